pub mod capture;
pub mod device;
pub mod engine;
pub mod mixer;
pub mod playback;
pub mod transport;
