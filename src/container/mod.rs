pub mod wav;

pub use wav::{Container, ContainerError, ContainerResult};
