//! In-memory devices for exercising the engine without hardware.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{Device, DeviceError, DeviceFault, DeviceResult, InputDevice, OutputDevice, StreamSpec};

#[derive(Default)]
pub struct OutputLog {
    /// One entry per accepted period
    pub periods: Vec<Vec<i16>>,
    /// Faults to report on the next writes, in order
    pub faults: VecDeque<DeviceFault>,
    pub recoveries: Vec<DeviceFault>,
    pub fail_open: bool,
    pub opens: usize,
}

pub struct MemoryOutput {
    open: bool,
    log: Rc<RefCell<OutputLog>>,
}

impl MemoryOutput {
    pub fn new() -> (Self, Rc<RefCell<OutputLog>>) {
        let log = Rc::new(RefCell::new(OutputLog::default()));
        (
            Self {
                open: false,
                log: Rc::clone(&log),
            },
            log,
        )
    }
}

impl Device for MemoryOutput {
    fn name(&self) -> &str {
        "memory-out"
    }

    fn open(&mut self, _spec: &StreamSpec) -> DeviceResult<()> {
        if self.open {
            return Ok(());
        }
        let mut log = self.log.borrow_mut();
        if log.fail_open {
            return Err(DeviceError::NoDevice("output"));
        }
        log.opens += 1;
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn recover(&mut self, fault: DeviceFault) -> DeviceResult<()> {
        self.log.borrow_mut().recoveries.push(fault);
        if self.open || fault == DeviceFault::BadDescriptor {
            self.open = true;
            Ok(())
        } else {
            Err(DeviceError::NotOpen)
        }
    }
}

impl OutputDevice for MemoryOutput {
    fn write_period(&mut self, samples: &[i16]) -> Result<usize, DeviceFault> {
        if !self.open {
            return Err(DeviceFault::BadDescriptor);
        }
        let mut log = self.log.borrow_mut();
        if let Some(fault) = log.faults.pop_front() {
            return Err(fault);
        }
        log.periods.push(samples.to_vec());
        Ok(samples.len() / 2)
    }
}

#[derive(Default)]
pub struct InputLog {
    /// Interleaved stereo samples handed out by reads; silence once empty
    pub pending: VecDeque<i16>,
    pub faults: VecDeque<DeviceFault>,
    pub recoveries: Vec<DeviceFault>,
    pub fail_open: bool,
    /// Recovery closes the device and fails, like a vanished card
    pub fail_recover: bool,
    pub opens: usize,
    pub reads: usize,
}

pub struct MemoryInput {
    open: bool,
    log: Rc<RefCell<InputLog>>,
}

impl MemoryInput {
    pub fn new() -> (Self, Rc<RefCell<InputLog>>) {
        let log = Rc::new(RefCell::new(InputLog::default()));
        (
            Self {
                open: false,
                log: Rc::clone(&log),
            },
            log,
        )
    }
}

impl Device for MemoryInput {
    fn name(&self) -> &str {
        "memory-in"
    }

    fn open(&mut self, _spec: &StreamSpec) -> DeviceResult<()> {
        if self.open {
            return Ok(());
        }
        let mut log = self.log.borrow_mut();
        if log.fail_open {
            return Err(DeviceError::NoDevice("input"));
        }
        log.opens += 1;
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn recover(&mut self, fault: DeviceFault) -> DeviceResult<()> {
        let mut log = self.log.borrow_mut();
        log.recoveries.push(fault);
        if log.fail_recover {
            self.open = false;
            return Err(DeviceError::NotOpen);
        }
        Ok(())
    }
}

impl InputDevice for MemoryInput {
    fn read_period(&mut self, samples: &mut [i16]) -> Result<usize, DeviceFault> {
        if !self.open {
            return Err(DeviceFault::BadDescriptor);
        }
        let mut log = self.log.borrow_mut();
        if let Some(fault) = log.faults.pop_front() {
            return Err(fault);
        }
        log.reads += 1;
        for s in samples.iter_mut() {
            *s = log.pending.pop_front().unwrap_or(0);
        }
        Ok(samples.len() / 2)
    }
}
