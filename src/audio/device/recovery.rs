use super::{Device, DeviceFault};

/// Count `fault` and run the device's recovery primitive. A failed recovery
/// is logged and left for the operator to see in the counter; the period
/// loop carries on either way. Returns whether the device recovered.
pub fn recover<D: Device + ?Sized>(device: &mut D, fault: DeviceFault, counter: &mut u32) -> bool {
    *counter = counter.saturating_add(1);
    log::warn!("{}: {} (#{})", device.name(), fault.label(), counter);
    match device.recover(fault) {
        Ok(()) => true,
        Err(e) => {
            log::error!("{}: recovery from {} failed: {}", device.name(), fault.label(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::memory::MemoryOutput;
    use crate::audio::device::{OutputDevice, StreamSpec};

    const SPEC: StreamSpec = StreamSpec {
        sample_rate: 44_100,
        channels: 2,
        period_frames: 4,
    };

    #[test]
    fn counts_every_fault_kind() {
        let (mut out, log) = MemoryOutput::new();
        out.open(&SPEC).unwrap();
        let mut underruns = 0;
        for fault in [DeviceFault::Xrun, DeviceFault::Suspended, DeviceFault::BadDescriptor] {
            assert!(recover(&mut out, fault, &mut underruns));
        }
        assert_eq!(underruns, 3);
        assert_eq!(log.borrow().recoveries.len(), 3);
    }

    #[test]
    fn failed_recovery_is_counted_not_fatal() {
        let (mut out, _log) = MemoryOutput::new();
        let mut underruns = 0;
        // closed device cannot un-suspend
        assert!(!recover(&mut out, DeviceFault::Suspended, &mut underruns));
        assert_eq!(underruns, 1);
        assert_eq!(out.write_period(&[0; 8]), Err(DeviceFault::BadDescriptor));
    }
}
