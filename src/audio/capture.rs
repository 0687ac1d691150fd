use crate::audio::device::recovery;
use crate::audio::engine::Engine;
use crate::constants::{LEG_COUNT, SAMPLE_BYTES};

/// Overwrite one channel of an interleaved period with one leg of captured
/// stereo input. Every other byte of `period` is left as it was.
pub fn splice_leg(period: &mut [u8], frame_stride: usize, channel: usize, captured: &[i16], leg: usize) {
    let slot = channel * SAMPLE_BYTES;
    debug_assert!(slot + SAMPLE_BYTES <= frame_stride);
    for (frame, pair) in period
        .chunks_exact_mut(frame_stride)
        .zip(captured.chunks_exact(LEG_COUNT))
    {
        frame[slot..slot + SAMPLE_BYTES].copy_from_slice(&pair[leg].to_le_bytes());
    }
}

/// Capture one period into the armed channels.
///
/// `head` is the playhead before this iteration's playback advanced it; the
/// period lands `record_offset` frames behind it. Returns whether capture is
/// active, including the lead-in before the compensated start is reached.
pub fn capture_period(engine: &mut Engine, head: u64) -> bool {
    if !engine.capture_active() {
        return false;
    }
    let period = engine.period_frames;
    let captured = &mut engine.capture_buf[..period * LEG_COUNT];

    let read = engine.input.read_period(captured);
    let frames = match read {
        Ok(n) => n.min(period),
        Err(fault) => {
            recovery::recover(engine.input.as_mut(), fault, &mut engine.counters.overruns);
            if !engine.input.is_open() {
                log::error!("Capture device lost; armed tracks back on the monitor mix");
                engine.refresh_recording();
                return false;
            }
            return true;
        }
    };

    // Input is drained during the lead-in so the device keeps flowing.
    let Some(target) = engine.transport.capture_target(head) else {
        return true;
    };
    if frames == 0 {
        return true;
    }
    let Some(container) = engine.container.as_mut() else {
        return false;
    };
    let frame_size = container.frame_size();

    if target + period as u64 > container.last_frame() {
        match container.extend(period * frame_size) {
            Ok(last) => log::debug!("Extended project to {} frames", last),
            Err(e) => {
                log::error!("Failed to extend project: {}", e);
                return true;
            }
        }
    }

    let span = &mut engine.splice_buf[..frames * frame_size];
    let existing = match container.read_at(target, span) {
        Ok(n) => n,
        Err(e) => {
            log::warn!("Capture read-back failed at frame {}: {}", target, e);
            return true;
        }
    };
    let span = &mut span[..existing * frame_size];
    for (leg, armed) in engine.armed.iter().enumerate() {
        if let Some(ch) = armed {
            splice_leg(span, frame_size, ch.get(), &captured[..frames * LEG_COUNT], leg);
        }
    }
    // Best effort: a failed write loses this period but keeps timing.
    if let Err(e) = container.write_at(target, span) {
        log::warn!("Capture write failed at frame {}: {}", target, e);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::DeviceFault;
    use crate::audio::engine::fixtures::{engine_with_file, read_frames, write_frames};
    use crate::audio::mixer::Leg;
    use crate::messages::Action;

    fn stereo(frames: usize, a: impl Fn(usize) -> i16, b: impl Fn(usize) -> i16) -> Vec<i16> {
        (0..frames).flat_map(|i| [a(i), b(i)]).collect()
    }

    #[test]
    fn splice_touches_only_the_target_channel() {
        let channels = 5;
        let stride = channels * SAMPLE_BYTES;
        let original: Vec<u8> = (0..8 * stride).map(|i| (i * 7 + 3) as u8).collect();
        let captured = stereo(8, |i| 1000 + i as i16, |i| -(i as i16));

        for k in 0..channels {
            let mut period = original.clone();
            splice_leg(&mut period, stride, k, &captured, 0);
            for (f, (new, old)) in period.chunks(stride).zip(original.chunks(stride)).enumerate() {
                for ch in 0..channels {
                    let slot = ch * 2..ch * 2 + 2;
                    if ch == k {
                        assert_eq!(&new[slot], &(1000 + f as i16).to_le_bytes());
                    } else {
                        assert_eq!(&new[slot.clone()], &old[slot]);
                    }
                }
            }
        }
    }

    #[test]
    fn splice_uses_requested_leg() {
        let mut period = vec![0u8; 4 * 2];
        splice_leg(&mut period, 4, 1, &stereo(2, |_| 5, |_| -5), 1);
        assert_eq!(period, [0, 0, 0xFB, 0xFF, 0, 0, 0xFB, 0xFF]);
    }

    #[test]
    fn first_write_lands_at_frame_zero_on_channel_three() {
        let period = 128;
        let original: Vec<Vec<i16>> = (0..1024).map(|i| (0..4).map(|ch| (i * 4 + ch) as i16).collect()).collect();
        let (mut engine, _dir, _out, input) = engine_with_file(4, period, |c| write_frames(c, &original));
        engine.transport.record_offset = 256;
        engine.selected = 3;
        engine.apply(Action::ToggleArm(Leg::A)).unwrap();
        engine.apply(Action::ToggleRecordEnable).unwrap();
        engine.apply(Action::ToggleTransport).unwrap();
        assert!(engine.tracks.all()[3].recording);

        input.borrow_mut().pending.extend(stereo(period * 3, |i| -(i as i16) - 1, |_| 9));
        // two lead-in periods, then the first write
        engine.step();
        engine.step();
        assert_eq!(engine.transport.position, 256);
        assert_eq!(read_frames(&mut engine, 0, 1024), original);
        engine.step();

        let after = read_frames(&mut engine, 0, 1024);
        for (i, (new, old)) in after.iter().zip(&original).enumerate() {
            for ch in 0..4 {
                if ch == 3 && i < period {
                    // third period of input, leg A
                    assert_eq!(new[ch], -((2 * period + i) as i16) - 1);
                } else {
                    assert_eq!(new[ch], old[ch], "frame {i} channel {ch}");
                }
            }
        }
    }

    #[test]
    fn target_trails_playhead_by_record_offset() {
        let period = 64;
        let offset = 100;
        let (mut engine, _dir, _out, input) = engine_with_file(2, period, |c| write_frames(c, &vec![vec![0, 0]; 2048]));
        engine.transport.record_offset = offset;
        engine.selected = 1;
        engine.apply(Action::ToggleArm(Leg::B)).unwrap();
        engine.apply(Action::ToggleRecordEnable).unwrap();
        engine.apply(Action::ToggleTransport).unwrap();

        // Each period of input carries the playhead it was captured at.
        for k in 0..10u64 {
            let head = k * period as u64;
            input.borrow_mut().pending.extend(stereo(period, |_| 0, |_| head as i16));
        }
        for _ in 0..10 {
            engine.step();
        }
        let frames = read_frames(&mut engine, 0, 2048);
        for k in 2..10u64 {
            let head = k * period as u64;
            let target = (head - offset) as usize;
            assert_eq!(frames[target][1], head as i16, "period {k}");
            assert_eq!(frames[target + period - 1][1], head as i16, "period {k}");
        }
        assert_eq!(frames[0][1], 0);
        assert!(frames.iter().all(|f| f[0] == 0));
    }

    #[test]
    fn capture_past_the_end_grows_one_period_at_a_time() {
        let period = 32;
        let (mut engine, _dir, _out, _input) = engine_with_file(3, period, |c| write_frames(c, &vec![vec![1, 2, 3]; 64]));
        engine.transport.record_offset = 0;
        engine.selected = 0;
        engine.apply(Action::ToggleArm(Leg::A)).unwrap();
        engine.apply(Action::ToggleRecordEnable).unwrap();
        engine.apply(Action::ToggleTransport).unwrap();

        let mut previous = engine.container.as_ref().unwrap().last_frame();
        assert_eq!(previous, 64);
        engine.step();
        engine.step();
        assert_eq!(engine.container.as_ref().unwrap().last_frame(), 64);
        for _ in 0..5 {
            engine.step();
            let last = engine.container.as_ref().unwrap().last_frame();
            assert_eq!(last, previous + period as u64);
            previous = last;
        }
        assert!(engine.is_playing());

        engine.apply(Action::ToggleTransport).unwrap();
        assert_eq!(engine.transport.last_frame(), 64 + 5 * 32);
        let frames = read_frames(&mut engine, 0, 224);
        assert!(frames[64..].iter().all(|f| f[1] == 0 && f[2] == 0));
    }

    #[test]
    fn stop_after_recording_past_the_end_keeps_head_inside_the_file() {
        let period = 32;
        let (mut engine, _dir, _out, _input) = engine_with_file(2, period, |c| write_frames(c, &vec![vec![0, 0]; 64]));
        engine.transport.record_offset = 64;
        engine.apply(Action::ToggleArm(Leg::A)).unwrap();
        engine.apply(Action::ToggleRecordEnable).unwrap();
        engine.apply(Action::ToggleTransport).unwrap();
        for _ in 0..5 {
            engine.step();
        }
        assert_eq!(engine.transport.position, 160);

        engine.apply(Action::ToggleTransport).unwrap();
        let status = engine.status();
        assert_eq!(status.last_frame, 96);
        assert_eq!(status.position, 96);
        assert_eq!(engine.session().position, 96);
    }

    #[test]
    fn lost_input_clears_recording_flags() {
        let (mut engine, _dir, _out, input) = engine_with_file(2, 16, |c| write_frames(c, &vec![vec![0, 0]; 256]));
        engine.transport.record_offset = 0;
        engine.apply(Action::ToggleArm(Leg::A)).unwrap();
        engine.apply(Action::ToggleRecordEnable).unwrap();
        engine.apply(Action::ToggleTransport).unwrap();
        assert!(engine.tracks.all()[0].recording);
        {
            let mut log = input.borrow_mut();
            log.faults.push_back(DeviceFault::BadDescriptor);
            log.fail_recover = true;
        }

        assert!(engine.step());
        assert!(!engine.input.is_open());
        assert!(!engine.tracks.all()[0].recording);
        assert!(!engine.capture_active());
        assert_eq!(engine.counters.overruns, 1);
        assert!(engine.is_playing());
    }

    #[test]
    fn input_faults_count_as_overruns() {
        let (mut engine, _dir, _out, input) = engine_with_file(2, 16, |c| write_frames(c, &vec![vec![0, 0]; 256]));
        engine.transport.record_offset = 0;
        engine.apply(Action::ToggleArm(Leg::A)).unwrap();
        engine.apply(Action::ToggleRecordEnable).unwrap();
        engine.apply(Action::ToggleTransport).unwrap();
        input.borrow_mut().faults.push_back(DeviceFault::Xrun);

        engine.step();
        engine.step();
        assert_eq!(engine.counters.overruns, 1);
        assert_eq!(engine.counters.underruns, 0);
        assert_eq!(input.borrow().recoveries, vec![DeviceFault::Xrun]);
    }

    #[test]
    fn idle_without_record_enable() {
        let (mut engine, _dir, _out, input) = engine_with_file(2, 16, |c| write_frames(c, &vec![vec![0, 0]; 256]));
        engine.apply(Action::ToggleArm(Leg::A)).unwrap();
        engine.apply(Action::ToggleTransport).unwrap();
        assert!(!capture_period(&mut engine, 0));
        assert_eq!(input.borrow().opens, 0);
    }
}
