use crate::audio::device::recovery;
use crate::audio::engine::Engine;
use crate::audio::mixer::mix_period;

/// Play one period from the playhead: read, mix to stereo, advance, submit.
///
/// Returns `false` once the file has no more data. While capture is running
/// the end of the file is not an end: the remainder of the period is silence
/// and the playhead keeps moving so recording can continue past it.
pub fn play_period(engine: &mut Engine) -> bool {
    let capturing = engine.capture_active();
    let period = engine.period_frames;
    let Some(container) = engine.container.as_mut() else {
        return false;
    };
    let channels = container.channels();
    let frame_size = container.frame_size();

    let input = &mut engine.read_buf[..period * frame_size];
    let frames = match container.read_frames(input) {
        Ok(n) => n,
        Err(e) => {
            log::error!("Playback read failed at frame {}: {}", engine.transport.position, e);
            0
        }
    };

    let out = &mut engine.mix_buf[..period * 2];
    out.fill(0);
    mix_period(engine.tracks.live(), channels, &input[..frames * frame_size], out);

    let (advance, more) = if frames == period {
        (frames, true)
    } else if capturing {
        (period, true)
    } else {
        (frames, false)
    };
    engine.transport.advance(advance as u64);
    container.seek_frame(engine.transport.position);

    if advance > 0 {
        if let Err(fault) = engine.output.write_period(&out[..advance * 2]) {
            recovery::recover(engine.output.as_mut(), fault, &mut engine.counters.underruns);
        }
    }
    if !more {
        log::debug!("End of data at frame {}", engine.transport.position);
    }
    more
}
