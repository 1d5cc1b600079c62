//! Frame capture: plays a session from the start and samples its output
//!
//! This is the driver a video exporter (or any offline consumer) uses in place
//! of a render loop. It relies only on the timeline pausing itself at the end.

use crate::{Frame, Result, Session};
use tracing::{debug, info};

/// Receives sampled frames during a capture
pub trait FrameSink {
    /// Called with the current tick and the frame for it (`None` when nothing
    /// has been recorded)
    fn capture(&mut self, time: u32, frame: Option<&Frame>) -> Result<()>;
}

impl FrameSink for Vec<(u32, Option<Frame>)> {
    fn capture(&mut self, time: u32, frame: Option<&Frame>) -> Result<()> {
        self.push((time, frame.cloned()));
        Ok(())
    }
}

/// What a capture produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureSummary {
    /// Frames handed to the sink
    pub frames: u64,
    /// Ticks played
    pub ticks: u64,
}

/// Plays `session` from tick 0 until it pauses at the end of the timeline.
///
/// The first frame, every `every`-th tick and the final frame are sent to
/// `sink`. An `every` of 0 is treated as 1.
pub fn capture<S: FrameSink>(
    session: &mut Session,
    sink: &mut S,
    every: u32,
) -> Result<CaptureSummary> {
    let every = u64::from(every.max(1));
    let mut summary = CaptureSummary::default();

    session.set_time(0);
    if !session.timeline().is_playing() {
        session.toggle_play();
    }
    let duration = session.timeline().duration();
    debug!(duration, every, "starting capture");

    let frame = session.frame();
    sink.capture(session.timeline().current_time(), frame.as_ref())?;
    summary.frames += 1;

    let mut last_time = session.timeline().current_time();
    while session.timeline().is_playing() {
        let frame = session.tick();
        summary.ticks += 1;

        let time = session.timeline().current_time();
        let moved = time != last_time;
        last_time = time;

        let finished = !session.timeline().is_playing();
        if moved && (summary.ticks % every == 0 || finished) {
            sink.capture(time, frame.as_ref())?;
            summary.frames += 1;
        }

        if summary.ticks % 500 == 0 {
            debug!(
                ticks = summary.ticks,
                frames = summary.frames,
                "capture progress"
            );
        }
    }

    info!(
        frames = summary.frames,
        ticks = summary.ticks,
        "capture finished"
    );
    Ok(summary)
}
