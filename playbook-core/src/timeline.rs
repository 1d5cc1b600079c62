//! Playback timeline: current tick and play/pause state

use crate::KeyframeStore;
use tracing::debug;

/// Ticks advanced by a single [`TimelineController::tick`]
pub const TICK_STEP: u32 = 1;

/// Position of a recorded keyframe along the timeline, for progress displays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    /// Keyframe time in ticks
    pub time: u32,
    /// `time / duration`, in `[0, 1]`
    pub fraction: f64,
}

/// Owns the current time of a session and advances it during playback.
///
/// The controller never schedules anything itself: the host calls
/// [`tick`](Self::tick) once per rendered frame while playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineController {
    current_time: u32,
    duration: u32,
    playing: bool,
}

impl TimelineController {
    /// Creates a paused controller at tick 0
    pub fn new(duration: u32) -> Self {
        Self {
            current_time: 0,
            duration,
            playing: false,
        }
    }

    pub fn current_time(&self) -> u32 {
        self.current_time
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Moves to `time`, clamped to `[0, duration]`. Play state is unchanged.
    pub fn set_time(&mut self, time: u32) {
        self.current_time = time.min(self.duration);
    }

    /// Switches between playing and paused
    pub fn toggle_play(&mut self) {
        self.playing = !self.playing;
        debug!(
            playing = self.playing,
            time = self.current_time,
            "toggled playback"
        );
    }

    /// Advances one step while playing.
    ///
    /// Reaching the end of the timeline clamps the time to `duration` and
    /// pauses. Does nothing while paused.
    pub fn tick(&mut self) {
        if !self.playing {
            return;
        }

        let advanced = self.current_time.saturating_add(TICK_STEP);
        if advanced >= self.duration {
            self.current_time = self.duration;
            self.playing = false;
            debug!(time = self.current_time, "playback reached end of timeline");
        } else {
            self.current_time = advanced;
        }
    }

    /// Fraction of the timeline already played, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        f64::from(self.current_time) / f64::from(self.duration)
    }

    /// Markers for every keyframe reachable by playback
    pub fn markers(&self, store: &KeyframeStore) -> Vec<Marker> {
        store
            .iter()
            .filter(|k| k.time <= self.duration)
            .map(|k| Marker {
                time: k.time,
                fraction: if self.duration == 0 {
                    0.0
                } else {
                    f64::from(k.time) / f64::from(self.duration)
                },
            })
            .collect()
    }
}
