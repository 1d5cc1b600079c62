//! Authoring session tying the keyframe store to the timeline
//!
//! A [`Session`] is what a host UI drives: it reports piece moves, records
//! keyframes, scrubs and plays. Every mutator hands back the frame the host
//! should render for the new current time.

use crate::{
    EntityPosition, Frame, InterpolationMode, KeyframeStore, Positions, SavedPlay,
    TimelineController,
};
use tracing::debug;

/// Session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Timeline length in ticks
    pub duration: u32,
    /// Which entities take part in interpolation
    pub interpolation: InterpolationMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration: 2500,
            interpolation: InterpolationMode::PrevKeys,
        }
    }
}

/// One editing/playback session
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    store: KeyframeStore,
    timeline: TimelineController,
    stage: Frame,
}

impl Session {
    /// Creates an empty session
    pub fn new(config: SessionConfig) -> Self {
        Self::with_store(config, KeyframeStore::new())
    }

    /// Creates a session over an existing store
    pub fn with_store(config: SessionConfig, store: KeyframeStore) -> Self {
        let mut session = Self {
            config,
            store,
            timeline: TimelineController::new(config.duration),
            stage: Frame::default(),
        };
        session.refresh();
        session
    }

    /// Restores a saved play; its duration overrides the configured one
    pub fn from_saved(play: SavedPlay, config: SessionConfig) -> Self {
        let config = SessionConfig {
            duration: play.duration,
            ..config
        };
        Self::with_store(config, play.into_store())
    }

    /// Snapshot for the persistence layer
    pub fn to_saved(&self) -> SavedPlay {
        SavedPlay::from_store(self.config.duration, &self.store)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &KeyframeStore {
        &self.store
    }

    pub fn timeline(&self) -> &TimelineController {
        &self.timeline
    }

    /// Positions currently on stage, as last reported or played back
    pub fn stage(&self) -> &Frame {
        &self.stage
    }

    /// Host reports a piece moved
    pub fn move_entity(&mut self, id: impl Into<String>, pos: EntityPosition) {
        self.stage.positions.insert(id.into(), pos);
    }

    /// Host reports the shared object moved
    pub fn move_special(&mut self, pos: EntityPosition) {
        self.stage.special = Some(pos);
    }

    /// Host removed a piece from the surface
    pub fn remove_entity(&mut self, id: &str) -> Option<EntityPosition> {
        self.stage.positions.remove(id)
    }

    /// Records the stage at the current time
    pub fn record(&mut self) -> Option<Frame> {
        let time = self.timeline.current_time();
        self.store
            .record(time, self.stage.positions.clone(), self.stage.special);
        self.refresh()
    }

    /// Records explicit positions at `time`, leaving the current time alone
    pub fn record_at(
        &mut self,
        time: u32,
        positions: Positions,
        special: Option<EntityPosition>,
    ) -> Option<Frame> {
        self.store.record(time, positions, special);
        self.refresh()
    }

    /// Scrubs to `time`
    pub fn set_time(&mut self, time: u32) -> Option<Frame> {
        self.timeline.set_time(time);
        self.refresh()
    }

    pub fn toggle_play(&mut self) -> Option<Frame> {
        self.timeline.toggle_play();
        self.refresh()
    }

    /// Advances playback by one frame
    pub fn tick(&mut self) -> Option<Frame> {
        if !self.timeline.is_playing() {
            return self.frame();
        }
        self.timeline.tick();
        self.refresh()
    }

    /// Interpolated positions at the current time
    pub fn frame(&self) -> Option<Frame> {
        self.store
            .query_with(self.timeline.current_time(), self.config.interpolation)
    }

    /// Queries the current time and moves the stage there when data exists
    fn refresh(&mut self) -> Option<Frame> {
        let frame = self.frame();
        match &frame {
            Some(frame) => self.stage = frame.clone(),
            None => debug!(
                time = self.timeline.current_time(),
                "no keyframes, keeping stage"
            ),
        }
        frame
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
