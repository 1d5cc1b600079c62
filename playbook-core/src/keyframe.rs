//! Keyframe store and position interpolation
//!
//! Keyframes are snapshots of every tracked piece at one timeline tick. The
//! store keeps them sorted by time with at most one keyframe per tick, which is
//! what lets [`KeyframeStore::query`] find the bracketing pair with a single
//! scan from each end.

use crate::EntityPosition;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Entity identifier to position mapping
pub type Positions = BTreeMap<String, EntityPosition>;

/// A committed snapshot of all tracked positions at one tick
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Keyframe {
    /// Timeline tick this snapshot belongs to
    pub time: u32,
    /// Per-entity positions
    pub positions: Positions,
    /// Position of the shared object, tracked apart from the pieces
    #[cfg_attr(feature = "serde", serde(default))]
    pub special: Option<EntityPosition>,
}

impl Keyframe {
    /// Creates a new keyframe
    pub fn new(time: u32, positions: Positions, special: Option<EntityPosition>) -> Self {
        Self {
            time,
            positions,
            special,
        }
    }
}

/// Positions computed for a query time
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    /// Per-entity positions
    pub positions: Positions,
    /// Position of the shared object, if any bracket defined one
    pub special: Option<EntityPosition>,
}

impl From<&Keyframe> for Frame {
    fn from(keyframe: &Keyframe) -> Self {
        Self {
            positions: keyframe.positions.clone(),
            special: keyframe.special,
        }
    }
}

/// Which entity keys take part in interpolation between two keyframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterpolationMode {
    /// Only keys of the earlier keyframe are interpolated; keys that first
    /// appear in the later keyframe are left out until it is reached.
    #[default]
    PrevKeys,
    /// Keys of both keyframes; a key missing from one side is held at the
    /// value of the side that has it.
    UnionKeys,
}

/// Time-ordered keyframe collection with at most one keyframe per tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeStore {
    keyframes: Vec<Keyframe>,
}

impl KeyframeStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from keyframes in any order.
    ///
    /// When several keyframes share a time, the one appearing last wins.
    pub fn from_keyframes<I>(keyframes: I) -> Self
    where
        I: IntoIterator<Item = Keyframe>,
    {
        let mut store = Self::new();
        for keyframe in keyframes {
            store.insert(keyframe);
        }
        store
    }

    /// Records a snapshot at `time`, replacing any keyframe already there
    pub fn record(&mut self, time: u32, positions: Positions, special: Option<EntityPosition>) {
        self.insert(Keyframe::new(time, positions, special));
    }

    /// Inserts a keyframe, replacing any keyframe with the same time
    pub fn insert(&mut self, keyframe: Keyframe) {
        let before = self.keyframes.len();
        self.keyframes.retain(|k| k.time != keyframe.time);
        if self.keyframes.len() != before {
            debug!(time = keyframe.time, "replacing keyframe");
        } else {
            debug!(
                time = keyframe.time,
                entities = keyframe.positions.len(),
                "recording keyframe"
            );
        }

        self.keyframes.push(keyframe);
        self.keyframes.sort_by_key(|k| k.time);
    }

    /// Returns the keyframe recorded exactly at `time`
    pub fn get(&self, time: u32) -> Option<&Keyframe> {
        self.keyframes
            .binary_search_by_key(&time, |k| k.time)
            .ok()
            .map(|idx| &self.keyframes[idx])
    }

    /// All keyframes, ascending by time
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyframe> {
        self.keyframes.iter()
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Interpolated positions at `time` using [`InterpolationMode::PrevKeys`].
    ///
    /// Returns `None` when nothing has been recorded yet.
    pub fn query(&self, time: u32) -> Option<Frame> {
        self.query_with(time, InterpolationMode::default())
    }

    /// Interpolated positions at `time` using the given key mode
    pub fn query_with(&self, time: u32, mode: InterpolationMode) -> Option<Frame> {
        let prev = self.keyframes.iter().rev().find(|k| k.time <= time);
        let next = self.keyframes.iter().find(|k| k.time > time);
        trace!(
            time,
            prev = prev.map(|k| k.time),
            next = next.map(|k| k.time),
            "querying keyframes"
        );

        match (prev, next) {
            (None, None) => None,
            (Some(hold), None) | (None, Some(hold)) => Some(Frame::from(hold)),
            (Some(prev), Some(next)) => Some(interpolate(prev, next, time, mode)),
        }
    }
}

/// Interpolates between two keyframes with `prev.time <= time < next.time`
fn interpolate(prev: &Keyframe, next: &Keyframe, time: u32, mode: InterpolationMode) -> Frame {
    let span = f64::from(next.time - prev.time);
    let factor = f64::from(time - prev.time) / span;

    let mut positions: Positions = prev
        .positions
        .iter()
        .map(|(id, from)| {
            let pos = match next.positions.get(id) {
                Some(to) => from.lerp(*to, factor),
                None => *from,
            };
            (id.clone(), pos)
        })
        .collect();

    if mode == InterpolationMode::UnionKeys {
        for (id, pos) in &next.positions {
            positions.entry(id.clone()).or_insert(*pos);
        }
    }

    let special = match (prev.special, next.special) {
        (Some(from), Some(to)) => Some(from.lerp(to, factor)),
        (from, to) => from.or(to),
    };

    Frame { positions, special }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(entries: &[(&str, f64, f64)]) -> Positions {
        entries
            .iter()
            .map(|(id, x, y)| (id.to_string(), EntityPosition::new(*x, *y)))
            .collect()
    }

    #[test]
    fn test_record_keeps_store_sorted_and_unique() {
        let mut store = KeyframeStore::new();
        for time in [300, 0, 150, 300, 75, 0] {
            store.record(time, positions(&[("p1", time as f64, 0.0)]), None);
        }

        let times: Vec<u32> = store.iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0, 75, 150, 300]);
    }

    #[test]
    fn test_record_same_time_replaces() {
        let mut store = KeyframeStore::new();
        store.record(40, positions(&[("p1", 1.0, 1.0)]), None);
        store.record(40, positions(&[("p1", 1.0, 1.0)]), None);
        assert_eq!(store.len(), 1);

        store.record(40, positions(&[("p1", 9.0, 9.0)]), None);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(40).unwrap().positions["p1"],
            EntityPosition::new(9.0, 9.0)
        );
    }

    #[test]
    fn test_query_empty_store_has_no_data() {
        let store = KeyframeStore::new();
        assert_eq!(store.query(0), None);
    }

    #[test]
    fn test_query_midpoint() {
        let mut store = KeyframeStore::new();
        store.record(0, positions(&[("p1", 10.0, 10.0)]), None);
        store.record(100, positions(&[("p1", 110.0, 10.0)]), None);

        let frame = store.query(50).unwrap();
        assert_eq!(frame.positions, positions(&[("p1", 60.0, 10.0)]));
    }

    #[test]
    fn test_query_holds_single_keyframe() {
        let mut store = KeyframeStore::new();
        store.record(200, positions(&[("p1", 5.0, 5.0)]), None);

        let expected = positions(&[("p1", 5.0, 5.0)]);
        assert_eq!(store.query(50).unwrap().positions, expected);
        assert_eq!(store.query(500).unwrap().positions, expected);
    }

    #[test]
    fn test_query_exact_time_is_exact() {
        let mut store = KeyframeStore::new();
        store.record(0, positions(&[("p1", 0.0, 0.0)]), None);
        store.record(10, positions(&[("p1", 33.3, 66.6)]), Some(EntityPosition::new(1.0, 2.0)));
        store.record(20, positions(&[("p1", 90.0, 0.0)]), None);

        let frame = store.query(10).unwrap();
        assert_eq!(frame, Frame::from(store.get(10).unwrap()));
    }

    #[test]
    fn test_query_stays_within_bracket() {
        let mut store = KeyframeStore::new();
        store.record(3, positions(&[("a", 80.0, 5.0), ("b", -4.0, 12.5)]), None);
        store.record(17, positions(&[("a", 20.0, 95.0), ("b", 4.0, 12.5)]), None);

        for t in 4..17 {
            let frame = store.query(t).unwrap();
            let a = frame.positions["a"];
            let b = frame.positions["b"];
            assert!((20.0..=80.0).contains(&a.x));
            assert!((5.0..=95.0).contains(&a.y));
            assert!((-4.0..=4.0).contains(&b.x));
            assert_eq!(b.y, 12.5);
        }
    }

    #[test]
    fn test_entities_only_in_next_are_skipped() {
        let mut store = KeyframeStore::new();
        store.record(0, positions(&[("p1", 0.0, 0.0), ("p2", 50.0, 50.0)]), None);
        store.record(10, positions(&[("p1", 10.0, 0.0), ("p3", 70.0, 70.0)]), None);

        let frame = store.query(5).unwrap();
        assert_eq!(frame.positions.len(), 2);
        assert_eq!(frame.positions["p1"], EntityPosition::new(5.0, 0.0));
        // held: missing from the later keyframe
        assert_eq!(frame.positions["p2"], EntityPosition::new(50.0, 50.0));
        assert!(!frame.positions.contains_key("p3"));

        let union = store.query_with(5, InterpolationMode::UnionKeys).unwrap();
        assert_eq!(union.positions.len(), 3);
        assert_eq!(union.positions["p3"], EntityPosition::new(70.0, 70.0));
    }

    #[test]
    fn test_special_position() {
        let mut store = KeyframeStore::new();
        store.record(0, Positions::new(), Some(EntityPosition::new(0.0, 0.0)));
        store.record(4, Positions::new(), Some(EntityPosition::new(40.0, 8.0)));
        store.record(8, Positions::new(), None);

        assert_eq!(store.query(1).unwrap().special, Some(EntityPosition::new(10.0, 2.0)));
        // only the earlier bracket has one
        assert_eq!(store.query(6).unwrap().special, Some(EntityPosition::new(40.0, 8.0)));
        assert_eq!(store.query(9).unwrap().special, None);
    }

    #[test]
    fn test_from_keyframes_last_duplicate_wins() {
        let store = KeyframeStore::from_keyframes(vec![
            Keyframe::new(20, positions(&[("p1", 1.0, 1.0)]), None),
            Keyframe::new(5, Positions::new(), None),
            Keyframe::new(20, positions(&[("p1", 2.0, 2.0)]), None),
        ]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.keyframes()[0].time, 5);
        assert_eq!(
            store.get(20).unwrap().positions["p1"],
            EntityPosition::new(2.0, 2.0)
        );
    }
}
