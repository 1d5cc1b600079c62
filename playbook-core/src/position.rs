//! Planar positions of pieces on the playing surface

/// Position of a single entity on the surface.
///
/// Coordinates are usually expressed as a percentage of the surface (0-100),
/// but nothing here enforces that range.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityPosition {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl EntityPosition {
    /// Creates a new position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linearly interpolates towards `target` by `factor`
    pub fn lerp(self, target: EntityPosition, factor: f64) -> Self {
        Self {
            x: self.x + (target.x - self.x) * factor,
            y: self.y + (target.y - self.y) * factor,
        }
    }
}

impl From<(f64, f64)> for EntityPosition {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}
