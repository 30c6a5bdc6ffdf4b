// Raw tri-axis accelerometer reading

use serde::{Deserialize, Serialize};

/// One accelerometer reading in g, as delivered by the sensor feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelReading {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm of the three axes.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// False when any axis is NaN or infinite.
    ///
    /// Non-finite readings are dropped before they reach the buffer; a single
    /// NaN would otherwise poison the deviation for a full window.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}
