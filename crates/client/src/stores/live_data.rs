//! Visible points of a live data stream.

use serde_json::Value;

/// The most recent points, oldest first, capped at `max_points`.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveDataState {
    pub points: Vec<Value>,
    pub max_points: usize,
}

impl LiveDataState {
    pub fn new(max_points: usize) -> Self {
        Self {
            points: Vec::new(),
            max_points,
        }
    }

    /// Append a flushed batch, dropping the oldest points over the cap.
    pub fn extend(&mut self, batch: impl IntoIterator<Item = Value>) {
        self.points.extend(batch);
        self.trim();
    }

    /// Replace every point with a snapshot.
    pub fn replace(&mut self, snapshot: Vec<Value>) {
        self.points = snapshot;
        self.trim();
    }

    pub fn latest(&self) -> Option<&Value> {
        self.points.last()
    }

    fn trim(&mut self) {
        if self.points.len() > self.max_points {
            let excess = self.points.len() - self.max_points;
            self.points.drain(..excess);
        }
    }
}
