// THEORY:
// A `Detection` is the pipeline's output unit: one labelled, scored box observed in
// one frame. It is only ever constructed through `Watchlist::admit`, which is the
// single gate enforcing the two emission rules: the label must be watched and the
// confidence must clear the detection threshold. Anything that reaches a published
// snapshot therefore already satisfies both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minimum confidence for a detection to be emitted.
pub const DETECTION_THRESHOLD: f64 = 0.5;

/// Labels watched when no custom watchlist is supplied.
pub const DEFAULT_WATCHLIST: &[&str] = &[
    "person",
    "car",
    "truck",
    "motorbike",
    "knife",
    "gun",
    "vehicle",
    "intrusion",
];

/// Axis-aligned box in frame pixel coordinates, `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Returns `None` for degenerate or inverted boxes.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Option<Self> {
        (x1 < x2 && y1 < y2).then_some(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// One classified observation from a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
    pub observed_at: DateTime<Utc>,
}

/// The fixed set of threat-relevant labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchlist {
    labels: BTreeSet<String>,
}

impl Default for Watchlist {
    fn default() -> Self {
        Self::new(DEFAULT_WATCHLIST.iter().copied())
    }
}

impl Watchlist {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Builds a `Detection` if `label` is watched and `confidence` clears
    /// `DETECTION_THRESHOLD`.
    pub fn admit(
        &self,
        label: &str,
        confidence: f64,
        bounding_box: BoundingBox,
        observed_at: DateTime<Utc>,
    ) -> Option<Detection> {
        if !self.contains(label) || !(confidence >= DETECTION_THRESHOLD) || confidence > 1.0 {
            return None;
        }
        Some(Detection {
            label: label.to_string(),
            confidence,
            bounding_box,
            observed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap()
    }

    #[test]
    fn rejects_degenerate_boxes() {
        assert!(BoundingBox::new(5.0, 0.0, 5.0, 10.0).is_none());
        assert!(BoundingBox::new(0.0, 9.0, 10.0, 1.0).is_none());
        assert_eq!(bbox().width(), 10.0);
    }

    #[test]
    fn admits_only_watched_confident_labels() {
        let watchlist = Watchlist::default();
        let now = Utc::now();
        assert!(watchlist.admit("gun", 0.9, bbox(), now).is_some());
        assert!(watchlist.admit("gun", 0.5, bbox(), now).is_some());
        assert!(watchlist.admit("gun", 0.49, bbox(), now).is_none());
        assert!(watchlist.admit("gun", f64::NAN, bbox(), now).is_none());
        assert!(watchlist.admit("umbrella", 0.99, bbox(), now).is_none());
    }

    #[test]
    fn custom_watchlist_replaces_defaults() {
        let watchlist = Watchlist::new(["drone"]);
        assert!(watchlist.contains("drone"));
        assert!(!watchlist.contains("gun"));
        assert_eq!(watchlist.labels().collect::<Vec<_>>(), vec!["drone"]);
    }
}
