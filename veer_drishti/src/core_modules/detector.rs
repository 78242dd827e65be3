// THEORY:
// The `Detector` is the leaf of the engine: one frame in, zero or more detections out.
// It is a capability with two interchangeable strategies:
//
// 1.  **ModelDetector**: wraps a learned `ClassifierBackend`. Every predicted box
//     passes through the watchlist gate unchanged (label, score and coordinates).
// 2.  **MotionDetector**: the heuristic fallback. It compares the current frame with
//     the previous one (see `motion_regions`) and reports each sufficiently large
//     changed region as an "intrusion" at a fixed confidence.
//
// The strategy is chosen exactly once, by `select_detector`, when the pipeline is
// built. A missing or failing classifier loader selects the heuristic. There is no
// runtime re-selection.

use crate::core_modules::detection::{BoundingBox, Detection, Watchlist};
use crate::core_modules::frame::Frame;
use crate::core_modules::motion_regions::{binarize_difference, find_regions};
use crate::error::{BackendUnavailable, DetectorError};
use chrono::Utc;
use tracing::{info, warn};

pub const INTRUSION_LABEL: &str = "intrusion";

/// Tunables for the motion heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionConfig {
    /// Luminance difference a pixel must exceed to count as changed.
    pub diff_threshold: u8,
    /// A changed region must cover strictly more pixels than this to be reported.
    pub min_region_area: usize,
    /// Confidence assigned to every motion detection.
    pub confidence: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            diff_threshold: 30,
            min_region_area: 1000,
            confidence: 0.7,
        }
    }
}

/// A single detection strategy.
pub trait Detector: Send {
    /// Strategy name for logs and health output.
    fn name(&self) -> &str;

    /// Classifies `frame`. `previous` is the frame sampled on the prior tick, if any.
    fn detect(&mut self, frame: &Frame, previous: Option<&Frame>) -> Result<Vec<Detection>, DetectorError>;
}

/// One raw box predicted by a learned classifier, before watchlist filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

/// A learned image classifier.
pub trait ClassifierBackend: Send {
    fn name(&self) -> &str;

    fn predict(&mut self, frame: &Frame) -> Result<Vec<Prediction>, DetectorError>;
}

/// Attempts to bring up a learned backend. Run once, at pipeline construction.
pub type ClassifierLoader = Box<dyn FnOnce() -> Result<Box<dyn ClassifierBackend>, BackendUnavailable> + Send>;

/// Learned-model strategy.
pub struct ModelDetector {
    backend: Box<dyn ClassifierBackend>,
    watchlist: Watchlist,
}

impl ModelDetector {
    pub fn new(backend: Box<dyn ClassifierBackend>, watchlist: Watchlist) -> Self {
        Self { backend, watchlist }
    }
}

impl Detector for ModelDetector {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn detect(&mut self, frame: &Frame, _previous: Option<&Frame>) -> Result<Vec<Detection>, DetectorError> {
        let observed_at = Utc::now();
        let predictions = self.backend.predict(frame)?;
        Ok(predictions
            .into_iter()
            .filter_map(|p| self.watchlist.admit(&p.label, p.confidence, p.bounding_box, observed_at))
            .collect())
    }
}

/// Frame-differencing heuristic strategy.
pub struct MotionDetector {
    config: MotionConfig,
    watchlist: Watchlist,
}

impl MotionDetector {
    pub fn new(config: MotionConfig, watchlist: Watchlist) -> Self {
        Self { config, watchlist }
    }
}

impl Detector for MotionDetector {
    fn name(&self) -> &str {
        "motion-heuristic"
    }

    fn detect(&mut self, frame: &Frame, previous: Option<&Frame>) -> Result<Vec<Detection>, DetectorError> {
        // --- 1. No baseline, no motion ---
        let Some(previous) = previous else {
            return Ok(Vec::new());
        };
        if !frame.same_dimensions(previous) {
            return Err(DetectorError::Frame(format!(
                "frame is {}x{} but previous frame is {}x{}",
                frame.width, frame.height, previous.width, previous.height
            )));
        }

        // --- 2. Difference & binarize ---
        let mask = binarize_difference(&frame.to_grayscale(), &previous.to_grayscale(), self.config.diff_threshold);

        // --- 3. Regions to detections ---
        let observed_at = Utc::now();
        let detections = find_regions(&mask, frame.width, frame.height)
            .into_iter()
            .filter(|region| region.area > self.config.min_region_area)
            .filter_map(|region| {
                let (x1, y1, x2, y2) = region.rect();
                let bounding_box = BoundingBox::new(x1 as f64, y1 as f64, x2 as f64, y2 as f64)?;
                self.watchlist
                    .admit(INTRUSION_LABEL, self.config.confidence, bounding_box, observed_at)
            })
            .collect();
        Ok(detections)
    }
}

/// Picks the detection strategy for the lifetime of a pipeline.
pub fn select_detector(
    loader: Option<ClassifierLoader>,
    motion: MotionConfig,
    watchlist: Watchlist,
) -> Box<dyn Detector> {
    match loader.map(|load| load()) {
        Some(Ok(backend)) => {
            info!(backend = %backend.name(), "Classifier backend loaded");
            Box::new(ModelDetector::new(backend, watchlist))
        }
        Some(Err(e)) => {
            warn!(error = %e, "Classifier backend failed to load, using motion heuristic");
            Box::new(MotionDetector::new(motion, watchlist))
        }
        None => {
            warn!("No classifier backend available, using motion heuristic");
            Box::new(MotionDetector::new(motion, watchlist))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend(Vec<Prediction>);

    impl ClassifierBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict(&mut self, _frame: &Frame) -> Result<Vec<Prediction>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    fn prediction(label: &str, confidence: f64) -> Prediction {
        Prediction {
            label: label.to_string(),
            confidence,
            bounding_box: BoundingBox::new(1.0, 2.0, 30.0, 40.0).unwrap(),
        }
    }

    fn motion() -> MotionDetector {
        MotionDetector::new(MotionConfig::default(), Watchlist::default())
    }

    #[test]
    fn motion_without_previous_frame_is_empty() {
        let frame = Frame::filled(64, 64, 200);
        assert!(motion().detect(&frame, None).unwrap().is_empty());
    }

    #[test]
    fn motion_reports_large_changed_region() {
        let previous = Frame::filled(100, 100, 0);
        let mut current = previous.clone();
        current.fill_rect(10, 20, 50, 60, 255);

        let detections = motion().detect(&current, Some(&previous)).unwrap();
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.label, INTRUSION_LABEL);
        assert_eq!(d.confidence, 0.7);
        assert_eq!(d.bounding_box, BoundingBox::new(10.0, 20.0, 50.0, 60.0).unwrap());
    }

    #[test]
    fn motion_ignores_small_or_faint_changes() {
        let previous = Frame::filled(100, 100, 100);

        let mut small = previous.clone();
        small.fill_rect(0, 0, 10, 10, 255);
        assert!(motion().detect(&small, Some(&previous)).unwrap().is_empty());

        let faint = Frame::filled(100, 100, 125);
        assert!(motion().detect(&faint, Some(&previous)).unwrap().is_empty());
    }

    #[test]
    fn motion_area_threshold_is_strict() {
        let previous = Frame::filled(100, 100, 0);
        let mut exact = previous.clone();
        exact.fill_rect(0, 0, 50, 20, 255);
        assert!(motion().detect(&exact, Some(&previous)).unwrap().is_empty());

        let mut over = previous.clone();
        over.fill_rect(0, 0, 51, 20, 255);
        assert_eq!(motion().detect(&over, Some(&previous)).unwrap().len(), 1);
    }

    #[test]
    fn motion_rejects_resized_frames() {
        let previous = Frame::filled(100, 100, 0);
        let current = Frame::filled(80, 100, 255);
        let err = motion().detect(&current, Some(&previous)).unwrap_err();
        assert!(matches!(err, DetectorError::Frame(_)));
        assert!(err.to_string().contains("80x100"));
    }

    #[test]
    fn motion_respects_watchlist() {
        let previous = Frame::filled(100, 100, 0);
        let mut current = previous.clone();
        current.fill_rect(0, 0, 60, 60, 255);
        let mut detector = MotionDetector::new(MotionConfig::default(), Watchlist::new(["gun"]));
        assert!(detector.detect(&current, Some(&previous)).unwrap().is_empty());
    }

    #[test]
    fn model_filters_by_watchlist_and_threshold() {
        let backend = FixedBackend(vec![
            prediction("gun", 0.91),
            prediction("gun", 0.3),
            prediction("umbrella", 0.99),
            prediction("person", 0.5),
        ]);
        let mut detector = ModelDetector::new(Box::new(backend), Watchlist::default());
        let detections = detector.detect(&Frame::filled(8, 8, 0), None).unwrap();

        let labels: Vec<_> = detections.iter().map(|d| (d.label.as_str(), d.confidence)).collect();
        assert_eq!(labels, vec![("gun", 0.91), ("person", 0.5)]);
        assert_eq!(detections[0].bounding_box, BoundingBox::new(1.0, 2.0, 30.0, 40.0).unwrap());
    }

    #[test]
    fn selection_prefers_loaded_backend() {
        let loader: ClassifierLoader =
            Box::new(|| Ok(Box::new(FixedBackend(Vec::new())) as Box<dyn ClassifierBackend>));
        let detector = select_detector(Some(loader), MotionConfig::default(), Watchlist::default());
        assert_eq!(detector.name(), "fixed");
    }

    #[test]
    fn selection_falls_back_to_heuristic() {
        let failing: ClassifierLoader = Box::new(|| Err(BackendUnavailable::new("weights missing")));
        let detector = select_detector(Some(failing), MotionConfig::default(), Watchlist::default());
        assert_eq!(detector.name(), "motion-heuristic");

        let detector = select_detector(None, MotionConfig::default(), Watchlist::default());
        assert_eq!(detector.name(), "motion-heuristic");
    }
}
