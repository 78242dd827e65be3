// THEORY:
// The `alerts` module fuses both producers into a single notification view. Alerts
// are never stored: every query derives them again from the current detection
// snapshot and the current roster, then deduplicates, orders and windows the result.
//
// Because nothing accumulates, there is nothing to garbage-collect. The retention
// window is the whole retention policy, and deduplication collapses identical
// derivations. For a fixed source state and a fixed `now`, the output is always the
// same.

use crate::core_modules::detection::{BoundingBox, DETECTION_THRESHOLD, Detection};
use crate::pipeline::DetectionPipeline;
use crate::simulator::{EntitySimulator, EntitySnapshot, EntityStatus, Position};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Detections at or above this confidence raise HIGH severity alerts.
pub const HIGH_SEVERITY_CONFIDENCE: f64 = 0.8;

/// Default retention window: ten minutes.
pub const DEFAULT_WINDOW_SECS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    ThreatDetection,
    EntityWarning,
    EntityEmergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Medium,
    High,
}

/// Source-specific fields carried by an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertMetadata {
    Threat {
        label: String,
        confidence: f64,
        bounding_box: BoundingBox,
    },
    Entity {
        entity_id: String,
        display_name: String,
        vital_rate: u32,
        position: Position,
    },
}

/// A normalized notification derived from either source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    pub metadata: AlertMetadata,
    pub severity: Severity,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertConfig {
    pub window: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            window: Duration::seconds(DEFAULT_WINDOW_SECS),
        }
    }
}

/// Read access to the latest detection snapshot.
pub trait DetectionFeed {
    fn latest_detections(&self) -> Vec<Detection>;
}

/// Read access to the current roster.
pub trait RosterFeed {
    fn roster(&self) -> Vec<EntitySnapshot>;
}

impl DetectionFeed for DetectionPipeline {
    fn latest_detections(&self) -> Vec<Detection> {
        DetectionPipeline::latest_detections(self)
    }
}

impl RosterFeed for EntitySimulator {
    fn roster(&self) -> Vec<EntitySnapshot> {
        EntitySimulator::roster(self)
    }
}

impl DetectionFeed for Vec<Detection> {
    fn latest_detections(&self) -> Vec<Detection> {
        self.clone()
    }
}

impl RosterFeed for Vec<EntitySnapshot> {
    fn roster(&self) -> Vec<EntitySnapshot> {
        self.clone()
    }
}

impl<T: DetectionFeed + ?Sized> DetectionFeed for Arc<T> {
    fn latest_detections(&self) -> Vec<Detection> {
        (**self).latest_detections()
    }
}

impl<T: RosterFeed + ?Sized> RosterFeed for Arc<T> {
    fn roster(&self) -> Vec<EntitySnapshot> {
        (**self).roster()
    }
}

/// The alert a detection raises, if it clears the threshold.
pub fn threat_alert(detection: &Detection) -> Option<Alert> {
    if !(detection.confidence >= DETECTION_THRESHOLD) {
        return None;
    }
    let severity = if detection.confidence >= HIGH_SEVERITY_CONFIDENCE {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(Alert {
        kind: AlertKind::ThreatDetection,
        message: format!(
            "Threat detected: {} (confidence: {:.2})",
            detection.label, detection.confidence
        ),
        metadata: AlertMetadata::Threat {
            label: detection.label.clone(),
            confidence: detection.confidence,
            bounding_box: detection.bounding_box,
        },
        severity,
        raised_at: detection.observed_at,
    })
}

/// The alert an entity's status raises, if any.
pub fn entity_alert(entity: &EntitySnapshot) -> Option<Alert> {
    let (kind, severity, message) = match entity.status {
        EntityStatus::Normal => return None,
        EntityStatus::AtRisk => (
            AlertKind::EntityWarning,
            Severity::Medium,
            format!("WARNING: {} shows concerning vital signs", entity.display_name),
        ),
        EntityStatus::Critical => (
            AlertKind::EntityEmergency,
            Severity::High,
            format!("CRITICAL: {} requires immediate assistance", entity.display_name),
        ),
    };
    Some(Alert {
        kind,
        message,
        metadata: AlertMetadata::Entity {
            entity_id: entity.id.clone(),
            display_name: entity.display_name.clone(),
            vital_rate: entity.vital_rate,
            position: entity.position,
        },
        severity,
        raised_at: entity.updated_at,
    })
}

/// Derives, deduplicates, orders (newest first) and windows alerts from one pair of
/// source snapshots. An alert survives only if `raised_at > now - window`.
pub fn aggregate(
    detections: &[Detection],
    roster: &[EntitySnapshot],
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<Alert> {
    // --- 1. Derivation ---
    let derived = roster
        .iter()
        .filter_map(entity_alert)
        .chain(detections.iter().filter_map(threat_alert));

    // --- 2. Structural dedup ---
    let mut alerts: Vec<Alert> = Vec::new();
    for alert in derived {
        if !alerts.contains(&alert) {
            alerts.push(alert);
        }
    }

    // --- 3. Recency order (stable) ---
    alerts.sort_by(|a, b| b.raised_at.cmp(&a.raised_at));

    // --- 4. Retention window ---
    if let Some(cutoff) = now.checked_sub_signed(window) {
        alerts.retain(|alert| alert.raised_at > cutoff);
    }
    alerts
}

/// Pull-based view over both producers.
pub struct AlertAggregator<D, R> {
    detections: D,
    roster: R,
    config: AlertConfig,
}

impl<D: DetectionFeed, R: RosterFeed> AlertAggregator<D, R> {
    pub fn new(detections: D, roster: R, config: AlertConfig) -> Self {
        Self {
            detections,
            roster,
            config,
        }
    }

    /// Alerts at `now` using the configured retention window.
    pub fn current_alerts(&self, now: DateTime<Utc>) -> Vec<Alert> {
        self.current_alerts_within(now, self.config.window)
    }

    pub fn current_alerts_within(&self, now: DateTime<Utc>, window: Duration) -> Vec<Alert> {
        aggregate(
            &self.detections.latest_detections(),
            &self.roster.roster(),
            now,
            window,
        )
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }
}
