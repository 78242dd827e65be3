use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use veer_drishti::simulator::default_roster;
use veer_drishti::{
    AlertAggregator, AlertConfig, AlertKind, AlertMetadata, BoundingBox, Detection, DetectionPipeline, EntitySimulator,
    Frame, MemorySource, PipelineConfig, Severity, SimulatorConfig,
};

fn calm_squad() -> Arc<EntitySimulator> {
    let roster = default_roster().into_iter().map(|seed| seed.with_vital_rate(80)).collect();
    Arc::new(EntitySimulator::new(
        SimulatorConfig {
            seed: Some(11),
            ..SimulatorConfig::default()
        },
        roster,
    ))
}

#[test]
fn threat_then_emergency_scenario() {
    let squad = calm_squad();
    let gun = Detection {
        label: "gun".to_string(),
        confidence: 0.9,
        bounding_box: BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap(),
        observed_at: Utc::now() - ChronoDuration::seconds(5),
    };
    let aggregator = AlertAggregator::new(vec![gun], squad.clone(), AlertConfig::default());

    // --- 1. One published detection, nobody in distress ---
    let alerts = aggregator.current_alerts(Utc::now());
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::ThreatDetection);
    assert_eq!(alerts[0].severity, Severity::High);

    // --- 2. Soldier three goes down ---
    assert!(squad.force_emergency("soldier-3"));
    let alerts = aggregator.current_alerts(Utc::now());
    assert_eq!(alerts.len(), 2);

    let emergencies: Vec<_> = alerts.iter().filter(|a| a.kind == AlertKind::EntityEmergency).collect();
    assert_eq!(emergencies.len(), 1);
    assert_eq!(emergencies[0].severity, Severity::High);
    match &emergencies[0].metadata {
        AlertMetadata::Entity { entity_id, vital_rate, .. } => {
            assert_eq!(entity_id, "soldier-3");
            assert!((120..=150).contains(vital_rate));
        }
        other => panic!("unexpected metadata {other:?}"),
    }

    assert!(alerts[0].raised_at >= alerts[1].raised_at);
    assert_eq!(alerts[0].kind, AlertKind::EntityEmergency);

    // --- 3. Unknown ids change nothing ---
    assert!(!squad.force_emergency("soldier-42"));
    let now = Utc::now();
    assert_eq!(aggregator.current_alerts(now), aggregator.current_alerts(now));
    assert_eq!(aggregator.current_alerts(now).len(), 2);
}

#[test]
fn fresh_squad_raises_no_alerts() {
    for seed in 0..20 {
        let squad = EntitySimulator::new(
            SimulatorConfig {
                seed: Some(seed),
                ..SimulatorConfig::default()
            },
            default_roster(),
        );
        let aggregator = AlertAggregator::new(Vec::<Detection>::new(), squad, AlertConfig::default());
        assert!(aggregator.current_alerts(Utc::now()).is_empty(), "seed {seed}");
    }
}

#[tokio::test]
async fn motion_feed_flows_into_alerts() {
    let still = Frame::filled(120, 120, 0);
    let mut moved = still.clone();
    moved.fill_rect(20, 20, 80, 80, 255);

    let pipeline = Arc::new(DetectionPipeline::new(
        PipelineConfig {
            sample_interval: Duration::from_millis(5),
            ..PipelineConfig::default()
        },
        Box::new(MemorySource::new(vec![still, moved])),
        None,
    ));
    assert_eq!(pipeline.strategy(), "motion-heuristic");

    let squad = calm_squad();
    let aggregator = AlertAggregator::new(pipeline.clone(), squad, AlertConfig::default());

    pipeline.start();
    for _ in 0..400 {
        if pipeline.tick_count() >= 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    pipeline.stop().await;

    let detections = pipeline.latest_detections();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].label, "intrusion");
    assert_eq!(detections[0].bounding_box, BoundingBox::new(20.0, 20.0, 80.0, 80.0).unwrap());

    let alerts = aggregator.current_alerts(Utc::now());
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Medium);
    assert_eq!(alerts[0].message, "Threat detected: intrusion (confidence: 0.70)");
}
