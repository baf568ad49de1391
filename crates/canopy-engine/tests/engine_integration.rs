//! Integration tests for the Canopy engine
//!
//! Exercises the full loop:
//! - request selection and resource routing
//! - mesh partitions and imbalance feeding the adaptive pipeline
//! - planted adaptations shifting scheduler weights
//! - deferred health monitoring and shutdown

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use canopy_adaptive::{Adaptation, AdaptationStatus, AdaptationType, HealthProbe, MonitorOutcome};
use canopy_common::{Agent, CollaborationRequest, EngineEvent, FrictionSignal};
use canopy_engine::{CanopyEngine, EngineConfig};
use canopy_mesh::{StaticAffinity, TransferOutcome};
use tokio::sync::broadcast;

fn engine_with(affinity: StaticAffinity) -> CanopyEngine {
    CanopyEngine::builder(EngineConfig::default())
        .with_affinity(Arc::new(affinity))
        .build()
        .unwrap()
}

fn agents(capacities: &[(&str, f64)]) -> Vec<Agent> {
    capacities
        .iter()
        .map(|(id, capacity)| Agent::new(*id, *capacity, "generalist"))
        .collect()
}

fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    names
}

/// Seeds a guidance adaptation, then fires a signal that plants it
fn plant_guidance(engine: &CanopyEngine) -> Adaptation {
    engine
        .process_signal(
            FrictionSignal::new("onboarding_help")
                .with_attempts(3)
                .with_urgency("medium")
                .with_pattern(0.9, 10),
        )
        .unwrap();
    let outcome = engine
        .process_signal(
            FrictionSignal::new("onboarding_help")
                .with_attempts(5)
                .with_errors(3)
                .with_help_requests(2)
                .with_urgency("high"),
        )
        .unwrap();
    assert_eq!(outcome.planted.len(), 1);
    outcome.planted[0].clone()
}

struct FixedProbe(Option<f64>);

#[async_trait]
impl HealthProbe for FixedProbe {
    async fn measure(&self, _adaptation: &Adaptation) -> Option<f64> {
        self.0
    }
}

mod coordination_tests {
    use super::*;

    /// Test: only coherent requests survive and the strongest one is served
    #[test]
    fn test_selection_and_routing() {
        let engine = engine_with(
            StaticAffinity::empty()
                .with_pair("p", "x", 0.8, 1)
                .with_pair("x", "y", 0.8, 1)
                .with_pair("y", "q", 0.8, 1),
        );
        engine
            .establish_network(agents(&[("p", 100.0), ("x", 50.0), ("y", 50.0), ("q", 50.0)]))
            .unwrap();
        let mut rx = engine.subscribe();

        let batch = vec![
            CollaborationRequest::new("r1", "q", 0.9, 0.8, 20.0).with_coherence(0.9),
            CollaborationRequest::new("r2", "x", 0.7, 0.8, 20.0).with_coherence(0.6),
            CollaborationRequest::new("r3", "y", 0.2, 0.8, 20.0).with_coherence(0.95),
        ];
        let outcome = engine.coordinate(batch, "p", "compute").unwrap();

        assert_eq!(outcome.stats.paths_processed, 3);
        assert_eq!(outcome.stats.coherent_paths, 2);
        let selected = outcome.selection.selected.unwrap();
        assert_eq!(selected.request_id, "r1");
        // mean(0.9, 0.8, 0.8, 1.0) × 0.9
        assert!((selected.energy_yield - 0.7875).abs() < 1e-9);

        let receipt = outcome.transfer.unwrap();
        let receipt = receipt.receipt().unwrap();
        assert_eq!(receipt.path, vec!["p", "x", "y", "q"]);
        assert!((receipt.efficiency - 0.85).abs() < 1e-12);
        assert!((engine.mesh().capacity("q").unwrap() - 67.0).abs() < 1e-9);

        assert_eq!(
            drain(&mut rx),
            vec!["quantum_processing_complete", "nutrient_transfer"]
        );
    }

    /// Test: uniform compatibility above the edge threshold connects everyone
    #[test]
    fn test_fully_connected_mesh() {
        let engine = engine_with(StaticAffinity::uniform(0.8, 1));
        let summary = engine
            .establish_network(agents(&[("a", 10.0), ("b", 10.0), ("c", 10.0), ("d", 10.0)]))
            .unwrap();

        assert_eq!(summary.edges, 6);
        assert_eq!(summary.connection_density, 1.0);
        assert_eq!(engine.metrics().mesh_density.get(), 1.0);
    }

    /// Test: malformed input is the only hard failure
    #[test]
    fn test_malformed_inputs() {
        let engine = engine_with(StaticAffinity::uniform(0.8, 1));
        assert!(engine
            .establish_network(agents(&[("a", -1.0)]))
            .unwrap_err()
            .is_malformed_input());

        engine.establish_network(agents(&[("a", 10.0), ("b", 10.0)])).unwrap();
        assert!(engine
            .transfer("a", "b", "compute", f64::NAN)
            .unwrap_err()
            .is_malformed_input());
        assert!(engine
            .transfer("a", "ghost", "compute", 1.0)
            .unwrap_err()
            .is_malformed_input());
        assert!(engine
            .process_signal(FrictionSignal::new("   "))
            .unwrap_err()
            .is_malformed_input());
    }
}

mod feedback_tests {
    use super::*;

    /// Test: repeated partitions bank seeds, then plant a rebalancing adaptation
    #[tokio::test]
    async fn test_partition_feedback_reinforces_headroom() {
        let engine = engine_with(StaticAffinity::empty().with_pair("a", "b", 0.8, 1));
        engine
            .establish_network(agents(&[("a", 100.0), ("b", 100.0), ("island", 100.0)]))
            .unwrap();
        let before = engine.scheduler().weights();

        for _ in 0..4 {
            assert_eq!(
                engine.transfer("a", "island", "compute", 10.0).unwrap(),
                TransferOutcome::NoPath
            );
        }
        assert_eq!(
            engine
                .pipeline()
                .seed_bank()
                .count(AdaptationType::ResourceRebalancing),
            4
        );
        assert_eq!(engine.scheduler().weights(), before);

        engine.transfer("a", "island", "compute", 10.0).unwrap();

        let planted = engine.pipeline().adaptations();
        assert_eq!(planted.len(), 1);
        assert_eq!(planted[0].adaptation_type, AdaptationType::ResourceRebalancing);
        assert!((engine.scheduler().weights().resource_headroom - 1.06725).abs() < 1e-9);
        assert_eq!(engine.partition_failures(), 5);
        assert_eq!(engine.metrics().transfers_no_path.get(), 5);

        // routable transfers are unaffected
        assert!(engine.transfer("a", "b", "compute", 10.0).unwrap().is_completed());
        engine.shutdown();
    }

    /// Test: a periodic rebalance pass raises an imbalance signal
    #[tokio::test(start_paused = true)]
    async fn test_rebalancer_raises_imbalance_signal() {
        let engine = engine_with(StaticAffinity::uniform(0.8, 1));
        engine
            .establish_network(agents(&[
                ("a", 10.0),
                ("b", 100.0),
                ("c", 100.0),
                ("d", 190.0),
            ]))
            .unwrap();
        let mut rx = engine.subscribe();

        engine.start_rebalancer().unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;

        let names = drain(&mut rx);
        assert!(names.contains(&"support_requested"));
        assert!(names.contains(&"support_available"));
        assert!(names.contains(&"seed_stored"));
        assert_eq!(
            engine
                .pipeline()
                .seed_bank()
                .count(AdaptationType::ResourceRebalancing),
            1
        );

        engine.shutdown();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(engine.pipeline().seed_bank().len(), 1);
    }

    /// Test: balanced meshes stay quiet
    #[tokio::test(start_paused = true)]
    async fn test_balanced_mesh_raises_nothing() {
        let engine = engine_with(StaticAffinity::uniform(0.8, 1));
        engine
            .establish_network(agents(&[("a", 100.0), ("b", 100.0)]))
            .unwrap();

        engine.start_rebalancer().unwrap();
        tokio::time::sleep(Duration::from_secs(95)).await;

        assert!(engine.pipeline().seed_bank().is_empty());
        assert_eq!(engine.metrics().signals_processed.get(), 0);
        engine.shutdown();
    }
}

mod monitoring_tests {
    use super::*;

    /// Test: the deferred check runs once the monitor delay elapses
    #[tokio::test(start_paused = true)]
    async fn test_deferred_health_check() {
        let engine = engine_with(StaticAffinity::uniform(0.8, 1));
        let adaptation = plant_guidance(&engine);
        assert_eq!(engine.pipeline().pending_monitors(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;

        let checked = engine.pipeline().adaptation(&adaptation.id).unwrap();
        assert_eq!(checked.status, AdaptationStatus::Monitored);
        assert!(checked.last_checked_at.is_some());
        assert_eq!(engine.pipeline().pending_monitors(), 0);
    }

    /// Test: low health flags the adaptation and is counted
    #[tokio::test(start_paused = true)]
    async fn test_low_health_flagged() {
        let engine = CanopyEngine::builder(EngineConfig::default())
            .with_health_probe(Arc::new(FixedProbe(Some(0.3))))
            .build()
            .unwrap();
        let adaptation = plant_guidance(&engine);
        let mut rx = engine.subscribe();

        let outcome = engine.monitor(adaptation.id).await;

        assert_eq!(outcome, MonitorOutcome::FlaggedForReview { health: 0.3 });
        assert_eq!(engine.metrics().adaptations_flagged.get(), 1);
        assert_eq!(
            drain(&mut rx),
            vec!["adaptation_growth_update", "adaptation_review_alert"]
        );
        engine.shutdown();
    }

    /// Test: flags raised by the scheduled check are counted too
    #[tokio::test(start_paused = true)]
    async fn test_scheduled_flag_counted() {
        let mut config = EngineConfig::default();
        config.adaptive.monitor_delay_secs = 0;
        let engine = CanopyEngine::builder(config)
            .with_health_probe(Arc::new(FixedProbe(Some(0.2))))
            .build()
            .unwrap();
        let adaptation = plant_guidance(&engine);

        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(
            engine.pipeline().adaptation(&adaptation.id).unwrap().status,
            AdaptationStatus::FlaggedForReview
        );
        assert_eq!(engine.metrics().adaptations_flagged.get(), 1);
        assert_eq!(engine.pipeline().pending_monitors(), 0);
        engine.shutdown();
    }

    /// Test: a probe without a reading is a monitoring failure, not an error
    #[tokio::test(start_paused = true)]
    async fn test_probe_failure() {
        let engine = CanopyEngine::builder(EngineConfig::default())
            .with_health_probe(Arc::new(FixedProbe(None)))
            .build()
            .unwrap();
        let adaptation = plant_guidance(&engine);

        let outcome = engine.monitor(adaptation.id).await;

        assert!(matches!(outcome, MonitorOutcome::Failed { .. }));
        assert_eq!(
            engine.pipeline().adaptation(&adaptation.id).unwrap().status,
            AdaptationStatus::FlaggedForReview
        );
        engine.shutdown();
    }

    /// Test: retiring an adaptation cancels its pending check
    #[tokio::test(start_paused = true)]
    async fn test_retire_cancels_check() {
        let engine = engine_with(StaticAffinity::uniform(0.8, 1));
        let adaptation = plant_guidance(&engine);
        let mut rx = engine.subscribe();

        assert!(engine.retire_adaptation(&adaptation.id).is_some());
        assert!(!engine.cancel_monitor(&adaptation.id));
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(drain(&mut rx).is_empty());
    }

    /// Test: shutdown cancels every pending check
    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_checks() {
        let engine = engine_with(StaticAffinity::uniform(0.8, 1));
        let adaptation = plant_guidance(&engine);

        engine.shutdown();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(
            engine.pipeline().adaptation(&adaptation.id).unwrap().status,
            AdaptationStatus::Planted
        );
    }
}

mod event_tests {
    use super::*;
    use tokio_stream::StreamExt;

    /// Test: event stream sees the mesh lifecycle in order
    #[tokio::test]
    async fn test_event_stream_order() {
        let engine = engine_with(StaticAffinity::uniform(0.8, 1));
        let mut stream = engine.event_stream();

        engine
            .establish_network(agents(&[("a", 100.0), ("b", 100.0)]))
            .unwrap();
        engine.transfer("a", "b", "compute", 5.0).unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.name(), "network_established");
        match stream.next().await.unwrap().unwrap() {
            EngineEvent::NutrientTransfer {
                actual_amount,
                hops,
                ..
            } => {
                assert_eq!(hops, 1);
                assert!((actual_amount - 4.75).abs() < 1e-12);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    /// Test: events serialize with a snake_case tag
    #[test]
    fn test_event_wire_format() {
        let engine = engine_with(StaticAffinity::uniform(0.8, 1));
        let mut rx = engine.subscribe();
        engine
            .establish_network(agents(&[("a", 1.0), ("b", 1.0)]))
            .unwrap();

        let json = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(json["event"], "network_established");
        assert_eq!(json["agents_connected"], 2);
    }
}
