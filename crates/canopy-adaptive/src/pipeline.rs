//! Adaptive signal pipeline
//!
//! Signals below the fire threshold are banked as seeds. Signals at or above
//! it germinate the best matching seeds, plant the candidates that clear the
//! viability gate and schedule one deferred health check per planted
//! adaptation.

use std::sync::Arc;
use std::time::Duration;

use canopy_common::{
    CanopyError, EngineEvent, EventBus, FrictionSignal, Result, ScheduledTask, Signal, TaskRegistry,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adaptation::{Adaptation, AdaptationStatus};
use crate::classify::{self, AdaptationType};
use crate::germination::{self, AdaptationRejected};
use crate::intensity::fire_intensity;
use crate::monitor::{ConfidenceHealthProbe, HealthProbe, MonitorOutcome};
use crate::seed_bank::{Seed, SeedBank};
use crate::AdaptiveConfig;

/// What happened to one signal
#[derive(Debug, Clone, Serialize)]
pub struct SignalOutcome {
    /// Intensity reached the fire threshold
    pub triggered: bool,
    pub intensity: f64,
    pub adaptation_type: AdaptationType,
    pub seeds_selected: usize,
    pub planted: Vec<Adaptation>,
    pub rejected: Vec<AdaptationRejected>,
    /// Seed banked from this signal, if any
    pub stored_seed: Option<Seed>,
    /// Seeds evicted from the bank to make room
    pub evicted_seeds: usize,
}

impl SignalOutcome {
    pub fn germination_attempts(&self) -> usize {
        self.planted.len() + self.rejected.len()
    }
}

/// Receives the outcome of every health check that reached its adaptation,
/// scheduled or run on demand
pub type MonitorListener = Arc<dyn Fn(Uuid, &MonitorOutcome) + Send + Sync>;

/// Shared state reachable from deferred health checks
#[derive(Clone)]
struct HealthMonitor {
    adaptations: Arc<DashMap<Uuid, Adaptation>>,
    probe: Arc<dyn HealthProbe>,
    tasks: Arc<TaskRegistry<Uuid>>,
    events: Option<EventBus>,
    listener: Option<MonitorListener>,
    review_threshold: f64,
}

impl HealthMonitor {
    async fn check(&self, id: Uuid) -> MonitorOutcome {
        let Some(snapshot) = self.adaptations.get(&id).map(|a| a.clone()) else {
            warn!(adaptation_id = %id, "Health check target not found");
            return MonitorOutcome::Failed {
                reason: format!("adaptation {} not found", id),
            };
        };

        let reading = self.probe.measure(&snapshot).await;

        let Some(mut adaptation) = self.adaptations.get_mut(&id) else {
            warn!(adaptation_id = %id, "Adaptation retired during health check");
            return MonitorOutcome::Failed {
                reason: format!("adaptation {} retired during health check", id),
            };
        };
        adaptation.last_checked_at = Some(Utc::now());

        let (outcome, alert) = match reading.filter(|h| h.is_finite()) {
            Some(raw) => {
                let health = raw.clamp(0.0, 1.0);
                adaptation.health = Some(health);
                if adaptation.status.can_transition_to(AdaptationStatus::Monitored) {
                    adaptation.transition(AdaptationStatus::Monitored).ok();
                }
                let low = health < self.review_threshold;
                if low && adaptation.status.can_transition_to(AdaptationStatus::FlaggedForReview) {
                    adaptation.transition(AdaptationStatus::FlaggedForReview).ok();
                }

                let outcome = if adaptation.status == AdaptationStatus::FlaggedForReview {
                    MonitorOutcome::FlaggedForReview { health }
                } else {
                    MonitorOutcome::Healthy { health }
                };
                let alert = low.then(|| format!("health {:.3} below {:.3}", health, self.review_threshold));
                (outcome, alert)
            }
            None => {
                if adaptation.status.can_transition_to(AdaptationStatus::FlaggedForReview) {
                    adaptation.transition(AdaptationStatus::FlaggedForReview).ok();
                }
                let reason = "health probe returned no reading".to_string();
                warn!(adaptation_id = %id, "Monitoring failure, adaptation flagged");
                (
                    MonitorOutcome::Failed {
                        reason: reason.clone(),
                    },
                    Some(reason),
                )
            }
        };

        let status = adaptation.status;
        let health = adaptation.health;
        drop(adaptation);

        debug!(adaptation_id = %id, status = %status, health = ?health, "Health check complete");
        self.publish(EngineEvent::AdaptationGrowthUpdate {
            adaptation_id: id,
            health: outcome.health(),
            status: status.to_string(),
        });
        if let Some(reason) = alert {
            info!(adaptation_id = %id, reason = %reason, "Adaptation flagged for review");
            self.publish(EngineEvent::AdaptationReviewAlert {
                adaptation_id: id,
                health: outcome.health(),
                reason,
            });
        }
        if let Some(listener) = &self.listener {
            listener(id, &outcome);
        }

        outcome
    }

    fn publish(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

/// Converts friction signals into seeds and planted adaptations
pub struct AdaptiveSignalPipeline {
    config: AdaptiveConfig,
    bank: SeedBank,
    monitor: HealthMonitor,
}

impl AdaptiveSignalPipeline {
    pub fn new(config: AdaptiveConfig) -> Self {
        let ttl_secs = i64::try_from(config.seed_ttl_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        let bank = SeedBank::new(config.max_seeds_per_type, chrono::Duration::seconds(ttl_secs));
        let monitor = HealthMonitor {
            adaptations: Arc::new(DashMap::new()),
            probe: Arc::new(ConfidenceHealthProbe),
            tasks: Arc::new(TaskRegistry::new()),
            events: None,
            listener: None,
            review_threshold: config.health_review_threshold,
        };
        Self {
            config,
            bank,
            monitor,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.monitor.probe = probe;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.monitor.events = Some(events);
        self
    }

    pub fn with_monitor_listener(mut self, listener: MonitorListener) -> Self {
        self.monitor.listener = Some(listener);
        self
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// Measure a signal and either bank it or germinate matching seeds
    #[instrument(skip(self, signal), fields(resistance_type = %signal.resistance_type))]
    pub fn process_signal(&self, signal: FrictionSignal) -> Result<SignalOutcome> {
        let signal = signal.validate()?;
        let intensity = fire_intensity(&signal).value();
        let kind = AdaptationType::classify(&signal);
        let now = Utc::now();

        if intensity < self.config.fire_threshold {
            let (seed, evicted) = self.store_seed(&signal, kind, intensity, now);
            return Ok(SignalOutcome {
                triggered: false,
                intensity,
                adaptation_type: kind,
                seeds_selected: 0,
                planted: Vec::new(),
                rejected: Vec::new(),
                stored_seed: Some(seed),
                evicted_seeds: evicted,
            });
        }

        let selected = self.bank.take_best(kind, intensity, now);
        let seeds_selected = selected.len();
        let mut candidates = Vec::with_capacity(seeds_selected);
        for seed in selected {
            let mut candidate = germination::germinate(&seed, intensity, &self.config.conditions);
            candidate.transition(AdaptationStatus::Germinating)?;
            let reasons = self.config.gate.evaluate(&candidate);
            candidates.push((seed, candidate, reasons));
        }

        // every planted adaptation needs its health check scheduled
        let plantable = candidates.iter().any(|(_, _, reasons)| reasons.is_empty());
        if plantable && !ScheduledTask::runtime_available() {
            for (seed, _, _) in candidates {
                self.bank.restore(seed);
            }
            warn!(adaptation_type = %kind, "No runtime for health checks, seeds returned to bank");
            return Err(CanopyError::Internal(
                "planting requires a tokio runtime for health checks".to_string(),
            ));
        }

        let mut planted = Vec::new();
        let mut rejected = Vec::new();
        for (seed, mut candidate, reasons) in candidates {
            if reasons.is_empty() {
                candidate.transition(AdaptationStatus::Planted)?;
                self.plant(candidate.clone())?;
                planted.push(candidate);
            } else {
                debug!(seed_id = %seed.id, reasons = ?reasons, "Candidate rejected by viability gate");
                let seed_id = seed.id;
                let seed_restored = self.config.restore_rejected_seeds;
                if seed_restored {
                    self.bank.restore(seed);
                }
                rejected.push(AdaptationRejected {
                    seed_id,
                    reasons,
                    seed_restored,
                });
            }
        }

        // nothing to germinate yet; keep the pressure as a seed
        let (stored_seed, evicted_seeds) = if seeds_selected == 0 {
            let (seed, evicted) = self.store_seed(&signal, kind, intensity, now);
            (Some(seed), evicted)
        } else {
            (None, 0)
        };

        info!(
            intensity,
            adaptation_type = %kind,
            seeds_selected,
            planted = planted.len(),
            rejected = rejected.len(),
            "Adaptive germination"
        );
        self.monitor.publish(EngineEvent::AdaptiveGermination {
            fire_intensity: intensity,
            seeds_selected,
            successful_germinations: planted.len(),
        });

        Ok(SignalOutcome {
            triggered: true,
            intensity,
            adaptation_type: kind,
            seeds_selected,
            planted,
            rejected,
            stored_seed,
            evicted_seeds,
        })
    }

    fn store_seed(
        &self,
        signal: &Signal,
        kind: AdaptationType,
        intensity: f64,
        now: DateTime<Utc>,
    ) -> (Seed, usize) {
        let viability = classify::viability(signal, kind).value();
        let seed = Seed::new(kind, signal.category.clone(), viability, now);
        let evicted = self.bank.insert(seed.clone(), now).len();

        debug!(seed_id = %seed.id, adaptation_type = %kind, viability, "Seed stored");
        self.monitor.publish(EngineEvent::SeedStored {
            seed_id: seed.id,
            adaptation_type: kind.to_string(),
            viability,
            complexity: seed.complexity,
            fire_intensity: intensity,
        });
        (seed, evicted)
    }

    fn plant(&self, adaptation: Adaptation) -> Result<()> {
        let id = adaptation.id;
        info!(
            adaptation_id = %id,
            adaptation_type = %adaptation.adaptation_type,
            confidence = adaptation.confidence,
            expected_impact = adaptation.expected_impact,
            "Adaptation planted"
        );
        self.monitor.publish(EngineEvent::AdaptationPlanted {
            adaptation_id: id,
            adaptation_type: adaptation.adaptation_type.to_string(),
            confidence: adaptation.confidence,
            implementation_complexity: adaptation.implementation_complexity,
            expected_impact: adaptation.expected_impact,
        });
        self.monitor.adaptations.insert(id, adaptation);

        if let Err(e) = self.schedule_monitor(id) {
            warn!(adaptation_id = %id, error = %e, "Health check not scheduled, planting undone");
            self.monitor.adaptations.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    fn schedule_monitor(&self, id: Uuid) -> Result<()> {
        let delay = Duration::from_secs(self.config.monitor_delay_secs);
        let monitor = self.monitor.clone();
        self.monitor
            .tasks
            .schedule_after(id, format!("health-check-{}", id), delay, async move {
                monitor.check(id).await;
            })
    }

    /// Run a health check now
    pub async fn monitor(&self, id: Uuid) -> MonitorOutcome {
        self.monitor.check(id).await
    }

    /// Cancel a pending health check. Returns whether one was pending.
    pub fn cancel_monitor(&self, id: &Uuid) -> bool {
        self.monitor.tasks.cancel(id)
    }

    /// Remove an adaptation and cancel its pending health check
    #[instrument(skip(self))]
    pub fn retire_adaptation(&self, id: &Uuid) -> Option<Adaptation> {
        self.monitor.tasks.cancel(id);
        let retired = self.monitor.adaptations.remove(id).map(|(_, a)| a);
        if retired.is_some() {
            info!(adaptation_id = %id, "Adaptation retired");
        }
        retired
    }

    pub fn adaptation(&self, id: &Uuid) -> Option<Adaptation> {
        self.monitor.adaptations.get(id).map(|a| a.clone())
    }

    /// Every live adaptation, oldest first
    pub fn adaptations(&self) -> Vec<Adaptation> {
        let mut all: Vec<Adaptation> = self
            .monitor
            .adaptations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|a| a.created_at);
        all
    }

    pub fn pending_monitors(&self) -> usize {
        self.monitor.tasks.len()
    }

    pub fn seed_bank(&self) -> &SeedBank {
        &self.bank
    }

    /// Cancel every pending health check
    pub fn shutdown(&self) -> usize {
        let cancelled = self.monitor.tasks.cancel_all();
        info!(cancelled, "Adaptive pipeline stopped");
        cancelled
    }
}

impl Default for AdaptiveSignalPipeline {
    fn default() -> Self {
        Self::new(AdaptiveConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MockHealthProbe;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Low-pressure guidance signal worth about 0.81 viability
    fn guidance_seed_signal() -> FrictionSignal {
        FrictionSignal::new("onboarding_help")
            .with_attempts(3)
            .with_urgency("medium")
            .with_pattern(0.9, 10)
    }

    fn fire_signal(resistance_type: &str) -> FrictionSignal {
        FrictionSignal::new(resistance_type)
            .with_attempts(5)
            .with_errors(3)
            .with_urgency("high")
            .with_help_requests(2)
    }

    fn planted_pipeline(pipeline: &AdaptiveSignalPipeline) -> Uuid {
        pipeline.process_signal(guidance_seed_signal()).unwrap();
        let outcome = pipeline.process_signal(fire_signal("onboarding_help")).unwrap();
        assert_eq!(outcome.planted.len(), 1);
        outcome.planted[0].id
    }

    #[test]
    fn test_quiet_signal_stores_one_seed() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let pipeline = AdaptiveSignalPipeline::default().with_events(bus);

        let outcome = pipeline.process_signal(guidance_seed_signal()).unwrap();

        assert!(!outcome.triggered);
        assert!((outcome.intensity - 0.12).abs() < 1e-12);
        assert_eq!(outcome.germination_attempts(), 0);
        let seed = outcome.stored_seed.unwrap();
        assert_eq!(seed.adaptation_type, AdaptationType::GuidanceEnhancement);
        assert!((seed.viability - 0.81).abs() < 1e-12);
        assert_eq!(pipeline.seed_bank().len(), 1);
        assert_eq!(rx.try_recv().unwrap().name(), "seed_stored");
    }

    #[test]
    fn test_triggered_with_empty_bank_keeps_pressure() {
        let pipeline = AdaptiveSignalPipeline::default();
        let outcome = pipeline.process_signal(fire_signal("checkout")).unwrap();

        assert!(outcome.triggered);
        assert_eq!(outcome.seeds_selected, 0);
        assert!(outcome.stored_seed.is_some());
        assert_eq!(pipeline.seed_bank().len(), 1);
    }

    #[tokio::test]
    async fn test_triggered_signal_plants_matching_seed() {
        let bus = EventBus::new(16);
        let pipeline = AdaptiveSignalPipeline::default().with_events(bus.clone());
        pipeline.process_signal(guidance_seed_signal()).unwrap();

        let mut rx = bus.subscribe();
        let outcome = pipeline.process_signal(fire_signal("onboarding_help")).unwrap();

        assert!(outcome.triggered);
        assert_eq!(outcome.seeds_selected, 1);
        assert_eq!(outcome.planted.len(), 1);
        let planted = &outcome.planted[0];
        assert_eq!(planted.status, AdaptationStatus::Planted);
        assert!((planted.confidence - 0.729).abs() < 1e-9);
        assert!((planted.expected_impact - 0.705).abs() < 1e-9);
        assert!(pipeline.seed_bank().is_empty());
        assert!(outcome.stored_seed.is_none());

        assert_eq!(rx.try_recv().unwrap().name(), "adaptation_planted");
        match rx.try_recv().unwrap() {
            EngineEvent::AdaptiveGermination {
                seeds_selected,
                successful_germinations,
                ..
            } => {
                assert_eq!(seeds_selected, 1);
                assert_eq!(successful_germinations, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_planting_without_runtime_keeps_seed() {
        let pipeline = AdaptiveSignalPipeline::default();
        pipeline.process_signal(guidance_seed_signal()).unwrap();

        let err = pipeline
            .process_signal(fire_signal("onboarding_help"))
            .unwrap_err();

        assert!(matches!(err, CanopyError::Internal(_)));
        assert!(pipeline.adaptations().is_empty());
        assert_eq!(pipeline.pending_monitors(), 0);
        assert_eq!(
            pipeline.seed_bank().count(AdaptationType::GuidanceEnhancement),
            1
        );
    }

    #[test]
    fn test_rejected_seed_restored() {
        let pipeline = AdaptiveSignalPipeline::default();
        pipeline
            .process_signal(FrictionSignal::new("crash_report"))
            .unwrap();

        let outcome = pipeline.process_signal(fire_signal("crash_report")).unwrap();

        assert_eq!(outcome.germination_attempts(), 1);
        assert!(outcome.planted.is_empty());
        assert!(outcome.rejected[0].seed_restored);
        assert!(!outcome.rejected[0].reasons.is_empty());
        assert_eq!(pipeline.seed_bank().count(AdaptationType::ErrorPrevention), 1);
        assert!(pipeline.adaptations().is_empty());
    }

    #[test]
    fn test_rejected_seed_dropped_when_not_restoring() {
        let config = AdaptiveConfig {
            restore_rejected_seeds: false,
            ..AdaptiveConfig::default()
        };
        let pipeline = AdaptiveSignalPipeline::new(config);
        pipeline
            .process_signal(FrictionSignal::new("crash_report"))
            .unwrap();
        let outcome = pipeline.process_signal(fire_signal("crash_report")).unwrap();

        assert!(!outcome.rejected[0].seed_restored);
        assert!(pipeline.seed_bank().is_empty());
    }

    #[test]
    fn test_malformed_signal_rejected() {
        let pipeline = AdaptiveSignalPipeline::default();
        let err = pipeline
            .process_signal(FrictionSignal::new("x").with_pattern(f64::NAN, 1))
            .unwrap_err();
        assert!(err.is_malformed_input());
        assert!(pipeline
            .process_signal(FrictionSignal::new("x").with_urgency("someday"))
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_check_marks_monitored() {
        let bus = EventBus::new(32);
        let pipeline = AdaptiveSignalPipeline::default().with_events(bus.clone());
        let id = planted_pipeline(&pipeline);
        let mut rx = bus.subscribe();
        assert_eq!(pipeline.pending_monitors(), 1);

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(pipeline.adaptation(&id).unwrap().status, AdaptationStatus::Planted);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let adaptation = pipeline.adaptation(&id).unwrap();
        assert_eq!(adaptation.status, AdaptationStatus::Monitored);
        // mean(0.729, 0.705, 0.7)
        assert!((adaptation.health.unwrap() - 0.711333).abs() < 1e-4);
        assert_eq!(pipeline.pending_monitors(), 0);
        assert_eq!(rx.try_recv().unwrap().name(), "adaptation_growth_update");
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_health_flags_for_review() {
        let mut probe = MockHealthProbe::new();
        probe.expect_measure().returning(|_| Some(0.4));
        let bus = EventBus::new(32);
        let pipeline = AdaptiveSignalPipeline::default()
            .with_probe(Arc::new(probe))
            .with_events(bus.clone());
        let id = planted_pipeline(&pipeline);
        let mut rx = bus.subscribe();

        let outcome = pipeline.monitor(id).await;

        assert_eq!(outcome, MonitorOutcome::FlaggedForReview { health: 0.4 });
        assert_eq!(
            pipeline.adaptation(&id).unwrap().status,
            AdaptationStatus::FlaggedForReview
        );
        assert_eq!(rx.try_recv().unwrap().name(), "adaptation_growth_update");
        assert_eq!(rx.try_recv().unwrap().name(), "adaptation_review_alert");
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_check_reports_to_listener() {
        let mut probe = MockHealthProbe::new();
        probe.expect_measure().times(1).returning(|_| Some(0.2));
        let flagged = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&flagged);
        let config = AdaptiveConfig {
            monitor_delay_secs: 0,
            ..AdaptiveConfig::default()
        };
        let pipeline = AdaptiveSignalPipeline::new(config)
            .with_probe(Arc::new(probe))
            .with_monitor_listener(Arc::new(move |_id: Uuid, outcome: &MonitorOutcome| {
                if outcome.is_flagged() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }));
        let id = planted_pipeline(&pipeline);

        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(flagged.load(Ordering::SeqCst), 1);
        assert_eq!(
            pipeline.adaptation(&id).unwrap().status,
            AdaptationStatus::FlaggedForReview
        );
        assert_eq!(pipeline.pending_monitors(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_flags_adaptation() {
        let mut probe = MockHealthProbe::new();
        probe.expect_measure().times(1).returning(|_| None);
        let pipeline = AdaptiveSignalPipeline::default().with_probe(Arc::new(probe));
        let id = planted_pipeline(&pipeline);

        let outcome = pipeline.monitor(id).await;

        assert!(matches!(outcome, MonitorOutcome::Failed { .. }));
        assert_eq!(
            pipeline.adaptation(&id).unwrap().status,
            AdaptationStatus::FlaggedForReview
        );
        assert!(pipeline.cancel_monitor(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_check_never_fires() {
        let mut probe = MockHealthProbe::new();
        probe.expect_measure().never();
        let pipeline = AdaptiveSignalPipeline::default().with_probe(Arc::new(probe));
        let id = planted_pipeline(&pipeline);

        assert!(pipeline.cancel_monitor(&id));
        assert!(!pipeline.cancel_monitor(&id));
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(pipeline.adaptation(&id).unwrap().status, AdaptationStatus::Planted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retired_adaptation_fails_monitoring() {
        let pipeline = AdaptiveSignalPipeline::default();
        let id = planted_pipeline(&pipeline);

        let retired = pipeline.retire_adaptation(&id).unwrap();
        assert_eq!(retired.id, id);
        assert_eq!(pipeline.pending_monitors(), 0);

        let outcome = pipeline.monitor(id).await;
        assert!(matches!(outcome, MonitorOutcome::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_checks() {
        let pipeline = AdaptiveSignalPipeline::default();
        planted_pipeline(&pipeline);
        assert_eq!(pipeline.shutdown(), 1);
        assert_eq!(pipeline.pending_monitors(), 0);
    }

    proptest! {
        #[test]
        fn prop_quiet_signals_bank_exactly_one_seed(
            attempts in 0u32..3,
            errors in 0u32..3,
            help in 0u32..3,
            pattern in 0.0f64..=1.0,
            occurrences in 0u32..50,
        ) {
            let pipeline = AdaptiveSignalPipeline::default();
            let outcome = pipeline
                .process_signal(
                    FrictionSignal::new("checkout")
                        .with_attempts(attempts)
                        .with_errors(errors)
                        .with_help_requests(help)
                        .with_pattern(pattern, occurrences),
                )
                .unwrap();

            prop_assert!(!outcome.triggered);
            prop_assert_eq!(outcome.germination_attempts(), 0);
            prop_assert_eq!(pipeline.seed_bank().len(), 1);
            let viability = outcome.stored_seed.unwrap().viability;
            prop_assert!((0.0..=1.0).contains(&viability));
        }

        #[test]
        fn prop_fired_signal_germinates_from_nonempty_bank(
            banked in 1usize..10,
            attempts in 5u32..20,
            errors in 5u32..20,
            help in 0u32..8,
            frustration in 0usize..8,
            critical in any::<bool>(),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let _guard = runtime.enter();

            let pipeline = AdaptiveSignalPipeline::default();
            for _ in 0..banked {
                pipeline.process_signal(FrictionSignal::new("onboarding_help")).unwrap();
            }

            let signal = FrictionSignal::new("onboarding_help")
                .with_attempts(attempts)
                .with_errors(errors)
                .with_help_requests(help)
                .with_frustration(vec![String::new(); frustration])
                .with_urgency(if critical { "critical" } else { "high" });
            let intensity = fire_intensity(&signal.clone().validate().unwrap()).value();
            prop_assert!(intensity >= pipeline.config().fire_threshold);

            let outcome = pipeline.process_signal(signal).unwrap();

            let expected = ((banked as f64) * intensity).ceil() as usize;
            prop_assert!(outcome.triggered);
            prop_assert!(outcome.seeds_selected >= 1);
            prop_assert_eq!(outcome.seeds_selected, expected.min(banked));
            prop_assert_eq!(outcome.germination_attempts(), outcome.seeds_selected);
        }
    }
}
