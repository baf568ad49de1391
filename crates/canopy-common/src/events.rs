//! Typed engine events and the broadcast bus that carries them
//!
//! Every observable event is a flat record. Consumers subscribe to the bus;
//! a slow consumer lags and drops events on its own receiver without ever
//! blocking or mutating engine state.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;
use uuid::Uuid;

/// Events produced by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Scheduler finished scoring one batch
    QuantumProcessingComplete {
        paths_processed: usize,
        coherent_paths: usize,
        processing_time_us: u64,
        selected_request: Option<String>,
        energy_yield: Option<f64>,
    },
    /// Mesh edges were (re)built
    NetworkEstablished {
        agents_connected: usize,
        connection_density: f64,
    },
    /// A resource transfer completed along a mesh path
    NutrientTransfer {
        from: String,
        to: String,
        resource_type: String,
        requested: f64,
        actual_amount: f64,
        efficiency: f64,
        hops: usize,
        path: Vec<String>,
    },
    /// A node is below the low-water mark of the rebalance band
    SupportRequested {
        node_id: String,
        capacity: f64,
        average_capacity: f64,
    },
    /// A node is above the high-water mark of the rebalance band
    SupportAvailable {
        node_id: String,
        capacity: f64,
        average_capacity: f64,
    },
    /// A signal crossed the fire threshold
    AdaptiveGermination {
        fire_intensity: f64,
        seeds_selected: usize,
        successful_germinations: usize,
    },
    /// A signal was banked as a seed
    SeedStored {
        seed_id: Uuid,
        adaptation_type: String,
        viability: f64,
        complexity: f64,
        fire_intensity: f64,
    },
    /// An adaptation passed the viability gate
    AdaptationPlanted {
        adaptation_id: Uuid,
        adaptation_type: String,
        confidence: f64,
        implementation_complexity: f64,
        expected_impact: f64,
    },
    /// Health check result for a planted adaptation
    AdaptationGrowthUpdate {
        adaptation_id: Uuid,
        health: Option<f64>,
        status: String,
    },
    /// A planted adaptation needs operator review
    AdaptationReviewAlert {
        adaptation_id: Uuid,
        health: Option<f64>,
        reason: String,
    },
}

impl EngineEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::QuantumProcessingComplete { .. } => "quantum_processing_complete",
            EngineEvent::NetworkEstablished { .. } => "network_established",
            EngineEvent::NutrientTransfer { .. } => "nutrient_transfer",
            EngineEvent::SupportRequested { .. } => "support_requested",
            EngineEvent::SupportAvailable { .. } => "support_available",
            EngineEvent::AdaptiveGermination { .. } => "adaptive_germination",
            EngineEvent::SeedStored { .. } => "seed_stored",
            EngineEvent::AdaptationPlanted { .. } => "adaptation_planted",
            EngineEvent::AdaptationGrowthUpdate { .. } => "adaptation_growth_update",
            EngineEvent::AdaptationReviewAlert { .. } => "adaptation_review_alert",
        }
    }
}

/// Bounded broadcast bus for [`EngineEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus retaining at most `capacity` undelivered events per receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Returns the number of receivers that saw it.
    pub fn publish(&self, event: EngineEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!(event = name, "No subscribers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a `Stream`
    pub fn stream(&self) -> BroadcastStream<EngineEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = EngineEvent::NetworkEstablished {
            agents_connected: 4,
            connection_density: 1.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "network_established");
        assert_eq!(json["agents_connected"], 4);
        assert_eq!(event.name(), "network_established");
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        let delivered = bus.publish(EngineEvent::AdaptiveGermination {
            fire_intensity: 0.7,
            seeds_selected: 2,
            successful_germinations: 1,
        });
        assert_eq!(delivered, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "adaptive_germination");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(8);
        let delivered = bus.publish(EngineEvent::NetworkEstablished {
            agents_connected: 0,
            connection_density: 0.0,
        });
        assert_eq!(delivered, 0);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
