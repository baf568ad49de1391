//! # Canopy Common
//!
//! Shared types, errors, events and task primitives for the Canopy coordination engine.
//!
//! ## Core Types
//!
//! - [`Request`]: validated collaboration request competing for selection
//! - [`AgentSpec`]: validated agent description used to build the resource mesh
//! - [`Signal`]: validated friction signal feeding the adaptation pipeline
//! - [`UnitScore`]: helpers keeping every scalar score inside `[0, 1]`
//!
//! ## Runtime
//!
//! - [`events::EventBus`]: typed broadcast channel carrying [`EngineEvent`]s
//! - [`task::ScheduledTask`]: cancellable deferred/periodic task handle
//! - [`task::TaskRegistry`]: keyed set of pending tasks, cancelled on removal

pub mod error;
pub mod events;
pub mod task;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{CanopyError, InputError, Result};
pub use events::{EngineEvent, EventBus};
pub use task::{ScheduledTask, TaskRegistry};
pub use types::{
    agent::{Agent, AgentSpec},
    request::{CollaborationRequest, Request},
    score::UnitScore,
    signal::{FrictionSignal, Signal, UrgencyLevel},
};

/// Canopy version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default coherence threshold for request selection
pub const COHERENCE_THRESHOLD: f64 = 0.85;

/// Minimum pairwise compatibility for a mesh edge (exclusive)
pub const EDGE_COMPATIBILITY_THRESHOLD: f64 = 0.7;

/// Default maximum network distance for a mesh edge
pub const MAX_NETWORK_DEPTH: u32 = 6;

/// Default fire threshold for the adaptation pipeline
pub const FIRE_THRESHOLD: f64 = 0.6;

/// Health below which a planted adaptation is flagged for review
pub const HEALTH_REVIEW_THRESHOLD: f64 = 0.7;

/// Default capacity of the event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
