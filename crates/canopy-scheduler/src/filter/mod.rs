//! Coherence filtering
pub mod policy;

pub use self::policy::CoherencePolicy;
