//! Core data types for the Canopy engine

pub mod agent;
pub mod request;
pub mod score;
pub mod signal;
