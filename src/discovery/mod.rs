pub mod engine;

pub use engine::{CycleResult, DiscoveryEngine, DiscoveryStatus};
