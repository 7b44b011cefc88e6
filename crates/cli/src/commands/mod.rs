pub mod agents;
pub mod daemon;
