pub mod orchestrator;
pub mod state;
