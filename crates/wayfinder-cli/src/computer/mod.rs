//! Computers the agent can act upon

pub mod local;
pub mod simulated;

pub use local::LocalComputer;
pub use simulated::SimulatedComputer;
