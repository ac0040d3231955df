//! Call data model, state machine, persistence, and orchestration (§3, §4.2, §6).

pub mod manager;
pub mod model;
pub mod orchestrator;
pub mod session;
pub mod store;

pub use manager::CallManager;
pub use model::{Call, CallState, Speaker, Status, StatusKind, Utterance};
pub use orchestrator::{run as run_orchestrator, OrchestratorEvent};
pub use session::run as run_media_session;
pub use store::{CallStore, InMemoryCallStore};
