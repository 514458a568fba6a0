//! Classification and routing of incoming requests.

pub mod classifier;
pub mod router;
pub mod state;

pub use classifier::{fallback_classify, is_unsafe};
pub use router::Router;
pub use state::{Category, FinalResponse, HistoryTurn, RequestContext, RequestState, RoutingStep};
