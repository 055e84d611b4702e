//! Request scheduling for the router.
//!
//! Maps constraints to variants, tracks each request through its lifecycle,
//! and dispatches it to an executor while recording latency measurements.

mod dispatcher;
mod profile;
mod request;
mod selection;

pub use dispatcher::{DispatchError, DispatchResponse, Dispatcher, DispatcherConfig};
pub use profile::{ProfileError, ProfileReport, Profiler};
pub use request::{InferenceRequest, RequestContext, RequestError, RequestPhase, SloKind};
pub use selection::{
    Constraint, Selection, SelectionEngine, SelectionError, DEFAULT_ACCURACY_FLOOR,
};
