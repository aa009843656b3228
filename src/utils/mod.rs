pub mod background;
pub mod context;
pub mod propagation;

pub use background::BackgroundTasks;
pub use context::{CallContext, CancelHandle, CancelReason};
pub use propagation::TraceCarrier;
