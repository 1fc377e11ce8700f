pub mod coordinator;
pub mod handler;
pub mod request;
pub mod scheduler;
pub mod state;

pub use coordinator::{CoordinatorBuilder, TokenRefreshCoordinator};
pub use handler::{handler_fn, AlwaysAuthenticated, FnTokenHandler, NoopSink, ResultSink, SessionProbe, TokenHandler};
pub use request::{SuccessCallback, TokenRequest};
pub use scheduler::{ArmedRefresh, RefreshKind, RefreshScheduler};
pub use state::StateSnapshot;
