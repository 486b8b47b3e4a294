//! The dynamic command lifecycle: static safety validation of submitted
//! scripts, capability-scoped execution, registration against the platform
//! command namespace, and startup reconciliation from persisted state.

pub mod handler;
pub mod reconcile;
pub mod registrar;
pub mod registry;
pub mod validator;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use handler::{Invocation, ScriptHandler, HANDLER_TIMEOUT};
pub use reconcile::ReconcileSummary;
pub use registrar::{CreatedCommand, Durability, Registrar};
pub use registry::CommandRegistry;
pub use validator::{Validator, MAX_SOURCE_LEN};

#[cfg(any(test, feature = "test-support"))]
pub use mocks::MockRegistry;
