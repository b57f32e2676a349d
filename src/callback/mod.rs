//! OAuth callback handling: redirect validation, the per-attempt state
//! machine, and the registry that hosts running attempts.

pub mod machine;
pub mod registry;
pub mod request;

pub use machine::{
    AttemptSnapshot, AttemptState, AttemptTiming, CallbackStateMachine, Destination,
    DispatchOutcome, LogNavigator, Navigator, TICK,
};
pub use registry::{spawn_reaper, AttemptRegistry};
pub use request::{CallbackQuery, CallbackRejection, CallbackRequest};
