#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the authbridge application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod callback;
pub mod cookies;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod settings;
pub mod utils;

// Test utilities for unit tests and, behind the `testing` feature, integration tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use callback::{AttemptRegistry, CallbackStateMachine, LogNavigator};
pub use cookies::SessionCookies;
pub use errors::ErrorKind;
pub use gateway::{AuthError, AuthGateway, HttpAuthGateway};
pub use handlers::configure_services;
pub use provider::Provider;
pub use settings::BridgeSettings;
