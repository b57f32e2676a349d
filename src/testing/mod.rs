//! Testing utilities for the bridge
//!
//! Available to unit tests and, with the `testing` feature, to the
//! integration tests under `tests/`.
//!
//! - [`fixtures`] - Pre-built callback requests, errors and settings
//! - [`mock`] - A scripted [`crate::gateway::AuthGateway`] and a recording navigator

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;
pub use mock::{ExchangeRecord, MockAuthGateway, RecordingNavigator, ScriptedCall};

/// Common test constants
pub mod constants {
    pub const TEST_CODE: &str = "4/0AX4XfWh-test-code";
    pub const TEST_STATE: &str = "st4te-n0nce";
    pub const TEST_CLIENT_IP: &str = "192.168.1.1";
    pub const TEST_USER_AGENT: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
    pub const TEST_CODE_URL: &str =
        "https://accounts.google.com/o/oauth2/v2/auth?client_id=test&state=st4te-n0nce";
}
