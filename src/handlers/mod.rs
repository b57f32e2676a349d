// HTTP request handlers for the authentication bridge
pub mod auth;
pub mod callback;
pub mod session;
pub mod static_files;


use actix_web::web;

// Re-export the main handler functions
pub use auth::sign_in;
pub use callback::{attempt_status, oauth_callback, teardown_attempt};
pub use session::session_status;
pub use static_files::health;

/// Register every bridge route
pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg
        // Session presence hint
        .route("/auth/session", web::get().to(session_status))
        // Callback attempts
        .route("/auth/attempts/{attempt_id}", web::get().to(attempt_status))
        .route(
            "/auth/attempts/{attempt_id}",
            web::delete().to(teardown_attempt),
        )
        .route(
            "/auth/attempts/{attempt_id}/teardown",
            web::post().to(teardown_attempt),
        )
        // Provider flows
        .route("/auth/{provider}/sign_in", web::get().to(sign_in))
        .route("/auth/{provider}/sign_in", web::post().to(sign_in))
        .route("/auth/{provider}/callback", web::get().to(oauth_callback))
        // Health endpoint
        .route("/ping", web::get().to(health));
}
