#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{
    middleware::{Compress, Logger},
    web, App, HttpServer,
};
use authbridge::{
    callback::{spawn_reaper, AttemptRegistry, LogNavigator},
    gateway::{AuthGateway, HttpAuthGateway},
    handlers::configure_services,
    settings::BridgeSettings,
};

/// How often stale callback attempts are swept
const REAP_INTERVAL: Duration = Duration::from_secs(30);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = BridgeSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    let gateway: Arc<dyn AuthGateway> = Arc::new(
        HttpAuthGateway::from_settings(&settings.backend).map_err(|e| {
            std::io::Error::other(format!("Failed to initialize backend client: {e}"))
        })?,
    );

    start_server(gateway, settings).await
}

/// Start the bridge server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(
    gateway: Arc<dyn AuthGateway>,
    settings: BridgeSettings,
) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let registry = Arc::new(AttemptRegistry::new(
        gateway.clone(),
        Arc::new(LogNavigator),
        settings.attempt_timing(),
    ));
    let reaper = spawn_reaper(registry.clone(), settings.attempt_retention(), REAP_INTERVAL);

    // Configure CORS for SPAs
    let cors_origins = settings.get_cors_origins();

    let result = HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["Content-Type", "Accept"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::from(gateway.clone()))
            .app_data(web::Data::from(registry.clone()))
            .app_data(web::Data::new(settings.clone()))
            .wrap(cors)
            .wrap(Compress::default())
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await;

    reaper.abort();
    result
}

fn print_startup_info(bind_address: &str, settings: &BridgeSettings) {
    println!("Starting authbridge {} on http://{bind_address}", authbridge::VERSION);
    println!("Backend API: {}", settings.backend.api_url);
    println!();
    println!("Sign-in endpoints:");
    println!("  GET|POST /auth/{{provider}}/sign_in  - Start sign-in (google, discord, github, guest)");
    println!("  GET      /auth/{{provider}}/callback - Provider redirect target");
    println!();
    println!("Callback attempts:");
    println!("  GET      /auth/attempts/{{id}}          - Attempt status");
    println!("  DELETE   /auth/attempts/{{id}}          - Tear down attempt");
    println!("  POST     /auth/attempts/{{id}}/teardown - Tear down attempt (beacon)");
    println!();
    println!("System endpoints:");
    println!("  GET  /auth/session - Session presence hint");
    println!("  GET  /ping         - Health check");
    println!();
    println!(
        "Callback timeout: {}s, login redirect grace: {}s",
        settings.callback.timeout_seconds, settings.callback.grace_seconds
    );
}
