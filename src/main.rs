mod config;
mod deletion;
mod models;
mod responses;
mod routes;
mod services;
mod state;
mod worker;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::http::Method;
use axum::{
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use config::Config;
use deletion::DeletionWorkflow;
use reqwest::Client;
use responses::JsonResponse;
use routes::{
    cancel_registration, create_booking, create_registration, dashboard_stats, handle_contact,
    handle_delete_account, handle_delete_user_admin, handle_signin, handle_signout, handle_signup,
    health_check, list_events, list_registrations, list_upcoming_events,
};
use services::supabase::{AuthApi, DataStore, SupabaseAuth, SupabaseRest};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::state::AppState;

#[cfg(feature = "tls")]
use axum_server::tls_rustls::RustlsConfig;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        // Default: 200ms/token (~5 req/sec)
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let global_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    let rate_limit_auth_s: u64 = std::env::var("RATE_LIMITER_AUTH_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(1);
    let rate_limit_auth_burst: u32 = std::env::var("RATE_LIMITER_AUTH_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(10);
    // Stricter limiter for the mutating auth and account routes
    let auth_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(rate_limit_auth_s)
            .burst_size(rate_limit_auth_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background task to cleanup old IPs
    let governor_limiter = global_governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let config = Config::from_env();

    let http_client = Client::new();
    let store: Arc<dyn DataStore> = Arc::new(
        SupabaseRest::new(
            http_client.clone(),
            config.supabase_url.clone(),
            config.supabase_anon_key.clone(),
        )
        .with_bearer(config.supabase_service_role_key.clone()),
    );
    let auth: Arc<dyn AuthApi> = Arc::new(SupabaseAuth::new(
        http_client,
        config.supabase_url.clone(),
        config.supabase_anon_key.clone(),
        config.supabase_service_role_key.clone(),
    ));

    let state = AppState {
        store: store.clone(),
        auth: auth.clone(),
        deletion: Arc::new(DeletionWorkflow::new(store, auth)),
        config: Arc::new(config),
    };
    let state_for_worker = state.clone();

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .frontend_origin
                .parse::<HeaderValue>()
                .unwrap(),
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/signin", post(handle_signin))
        .route("/signup", post(handle_signup))
        .route("/signout", post(handle_signout))
        .layer(GovernorLayer {
            config: auth_governor_conf.clone(),
        });

    let account_routes = Router::new()
        .route("/", delete(handle_delete_account))
        .layer(GovernorLayer {
            config: auth_governor_conf.clone(),
        });

    let admin_routes = Router::new()
        .route("/dashboard", get(dashboard_stats))
        .route("/users/{id}", delete(handle_delete_user_admin))
        .layer(GovernorLayer {
            config: auth_governor_conf.clone(),
        });

    let app = Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check))
        .route("/api/events", get(list_events))
        .route("/api/events/upcoming", get(list_upcoming_events))
        .route("/api/contact", post(handle_contact))
        .route("/api/bookings", post(create_booking))
        .route(
            "/api/registrations",
            get(list_registrations).post(create_registration),
        )
        .route("/api/registrations/{id}/cancel", post(cancel_registration))
        .nest("/api/auth", auth_routes)
        .nest("/api/account", account_routes)
        .nest("/api/admin", admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: global_governor_conf.clone(),
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));

    // Periodically advance tracked events whose window has passed
    worker::start_background_workers(state_for_worker).await;
    #[cfg(feature = "tls")]
    {
        // TLS: Only run this block when `--features tls` is used
        let tls_config = RustlsConfig::from_pem_file(
            std::env::var("DEV_CERT_LOCATION").unwrap(),
            std::env::var("DEV_KEY_LOCATION").unwrap(),
        )
        .await
        .expect("Failed to load TLS certs");

        println!("Running with TLS at https://{}", addr);
        let _ = axum_server::bind_rustls(addr, tls_config)
            .serve(make_service)
            .await;

        return; // Skip the fallback if TLS was used
    }

    let listener = TcpListener::bind(addr).await.unwrap();
    println!("Running without TLS at http://{}", addr);
    axum::serve(listener, make_service).await.unwrap();
}

/// A simple root route.
async fn root() -> Response {
    JsonResponse::success("Hello, EviStro!").into_response()
}
