use anyhow::Context;
use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::{delete, get, patch, post, put},
    Router,
};
use clap::Parser;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use domus_api::config::AppConfig;
use domus_api::database;
use domus_api::handlers::{
    access, announcements, appointments, contracts, inquiries, notifications, otp, reservations,
    roles,
};
use domus_api::middleware::{auth, route_access};
use domus_api::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "domus-api", about = "Property-management back-office API server")]
struct Args {
    /// Listen port; overrides SERVER_PORT and the environment default
    #[arg(long)]
    port: Option<u16>,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    tracing::info!("Starting Domus API in {:?} mode", config.environment);

    let state = AppState::new(config).context("failed to initialize application state")?;

    // Allow tests or deployments to override port via env
    let port = args
        .port
        .or_else(|| std::env::var("DOMUS_API_PORT").ok().and_then(|s| s.parse().ok()))
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(state.config.server.port);

    let bind_addr = format!("{}:{}", args.bind, port);
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Domus API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}

fn app(state: AppState) -> Router {
    let enable_cors = state.config.server.enable_cors;

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/announcements", get(announcements::public_feed))
        .merge(otp_routes())
        // Authenticated API surface
        .merge(protected_routes(state.clone()))
        .with_state(state);

    if enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(TraceLayer::new_for_http())
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(appointment_routes())
        .merge(reservation_routes())
        .merge(contract_routes())
        .merge(inquiry_routes())
        .merge(announcement_routes())
        .merge(notification_routes())
        .merge(lookup_routes())
        // ServiceBuilder runs top-down: authenticate, then gate by role.
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(state, auth::require_auth))
                .layer(from_fn(route_access::enforce)),
        )
}

fn otp_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/otp/request", post(otp::request))
        .route("/auth/otp/verify", post(otp::verify))
}

fn appointment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/appointments",
            get(appointments::list).post(appointments::create),
        )
        .route(
            "/api/appointments/:id",
            get(appointments::get).patch(appointments::update_status),
        )
}

fn reservation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/reservations",
            get(reservations::list).post(reservations::create),
        )
        .route(
            "/api/reservations/:id",
            get(reservations::get).patch(reservations::update_status),
        )
}

fn contract_routes() -> Router<AppState> {
    Router::new()
        .route("/api/contracts", get(contracts::list).post(contracts::create))
        .route(
            "/api/contracts/:id",
            get(contracts::get)
                .put(contracts::update)
                .delete(contracts::delete),
        )
        .route("/api/contracts/:id/schedule", get(contracts::schedule))
        .route(
            "/api/contracts/:id/schedule/:installment",
            patch(contracts::pay_installment),
        )
        .route(
            "/api/contracts/:id/transactions",
            get(contracts::transactions).post(contracts::record_payment),
        )
        .route("/api/contracts/:id/transfer", post(contracts::transfer))
        .route(
            "/api/contracts/:id/transfer/revert",
            post(contracts::revert_transfer),
        )
}

fn inquiry_routes() -> Router<AppState> {
    Router::new()
        .route("/api/inquiries", get(inquiries::list).post(inquiries::create))
        .route(
            "/api/inquiries/:id",
            get(inquiries::get).patch(inquiries::update_status),
        )
}

fn announcement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/announcements",
            get(announcements::list).post(announcements::create),
        )
        .route(
            "/api/announcements/:id",
            put(announcements::update).delete(announcements::delete),
        )
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/:id/read", patch(notifications::mark_read))
        .route("/api/notifications/:id", delete(notifications::delete))
}

fn lookup_routes() -> Router<AppState> {
    Router::new()
        .route("/api/roles", get(roles::list))
        .route("/api/routes/access", get(access::my_access))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Domus API",
            "version": version,
            "description": "Property-management back-office API built with Rust (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "announcements": "/announcements (public feed)",
                "otp": "/auth/otp/request, /auth/otp/verify (public)",
                "appointments": "/api/appointments[/:id] (authenticated)",
                "reservations": "/api/reservations[/:id] (authenticated)",
                "contracts": "/api/contracts[/:id] (staff)",
                "inquiries": "/api/inquiries[/:id] (authenticated)",
                "notifications": "/api/notifications[/:id] (authenticated)",
                "roles": "/api/roles (admin)",
                "routes": "/api/routes/access (authenticated)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match database::health_check(&state.db).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
