use axum::http::HeaderValue;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod adapters;
mod auth;
mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod store;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pathgen_api_rust=info,tower_http=info".into()),
        )
        .init();

    let config = crate::config::config();
    tracing::info!("Starting PathGen API in {:?} mode", config.environment);

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("PATHGEN_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("PathGen API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Token-authenticated API
        .merge(protected_routes())
        // Global middleware
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn public_routes() -> Router {
    use handlers::{email_tracking, insights};

    Router::new()
        .route("/api/email/track/open", get(email_tracking::open))
        .route("/api/email/track/click", get(email_tracking::click))
        .route("/api/insights/tournaments", get(insights::tournaments))
}

fn protected_routes() -> Router {
    Router::new()
        .merge(admin_routes())
        .merge(user_routes())
        .merge(billing_routes())
        .layer(from_fn(middleware::auth::bearer_auth_middleware))
}

fn admin_routes() -> Router {
    use handlers::admin;
    use handlers::content;

    Router::new()
        .route("/api/admin/auth", get(admin::auth::check))
        .route(
            "/api/admin/affiliates",
            get(admin::affiliates::list).post(admin::affiliates::create),
        )
        .route(
            "/api/admin/affiliates/:code",
            get(admin::affiliates::conversions).patch(admin::affiliates::update),
        )
        .route(
            "/api/admin/promo-codes",
            get(admin::promo_codes::list).post(admin::promo_codes::create),
        )
        .route(
            "/api/admin/roles",
            get(admin::roles::list).patch(admin::roles::update),
        )
        .route("/api/admin/users/search", get(admin::users::search))
        .route(
            "/api/admin/users/:id",
            get(admin::users::detail).patch(admin::users::update),
        )
        .route("/api/admin/subscriptions", get(admin::subscriptions::list))
        .route(
            "/api/admin/subscriptions/:id",
            get(admin::subscriptions::payment_history).post(admin::subscriptions::act),
        )
        .route(
            "/api/admin/notifications",
            get(admin::notifications::history).post(admin::notifications::send),
        )
        .route("/api/admin/audit-logs", get(admin::audit_logs::list))
        .route(
            "/api/admin/analytics/dashboard",
            get(admin::analytics::dashboard),
        )
        .route(
            "/api/admin/monitoring/stats",
            get(admin::monitoring::stats),
        )
        .route("/api/content/ingest", post(content::ingest))
}

fn user_routes() -> Router {
    use handlers::users;

    Router::new()
        .route("/api/users", post(users::create))
        .route("/api/users/delete-account", post(users::delete_account))
}

fn billing_routes() -> Router {
    use handlers::billing;

    Router::new()
        .route("/api/billing/payment-intent", post(billing::create_payment_intent))
        .route("/api/billing/session/:id", get(billing::checkout_session))
        .route("/api/billing/portal", post(billing::portal))
}

fn cors_layer() -> CorsLayer {
    let origins = &config::config().security.cors_origins;
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "PathGen API (Rust)",
            "version": version,
            "description": "Backend API for the PathGen coaching assistant",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "email_tracking": "/api/email/track/* (public)",
                "insights": "/api/insights/tournaments (public)",
                "admin": "/api/admin/* (protected - elevated role required)",
                "users": "/api/users, /api/users/delete-account (protected)",
                "billing": "/api/billing/* (protected)",
                "content": "/api/content/ingest (protected - elevated role required)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    let database = match store::Store::shared().await {
        Ok(store) => store.health_check().await,
        Err(e) => Err(e),
    };

    match database {
        Ok(()) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
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
            axum::response::Json(json!({
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
