use crate::{
    api::handlers::{auth, health, me, users},
    auth::{AuthConfig, AuthEngine, schema},
    cli::globals::GlobalArgs,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::sleep};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod email;
pub(crate) mod handlers;
mod openapi;

pub use openapi::openapi;

/// How often expired sessions are reaped from the database.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    schema::ensure_schema(&pool)
        .await
        .context("Failed to prepare database schema")?;

    let notifier: Arc<dyn email::EmailSender> = match globals.email_url.as_deref() {
        Some(endpoint) => {
            let url = Url::parse(endpoint)
                .with_context(|| format!("Invalid email delivery URL: {endpoint}"))?;
            Arc::new(email::HttpEmailSender::new(url)?)
        }
        None => Arc::new(email::LogEmailSender),
    };

    let config = AuthConfig::new(globals.token_secret.clone());
    let engine = AuthEngine::new(pool.clone(), config, notifier);

    // Background sweeper deletes expired registration, login, and refresh
    // sessions so abandoned flows do not pile up in the database.
    spawn_session_sweeper(engine.clone(), SWEEP_INTERVAL);

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    let app = Router::new()
        .route("/auth/v1/registration", post(auth::registration::register))
        .route(
            "/auth/v1/registration/confirmEmail",
            post(auth::registration::confirm_email),
        )
        .route(
            "/auth/v1/registration/resendCodeEmail",
            post(auth::registration::resend_code),
        )
        .route("/auth/v1/login/sendCodeEmail", post(auth::login::send_code))
        .route(
            "/auth/v1/login/confirmEmail",
            post(auth::login::confirm_login),
        )
        .route("/auth/v1/refreshToken", post(auth::refresh::refresh))
        .route("/auth/v1/me", get(me::get_me))
        .route("/auth/v1/admin/users", get(users::list_users))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(engine))
                .layer(Extension(pool.clone())),
        )
        .route("/health", get(health::health).options(health::health))
        .layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Reap expired sessions on a fixed cadence until the process exits.
pub fn spawn_session_sweeper(
    engine: AuthEngine,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match engine.sweep_expired().await {
                Ok(totals) => {
                    let reaped = totals.registration_sessions
                        + totals.login_sessions
                        + totals.token_sessions;
                    if reaped > 0 {
                        info!(
                            registration_sessions = totals.registration_sessions,
                            login_sessions = totals.login_sessions,
                            token_sessions = totals.token_sessions,
                            "Reaped expired sessions"
                        );
                    }
                }
                Err(err) => error!("session sweep failed: {err}"),
            }

            sleep(interval).await;
        }
    })
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
