#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use accord_adapter::{
    AdapterError, AdapterRuntime, CreateSessionAdapterRequest, RegisterUserAdapterRequest,
    RetentionExemptAdapterRequest, UploadVideoAdapterRequest, VerifyAdapterRequest,
};
use accord_kernel_contracts::identity::BillingEvent;

type SharedRuntime = Arc<Mutex<AdapterRuntime>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("ACCORD_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;
    let sweep_workers_enabled = parse_sweep_workers_enabled_from_env();
    let session_sweep_interval_ms =
        parse_interval_ms_from_env("ACCORD_SESSION_SWEEP_INTERVAL_MS", 60_000);
    let account_sweep_interval_ms =
        parse_interval_ms_from_env("ACCORD_ACCOUNT_SWEEP_INTERVAL_MS", 300_000);

    let runtime = Arc::new(Mutex::new(AdapterRuntime::default_from_env()?));

    // The two retention timers run on independent cadences and share
    // nothing but the store behind the runtime lock.
    if sweep_workers_enabled {
        let runtime_for_sessions = runtime.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(session_sweep_interval_ms));
            loop {
                ticker.tick().await;
                let pass = match runtime_for_sessions.lock() {
                    Ok(mut runtime) => runtime.run_session_sweep_pass().map(|_| ()),
                    Err(_) => Err(AdapterError::Internal(
                        "adapter runtime lock poisoned".to_string(),
                    )),
                };
                if let Err(err) = pass {
                    eprintln!("accord_adapter_http session sweep pass failed: {err:?}");
                }
            }
        });

        let runtime_for_accounts = runtime.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(account_sweep_interval_ms));
            loop {
                ticker.tick().await;
                let pass = match runtime_for_accounts.lock() {
                    Ok(mut runtime) => runtime.run_account_sweep_pass().map(|_| ()),
                    Err(_) => Err(AdapterError::Internal(
                        "adapter runtime lock poisoned".to_string(),
                    )),
                };
                if let Err(err) = pass {
                    eprintln!("accord_adapter_http account sweep pass failed: {err:?}");
                }
            }
        });
    }

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/users", post(register_user))
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id", get(session_view))
        .route("/v1/sessions/:id/video", post(upload_video))
        .route("/v1/sessions/:id/video-url", get(video_read_url))
        .route("/v1/sessions/:id/verify", post(verify))
        .route("/v1/sessions/:id/revoke", post(revoke))
        .route("/v1/sessions/:id/retention-exempt", post(retention_exempt))
        .route("/v1/r/:qr_token", get(recipient_view))
        .route("/v1/billing/events", post(billing_event))
        .route("/v1/admin/sweeps/sessions", post(run_session_sweep))
        .route("/v1/admin/sweeps/accounts", post(run_account_sweep))
        .with_state(runtime);

    println!(
        "accord_adapter_http listening on http://{addr} (sweep_workers_enabled={sweep_workers_enabled} session_interval_ms={session_sweep_interval_ms} account_interval_ms={account_sweep_interval_ms})"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn parse_sweep_workers_enabled_from_env() -> bool {
    match env::var("ACCORD_SWEEP_WORKERS_ENABLED") {
        Ok(v) => !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        Err(_) => true,
    }
}

fn parse_interval_ms_from_env(var: &str, default_ms: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| (100..=3_600_000).contains(v))
        .unwrap_or(default_ms)
}

#[derive(Debug, Clone, serde::Serialize)]
struct ErrorBody {
    status: &'static str,
    reason: String,
}

fn respond<T: serde::Serialize>(out: Result<T, AdapterError>) -> Response {
    match out {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => {
            let (code, reason) = match err {
                AdapterError::Invalid(reason) => (StatusCode::BAD_REQUEST, reason),
                AdapterError::NotFound(reason) => (StatusCode::NOT_FOUND, reason),
                AdapterError::Conflict(reason) => (StatusCode::CONFLICT, reason),
                AdapterError::NotReady(reason) => (StatusCode::CONFLICT, reason),
                AdapterError::Internal(reason) => (StatusCode::INTERNAL_SERVER_ERROR, reason),
            };
            (
                code,
                Json(ErrorBody {
                    status: "error",
                    reason,
                }),
            )
                .into_response()
        }
    }
}

fn lock_poisoned() -> AdapterError {
    AdapterError::Internal("adapter runtime lock poisoned".to_string())
}

async fn healthz(State(runtime): State<SharedRuntime>) -> Response {
    respond(match runtime.lock() {
        Ok(runtime) => Ok(runtime.health_report()),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn register_user(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<RegisterUserAdapterRequest>,
) -> Response {
    respond(match runtime.lock() {
        Ok(mut runtime) => runtime.register_user(request),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn create_session(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<CreateSessionAdapterRequest>,
) -> Response {
    respond(match runtime.lock() {
        Ok(mut runtime) => runtime.create_session(request),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn session_view(
    State(runtime): State<SharedRuntime>,
    Path(id): Path<String>,
) -> Response {
    respond(match runtime.lock() {
        Ok(runtime) => runtime.session_view(&id),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn upload_video(
    State(runtime): State<SharedRuntime>,
    Path(id): Path<String>,
    Json(request): Json<UploadVideoAdapterRequest>,
) -> Response {
    respond(match runtime.lock() {
        Ok(mut runtime) => runtime.upload_video(&id, request),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn video_read_url(
    State(runtime): State<SharedRuntime>,
    Path(id): Path<String>,
) -> Response {
    respond(match runtime.lock() {
        Ok(runtime) => runtime.video_read_url(&id),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn verify(
    State(runtime): State<SharedRuntime>,
    Path(id): Path<String>,
    Json(request): Json<VerifyAdapterRequest>,
) -> Response {
    respond(match runtime.lock() {
        Ok(mut runtime) => runtime.verify(&id, request),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn revoke(State(runtime): State<SharedRuntime>, Path(id): Path<String>) -> Response {
    respond(match runtime.lock() {
        Ok(mut runtime) => runtime.revoke(&id),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn retention_exempt(
    State(runtime): State<SharedRuntime>,
    Path(id): Path<String>,
    Json(request): Json<RetentionExemptAdapterRequest>,
) -> Response {
    respond(match runtime.lock() {
        Ok(mut runtime) => runtime.set_retention_exempt(&id, request),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn recipient_view(
    State(runtime): State<SharedRuntime>,
    Path(qr_token): Path<String>,
) -> Response {
    respond(match runtime.lock() {
        Ok(runtime) => runtime.recipient_view(&qr_token),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn billing_event(
    State(runtime): State<SharedRuntime>,
    Json(event): Json<BillingEvent>,
) -> Response {
    respond(match runtime.lock() {
        Ok(mut runtime) => runtime.handle_billing_event(event),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn run_session_sweep(State(runtime): State<SharedRuntime>) -> Response {
    respond(match runtime.lock() {
        Ok(mut runtime) => runtime.run_session_sweep_pass(),
        Err(_) => Err(lock_poisoned()),
    })
}

async fn run_account_sweep(State(runtime): State<SharedRuntime>) -> Response {
    respond(match runtime.lock() {
        Ok(mut runtime) => runtime.run_account_sweep_pass(),
        Err(_) => Err(lock_poisoned()),
    })
}
