//! warp filters and handlers
//!
//! Handlers never reject once a route matches: every outcome, including a
//! malformed body or missing identity, is rendered as an envelope. Rejections
//! only come from routing itself and are rendered by [`handle_rejection`].

use crate::auth;
use crate::dispatch::{self, SyncRequest, WorkflowRequest};
use crate::envelope;
use crate::error::ApiError;
use crate::state::AppState;
use delivery_model::RequestMeta;
use delivery_sync::WebhookDelivery;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use uuid::Uuid;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Largest accepted request body
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

pub const GITHUB_EVENT_HEADER: &str = "x-github-event";
pub const GITHUB_DELIVERY_HEADER: &str = "x-github-delivery";
pub const GITHUB_SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Every route, with CORS and request tracing applied
pub fn routes(
    state: AppState,
    cors_origins: &[String],
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let workflow = warp::path!("api" / "workflow")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(caller())
        .and(request_meta())
        .and(body())
        .then(workflow_handler);

    let sync = warp::path!("api" / "sync")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(caller())
        .and(body())
        .then(sync_handler);

    let webhook = warp::path!("api" / "webhooks" / "github")
        .and(warp::post())
        .and(with_state(state))
        .and(warp::header::optional::<String>(GITHUB_EVENT_HEADER))
        .and(warp::header::optional::<String>(GITHUB_DELIVERY_HEADER))
        .and(warp::header::optional::<String>(GITHUB_SIGNATURE_HEADER))
        .and(body())
        .then(webhook_handler);

    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "ok", "version": crate::VERSION })));

    workflow
        .or(sync)
        .or(webhook)
        .or(health)
        .recover(handle_rejection)
        .with(cors(cors_origins))
        .with(warp::trace::request())
}

fn cors(origins: &[String]) -> warp::cors::Cors {
    let builder = warp::cors()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec![
            "content-type",
            auth::USER_ID_HEADER,
            auth::USER_ROLE_HEADER,
        ]);
    if origins.is_empty() {
        builder.allow_any_origin().build()
    } else {
        builder
            .allow_origins(origins.iter().map(String::as_str))
            .build()
    }
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn caller() -> impl Filter<Extract = (Option<String>, Option<String>), Error = Rejection> + Clone {
    warp::header::optional::<String>(auth::USER_ID_HEADER)
        .and(warp::header::optional::<String>(auth::USER_ROLE_HEADER))
}

fn request_meta() -> impl Filter<Extract = (RequestMeta,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-forwarded-for")
        .and(warp::addr::remote())
        .and(warp::header::optional::<String>("user-agent"))
        .map(
            |forwarded: Option<String>, remote: Option<SocketAddr>, agent: Option<String>| {
                auth::request_meta(forwarded.as_deref(), remote, agent)
            },
        )
}

fn body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::bytes())
}

async fn workflow_handler(
    state: AppState,
    user_id: Option<String>,
    role: Option<String>,
    meta: RequestMeta,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();
    let result = run_workflow(&state, user_id.as_deref(), role.as_deref(), &meta, &body).await;
    envelope::respond("workflow", request_id, result)
}

async fn run_workflow(
    state: &AppState,
    user_id: Option<&str>,
    role: Option<&str>,
    meta: &RequestMeta,
    body: &[u8],
) -> Result<Value, ApiError> {
    let principal = auth::principal(user_id, role)?;
    let request: WorkflowRequest = dispatch::parse_request(body)?;
    tracing::debug!(user = %principal.user_id, action = request.action(), "workflow request");
    dispatch::workflow::dispatch(state, &principal, meta, request).await
}

async fn sync_handler(
    state: AppState,
    user_id: Option<String>,
    role: Option<String>,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();
    let result = run_sync(&state, user_id.as_deref(), role.as_deref(), &body).await;
    envelope::respond("sync", request_id, result)
}

async fn run_sync(
    state: &AppState,
    user_id: Option<&str>,
    role: Option<&str>,
    body: &[u8],
) -> Result<Value, ApiError> {
    let principal = auth::principal(user_id, role)?;
    let request: SyncRequest = dispatch::parse_request(body)?;
    tracing::debug!(
        user = %principal.user_id,
        action = request.action().as_str(),
        "sync request"
    );
    dispatch::sync::dispatch(state, &principal, request).await
}

async fn webhook_handler(
    state: AppState,
    event: Option<String>,
    delivery_id: Option<String>,
    signature: Option<String>,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();
    let delivery = WebhookDelivery {
        event: event.as_deref(),
        delivery_id: delivery_id.as_deref(),
        signature: signature.as_deref(),
        body: &body,
    };
    let result = match state.webhooks.handle(delivery).await {
        Ok(outcome) => dispatch::to_data(&outcome),
        Err(e) => Err(ApiError::from(e)),
    };
    envelope::respond("webhook", request_id, result)
}

/// Render routing rejections as envelopes
///
/// # Errors
/// Never; the `Result` satisfies [`Filter::recover`]
pub async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let err = if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError::Validation("method not allowed; API routes accept POST only".into())
    } else if rejection.is_not_found() {
        ApiError::NotFound("route not found".into())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        ApiError::Validation(format!("request body exceeds {MAX_BODY_BYTES} bytes"))
    } else {
        tracing::debug!(?rejection, "unhandled rejection");
        ApiError::Validation("malformed request".into())
    };
    Ok(envelope::failure("route", Uuid::new_v4(), &err))
}
