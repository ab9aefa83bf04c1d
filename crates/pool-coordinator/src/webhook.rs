//! HTTP transport for the admission webhooks.
//!
//! # Endpoints
//!
//! - `POST /pool-coordinator-webhook-validate` - pod deletion policy
//! - `POST /pool-coordinator-webhook-mutate` - toleration injection
//! - `GET /pool-coordinator-webhook-health` - liveness probe
//! - `GET /pool-coordinator/pools/:pool` - pool membership and liveness
//!
//! TLS is terminated in front of this server.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use kube::api::DynamicObject;
use kube::core::admission::{self, AdmissionRequest, AdmissionResponse, AdmissionReview};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::admission::AdmissionEngine;
use crate::coordinator::Coordinator;
use crate::types::{Decision, Mutation, Operation, PodAdmissionRequest};
use crate::{CoordinatorError, Result};

/// Path of the validating webhook.
pub const VALIDATE_PATH: &str = "/pool-coordinator-webhook-validate";
/// Path of the mutating webhook.
pub const MUTATE_PATH: &str = "/pool-coordinator-webhook-mutate";
/// Path of the health probe.
pub const HEALTH_PATH: &str = "/pool-coordinator-webhook-health";

/// Build the webhook router.
pub fn create_router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route(VALIDATE_PATH, post(validate_handler))
        .route(MUTATE_PATH, post(mutate_handler))
        .route(HEALTH_PATH, get(health_handler))
        .route("/pool-coordinator/pools/:pool", get(pool_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(coordinator)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn validate_handler(
    State(coordinator): State<Arc<Coordinator>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(review(coordinator.admission(), body, |engine, request| {
        (None, engine.evaluate_delete(request))
    }))
}

async fn mutate_handler(
    State(coordinator): State<Arc<Coordinator>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(review(coordinator.admission(), body, AdmissionEngine::evaluate_mutate))
}

/// Membership and liveness of one pool.
#[derive(Debug, Serialize)]
struct PoolStatus {
    pool: String,
    nodes: Vec<String>,
    count: usize,
    alive: usize,
}

async fn pool_handler(
    State(coordinator): State<Arc<Coordinator>>,
    Path(pool): Path<String>,
) -> impl IntoResponse {
    let mut nodes = coordinator.pools().nodes(&pool);
    nodes.sort();
    let alive = coordinator.alive_nodes_in_pool(&pool, Utc::now());
    Json(PoolStatus {
        count: nodes.len(),
        pool,
        nodes,
        alive,
    })
}

fn review<F>(
    engine: &AdmissionEngine,
    body: AdmissionReview<DynamicObject>,
    evaluate: F,
) -> AdmissionReview<DynamicObject>
where
    F: FnOnce(&AdmissionEngine, &PodAdmissionRequest) -> (Option<Mutation>, Decision),
{
    let request: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return AdmissionResponse::invalid(e.to_string()).into_review();
        }
    };

    if request.kind.kind != "Pod" {
        warn!(uid = %request.uid, kind = %request.kind.kind, "Rejecting non-pod admission request");
        return respond(&request, None, Decision::invalid("only pods are supported here"));
    }

    let pod_request = match pod_request(&request) {
        Ok(pod_request) => pod_request,
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Failed to read pod from admission request");
            return respond_error(&request, &e);
        }
    };

    let (mutation, decision) = evaluate(engine, &pod_request);
    debug!(
        uid = %request.uid,
        operation = %pod_request.operation,
        allowed = decision.allowed,
        reason = %decision.reason,
        "Admission decided"
    );
    respond(&request, mutation, decision)
}

fn respond(
    request: &AdmissionRequest<DynamicObject>,
    mutation: Option<Mutation>,
    decision: Decision,
) -> AdmissionReview<DynamicObject> {
    let mut response = AdmissionResponse::from(request);
    if !decision.allowed {
        response = response.deny(decision.reason.clone());
    }
    response.result.code = decision.code.http_status();
    response.result.message = decision.reason;

    if let Some(mutation) = mutation {
        response = match response.with_patch(mutation.patch) {
            Ok(patched) => patched,
            Err(e) => {
                error!(uid = %request.uid, error = %e, "Failed to serialize patch");
                AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"))
            }
        };
    }

    response.into_review()
}

fn respond_error(
    request: &AdmissionRequest<DynamicObject>,
    error: &CoordinatorError,
) -> AdmissionReview<DynamicObject> {
    let mut response = AdmissionResponse::from(request).deny(error.to_string());
    response.result.code = error.http_status_code();
    response.into_review()
}

fn pod_request(request: &AdmissionRequest<DynamicObject>) -> Result<PodAdmissionRequest> {
    let operation = match request.operation {
        admission::Operation::Create => Operation::Create,
        admission::Operation::Update => Operation::Update,
        admission::Operation::Delete => Operation::Delete,
        admission::Operation::Connect => Operation::Connect,
    };
    Ok(PodAdmissionRequest {
        uid: request.uid.clone(),
        operation,
        username: request.user_info.username.clone().unwrap_or_default(),
        old_object: request
            .old_object
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?,
        object: request
            .object
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?,
    })
}
