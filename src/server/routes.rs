//! Route handlers for the download gate.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::audit::{AttemptId, AuditContext, AuditLog};
use crate::clock::Clock;
use crate::entitlement::state::EntitlementState;
use crate::gate::{self, Access, Platform};
use crate::payment::pipeline::OperatorDecision;
use crate::payment::submission::{PaymentMethod, PaymentSubmission};
use crate::server::error::ApiError;
use crate::server::ServerState;

const SUBJECT_HEADER: &str = "x-subject-id";

fn subject_from(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(SUBJECT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(ApiError::unauthorized)
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn source_addr(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// `GET /downloads/{platform}` — authorize, audit, then stream the artifact.
pub async fn download(
    State(state): State<Arc<ServerState>>,
    Path(platform): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    // Platform validation comes before anything else so an invalid request
    // learns nothing about the requester's entitlement.
    let platform: Platform = platform
        .parse()
        .map_err(|_| ApiError::not_found("Invalid platform or file extension"))?;
    let subject = subject_from(&headers)?;

    let now = state.clock.now_utc();
    let (entitlement, suspicious, tier) =
        state.subscriptions.resolve(&subject, state.clock.as_ref());
    let access = gate::authorize(&entitlement, suspicious, state.config.suspicious_hard_block);

    let ua = user_agent(&headers);
    let addr = source_addr(&headers);
    let ctx = AuditContext {
        subject_id: &subject,
        platform,
        tier: &tier,
        user_agent: &ua,
        source_addr: &addr,
    };

    if let Access::Deny(reason) = access {
        info!(subject = %subject, platform = %platform, ?reason, "download denied");
        state.audit.record_denied(&ctx, None, now);
        return Err(ApiError::denied(reason));
    }

    let path = state.config.downloads_dir.join(platform.artifact_name());
    let file = tokio::fs::File::open(&path).await.map_err(|_| {
        ApiError::not_found("Desktop app file not available. Please contact support.")
    })?;

    // The decision is made; the stream proceeds without holding any
    // entitlement lock. Completion (or abort) is audited by the wrapper.
    let attempt = state.audit.record_initiated(&ctx, now);
    info!(subject = %subject, platform = %platform, tier = %tier, "download initiated");

    let stream = AuditedStream::new(
        ReaderStream::new(file),
        StreamAudit {
            audit: Arc::clone(&state.audit),
            clock: Arc::clone(&state.clock),
            subject_id: subject,
            platform,
            tier,
            user_agent: ua,
            source_addr: addr,
            attempt,
        },
    );

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", platform.artifact_name()),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(&format!("response build failed: {e}")))?;
    Ok(response)
}

/// `GET /downloads/info` — entitlement view for UI rendering.
///
/// First contact opens the subject's trial window; beyond that the
/// endpoint only reads, and it never appends to the audit trail.
pub async fn download_info(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let subject = subject_from(&headers)?;
    let (entitlement, suspicious, tier) =
        state.subscriptions.resolve(&subject, state.clock.as_ref());
    let access = gate::authorize(&entitlement, suspicious, state.config.suspicious_hard_block);

    let (state_name, days_remaining) = match &entitlement {
        EntitlementState::TrialActive { days_remaining } => ("trial_active", Some(*days_remaining)),
        EntitlementState::TrialExpired => ("trial_expired", None),
        EntitlementState::PaymentSubmitted => ("payment_submitted", None),
        EntitlementState::Verified { .. } => ("verified", None),
        EntitlementState::Rejected => ("payment_rejected", None),
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "state": state_name,
            "daysRemaining": days_remaining,
            "plan": tier,
            "canDownload": access.is_allowed(),
            "recommendedPlatform": Platform::recommend_from_user_agent(&user_agent(&headers)).to_string(),
        }
    })))
}

/// Body of a payment submission.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    method: String,
    reference: String,
    plan: String,
}

/// `POST /payments` — capture a payment claim for manual verification.
pub async fn submit_payment(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let subject = subject_from(&headers)?;
    let method: PaymentMethod = request.method.parse()?;
    let submission = PaymentSubmission::new(
        method,
        &request.reference,
        &request.plan,
        state.config.min_reference_len,
        state.clock.as_ref(),
    )?;

    let id = state
        .subscriptions
        .begin_submission(&subject, submission, state.clock.as_ref())?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment submitted. You will regain access once it is verified.",
        "submissionId": id.to_string(),
    })))
}

/// Body of an operator verification decision.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    approved: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// `POST /admin/verify/{subject}` — record the operator's decision.
pub async fn verify_payment(
    State(state): State<Arc<ServerState>>,
    Path(subject): Path<String>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let decision = OperatorDecision {
        approved: request.approved,
        reason: request.reason,
    };
    let outcome =
        state
            .subscriptions
            .resolve_submission(&subject, &decision, state.clock.now_utc())?;

    Ok(Json(json!({
        "success": true,
        "message": if outcome.approved {
            "Payment verified"
        } else {
            "Payment rejected"
        },
    })))
}

/// Query parameters for the stats endpoint.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_stats_days")]
    days: i64,
}

fn default_stats_days() -> i64 {
    30
}

/// `GET /admin/stats` — aggregate download counts over a trailing window.
pub async fn stats(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<StatsQuery>,
) -> Json<serde_json::Value> {
    let stats = state.audit.stats(state.clock.now_utc(), query.days);
    Json(json!({
        "success": true,
        "periodDays": query.days,
        "stats": stats,
    }))
}

/// Everything the stream wrapper needs to close out the audit trail.
struct StreamAudit {
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    subject_id: String,
    platform: Platform,
    tier: String,
    user_agent: String,
    source_addr: String,
    attempt: AttemptId,
}

impl StreamAudit {
    fn ctx(&self) -> AuditContext<'_> {
        AuditContext {
            subject_id: &self.subject_id,
            platform: self.platform,
            tier: &self.tier,
            user_agent: &self.user_agent,
            source_addr: &self.source_addr,
        }
    }

    fn complete(self) {
        let now = self.clock.now_utc();
        self.audit.record_completed(&self.ctx(), self.attempt, now);
    }

    fn abandon(self) {
        let now = self.clock.now_utc();
        debug!(subject = %self.subject_id, "download stream ended early");
        self.audit.record_denied(&self.ctx(), Some(self.attempt), now);
    }
}

/// File stream that settles its audit entry exactly once: `completed` when
/// the reader drains, `denied` when the client aborts or the read fails.
struct AuditedStream {
    inner: ReaderStream<tokio::fs::File>,
    // Taken on settlement; present means the attempt is still open.
    audit: Option<StreamAudit>,
}

impl AuditedStream {
    fn new(inner: ReaderStream<tokio::fs::File>, audit: StreamAudit) -> Self {
        Self {
            inner,
            audit: Some(audit),
        }
    }
}

impl Stream for AuditedStream {
    type Item = <ReaderStream<tokio::fs::File> as Stream>::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(None) => {
                if let Some(audit) = this.audit.take() {
                    audit.complete();
                }
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                if let Some(audit) = this.audit.take() {
                    audit.abandon();
                }
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

impl Drop for AuditedStream {
    fn drop(&mut self) {
        // Client disconnected before the file drained.
        if let Some(audit) = self.audit.take() {
            audit.abandon();
        }
    }
}
