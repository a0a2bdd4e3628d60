// crates/changedesk-server/src/http.rs
// ============================================================================
// Module: HTTP Facade
// Description: Public request surface for changes, announcements, and drafts.
// Purpose: Parse and validate payloads, enforce auth, and delegate to the reactor.
// Dependencies: axum, tower-http, changedesk-{core,store,survey}
// ============================================================================

//! ## Overview
//! The facade exposes the public surface over axum: upload, status
//! transitions, listings, version history, draft CRUD, search, statistics,
//! and the HMAC-verified survey webhook. Responses are JSON with permissive
//! CORS; errors carry `{error, message, type}` with the taxonomy status
//! codes (400 validation, 401/403 auth, 404 missing, 409 conflict, 500
//! upstream/internal). All mutating writes reach the optimistic writer; all
//! side effects run through the reactor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use changedesk_core::AnnouncementId;
use changedesk_core::Attachment;
use changedesk_core::ChangeId;
use changedesk_core::CustomerCode;
use changedesk_core::ObjectId;
use changedesk_core::ObjectRecord;
use changedesk_core::ObjectStatus;
use changedesk_core::ObjectType;
use changedesk_core::UtcTimestamp;
use changedesk_core::apply_transition;
use changedesk_core::validate_record;
use changedesk_notify::HttpMeetingClient;
use changedesk_notify::RecordingMailTransport;
use changedesk_notify::RecordingMeetingClient;
use changedesk_notify::SesMailTransport;
use changedesk_store::GatewayError;
use changedesk_store::MemoryObjectStore;
use changedesk_store::ObjectGateway;
use changedesk_store::ObjectStore;
use changedesk_store::PutCondition;
use changedesk_store::S3ObjectStore;
use changedesk_store::S3ObjectStoreConfig;
use changedesk_store::archive_key;
use changedesk_store::draft_key;
use changedesk_store::layout::ARCHIVE_PREFIX;
use changedesk_store::layout::DRAFTS_PREFIX;
use changedesk_store::version_key;
use changedesk_store::versions_prefix;
use changedesk_survey::RecordingSurveyService;
use changedesk_survey::SurveyProvisioner;
use changedesk_survey::SurveyService;
use changedesk_survey::TypeformClient;
use changedesk_survey::WebhookError;
use changedesk_survey::WebhookIngest;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::ReactorAuditSink;
use crate::audit::StderrAuditSink;
use crate::auth::AuthError;
use crate::auth::AuthPolicy;
use crate::auth::RequestIdentity;
use crate::config::ChangedeskConfig;
use crate::config::ConfigError;
use crate::config::StorageBackend;
use crate::queue::NoopQueuePublisher;
use crate::queue::QueuePublisher;
use crate::queue::SqsQueuePublisher;
use crate::reactor::ApiError;
use crate::reactor::Reactor;
use crate::reactor::ReactorClients;
use crate::reactor::TransitionResponse;
use crate::telemetry::ApiAction;
use crate::telemetry::ApiOutcome;
use crate::telemetry::NoopMetrics;
use crate::telemetry::ReactorMetrics;
use crate::telemetry::RequestMetricEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the survey webhook signature.
const WEBHOOK_SIGNATURE_HEADER: &str = "typeform-signature";
/// Default listing limit for the recent endpoint.
const DEFAULT_RECENT_LIMIT: usize = 20;
/// Hard cap for listing limits.
const MAX_LISTING_LIMIT: usize = 500;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server bootstrap and bind errors.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Bind or accept failure.
    #[error("serve failed: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Application State
// ============================================================================

/// Shared state behind every handler.
pub struct AppState {
    /// Lifecycle reactor.
    pub reactor: Arc<Reactor>,
    /// Authorization policy.
    pub policy: AuthPolicy,
    /// Audit sink.
    pub audit: Arc<dyn ReactorAuditSink>,
    /// Metrics sink.
    pub metrics: Arc<dyn ReactorMetrics>,
    /// Survey webhook ingest.
    pub webhook: WebhookIngest,
    /// Inflight request limiter.
    pub inflight: Arc<Semaphore>,
    /// Maximum request body size.
    pub max_body_bytes: usize,
}

impl AppState {
    /// Builds the full application state from configuration.
    ///
    /// Empty upstream credentials (and `dry_run`) select recording
    /// implementations so local deployments never call external services.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation or client construction fails.
    pub fn from_config(config: &ChangedeskConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        let store: Arc<dyn ObjectStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryObjectStore::new(&config.storage.bucket)),
            StorageBackend::S3 => Arc::new(
                S3ObjectStore::new(&S3ObjectStoreConfig {
                    bucket: config.storage.bucket.clone(),
                    region: config.storage.region.clone(),
                    endpoint: config.storage.endpoint.clone(),
                    force_path_style: config.storage.force_path_style,
                })
                .map_err(|err| ConfigError::Invalid(err.to_string()))?,
            ),
        };
        let gateway = ObjectGateway::new(store);
        let audit: Arc<dyn ReactorAuditSink> = if config.audit.enabled {
            match &config.audit.path {
                Some(path) => Arc::new(
                    FileAuditSink::new(std::path::Path::new(path))
                        .map_err(|err| ConfigError::Invalid(err.to_string()))?,
                ),
                None => Arc::new(StderrAuditSink),
            }
        } else {
            Arc::new(NoopAuditSink)
        };
        let live = !config.dry_run;
        let mail: Arc<dyn changedesk_notify::MailTransport> =
            if live && !config.mail.sender.trim().is_empty() {
                Arc::new(
                    SesMailTransport::new(&config.mail.sender, config.storage.region.as_deref())
                        .map_err(|err| ConfigError::Invalid(err.to_string()))?,
                )
            } else {
                Arc::new(RecordingMailTransport::new())
            };
        let meetings: Arc<dyn changedesk_notify::MeetingClient> =
            if live && !config.meetings.base_url.trim().is_empty() {
                Arc::new(
                    HttpMeetingClient::new(&config.meetings.base_url, &config.meetings.token)
                        .map_err(|err| ConfigError::Invalid(err.to_string()))?,
                )
            } else {
                Arc::new(RecordingMeetingClient::new())
            };
        let survey_service: Arc<dyn SurveyService> =
            if live && !config.survey.api_token.trim().is_empty() {
                Arc::new(
                    TypeformClient::new(&config.survey.base_url, &config.survey.api_token)
                        .map_err(|err| ConfigError::Invalid(err.to_string()))?,
                )
            } else {
                Arc::new(RecordingSurveyService::new())
            };
        let queue: Arc<dyn QueuePublisher> = match &config.queue.queue_url {
            Some(queue_url) if live => Arc::new(
                SqsQueuePublisher::new(queue_url, config.storage.region.as_deref())
                    .map_err(|err| ConfigError::Invalid(err.to_string()))?,
            ),
            _ => Arc::new(NoopQueuePublisher),
        };
        let surveys = Arc::new(SurveyProvisioner::new(survey_service, gateway.clone()));
        let reactor = Arc::new(Reactor::new(
            gateway.clone(),
            ReactorClients {
                mail,
                meetings,
                surveys,
                queue,
                audit: Arc::clone(&audit),
            },
            config.customer_directory()?,
            config.mail.approver_list.clone(),
            config.meetings.organizer.clone(),
            config.fanout.max_concurrency,
        ));
        let webhook = WebhookIngest::new(gateway, config.survey.webhook_secret.clone());
        Ok(Arc::new(Self {
            reactor,
            policy: AuthPolicy::new(
                config.auth.allowed_domains.clone(),
                config.auth.admin_users.clone(),
            ),
            audit,
            metrics: Arc::new(NoopMetrics),
            webhook,
            inflight: Arc::new(Semaphore::new(config.server.max_inflight)),
            max_body_bytes: config.server.max_body_bytes,
        }))
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the public router with CORS, body limits, and inflight limiting.
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/upload", post(handle_upload))
        .route("/auth-check", get(handle_auth_check))
        .route("/api/user/context", get(handle_user_context))
        .route("/changes", get(handle_list_changes))
        .route("/announcements", get(handle_list_announcements))
        .route("/changes/search", post(handle_search))
        .route("/changes/statistics", get(handle_statistics))
        .route("/changes/recent", get(handle_recent))
        .route("/changes/{id}", get(handle_get_record).put(handle_edit_record))
        .route("/announcements/{id}", get(handle_get_record))
        .route("/changes/{id}/versions", get(handle_list_versions))
        .route("/changes/{id}/versions/{version}", get(handle_get_version))
        .route("/changes/{id}/approve", post(handle_approve))
        .route("/changes/{id}/complete", post(handle_complete))
        .route("/changes/{id}/cancel", post(handle_cancel))
        .route("/changes/{id}/duplicate", post(handle_duplicate))
        .route("/drafts", get(handle_list_drafts).post(handle_save_draft))
        .route("/drafts/{id}", get(handle_get_draft).delete(handle_delete_draft))
        .route("/webhooks/survey", post(handle_webhook))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), limit_and_measure))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Binds the listener and serves the router until shutdown.
///
/// # Errors
///
/// Returns [`ServeError`] when the bind address is invalid or accept fails.
pub async fn serve(state: Arc<AppState>, bind: &str) -> Result<(), ServeError> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| ServeError::Io(err.to_string()))?;
    axum::serve(listener, router).await.map_err(|err| ServeError::Io(err.to_string()))
}

/// Middleware enforcing the inflight cap and recording request metrics.
async fn limit_and_measure(
    State(state): State<Arc<AppState>>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    let action = classify_action(request.method().as_str(), request.uri().path());
    let Ok(_permit) = Arc::clone(&state.inflight).try_acquire_owned() else {
        return api_error_response(&ApiError::Internal("server at capacity".to_string()));
    };
    let started = Instant::now();
    let response = next.run(request).await;
    let outcome =
        if response.status().is_success() { ApiOutcome::Ok } else { ApiOutcome::Error };
    let event = RequestMetricEvent {
        action,
        outcome,
        status: response.status().as_u16(),
    };
    state.metrics.record_request(event.clone());
    state.metrics.record_latency(event, started.elapsed());
    response
}

/// Classifies a request for telemetry labels.
fn classify_action(method: &str, path: &str) -> ApiAction {
    if path == "/upload" {
        ApiAction::Upload
    } else if path.ends_with("/approve") || path.ends_with("/complete") || path.ends_with("/cancel")
    {
        ApiAction::Transition
    } else if method == "PUT" {
        ApiAction::Edit
    } else if path.starts_with("/drafts") {
        ApiAction::Drafts
    } else if path.ends_with("/search") || path.ends_with("/statistics") || path.ends_with("/recent")
    {
        ApiAction::Query
    } else if path.starts_with("/webhooks") {
        ApiAction::Webhook
    } else if path == "/auth-check" || path.starts_with("/api/user") {
        ApiAction::Identity
    } else {
        ApiAction::Read
    }
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Maps a taxonomy error to its response status and type label.
fn error_parts(error: &ApiError) -> (StatusCode, &'static str) {
    match error {
        ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
        ApiError::Auth(AuthError::Unauthenticated(_)) => (StatusCode::UNAUTHORIZED, "AuthError"),
        ApiError::Auth(AuthError::Unauthorized(_)) => (StatusCode::FORBIDDEN, "AuthError"),
        ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
        ApiError::InvalidTransition(_) => (StatusCode::BAD_REQUEST, "InvalidTransition"),
        ApiError::ConcurrentModification(_) => (StatusCode::CONFLICT, "ConcurrentModification"),
        ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConcurrentModification"),
        ApiError::Upstream {
            ..
        } => (StatusCode::INTERNAL_SERVER_ERROR, "UpstreamError"),
        ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
    }
}

/// Builds the error response envelope.
fn api_error_response(error: &ApiError) -> Response {
    let (status, error_type) = error_parts(error);
    let body = json!({
        "error": error_type,
        "message": error.to_string(),
        "type": error_type,
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        api_error_response(&self)
    }
}

// ============================================================================
// SECTION: Request Payloads
// ============================================================================

/// Upload request envelope for creates and announcement updates.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    /// Optional action selector.
    #[serde(default)]
    action: Option<String>,
    /// Object kind tag.
    #[serde(default, alias = "object_type")]
    object_type: Option<String>,
    /// Announcement identifier (announcement payloads).
    #[serde(default, alias = "announcement_id")]
    announcement_id: Option<String>,
    /// Record title.
    #[serde(default, alias = "changeTitle", alias = "announcementTitle")]
    title: Option<String>,
    /// Change description.
    #[serde(default)]
    description: Option<String>,
    /// Announcement summary.
    #[serde(default)]
    summary: Option<String>,
    /// Announcement content body.
    #[serde(default)]
    content: Option<String>,
    /// Recipient customer codes.
    #[serde(default)]
    customers: Option<Vec<String>>,
    /// Requested status (announcement updates).
    #[serde(default)]
    status: Option<String>,
    /// Ask the reactor to schedule a meeting on approval.
    #[serde(default, alias = "include_meeting")]
    include_meeting: Option<bool>,
    /// Implementation window start.
    #[serde(default, alias = "implementation_start")]
    implementation_start: Option<String>,
    /// Implementation window end.
    #[serde(default, alias = "implementation_end")]
    implementation_end: Option<String>,
    /// Uploaded attachment metadata.
    #[serde(default)]
    attachments: Option<Vec<AttachmentPayload>>,
}

/// Attachment metadata carried on upload and edit payloads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentPayload {
    /// Original file name.
    name: String,
    /// Object-store key holding the bytes.
    #[serde(alias = "store_key")]
    store_key: String,
    /// Size in bytes.
    size: u64,
    /// Upload instant; defaults to the request instant when absent.
    #[serde(default, alias = "uploaded_at")]
    uploaded_at: Option<String>,
}

/// Edit request for PUT /changes/{id}.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditRequest {
    /// New title.
    #[serde(default)]
    title: Option<String>,
    /// New description.
    #[serde(default)]
    description: Option<String>,
    /// New summary.
    #[serde(default)]
    summary: Option<String>,
    /// New content body.
    #[serde(default)]
    content: Option<String>,
    /// New recipient list.
    #[serde(default)]
    customers: Option<Vec<String>>,
    /// New meeting flag.
    #[serde(default, alias = "include_meeting")]
    include_meeting: Option<bool>,
    /// New window start.
    #[serde(default, alias = "implementation_start")]
    implementation_start: Option<String>,
    /// New window end.
    #[serde(default, alias = "implementation_end")]
    implementation_end: Option<String>,
    /// Replacement attachment metadata.
    #[serde(default)]
    attachments: Option<Vec<AttachmentPayload>>,
}

/// Search request for POST /changes/search.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    /// Substring matched against title and bodies.
    #[serde(default)]
    query: Option<String>,
    /// Exact status filter.
    #[serde(default)]
    status: Option<String>,
    /// Creator filter.
    #[serde(default, alias = "created_by")]
    created_by: Option<String>,
    /// Customer intersection filter.
    #[serde(default)]
    customers: Option<Vec<String>>,
    /// Creation window start (RFC3339).
    #[serde(default, alias = "start_date")]
    start_date: Option<String>,
    /// Creation window end (RFC3339).
    #[serde(default, alias = "end_date")]
    end_date: Option<String>,
}

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
struct ListingQuery {
    /// Maximum items returned.
    #[serde(default)]
    limit: Option<usize>,
}

/// Duplicate request for POST /changes/{id}/duplicate.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DuplicateRequest {
    /// Fresh identifier for announcement duplicates.
    #[serde(default, alias = "announcement_id")]
    announcement_id: Option<String>,
}

// ============================================================================
// SECTION: Response Payloads
// ============================================================================

/// Upload response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    /// Change identifier for change records.
    #[serde(skip_serializing_if = "Option::is_none")]
    change_id: Option<String>,
    /// Announcement identifier for announcement records.
    #[serde(skip_serializing_if = "Option::is_none")]
    announcement_id: Option<String>,
    /// Status after the write.
    status: ObjectStatus,
    /// Version after the write.
    version: u64,
    /// Per-customer reaction outcomes.
    update_results: Vec<changedesk_runner::CustomerOutcome>,
    /// Aggregated reaction counts.
    summary: changedesk_runner::FanoutSummary,
}

impl UploadResponse {
    /// Wraps a transition response with the record's identifier fields.
    fn from_transition(record_kind: ObjectType, response: TransitionResponse) -> Self {
        let (change_id, announcement_id) = match record_kind {
            ObjectType::Change => (Some(response.object_id.clone()), None),
            ObjectType::Announcement(_) => (None, Some(response.object_id.clone())),
        };
        Self {
            change_id,
            announcement_id,
            status: response.status,
            version: response.version,
            update_results: response.update_results,
            summary: response.summary,
        }
    }
}

/// Listing response envelope.
#[derive(Debug, Serialize)]
struct ListResponse {
    /// Matching records.
    items: Vec<ObjectRecord>,
    /// Number of records returned.
    count: usize,
}

// ============================================================================
// SECTION: Identity & Listing Helpers
// ============================================================================

/// Authenticates the caller and applies the change-management domain gate.
fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    action: &str,
) -> Result<RequestIdentity, ApiError> {
    let identity = RequestIdentity::from_headers(headers)?;
    state.policy.authorize_action(&identity, action, state.audit.as_ref())?;
    Ok(identity)
}

/// Loads every decodable record under a prefix.
fn load_records(state: &AppState, prefix: &str) -> Result<Vec<ObjectRecord>, ApiError> {
    let gateway = state.reactor.gateway();
    let mut records = Vec::new();
    for entry in gateway.list(prefix)? {
        if !entry.key.ends_with(".json") {
            continue;
        }
        match gateway.get_json::<ObjectRecord>(&entry.key) {
            Ok((record, _etag)) => records.push(record),
            // Listings tolerate undecodable objects; fetches do not.
            Err(GatewayError::Decode {
                ..
            }) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(records)
}

/// Clamps a listing limit to the hard cap.
fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).min(MAX_LISTING_LIMIT)
}

/// Parses an optional RFC3339 field, mapping failures to validation errors.
fn parse_timestamp(field: &'static str, raw: Option<&str>) -> Result<Option<UtcTimestamp>, ApiError> {
    raw.map(|value| {
        UtcTimestamp::parse(value)
            .map_err(|_| ApiError::Validation(format!("malformed date in {field}: {value}")))
    })
    .transpose()
}

/// Parses customer code strings, mapping failures to validation errors.
fn parse_customers(raw: &[String]) -> Result<Vec<CustomerCode>, ApiError> {
    raw.iter()
        .map(|code| {
            CustomerCode::parse(code).map_err(|err| ApiError::Validation(err.to_string()))
        })
        .collect()
}

/// Parses attachment payloads, mapping failures to validation errors.
fn parse_attachments(
    raw: &[AttachmentPayload],
    now: UtcTimestamp,
) -> Result<Vec<Attachment>, ApiError> {
    raw.iter()
        .map(|payload| {
            if payload.name.trim().is_empty() {
                return Err(ApiError::Validation("attachment name must be set".to_string()));
            }
            if payload.store_key.trim().is_empty() {
                return Err(ApiError::Validation(
                    "attachment store_key must be set".to_string(),
                ));
            }
            let uploaded_at =
                parse_timestamp("uploadedAt", payload.uploaded_at.as_deref())?.unwrap_or(now);
            Ok(Attachment {
                name: payload.name.clone(),
                store_key: payload.store_key.clone(),
                size: payload.size,
                uploaded_at,
            })
        })
        .collect()
}

// ============================================================================
// SECTION: Upload & Transitions
// ============================================================================

/// POST /upload: create-and-submit, or announcement update by action.
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<UploadRequest>,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers, "upload")?;
    if request.action.as_deref() == Some("update_announcement") {
        return handle_announcement_update(&state, &identity, request).await;
    }
    let object_type = request
        .object_type
        .as_deref()
        .and_then(ObjectType::parse)
        .ok_or_else(|| ApiError::Validation("unknown or missing object_type".to_string()))?;
    let now = UtcTimestamp::now();
    let title = request
        .title
        .clone()
        .ok_or_else(|| ApiError::Validation("missing title".to_string()))?;
    let customers = parse_customers(request.customers.as_deref().unwrap_or_default())?;
    let mut record = match object_type {
        ObjectType::Change => ObjectRecord::new_change(
            ChangeId::generate(now),
            title,
            customers,
            identity.email.clone(),
            now,
        ),
        ObjectType::Announcement(subtype) => {
            let raw_id = request
                .announcement_id
                .as_deref()
                .ok_or_else(|| ApiError::Validation("missing announcement_id".to_string()))?;
            let announcement_id = AnnouncementId::parse(raw_id)
                .map_err(|err| ApiError::Validation(err.to_string()))?;
            ObjectRecord::new_announcement(
                subtype,
                announcement_id,
                title,
                customers,
                identity.email.clone(),
                now,
            )
        }
    };
    record.description = request.description.clone();
    record.summary = request.summary.clone();
    record.content = request.content.clone();
    record.include_meeting = request.include_meeting.unwrap_or(false);
    record.implementation_start =
        parse_timestamp("implementationStart", request.implementation_start.as_deref())?;
    record.implementation_end =
        parse_timestamp("implementationEnd", request.implementation_end.as_deref())?;
    record.attachments =
        parse_attachments(request.attachments.as_deref().unwrap_or_default(), now)?;
    apply_transition(&mut record, ObjectStatus::Submitted, &identity.email, now)?;
    let response = state.reactor.submit_new(record, CancellationToken::new()).await?;
    let body = UploadResponse::from_transition(object_type, response);
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// Handles the `update_announcement` upload action.
async fn handle_announcement_update(
    state: &AppState,
    identity: &RequestIdentity,
    request: UploadRequest,
) -> Result<Response, ApiError> {
    let raw_id = request
        .announcement_id
        .as_deref()
        .ok_or_else(|| ApiError::Validation("missing announcement_id".to_string()))?;
    let id = AnnouncementId::parse(raw_id)
        .map_err(|err| ApiError::Validation(err.to_string()))?;
    let key = archive_key(id.as_str()).map_err(GatewayError::Store)?;
    let (current, _etag) = state.reactor.gateway().get_json::<ObjectRecord>(&key)?;
    state.policy.ensure_owner(identity, &current, "update_announcement", state.audit.as_ref())?;
    if let Some(raw_status) = request.status.as_deref() {
        let status = ObjectStatus::from_label(raw_status)
            .ok_or_else(|| ApiError::Validation(format!("unknown status: {raw_status}")))?;
        let response = state
            .reactor
            .transition(id.as_str(), status, &identity.email, CancellationToken::new())
            .await?;
        let object_type = current.object_type;
        return Ok(Json(UploadResponse::from_transition(object_type, response)).into_response());
    }
    let customers = request.customers.as_deref().map(parse_customers).transpose()?;
    let attachments = request
        .attachments
        .as_deref()
        .map(|raw| parse_attachments(raw, UtcTimestamp::now()))
        .transpose()?;
    let updated = state.reactor.edit(id.as_str(), &identity.email, move |record| {
        if let Some(title) = &request.title {
            record.title = title.clone();
        }
        if let Some(summary) = &request.summary {
            record.summary = Some(summary.clone());
        }
        if let Some(content) = &request.content {
            record.content = Some(content.clone());
        }
        if let Some(customers) = &customers {
            record.customers = customers.clone();
        }
        if let Some(attachments) = &attachments {
            record.attachments = attachments.clone();
        }
    })?;
    let object_type = updated.object_type;
    let response = state.reactor.announce_update(updated, CancellationToken::new()).await;
    Ok(Json(UploadResponse::from_transition(object_type, response)).into_response())
}

/// Shared status-transition handler body.
async fn run_transition(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    to: ObjectStatus,
) -> Result<Response, ApiError> {
    let action = format!("transition:{to}");
    let identity = authorize(state, headers, &action)?;
    ObjectId::parse(id).map_err(|err| ApiError::Validation(err.to_string()))?;
    let key = archive_key(id).map_err(GatewayError::Store)?;
    let (current, _etag) = state.reactor.gateway().get_json::<ObjectRecord>(&key)?;
    state.policy.ensure_owner(&identity, &current, &action, state.audit.as_ref())?;
    let response =
        state.reactor.transition(id, to, &identity.email, CancellationToken::new()).await?;
    Ok(Json(response).into_response())
}

/// POST /changes/{id}/approve.
async fn handle_approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    run_transition(&state, &headers, &id, ObjectStatus::Approved).await
}

/// POST /changes/{id}/complete.
async fn handle_complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    run_transition(&state, &headers, &id, ObjectStatus::Completed).await
}

/// POST /changes/{id}/cancel.
///
/// Cancelling a draft tombstones the draft after writing the cancelled
/// archive record, keeping one live location per identifier.
async fn handle_cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers, "transition:cancelled")?;
    let archive = archive_key(&id).map_err(GatewayError::Store)?;
    if state.reactor.gateway().exists(&archive)? {
        let (current, _etag) = state.reactor.gateway().get_json::<ObjectRecord>(&archive)?;
        state
            .policy
            .ensure_owner(&identity, &current, "transition:cancelled", state.audit.as_ref())?;
        let response = state
            .reactor
            .transition(&id, ObjectStatus::Cancelled, &identity.email, CancellationToken::new())
            .await?;
        return Ok(Json(response).into_response());
    }
    // Draft-only cancellation: promote the draft to a cancelled archive
    // record, then tombstone the draft.
    let draft = draft_key(&id).map_err(GatewayError::Store)?;
    let (mut record, _etag) = state.reactor.gateway().get_json::<ObjectRecord>(&draft)?;
    state.policy.ensure_owner(&identity, &record, "transition:cancelled", state.audit.as_ref())?;
    let now = UtcTimestamp::now();
    apply_transition(&mut record, ObjectStatus::Cancelled, &identity.email, now)?;
    record.version = 1;
    state.reactor.writer().create(&record)?;
    state
        .reactor
        .gateway()
        .tombstone_move(&draft, &identity.email, "draft cancelled", now)?;
    let response = state.reactor.react(record, CancellationToken::new()).await;
    Ok(Json(response).into_response())
}

/// POST /changes/{id}/duplicate: copy an existing record into a fresh draft.
///
/// The copy takes a fresh identity with version, status, submission and
/// approval attribution, and side-effect metadata all reset; announcement
/// duplicates must supply the new announcement identifier.
async fn handle_duplicate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    request: Option<Json<DuplicateRequest>>,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers, "duplicate")?;
    let key = archive_key(&id).map_err(GatewayError::Store)?;
    let (source, _etag) = state.reactor.gateway().get_json::<ObjectRecord>(&key)?;
    let now = UtcTimestamp::now();
    let (change_id, announcement_id) = match source.object_type {
        ObjectType::Change => (Some(ChangeId::generate(now)), None),
        ObjectType::Announcement(_) => {
            let raw_id = request
                .as_ref()
                .and_then(|Json(body)| body.announcement_id.as_deref())
                .ok_or_else(|| {
                    ApiError::Validation(
                        "announcement duplicates require announcementId".to_string(),
                    )
                })?;
            let parsed = AnnouncementId::parse(raw_id)
                .map_err(|err| ApiError::Validation(err.to_string()))?;
            (None, Some(parsed))
        }
    };
    let copy = source.duplicate_as_draft(change_id, announcement_id, identity.email.clone(), now);
    validate_record(&copy).map_err(|err| ApiError::Validation(err.to_string()))?;
    let draft = draft_key(copy.id_str()).map_err(GatewayError::Store)?;
    state
        .reactor
        .gateway()
        .put_json(&draft, &copy, &BTreeMap::new(), PutCondition::Overwrite)?;
    Ok((StatusCode::CREATED, Json(copy)).into_response())
}

/// PUT /changes/{id}: edit content fields, creating a new version.
async fn handle_edit_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<EditRequest>,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers, "edit")?;
    let key = archive_key(&id).map_err(GatewayError::Store)?;
    let (current, _etag) = state.reactor.gateway().get_json::<ObjectRecord>(&key)?;
    state.policy.ensure_owner(&identity, &current, "edit", state.audit.as_ref())?;
    let customers = request.customers.as_deref().map(parse_customers).transpose()?;
    let implementation_start =
        parse_timestamp("implementationStart", request.implementation_start.as_deref())?;
    let implementation_end =
        parse_timestamp("implementationEnd", request.implementation_end.as_deref())?;
    let attachments = request
        .attachments
        .as_deref()
        .map(|raw| parse_attachments(raw, UtcTimestamp::now()))
        .transpose()?;
    let updated = state.reactor.edit(&id, &identity.email, move |record| {
        if let Some(title) = &request.title {
            record.title = title.clone();
        }
        if let Some(description) = &request.description {
            record.description = Some(description.clone());
        }
        if let Some(summary) = &request.summary {
            record.summary = Some(summary.clone());
        }
        if let Some(content) = &request.content {
            record.content = Some(content.clone());
        }
        if let Some(customers) = &customers {
            record.customers = customers.clone();
        }
        if let Some(attachments) = &attachments {
            record.attachments = attachments.clone();
        }
        if let Some(include_meeting) = request.include_meeting {
            record.include_meeting = include_meeting;
        }
        if implementation_start.is_some() {
            record.implementation_start = implementation_start;
        }
        if implementation_end.is_some() {
            record.implementation_end = implementation_end;
        }
    })?;
    validate_record(&updated).map_err(|err| ApiError::Validation(err.to_string()))?;
    Ok(Json(updated).into_response())
}

// ============================================================================
// SECTION: Reads
// ============================================================================

/// GET /auth-check.
async fn handle_auth_check(headers: HeaderMap) -> Response {
    let identity = RequestIdentity::from_headers(&headers);
    let body = match identity {
        Ok(identity) => json!({
            "authenticated": true,
            "userEmail": identity.email.as_str(),
            "timestamp": UtcTimestamp::now().to_rfc3339(),
        }),
        Err(_) => json!({
            "authenticated": false,
            "userEmail": Value::Null,
            "timestamp": UtcTimestamp::now().to_rfc3339(),
        }),
    };
    Json(body).into_response()
}

/// GET /api/user/context.
async fn handle_user_context(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = RequestIdentity::from_headers(&headers)?;
    let is_admin = state.policy.is_admin(&identity);
    let body = json!({
        "email": identity.email.as_str(),
        "isAdmin": is_admin,
        "role": if is_admin { "admin" } else { "user" },
        "customerCode": Value::Null,
    });
    Ok(Json(body).into_response())
}

/// GET /changes: archive records with change identifiers.
async fn handle_list_changes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListingQuery>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, "list")?;
    let mut records = load_records(&state, ARCHIVE_PREFIX)?;
    records.retain(|record| record.change_id.is_some());
    records.truncate(clamp_limit(query.limit, MAX_LISTING_LIMIT));
    let count = records.len();
    Ok(Json(ListResponse {
        items: records,
        count,
    })
    .into_response())
}

/// GET /announcements: archive records with announcement identifiers.
async fn handle_list_announcements(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListingQuery>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, "list")?;
    let mut records = load_records(&state, ARCHIVE_PREFIX)?;
    records.retain(|record| record.announcement_id.is_some());
    records.truncate(clamp_limit(query.limit, MAX_LISTING_LIMIT));
    let count = records.len();
    Ok(Json(ListResponse {
        items: records,
        count,
    })
    .into_response())
}

/// GET /changes/{id} and /announcements/{id}.
async fn handle_get_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, "fetch")?;
    ObjectId::parse(&id).map_err(|err| ApiError::Validation(err.to_string()))?;
    let key = archive_key(&id).map_err(GatewayError::Store)?;
    let (record, _etag) = state.reactor.gateway().get_json::<ObjectRecord>(&key)?;
    Ok(Json(record).into_response())
}

/// GET /changes/{id}/versions: snapshot listing.
async fn handle_list_versions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, "versions")?;
    let prefix = versions_prefix(&id).map_err(GatewayError::Store)?;
    let mut versions: Vec<u64> = state
        .reactor
        .gateway()
        .list(&prefix)?
        .into_iter()
        .filter_map(|entry| {
            entry
                .key
                .rsplit('/')
                .next()?
                .strip_prefix('v')?
                .strip_suffix(".json")?
                .parse()
                .ok()
        })
        .collect();
    versions.sort_unstable();
    Ok(Json(json!({ "id": id, "versions": versions })).into_response())
}

/// GET /changes/{id}/versions/{version}: one snapshot.
async fn handle_get_version(
    State(state): State<Arc<AppState>>,
    Path((id, version)): Path<(String, u64)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, "versions")?;
    let key = version_key(&id, version).map_err(GatewayError::Store)?;
    let (record, _etag) = state.reactor.gateway().get_json::<ObjectRecord>(&key)?;
    Ok(Json(record).into_response())
}

// ============================================================================
// SECTION: Drafts
// ============================================================================

/// GET /drafts: caller-owned drafts (admins see all).
async fn handle_list_drafts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers, "drafts:list")?;
    let mut records = load_records(&state, DRAFTS_PREFIX)?;
    if !state.policy.is_admin(&identity) {
        records.retain(|record| record.created_by.as_ref() == Some(&identity.email));
    }
    let count = records.len();
    Ok(Json(ListResponse {
        items: records,
        count,
    })
    .into_response())
}

/// POST /drafts: create or update a draft in place.
async fn handle_save_draft(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<UploadRequest>,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers, "drafts:save")?;
    let object_type = request
        .object_type
        .as_deref()
        .and_then(ObjectType::parse)
        .ok_or_else(|| ApiError::Validation("unknown or missing object_type".to_string()))?;
    let now = UtcTimestamp::now();
    let title = request
        .title
        .clone()
        .ok_or_else(|| ApiError::Validation("missing title".to_string()))?;
    let customers = parse_customers(request.customers.as_deref().unwrap_or_default())?;
    let mut record = match object_type {
        ObjectType::Change => ObjectRecord::new_change(
            ChangeId::generate(now),
            title,
            customers,
            identity.email.clone(),
            now,
        ),
        ObjectType::Announcement(subtype) => {
            let raw_id = request
                .announcement_id
                .as_deref()
                .ok_or_else(|| ApiError::Validation("missing announcement_id".to_string()))?;
            let announcement_id = AnnouncementId::parse(raw_id)
                .map_err(|err| ApiError::Validation(err.to_string()))?;
            ObjectRecord::new_announcement(
                subtype,
                announcement_id,
                title,
                customers,
                identity.email.clone(),
                now,
            )
        }
    };
    record.description = request.description.clone();
    record.summary = request.summary.clone();
    record.content = request.content.clone();
    record.include_meeting = request.include_meeting.unwrap_or(false);
    record.implementation_start =
        parse_timestamp("implementationStart", request.implementation_start.as_deref())?;
    record.implementation_end =
        parse_timestamp("implementationEnd", request.implementation_end.as_deref())?;
    record.attachments =
        parse_attachments(request.attachments.as_deref().unwrap_or_default(), now)?;
    let key = draft_key(record.id_str()).map_err(GatewayError::Store)?;
    state.reactor.gateway().put_json(
        &key,
        &record,
        &BTreeMap::new(),
        PutCondition::Overwrite,
    )?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

/// GET /drafts/{id}.
async fn handle_get_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers, "drafts:fetch")?;
    let key = draft_key(&id).map_err(GatewayError::Store)?;
    let (record, _etag) = state.reactor.gateway().get_json::<ObjectRecord>(&key)?;
    state.policy.ensure_owner(&identity, &record, "drafts:fetch", state.audit.as_ref())?;
    Ok(Json(record).into_response())
}

/// DELETE /drafts/{id}: tombstone move under deleted/drafts/.
async fn handle_delete_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers, "drafts:delete")?;
    let key = draft_key(&id).map_err(GatewayError::Store)?;
    let (record, _etag) = state.reactor.gateway().get_json::<ObjectRecord>(&key)?;
    state.policy.ensure_owner(&identity, &record, "drafts:delete", state.audit.as_ref())?;
    let tombstone = state.reactor.gateway().tombstone_move(
        &key,
        &identity.email,
        "draft deleted",
        UtcTimestamp::now(),
    )?;
    Ok(Json(json!({ "deleted": id, "tombstone": tombstone })).into_response())
}

// ============================================================================
// SECTION: Search, Statistics, Recent
// ============================================================================

/// POST /changes/search.
async fn handle_search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, "search")?;
    let status = request
        .status
        .as_deref()
        .map(|raw| {
            ObjectStatus::from_label(raw)
                .ok_or_else(|| ApiError::Validation(format!("unknown status: {raw}")))
        })
        .transpose()?;
    let start_date = parse_timestamp("startDate", request.start_date.as_deref())?;
    let end_date = parse_timestamp("endDate", request.end_date.as_deref())?;
    let customers = request.customers.as_deref().map(parse_customers).transpose()?;
    let needle = request.query.as_deref().map(str::to_ascii_lowercase);
    let mut records = load_records(&state, ARCHIVE_PREFIX)?;
    records.retain(|record| {
        if let Some(status) = status
            && record.status != status
        {
            return false;
        }
        if let Some(created_by) = request.created_by.as_deref()
            && record.created_by.as_ref().map(|user| user.as_str()) != Some(created_by)
        {
            return false;
        }
        if let Some(customers) = &customers
            && !customers.iter().any(|code| record.customers.contains(code))
        {
            return false;
        }
        if let Some(start) = start_date
            && record.created_at.is_none_or(|created| created < start)
        {
            return false;
        }
        if let Some(end) = end_date
            && record.created_at.is_none_or(|created| created > end)
        {
            return false;
        }
        if let Some(needle) = &needle {
            let haystack = format!(
                "{} {} {} {}",
                record.title,
                record.description.as_deref().unwrap_or_default(),
                record.summary.as_deref().unwrap_or_default(),
                record.content.as_deref().unwrap_or_default(),
            )
            .to_ascii_lowercase();
            if !haystack.contains(needle.as_str()) {
                return false;
            }
        }
        true
    });
    let count = records.len();
    Ok(Json(ListResponse {
        items: records,
        count,
    })
    .into_response())
}

/// GET /changes/statistics: caller-scoped counts by status.
async fn handle_statistics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers, "statistics")?;
    let mut records = load_records(&state, ARCHIVE_PREFIX)?;
    records.extend(load_records(&state, DRAFTS_PREFIX)?);
    records.retain(|record| record.created_by.as_ref() == Some(&identity.email));
    let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
    for status in ObjectStatus::ALL {
        by_status.insert(status.as_str(), 0);
    }
    for record in &records {
        if let Some(count) = by_status.get_mut(record.status.as_str()) {
            *count += 1;
        }
    }
    Ok(Json(json!({
        "byStatus": by_status,
        "total": records.len(),
        "userEmail": identity.email.as_str(),
    }))
    .into_response())
}

/// GET /changes/recent: newest-first by modification instant.
async fn handle_recent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListingQuery>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers, "recent")?;
    let mut records = load_records(&state, ARCHIVE_PREFIX)?;
    records.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
    records.truncate(clamp_limit(query.limit, DEFAULT_RECENT_LIMIT));
    let count = records.len();
    Ok(Json(ListResponse {
        items: records,
        count,
    })
    .into_response())
}

// ============================================================================
// SECTION: Webhook
// ============================================================================

/// POST /webhooks/survey: HMAC-verified response ingest.
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    match state.webhook.ingest(&body, signature, UtcTimestamp::now()) {
        Ok(stored) => Ok(Json(json!({ "stored": stored })).into_response()),
        Err(WebhookError::InvalidSignature) => {
            Err(ApiError::Auth(AuthError::Unauthenticated("invalid signature".to_string())))
        }
        Err(WebhookError::Malformed(message)) => Err(ApiError::Validation(message)),
        Err(WebhookError::Store(message)) => Err(crate::reactor::upstream("store", message)),
    }
}
