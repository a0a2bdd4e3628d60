// crates/changedesk-survey/src/lib.rs
// ============================================================================
// Module: Changedesk Survey Library
// Description: Post-event survey provisioning and webhook result ingest.
// Purpose: Mint branded feedback forms on completion and persist responses.
// Dependencies: crate::{client, provision, webhook}
// ============================================================================

//! ## Overview
//! When a record reaches its terminal completed state the provisioner builds
//! one typed survey form: customer logo (validated and uploaded), an
//! idempotently reused branded theme, hidden routing fields, and the
//! subtype question set. Webhook responses are HMAC-verified with a
//! constant-time compare and persisted under the survey results prefix.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod provision;
pub mod webhook;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::CreatedForm;
pub use client::RecordingSurveyService;
pub use client::SurveyError;
pub use client::SurveyFormSpec;
pub use client::SurveyHiddenFields;
pub use client::SurveyQuestion;
pub use client::SurveyQuestionKind;
pub use client::SurveyService;
pub use client::SurveyTheme;
pub use client::TypeformClient;
pub use client::UploadedImage;
pub use client::question_set;
pub use client::workspace_for;
pub use provision::SurveyOutcome;
pub use provision::SurveyProvisioner;
pub use webhook::WebhookError;
pub use webhook::WebhookIngest;
pub use webhook::verify_signature;
