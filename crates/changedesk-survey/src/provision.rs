// crates/changedesk-survey/src/provision.rs
// ============================================================================
// Module: Survey Provisioner
// Description: Completed-transition survey minting with branded themes.
// Purpose: Create one feedback form per customer and stamp it on the record.
// Dependencies: crate::client, changedesk-notify, changedesk-store
// ============================================================================

//! ## Overview
//! Provisioning runs only on the completed transition and only when the
//! record carries no `survey_id` yet. The flow: fetch and validate the
//! customer logo (default fallback), upload it, reuse or create the named
//! theme for the record kind, create the form with hidden routing fields and
//! the subtype question set, persist the form snapshot under
//! `surveys/forms/`, and stamp the survey handle onto the archive object's
//! metadata with a copy-to-self replace. Theme identifiers are cached per
//! process so repeat completions skip the service lookup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use changedesk_core::CustomerCode;
use changedesk_core::ObjectRecord;
use changedesk_core::ObjectType;
use changedesk_core::UserEmail;
use changedesk_core::UtcTimestamp;
use changedesk_notify::theme_for;
use changedesk_store::ObjectGateway;
use changedesk_store::PutCondition;
use changedesk_store::StoreError;
use changedesk_store::archive_key;
use changedesk_store::survey_form_key;
use serde_json::json;

use crate::client::CreatedForm;
use crate::client::SurveyError;
use crate::client::SurveyFormSpec;
use crate::client::SurveyHiddenFields;
use crate::client::SurveyService;
use crate::client::SurveyTheme;
use crate::client::question_set;
use crate::client::workspace_for;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Metadata key carrying the stamped survey identifier.
pub const META_SURVEY_ID: &str = "survey-id";
/// Metadata key carrying the stamped survey URL.
pub const META_SURVEY_URL: &str = "survey-url";
/// Metadata key carrying the stamped survey creation instant.
pub const META_SURVEY_CREATED_AT: &str = "survey-created-at";

/// Store key of the default logo used when a customer has none.
const DEFAULT_LOGO_KEY: &str = "branding/default-logo.png";
/// Logo extensions probed under the customer prefix, in order.
const LOGO_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

// ============================================================================
// SECTION: Logo Sniffing
// ============================================================================

/// Returns the image MIME type when the bytes carry a known magic number.
fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    None
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Handle of one provisioned survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyOutcome {
    /// Form identifier.
    pub survey_id: String,
    /// Public form URL.
    pub survey_url: String,
    /// Creation instant.
    pub created_at: UtcTimestamp,
}

// ============================================================================
// SECTION: Provisioner
// ============================================================================

/// Completed-transition survey provisioner.
pub struct SurveyProvisioner {
    /// External survey service.
    service: Arc<dyn SurveyService>,
    /// Store gateway for logos, snapshots, and metadata stamps.
    gateway: ObjectGateway,
    /// Process-local theme cache: theme name to service identifier.
    theme_cache: Mutex<BTreeMap<String, String>>,
}

impl SurveyProvisioner {
    /// Creates a provisioner over a service and store gateway.
    #[must_use]
    pub fn new(service: Arc<dyn SurveyService>, gateway: ObjectGateway) -> Self {
        Self {
            service,
            gateway,
            theme_cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Provisions the survey for one customer of a completed record.
    ///
    /// Logo upload and theme branding are best effort: a missing or invalid
    /// logo falls back to the unbranded theme rather than failing the form.
    ///
    /// # Errors
    ///
    /// Returns [`SurveyError`] when form creation or snapshot persistence
    /// fails.
    pub fn provision(
        &self,
        record: &ObjectRecord,
        customer: &CustomerCode,
        user_login: &UserEmail,
        now: UtcTimestamp,
    ) -> Result<SurveyOutcome, SurveyError> {
        let logo_src = self.upload_logo(customer);
        let theme_id = self.resolve_theme(record.object_type, logo_src)?;
        let (event_type, event_subtype) = match record.object_type {
            ObjectType::Change => ("change".to_string(), None),
            ObjectType::Announcement(subtype) => {
                ("announcement".to_string(), Some(subtype.as_str().to_string()))
            }
        };
        let spec = SurveyFormSpec {
            title: format!("Feedback: {}", record.title),
            workspace: workspace_for(record.object_type).to_string(),
            theme_id,
            hidden: SurveyHiddenFields {
                user_login: user_login.to_string(),
                customer_code: customer.to_string(),
                year: now.year(),
                quarter: now.quarter(),
                event_type,
                event_subtype,
                object_id: record.id_str().to_string(),
            },
            questions: question_set(record.object_type),
        };
        let created = self.service.create_form(&spec)?;
        self.persist_snapshot(record, customer, &spec, &created, now)?;
        self.stamp_archive_metadata(record, &created, now)?;
        Ok(SurveyOutcome {
            survey_id: created.form_id,
            survey_url: created.url,
            created_at: now,
        })
    }

    /// Fetches, validates, and uploads the customer logo.
    ///
    /// Returns `None` when no valid logo exists anywhere; provisioning
    /// continues unbranded.
    fn upload_logo(&self, customer: &CustomerCode) -> Option<String> {
        let mut candidates: Vec<String> = LOGO_EXTENSIONS
            .iter()
            .map(|extension| format!("customers/{}/logo.{extension}", customer.as_str()))
            .collect();
        candidates.push(DEFAULT_LOGO_KEY.to_string());
        for key in candidates {
            let Ok(stored) = self.gateway.store().get(&key) else {
                continue;
            };
            let Some(_mime) = sniff_image_mime(&stored.bytes) else {
                continue;
            };
            let encoded = BASE64.encode(&stored.bytes);
            let file_name = key.rsplit('/').next().unwrap_or("logo.png").to_string();
            match self.service.upload_image(&file_name, &encoded) {
                Ok(uploaded) => return Some(uploaded.image_src),
                Err(_) => continue,
            }
        }
        None
    }

    /// Returns the theme identifier for a record kind, creating it once.
    fn resolve_theme(
        &self,
        object_type: ObjectType,
        logo_src: Option<String>,
    ) -> Result<String, SurveyError> {
        let name = format!("changedesk-{}", workspace_for(object_type));
        if let Ok(cache) = self.theme_cache.lock()
            && let Some(theme_id) = cache.get(&name)
        {
            return Ok(theme_id.clone());
        }
        let theme_id = match self.service.find_theme(&name)? {
            Some(existing) => existing,
            None => self.service.create_theme(&SurveyTheme {
                name: name.clone(),
                color: theme_for(object_type).color.to_string(),
                logo_src,
            })?,
        };
        if let Ok(mut cache) = self.theme_cache.lock() {
            cache.insert(name, theme_id.clone());
        }
        Ok(theme_id)
    }

    /// Persists the form definition snapshot under the survey forms prefix.
    fn persist_snapshot(
        &self,
        record: &ObjectRecord,
        customer: &CustomerCode,
        spec: &SurveyFormSpec,
        created: &CreatedForm,
        now: UtcTimestamp,
    ) -> Result<(), SurveyError> {
        let key = survey_form_key(customer, record.id_str(), &now.to_key_form(), &created.form_id)
            .map_err(|err: StoreError| SurveyError::Store(err.to_string()))?;
        let snapshot = json!({
            "form_id": created.form_id,
            "url": created.url,
            "created_at": now,
            "spec": spec,
        });
        self.gateway
            .put_json(&key, &snapshot, &BTreeMap::new(), PutCondition::Overwrite)
            .map_err(|err| SurveyError::Store(err.to_string()))?;
        Ok(())
    }

    /// Stamps the survey handle onto the archive object metadata.
    fn stamp_archive_metadata(
        &self,
        record: &ObjectRecord,
        created: &CreatedForm,
        now: UtcTimestamp,
    ) -> Result<(), SurveyError> {
        let key = archive_key(record.id_str())
            .map_err(|err: StoreError| SurveyError::Store(err.to_string()))?;
        let stored =
            self.gateway.store().get(&key).map_err(|err| SurveyError::Store(err.to_string()))?;
        let mut metadata = stored.metadata;
        metadata.insert(META_SURVEY_ID.to_string(), created.form_id.clone());
        metadata.insert(META_SURVEY_URL.to_string(), created.url.clone());
        metadata.insert(META_SURVEY_CREATED_AT.to_string(), now.to_rfc3339());
        self.gateway
            .replace_metadata(&key, &metadata)
            .map_err(|err| SurveyError::Store(err.to_string()))?;
        Ok(())
    }
}
