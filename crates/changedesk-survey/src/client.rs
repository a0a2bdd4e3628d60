// crates/changedesk-survey/src/client.rs
// ============================================================================
// Module: Survey Service Client
// Description: External survey-service capability surface and HTTP client.
// Purpose: Upload images, upsert themes, and create typed feedback forms.
// Dependencies: changedesk-core, reqwest, base64
// ============================================================================

//! ## Overview
//! [`SurveyService`] is the seam to the external form service. The HTTP
//! implementation targets the Typeform-style API (image upload by base64,
//! named themes, forms with hidden fields); the recording implementation
//! backs tests and dry-run deployments. Theme creation is idempotent by
//! name: callers look up before creating.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use changedesk_core::AnnouncementSubtype;
use changedesk_core::ObjectType;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Timeout applied to every survey-service call.
const SURVEY_CALL_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Survey service errors.
#[derive(Debug, Error)]
pub enum SurveyError {
    /// Client configuration or input is invalid.
    #[error("survey invalid: {0}")]
    Invalid(String),
    /// The survey service rejected or failed the call.
    #[error("survey service error: {0}")]
    Service(String),
    /// Store access failed while persisting survey artifacts.
    #[error("survey store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Uploaded image handle returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedImage {
    /// Image identifier.
    pub image_id: String,
    /// Image source URL.
    pub image_src: String,
}

/// Named branded theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyTheme {
    /// Theme name (idempotency key).
    pub name: String,
    /// Primary color (CSS hex) matching the email theme.
    pub color: String,
    /// Optional uploaded logo source URL.
    pub logo_src: Option<String>,
}

/// Hidden routing fields embedded in every form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyHiddenFields {
    /// Login of the user who completed the record.
    pub user_login: String,
    /// Customer code the form is keyed on.
    pub customer_code: String,
    /// Event calendar year.
    pub year: i32,
    /// Event calendar quarter (1-4).
    pub quarter: u8,
    /// Coarse event type (`change` or `announcement`).
    pub event_type: String,
    /// Announcement subtype, when applicable.
    pub event_subtype: Option<String>,
    /// Record identifier.
    pub object_id: String,
}

/// Question kinds supported by the subtype templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyQuestionKind {
    /// Yes/no excellence question.
    YesNo,
    /// 0-10 net-promoter-score question.
    Nps,
    /// Free-text improvement question.
    FreeText,
}

/// One survey question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    /// Question prompt.
    pub prompt: String,
    /// Question kind.
    pub kind: SurveyQuestionKind,
}

/// Full form specification sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyFormSpec {
    /// Form title.
    pub title: String,
    /// Target workspace.
    pub workspace: String,
    /// Theme identifier applied to the form.
    pub theme_id: String,
    /// Hidden routing fields.
    pub hidden: SurveyHiddenFields,
    /// Question list.
    pub questions: Vec<SurveyQuestion>,
}

/// Created form handle returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedForm {
    /// Form identifier.
    pub form_id: String,
    /// Public form URL.
    pub url: String,
}

// ============================================================================
// SECTION: Subtype Tables
// ============================================================================

/// Returns the survey workspace for a record kind.
#[must_use]
pub const fn workspace_for(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Change => "changes",
        ObjectType::Announcement(AnnouncementSubtype::Cic) => "cic",
        ObjectType::Announcement(AnnouncementSubtype::Finops) => "finops",
        ObjectType::Announcement(AnnouncementSubtype::Innersource) => "innersource",
        ObjectType::Announcement(AnnouncementSubtype::General) => "general",
    }
}

/// Returns the subtype question template.
///
/// Every kind carries the same three shapes (yes/no excellence, 0-10 NPS,
/// free-text improvement) with kind-specific wording.
#[must_use]
pub fn question_set(object_type: ObjectType) -> Vec<SurveyQuestion> {
    let label = match object_type {
        ObjectType::Change => "change",
        ObjectType::Announcement(subtype) => subtype.as_str(),
    };
    vec![
        SurveyQuestion {
            prompt: format!("Was this {label} event executed excellently?"),
            kind: SurveyQuestionKind::YesNo,
        },
        SurveyQuestion {
            prompt: "How likely are you to recommend working with the cloud center of \
                     excellence? (0-10)"
                .to_string(),
            kind: SurveyQuestionKind::Nps,
        },
        SurveyQuestion {
            prompt: format!("What should we improve about future {label} events?"),
            kind: SurveyQuestionKind::FreeText,
        },
    ]
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// External survey-service capability.
pub trait SurveyService: Send + Sync {
    /// Uploads a base64-encoded image and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`SurveyError`] when the service call fails.
    fn upload_image(&self, file_name: &str, base64_content: &str)
    -> Result<UploadedImage, SurveyError>;

    /// Looks up a theme by name.
    ///
    /// # Errors
    ///
    /// Returns [`SurveyError`] when the service call fails.
    fn find_theme(&self, name: &str) -> Result<Option<String>, SurveyError>;

    /// Creates a theme and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SurveyError`] when the service call fails.
    fn create_theme(&self, theme: &SurveyTheme) -> Result<String, SurveyError>;

    /// Creates a form and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`SurveyError`] when the service call fails.
    fn create_form(&self, spec: &SurveyFormSpec) -> Result<CreatedForm, SurveyError>;
}

// ============================================================================
// SECTION: HTTP Client
// ============================================================================

/// Typeform-style HTTP survey client.
pub struct TypeformClient {
    /// Blocking HTTP client with timeouts applied.
    client: reqwest::blocking::Client,
    /// Service base URL.
    base_url: String,
    /// API token.
    token: String,
}

impl TypeformClient {
    /// Creates a new survey client.
    ///
    /// # Errors
    ///
    /// Returns [`SurveyError::Invalid`] when the base URL or token is unset.
    pub fn new(base_url: &str, token: &str) -> Result<Self, SurveyError> {
        if base_url.trim().is_empty() {
            return Err(SurveyError::Invalid("base url must be set".to_string()));
        }
        if token.trim().is_empty() {
            return Err(SurveyError::Invalid("api token must be set".to_string()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(SURVEY_CALL_TIMEOUT)
            .build()
            .map_err(|err| SurveyError::Invalid(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Sends a POST with JSON and decodes the response.
    fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, SurveyError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|err| SurveyError::Service(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SurveyError::Service(format!(
                "{path} returned status {}",
                response.status()
            )));
        }
        response.json().map_err(|err| SurveyError::Service(err.to_string()))
    }
}

impl SurveyService for TypeformClient {
    fn upload_image(
        &self,
        file_name: &str,
        base64_content: &str,
    ) -> Result<UploadedImage, SurveyError> {
        #[derive(Deserialize)]
        struct ImageResponse {
            /// Image identifier.
            id: String,
            /// Image source URL.
            src: String,
        }
        let body = json!({ "file_name": file_name, "image": base64_content });
        let image: ImageResponse = self.post_json("/images", &body)?;
        Ok(UploadedImage {
            image_id: image.id,
            image_src: image.src,
        })
    }

    fn find_theme(&self, name: &str) -> Result<Option<String>, SurveyError> {
        #[derive(Deserialize)]
        struct ThemePage {
            /// Theme entries on this page.
            items: Vec<ThemeEntry>,
        }
        #[derive(Deserialize)]
        struct ThemeEntry {
            /// Theme identifier.
            id: String,
            /// Theme name.
            name: String,
        }
        let response = self
            .client
            .get(format!("{}/themes", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("page_size", "200")])
            .send()
            .map_err(|err| SurveyError::Service(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SurveyError::Service(format!(
                "/themes returned status {}",
                response.status()
            )));
        }
        let page: ThemePage =
            response.json().map_err(|err| SurveyError::Service(err.to_string()))?;
        Ok(page.items.into_iter().find(|entry| entry.name == name).map(|entry| entry.id))
    }

    fn create_theme(&self, theme: &SurveyTheme) -> Result<String, SurveyError> {
        #[derive(Deserialize)]
        struct ThemeResponse {
            /// Theme identifier.
            id: String,
        }
        let mut body = json!({
            "name": theme.name,
            "colors": {
                "button": theme.color,
                "question": "#1f2937",
                "answer": theme.color,
                "background": "#ffffff",
            },
        });
        if let (Some(logo_src), Value::Object(fields)) = (&theme.logo_src, &mut body) {
            fields.insert("background".to_string(), json!({ "href": logo_src }));
        }
        let created: ThemeResponse = self.post_json("/themes", &body)?;
        Ok(created.id)
    }

    fn create_form(&self, spec: &SurveyFormSpec) -> Result<CreatedForm, SurveyError> {
        #[derive(Deserialize)]
        struct FormResponse {
            /// Form identifier.
            id: String,
            /// Display links.
            #[serde(rename = "_links")]
            links: FormLinks,
        }
        #[derive(Deserialize)]
        struct FormLinks {
            /// Public display URL.
            display: String,
        }
        let fields: Vec<Value> = spec
            .questions
            .iter()
            .map(|question| match question.kind {
                SurveyQuestionKind::YesNo => json!({
                    "title": question.prompt,
                    "type": "yes_no",
                }),
                SurveyQuestionKind::Nps => json!({
                    "title": question.prompt,
                    "type": "opinion_scale",
                    "properties": { "steps": 11, "start_at_one": false },
                }),
                SurveyQuestionKind::FreeText => json!({
                    "title": question.prompt,
                    "type": "long_text",
                }),
            })
            .collect();
        let hidden = [
            ("user_login", spec.hidden.user_login.clone()),
            ("customer_code", spec.hidden.customer_code.clone()),
            ("year", spec.hidden.year.to_string()),
            ("quarter", spec.hidden.quarter.to_string()),
            ("event_type", spec.hidden.event_type.clone()),
            ("event_subtype", spec.hidden.event_subtype.clone().unwrap_or_default()),
            ("object_id", spec.hidden.object_id.clone()),
        ];
        let hidden_names: Vec<&str> = hidden.iter().map(|(name, _)| *name).collect();
        let body = json!({
            "title": spec.title,
            "workspace": { "href": spec.workspace },
            "theme": { "href": spec.theme_id },
            "hidden": hidden_names,
            "fields": fields,
        });
        let created: FormResponse = self.post_json("/forms", &body)?;
        // Hidden values ride the share URL fragment; the form itself only
        // declares the field names.
        let prefill: Vec<String> =
            hidden.iter().map(|(name, value)| format!("{name}={value}")).collect();
        let url = format!("{}#{}", created.links.display, prefill.join("&"));
        Ok(CreatedForm {
            form_id: created.id,
            url,
        })
    }
}

// ============================================================================
// SECTION: Recording Service
// ============================================================================

/// Survey service that records calls for tests and dry-run deployments.
#[derive(Default)]
pub struct RecordingSurveyService {
    /// Uploaded images by file name.
    images: Mutex<Vec<String>>,
    /// Themes by name.
    themes: Mutex<BTreeMap<String, String>>,
    /// Created form specifications.
    forms: Mutex<Vec<SurveyFormSpec>>,
}

impl RecordingSurveyService {
    /// Creates an empty recording service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of uploaded images.
    #[must_use]
    pub fn uploaded_images(&self) -> Vec<String> {
        self.images.lock().map(|images| images.clone()).unwrap_or_default()
    }

    /// Returns the created theme names.
    #[must_use]
    pub fn theme_names(&self) -> Vec<String> {
        self.themes.lock().map(|themes| themes.keys().cloned().collect()).unwrap_or_default()
    }

    /// Returns the created form specifications.
    #[must_use]
    pub fn forms(&self) -> Vec<SurveyFormSpec> {
        self.forms.lock().map(|forms| forms.clone()).unwrap_or_default()
    }
}

impl SurveyService for RecordingSurveyService {
    fn upload_image(
        &self,
        file_name: &str,
        _base64_content: &str,
    ) -> Result<UploadedImage, SurveyError> {
        let mut images = self
            .images
            .lock()
            .map_err(|_| SurveyError::Service("recording lock poisoned".to_string()))?;
        images.push(file_name.to_string());
        let image_id = format!("img-{}", images.len());
        Ok(UploadedImage {
            image_src: format!("https://images.example.com/{image_id}"),
            image_id,
        })
    }

    fn find_theme(&self, name: &str) -> Result<Option<String>, SurveyError> {
        Ok(self
            .themes
            .lock()
            .map_err(|_| SurveyError::Service("recording lock poisoned".to_string()))?
            .get(name)
            .cloned())
    }

    fn create_theme(&self, theme: &SurveyTheme) -> Result<String, SurveyError> {
        let mut themes = self
            .themes
            .lock()
            .map_err(|_| SurveyError::Service("recording lock poisoned".to_string()))?;
        let theme_id = format!("theme-{}", themes.len() + 1);
        themes.insert(theme.name.clone(), theme_id.clone());
        Ok(theme_id)
    }

    fn create_form(&self, spec: &SurveyFormSpec) -> Result<CreatedForm, SurveyError> {
        let mut forms = self
            .forms
            .lock()
            .map_err(|_| SurveyError::Service("recording lock poisoned".to_string()))?;
        forms.push(spec.clone());
        let form_id = format!("form-{}", forms.len());
        Ok(CreatedForm {
            url: format!("https://surveys.example.com/to/{form_id}"),
            form_id,
        })
    }
}

#[cfg(test)]
mod tests;
