// crates/changedesk-notify/src/mail.rs
// ============================================================================
// Module: Mail Transport
// Description: Contact-list resolution and transactional email delivery.
// Purpose: Send one list-addressed message per customer without failing peers.
// Dependencies: aws-sdk-sesv2, changedesk-core, tokio
// ============================================================================

//! ## Overview
//! Each customer resolves to a contact list: change records use the
//! per-customer `<code>-changes` list, announcements use one shared list per
//! subtype (`cic-announce`, `finops-announce`, ...). [`MailTransport`]
//! resolves the list and sends one bulk-addressed transactional message.
//! An empty contact list is a successful no-op, never an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_sesv2::Client;
use aws_sdk_sesv2::types::Body;
use aws_sdk_sesv2::types::Content;
use aws_sdk_sesv2::types::Destination;
use aws_sdk_sesv2::types::EmailContent;
use aws_sdk_sesv2::types::Message;
use changedesk_core::CustomerCode;
use changedesk_core::ObjectType;
use thiserror::Error;
use tokio::runtime::Runtime;

use crate::templates::RenderedMessage;

// ============================================================================
// SECTION: Contact Lists
// ============================================================================

/// Returns the contact list name for a record kind and customer.
#[must_use]
pub fn contact_list_for(object_type: ObjectType, customer: &CustomerCode) -> String {
    match object_type {
        ObjectType::Change => format!("{}-changes", customer.as_str()),
        ObjectType::Announcement(subtype) => format!("{}-announce", subtype.as_str()),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Mail delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    /// Transport configuration is invalid.
    #[error("mail invalid: {0}")]
    Invalid(String),
    /// The mail service rejected or failed the call.
    #[error("mail service error: {0}")]
    Service(String),
    /// Local I/O failure.
    #[error("mail io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// One outbound message addressed to a contact list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text body.
    pub text: String,
}

impl From<RenderedMessage> for EmailMessage {
    fn from(rendered: RenderedMessage) -> Self {
        Self {
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        }
    }
}

/// Result of one list send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailSendOutcome {
    /// Number of addresses the message was delivered to.
    pub recipients: usize,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Transactional mail transport addressed by contact list.
pub trait MailTransport: Send + Sync {
    /// Sends one message to every contact on the named list.
    ///
    /// An empty list returns `Ok` with zero recipients.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when resolution or delivery fails.
    fn send_to_list(
        &self,
        contact_list: &str,
        message: &EmailMessage,
    ) -> Result<MailSendOutcome, MailError>;
}

// ============================================================================
// SECTION: SES Transport
// ============================================================================

/// SES-backed mail transport.
#[derive(Debug)]
pub struct SesMailTransport {
    /// SES v2 client handle.
    client: Client,
    /// Verified sender address.
    sender: String,
    /// Tokio runtime for blocking SES calls.
    runtime: Option<Arc<Runtime>>,
}

impl Drop for SesMailTransport {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

impl SesMailTransport {
    /// Creates a new SES transport.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when the sender is unset or the runtime cannot
    /// be created.
    pub fn new(sender: &str, region: Option<&str>) -> Result<Self, MailError> {
        if sender.trim().is_empty() {
            return Err(MailError::Invalid("sender address must be set".to_string()));
        }
        let runtime = Runtime::new().map_err(|err| MailError::Io(err.to_string()))?;
        let region = region.map(str::to_string);
        let shared_config = block_on_mail(&runtime, async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(Region::new(region));
            }
            Ok(loader.load().await)
        })?;
        let client = Client::new(&shared_config);
        Ok(Self {
            client,
            sender: sender.to_string(),
            runtime: Some(Arc::new(runtime)),
        })
    }

    /// Returns the runtime or an error if shutdown.
    fn runtime(&self) -> Result<&Runtime, MailError> {
        self.runtime
            .as_ref()
            .map(AsRef::as_ref)
            .ok_or_else(|| MailError::Io("mail runtime closed".to_string()))
    }

    /// Resolves the addresses subscribed to a contact list.
    fn list_addresses(&self, contact_list: &str) -> Result<Vec<String>, MailError> {
        let client = self.client.clone();
        let contact_list = contact_list.to_string();
        block_on_mail(self.runtime()?, async move {
            let mut addresses = Vec::new();
            let mut next_token: Option<String> = None;
            loop {
                let mut request = client.list_contacts().contact_list_name(&contact_list);
                if let Some(token) = next_token.take() {
                    request = request.next_token(token);
                }
                let output = match request.send().await {
                    Ok(output) => output,
                    Err(err) => {
                        // A list that was never provisioned is an empty list.
                        let missing = err
                            .raw_response()
                            .is_some_and(|response| response.status().as_u16() == 404);
                        if missing {
                            return Ok(Vec::new());
                        }
                        return Err(MailError::Service(err.to_string()));
                    }
                };
                for contact in output.contacts() {
                    if let Some(address) = contact.email_address() {
                        addresses.push(address.to_string());
                    }
                }
                match output.next_token() {
                    Some(token) => next_token = Some(token.to_string()),
                    None => break,
                }
            }
            Ok(addresses)
        })
    }
}

impl MailTransport for SesMailTransport {
    fn send_to_list(
        &self,
        contact_list: &str,
        message: &EmailMessage,
    ) -> Result<MailSendOutcome, MailError> {
        let addresses = self.list_addresses(contact_list)?;
        if addresses.is_empty() {
            return Ok(MailSendOutcome {
                recipients: 0,
            });
        }
        let recipients = addresses.len();
        let client = self.client.clone();
        let sender = self.sender.clone();
        let subject = message.subject.clone();
        let html = message.html.clone();
        let text = message.text.clone();
        block_on_mail(self.runtime()?, async move {
            let destination = Destination::builder().set_bcc_addresses(Some(addresses)).build();
            let body = Body::builder()
                .html(content_utf8(&html)?)
                .text(content_utf8(&text)?)
                .build();
            let message = Message::builder()
                .subject(content_utf8(&subject)?)
                .body(body)
                .build();
            let content = EmailContent::builder().simple(message).build();
            client
                .send_email()
                .from_email_address(sender)
                .destination(destination)
                .content(content)
                .send()
                .await
                .map_err(|err| MailError::Service(err.to_string()))?;
            Ok(())
        })?;
        Ok(MailSendOutcome {
            recipients,
        })
    }
}

/// Builds a UTF-8 SES content block.
fn content_utf8(value: &str) -> Result<Content, MailError> {
    Content::builder()
        .data(value)
        .charset("UTF-8")
        .build()
        .map_err(|err| MailError::Invalid(err.to_string()))
}

/// Blocks on a mail future using the transport runtime.
fn block_on_mail<F, T>(runtime: &Runtime, future: F) -> Result<T, MailError>
where
    F: Future<Output = Result<T, MailError>> + Send + 'static,
    T: Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        if matches!(handle.runtime_flavor(), tokio::runtime::RuntimeFlavor::MultiThread) {
            return tokio::task::block_in_place(|| handle.block_on(future));
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || {
            let result = Runtime::new()
                .map_err(|err| MailError::Io(err.to_string()))
                .and_then(|runtime| runtime.block_on(future));
            let _ = tx.send(result);
        });
        return rx
            .recv()
            .unwrap_or_else(|_| Err(MailError::Io("mail thread join failed".to_string())));
    }

    runtime.block_on(future)
}

// ============================================================================
// SECTION: Recording Transport
// ============================================================================

/// Transport that records sends for tests and dry-run deployments.
#[derive(Default)]
pub struct RecordingMailTransport {
    /// Recorded (contact list, message) pairs.
    sent: Mutex<Vec<(String, EmailMessage)>>,
    /// Contact lists that should fail delivery.
    failing_lists: Mutex<Vec<String>>,
}

impl RecordingMailTransport {
    /// Creates an empty recording transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a contact list as failing.
    pub fn fail_list(&self, contact_list: &str) {
        if let Ok(mut failing) = self.failing_lists.lock() {
            failing.push(contact_list.to_string());
        }
    }

    /// Returns the recorded sends.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, EmailMessage)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl MailTransport for RecordingMailTransport {
    fn send_to_list(
        &self,
        contact_list: &str,
        message: &EmailMessage,
    ) -> Result<MailSendOutcome, MailError> {
        let failing = self
            .failing_lists
            .lock()
            .map(|lists| lists.iter().any(|list| list == contact_list))
            .unwrap_or(false);
        if failing {
            return Err(MailError::Service(format!("delivery to {contact_list} failed")));
        }
        self.sent
            .lock()
            .map_err(|_| MailError::Io("recording lock poisoned".to_string()))?
            .push((contact_list.to_string(), message.clone()));
        Ok(MailSendOutcome {
            recipients: 1,
        })
    }
}
