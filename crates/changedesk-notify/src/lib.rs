// crates/changedesk-notify/src/lib.rs
// ============================================================================
// Module: Changedesk Notify Library
// Description: Email templates, mail transport, and meeting scheduling.
// Purpose: Provide the outbound side-effect clients the reactor dispatches.
// Dependencies: crate::{mail, meetings, templates}
// ============================================================================

//! ## Overview
//! Notification rendering is pure: a record plus an email kind produces
//! subject, HTML, and plain-text bodies themed by `object_type`. Delivery and
//! meeting scheduling sit behind traits so the reactor can run against the
//! real transactional-mail and video-conference services in production and
//! recording fakes in tests.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod mail;
pub mod meetings;
pub mod templates;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use mail::EmailMessage;
pub use mail::MailError;
pub use mail::MailSendOutcome;
pub use mail::MailTransport;
pub use mail::RecordingMailTransport;
pub use mail::SesMailTransport;
pub use mail::contact_list_for;
pub use meetings::HttpMeetingClient;
pub use meetings::MeetingClient;
pub use meetings::MeetingError;
pub use meetings::MeetingRequest;
pub use meetings::RecordingMeetingClient;
pub use meetings::meeting_subject;
pub use meetings::meeting_window;
pub use templates::EmailKind;
pub use templates::RenderedMessage;
pub use templates::Theme;
pub use templates::render;
pub use templates::theme_for;
