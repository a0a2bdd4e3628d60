// crates/changedesk-notify/src/templates.rs
// ============================================================================
// Module: Email Templates
// Description: Themed HTML and plain-text rendering for record emails.
// Purpose: Produce every outbound message body from one pure renderer.
// Dependencies: changedesk-core
// ============================================================================

//! ## Overview
//! Templates are indexed by `object_type`: changes render in neutral gray and
//! each announcement subtype carries its own color and emoji. Every rendering
//! produces both an HTML and a plain-text variant with the same sections:
//! header band, title, summary paragraph, content block, optional meeting
//! block, optional attachments list, footer. Rendering is pure; nothing here
//! performs I/O.

// ============================================================================
// SECTION: Imports
// ============================================================================

use changedesk_core::AnnouncementSubtype;
use changedesk_core::ObjectRecord;
use changedesk_core::ObjectType;

// ============================================================================
// SECTION: Themes
// ============================================================================

/// Visual theme applied to a rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// Header band color (CSS hex).
    pub color: &'static str,
    /// Header emoji.
    pub emoji: &'static str,
    /// Kind label shown in the header band.
    pub label: &'static str,
}

/// Neutral-gray change theme.
const CHANGE_THEME: Theme = Theme {
    color: "#6b7280",
    emoji: "\u{1f6e0}",
    label: "Change",
};

/// Blue CIC announcement theme.
const CIC_THEME: Theme = Theme {
    color: "#2563eb",
    emoji: "\u{1f4e2}",
    label: "CIC Announcement",
};

/// Green FinOps announcement theme.
const FINOPS_THEME: Theme = Theme {
    color: "#16a34a",
    emoji: "\u{1f4b0}",
    label: "FinOps Announcement",
};

/// Purple InnerSource announcement theme.
const INNERSOURCE_THEME: Theme = Theme {
    color: "#7c3aed",
    emoji: "\u{1f504}",
    label: "InnerSource Announcement",
};

/// Light-blue general announcement theme.
const GENERAL_THEME: Theme = Theme {
    color: "#0ea5e9",
    emoji: "\u{2139}",
    label: "Announcement",
};

/// Returns the theme for an object type.
///
/// Unknown announcement subtypes cannot be represented by [`ObjectType`], so
/// the general theme doubles as the fallback for the general subtype.
#[must_use]
pub const fn theme_for(object_type: ObjectType) -> Theme {
    match object_type {
        ObjectType::Change => CHANGE_THEME,
        ObjectType::Announcement(AnnouncementSubtype::Cic) => CIC_THEME,
        ObjectType::Announcement(AnnouncementSubtype::Finops) => FINOPS_THEME,
        ObjectType::Announcement(AnnouncementSubtype::Innersource) => INNERSOURCE_THEME,
        ObjectType::Announcement(AnnouncementSubtype::General) => GENERAL_THEME,
    }
}

// ============================================================================
// SECTION: Email Kinds
// ============================================================================

/// Which lifecycle email is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    /// Approval requested after submission.
    ApprovalRequest,
    /// Record approved; recipients informed.
    Approved,
    /// Record cancelled.
    Cancelled,
    /// Record completed.
    Completed,
}

impl EmailKind {
    /// Returns the subject prefix for this kind.
    const fn subject_prefix(self) -> &'static str {
        match self {
            Self::ApprovalRequest => "Approval required",
            Self::Approved => "Scheduled",
            Self::Cancelled => "Cancelled",
            Self::Completed => "Completed",
        }
    }

    /// Returns the lead-in sentence for this kind.
    const fn lead_in(self) -> &'static str {
        match self {
            Self::ApprovalRequest => "The following item is awaiting approval.",
            Self::Approved => "The following item has been approved and scheduled.",
            Self::Cancelled => "The following item has been cancelled.",
            Self::Completed => "The following item has been completed.",
        }
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// One rendered message: subject plus both body variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text body.
    pub text: String,
}

/// Renders the email for a record and lifecycle kind.
#[must_use]
pub fn render(record: &ObjectRecord, kind: EmailKind) -> RenderedMessage {
    let theme = theme_for(record.object_type);
    let subject = format!("{} {}: {}", theme.label, kind.subject_prefix(), record.title);
    let summary = record
        .summary
        .as_deref()
        .or(record.description.as_deref())
        .unwrap_or_default();
    let content = record.content.as_deref().unwrap_or_default();
    RenderedMessage {
        subject,
        html: render_html(record, kind, theme, summary, content),
        text: render_text(record, kind, theme, summary, content),
    }
}

/// Renders the HTML body.
fn render_html(
    record: &ObjectRecord,
    kind: EmailKind,
    theme: Theme,
    summary: &str,
    content: &str,
) -> String {
    let mut html = String::with_capacity(2048);
    html.push_str("<html><body style=\"font-family:Segoe UI,Arial,sans-serif;margin:0;\">\n");
    html.push_str(&format!(
        "<div style=\"background:{};color:#ffffff;padding:16px 24px;\"><h1 \
         style=\"margin:0;font-size:20px;\">{} {}</h1></div>\n",
        theme.color,
        theme.emoji,
        escape_html(theme.label),
    ));
    html.push_str("<div style=\"padding:24px;\">\n");
    html.push_str(&format!("<h2 style=\"margin-top:0;\">{}</h2>\n", escape_html(&record.title)));
    html.push_str(&format!("<p>{}</p>\n", escape_html(kind.lead_in())));
    if !summary.is_empty() {
        html.push_str(&format!("<p>{}</p>\n", escape_html(summary)));
    }
    if !content.is_empty() {
        html.push_str(&format!(
            "<div style=\"border-left:4px solid {};padding-left:12px;\">{}</div>\n",
            theme.color,
            escape_html(content),
        ));
    }
    if let (Some(start), Some(end)) = (record.implementation_start, record.implementation_end) {
        html.push_str(&format!(
            "<p><strong>Window:</strong> {start} &ndash; {end}</p>\n"
        ));
    }
    if let Some(meeting) = &record.meeting_metadata {
        html.push_str(&format!(
            "<div style=\"background:#f3f4f6;padding:12px;border-radius:6px;\">\
             <p style=\"margin:0;\"><strong>Meeting:</strong> {}</p>\
             <p style=\"margin:0;\">{} &ndash; {}</p>\
             <p style=\"margin:0;\"><a href=\"{}\">Join the meeting</a></p></div>\n",
            escape_html(&meeting.subject),
            meeting.start_time,
            meeting.end_time,
            escape_html(&meeting.join_url),
        ));
    }
    if !record.attachments.is_empty() {
        html.push_str("<p><strong>Attachments</strong></p>\n<ul>\n");
        for attachment in &record.attachments {
            html.push_str(&format!(
                "<li>{} ({})</li>\n",
                escape_html(&attachment.name),
                format_size(attachment.size),
            ));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</div>\n");
    html.push_str(
        "<div style=\"padding:12px 24px;color:#6b7280;font-size:12px;\">Sent by the cloud \
         center of excellence change desk. Replies to this mailbox are not monitored.</div>\n",
    );
    html.push_str("</body></html>\n");
    html
}

/// Renders the plain-text body.
fn render_text(
    record: &ObjectRecord,
    kind: EmailKind,
    theme: Theme,
    summary: &str,
    content: &str,
) -> String {
    let mut text = String::with_capacity(1024);
    text.push_str(&format!("{} | {}\n", theme.label, record.title));
    text.push_str(&format!("{}\n\n", kind.lead_in()));
    if !summary.is_empty() {
        text.push_str(summary);
        text.push_str("\n\n");
    }
    if !content.is_empty() {
        text.push_str(content);
        text.push_str("\n\n");
    }
    if let (Some(start), Some(end)) = (record.implementation_start, record.implementation_end) {
        text.push_str(&format!("Window: {start} - {end}\n"));
    }
    if let Some(meeting) = &record.meeting_metadata {
        text.push_str(&format!(
            "Meeting: {} ({} - {})\nJoin: {}\n",
            meeting.subject, meeting.start_time, meeting.end_time, meeting.join_url
        ));
    }
    if !record.attachments.is_empty() {
        text.push_str("Attachments:\n");
        for attachment in &record.attachments {
            text.push_str(&format!(
                "- {} ({})\n",
                attachment.name,
                format_size(attachment.size)
            ));
        }
    }
    text.push_str("\nSent by the cloud center of excellence change desk.\n");
    text
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Escapes HTML-significant characters.
fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Formats a byte count for human readers.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests;
