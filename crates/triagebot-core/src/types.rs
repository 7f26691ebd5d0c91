use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of inbound message kinds (§3). Per-kind fields that the
/// original dynamic payload carried conditionally (image dimensions,
/// document filename, …) live on the matching [`MediaDescriptor`] instead of
/// as optional top-level fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Contact,
    Unknown,
}

impl MessageKind {
    /// Local download folder for this kind, relative to the media root (§4.1 step 2).
    pub fn media_folder(&self) -> Option<&'static str> {
        match self {
            MessageKind::Image => Some("images"),
            MessageKind::Video => Some("videos"),
            MessageKind::Audio => Some("audio"),
            MessageKind::Document => Some("documents"),
            MessageKind::Sticker => Some("stickers"),
            _ => None,
        }
    }
}

/// Descriptor for a downloaded or referenced media attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub kind: MessageKind,
    pub mime: String,
    pub size_bytes: u64,
    /// Populated once the best-effort download completes; `None` if it failed.
    pub local_path: Option<String>,
}

/// A quoted-message reference carried by a reply (§3 context, §4.2 tier 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotedMessage {
    pub id: String,
    pub text: String,
    pub author: String,
}

/// Delivery priority, carried end-to-end (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
}

/// Normalized form of a received chat message (§3). Constructed once by the
/// transport gateway and never mutated after it is published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub sender_id: String,
    pub conversation_id: String,
    /// `true` when `conversation_id` denotes a group chat rather than a 1:1 chat.
    pub is_group: bool,
    pub timestamp: DateTime<Utc>,
    pub transport: String,
    pub text: String,
    pub kind: MessageKind,
    pub media: Option<MediaDescriptor>,
    pub caption: Option<String>,
    pub quoted: Option<QuotedMessage>,
    pub mentions: Vec<String>,
    pub forwarded: bool,
    pub priority: Priority,
}

impl InboundMessage {
    /// `(sender, text, kind)` fingerprint used by the duplicate filter (§4.1).
    pub fn dedup_fingerprint(&self) -> (String, String, MessageKind) {
        (self.sender_id.clone(), self.text.clone(), self.kind)
    }
}

/// Inline template reference carried by an [`OutboundCommand`] (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRef {
    pub name: String,
    pub variables: std::collections::HashMap<String, String>,
    /// Set once substitution has run, so re-processing is idempotent (§8).
    #[serde(default)]
    pub applied: bool,
}

/// Body of an [`OutboundCommand`] — exactly one of `text` / `media` is set (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutboundBody {
    Text(String),
    Media(MediaDescriptor),
}

/// A single recorded delivery attempt (§3 retry history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// A send request, produced by any service and consumed by the transport
/// gateway's outbound pipeline (§3, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundCommand {
    pub id: String,
    pub destination: String,
    pub body: OutboundBody,
    pub mentions: Vec<String>,
    pub quoted_message_id: Option<String>,
    pub priority: Priority,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub template: Option<TemplateRef>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub retry_history: Vec<RetryAttempt>,
}

impl OutboundCommand {
    /// Body length in UTF-16 code units, the unit the 4096 cap is defined in (§3).
    pub fn body_len_code_units(&self) -> usize {
        match &self.body {
            OutboundBody::Text(t) => t.encode_utf16().count(),
            OutboundBody::Media(_) => 0,
        }
    }
}

/// Closed domain set of incident categories the classifier may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Pos,
    Network,
    Inventory,
    Hardware,
    Software,
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Pos => "POS",
            Category::Network => "NETWORK",
            Category::Inventory => "INVENTORY",
            Category::Hardware => "HARDWARE",
            Category::Software => "SOFTWARE",
            Category::Other => "OTHER",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Low => "low",
        };
        f.write_str(s)
    }
}

/// Label assigned to a pair of per-model verdicts (§4.2, glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusKind {
    BothYes,
    BothNo,
    Disagree,
    PartialError,
    BothError,
}

/// Output of the dual-LLM consensus step (§3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub is_incident: bool,
    pub category: Option<Category>,
    pub urgency: Option<Urgency>,
    pub confidence: f64,
    pub consensus_kind: ConsensusKind,
    pub rationale_primary: Option<String>,
    pub rationale_secondary: Option<String>,
    pub needs_human_review: bool,
}

/// In-store representation of an active incident thread (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub ticket_id: String,
    pub original_message_id: String,
    pub conversation_id: String,
    pub reporter: String,
    pub created_at: DateTime<Utc>,
    pub category: Category,
    pub urgency: Urgency,
    pub first_message_text: String,
    pub message_ids: Vec<String>,
    pub last_update: DateTime<Utc>,
}

impl IncidentRecord {
    /// Store key for this record (§3, §6).
    pub fn store_key(conversation_id: &str, ticket_id: &str) -> String {
        format!("incident:active:{conversation_id}:{ticket_id}")
    }

    /// Prefix used for the tier-2 temporal scan (§4.2).
    pub fn store_key_prefix(conversation_id: &str) -> String {
        format!("incident:active:{conversation_id}:")
    }

    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_update).num_seconds().max(0)
    }
}

/// Reporter contact used for helpdesk contact resolution (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reporter {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Reporter {
    /// Resolve an email for helpdesk contact lookup, synthesizing one from
    /// phone digits when no real email is known (§4.3 step 1).
    pub fn resolution_email(&self) -> Option<String> {
        if let Some(email) = &self.email {
            return Some(email.clone());
        }
        self.phone.as_ref().map(|phone| {
            let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
            format!("{digits}@whatsapp.local")
        })
    }
}

/// A pending ticket-creation job, persisted in the fallback queue on failure (§3, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSpec {
    /// Internal ticket id minted when the originating [`IncidentRecord`] was
    /// created, carried through so a late (or retried) `ticket.created`
    /// publish still correlates to the thread the reporter sees.
    pub ticket_id: String,
    pub subject: String,
    pub description: String,
    pub urgency: Urgency,
    pub category: Category,
    pub reporter: Reporter,
    pub source_message_id: String,
    pub source_conversation_id: String,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Persisted OAuth2 authentication state for the helpdesk (§3, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub organization_id: String,
}

impl OAuthState {
    /// Safety margin before expiry at which a refresh is forced (§3, §4.3).
    pub const REFRESH_MARGIN_SECS: i64 = 300;

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        (self.access_token_expires_at - now).num_seconds() <= Self::REFRESH_MARGIN_SECS
    }
}
