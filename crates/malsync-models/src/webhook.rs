use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::media::MediaKind;
use crate::rating::to_mal_score;

/// Webhook event categories the pipeline cares about
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    Scrobble,
    Rate,
    /// Anything else (play, pause, library.new, ...), kept for logging
    Other(String),
}

impl WebhookEventType {
    /// Map Plex (`media.scrobble`) and Tautulli (`watched`, `scrobble`) event names
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "media.scrobble" | "scrobble" | "watched" => WebhookEventType::Scrobble,
            "media.rate" | "rate" | "rating" => WebhookEventType::Rate,
            other => WebhookEventType::Other(other.to_string()),
        }
    }
}

/// One provider id attached by the native Plex agent, e.g. `{"id": "tvdb://81797"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderGuid {
    pub id: String,
}

impl ProviderGuid {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Split into `(database prefix, value)` on the first `://`
    pub fn split(&self) -> Option<(&str, &str)> {
        self.id.split_once("://")
    }
}

/// Identifier as delivered by the media server, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawIdentifier {
    /// Agent-tagged GUID string (`com.plexapp.agents.hama://tvdb-81797/21/186?lang=en`)
    Agent(String),
    /// Provider list from the native Plex agent
    Providers(Vec<ProviderGuid>),
}

impl std::fmt::Display for RawIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawIdentifier::Agent(guid) => write!(f, "{}", guid),
            RawIdentifier::Providers(guids) => {
                let ids: Vec<&str> = guids.iter().map(|g| g.id.as_str()).collect();
                write!(f, "[{}]", ids.join(", "))
            }
        }
    }
}

/// Media metadata portion of a webhook payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WebhookMedia {
    /// Raw media type ("episode", "movie", "track", ...)
    pub media_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub guid: String,
    #[serde(default)]
    pub provider_guids: Vec<ProviderGuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl WebhookMedia {
    pub fn media_kind(&self) -> Option<MediaKind> {
        MediaKind::from_plex_type(&self.media_type)
    }

    /// Pick the identifier shape to normalize
    ///
    /// The native Plex agent uses opaque `plex://` GUIDs, the usable ids live in the
    /// provider list. Legacy agents carry everything in the GUID string.
    pub fn raw_identifier(&self) -> RawIdentifier {
        let native = self.guid.is_empty() || self.guid.starts_with("plex://");
        if native && !self.provider_guids.is_empty() {
            RawIdentifier::Providers(self.provider_guids.clone())
        } else {
            RawIdentifier::Agent(self.guid.clone())
        }
    }
}

/// A parsed webhook delivery from Plex or Tautulli
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookEnvelope {
    pub event_type: WebhookEventType,
    pub account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    pub media: WebhookMedia,
}

impl WebhookEnvelope {
    /// Parse either payload shape, detected by the presence of Plex's `Metadata` object
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(payload)?;
        Ok(Self::from_value(&value))
    }

    /// Same detection as [`WebhookEnvelope::from_json`] on an already parsed document
    pub fn from_value(value: &Value) -> Self {
        if value.get("Metadata").is_some() {
            Self::from_plex_value(value)
        } else {
            Self::from_tautulli_value(value)
        }
    }

    /// Native Plex webhook (the `payload` part of the multipart body)
    fn from_plex_value(value: &Value) -> Self {
        let metadata = value.get("Metadata").unwrap_or(&Value::Null);
        let event = value.get("event").and_then(|v| v.as_str()).unwrap_or_default();
        let account = value
            .get("Account")
            .and_then(|a| a.get("title"))
            .and_then(|t| t.as_str())
            .unwrap_or_default();

        // media.rate puts the new value at the top level, userRating lags behind
        let rating = value
            .get("rating")
            .and_then(flexible_f64)
            .or_else(|| metadata.get("userRating").and_then(flexible_f64));

        Self {
            event_type: WebhookEventType::from_name(event),
            account: account.to_string(),
            library: string_field(metadata, "librarySectionTitle"),
            media: WebhookMedia {
                media_type: string_field(metadata, "type").unwrap_or_default(),
                title: string_field(metadata, "grandparentTitle")
                    .or_else(|| string_field(metadata, "title")),
                guid: string_field(metadata, "guid").unwrap_or_default(),
                provider_guids: parse_guid_array(metadata.get("Guid").unwrap_or(&Value::Null)),
                season: metadata.get("parentIndex").and_then(flexible_u32),
                episode: metadata.get("index").and_then(flexible_u32),
                rating,
            },
        }
    }

    /// Tautulli "Webhook" notification agent with a flat JSON body
    fn from_tautulli_value(value: &Value) -> Self {
        let event = string_field(value, "event")
            .or_else(|| string_field(value, "action"))
            .unwrap_or_default();

        Self {
            event_type: WebhookEventType::from_name(&event),
            account: string_field(value, "user")
                .or_else(|| string_field(value, "username"))
                .unwrap_or_default(),
            library: string_field(value, "library_name"),
            media: WebhookMedia {
                media_type: string_field(value, "media_type").unwrap_or_default(),
                title: string_field(value, "show_name").or_else(|| string_field(value, "title")),
                guid: string_field(value, "guid").unwrap_or_default(),
                provider_guids: parse_guid_array(value.get("guids").unwrap_or(&Value::Null)),
                season: value.get("season_num").and_then(flexible_u32),
                episode: value.get("episode_num").and_then(flexible_u32),
                rating: value.get("user_rating").and_then(flexible_f64),
            },
        }
    }

    /// MAL score carried by a rating event
    pub fn score(&self) -> Option<u8> {
        self.media.rating.map(to_mal_score)
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Accepts numbers and numeric strings (Tautulli templates render everything as text)
fn flexible_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flexible_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Provider ids arrive as `[{"id": "tvdb://1"}]`, `["tvdb://1"]`, a single object or a
/// comma separated string depending on the sender
fn parse_guid_array(value: &Value) -> Vec<ProviderGuid> {
    let mut guids = Vec::new();
    match value {
        Value::Array(items) => {
            for item in items {
                if let Some(id) = item.get("id").and_then(|i| i.as_str()) {
                    guids.push(ProviderGuid::new(id));
                } else if let Some(id) = item.as_str() {
                    guids.push(ProviderGuid::new(id));
                }
            }
        }
        Value::Object(_) => {
            if let Some(id) = value.get("id").and_then(|i| i.as_str()) {
                guids.push(ProviderGuid::new(id));
            }
        }
        Value::String(s) => {
            guids.extend(
                s.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(ProviderGuid::new),
            );
        }
        _ => {}
    }
    guids
}
