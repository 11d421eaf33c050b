use crate::domain_model::{Article, ArticleId};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position in the `(created_at DESC, id DESC)` article order.
///
/// The string form is URL-safe base64 (no padding) of
/// `{"ts":"<rfc3339>","id":<n>}`, so any client holding it can resume a
/// walk without server-side state.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: ArticleId, // tiebreaker
}

#[derive(Serialize, Deserialize)]
struct CursorWire {
    ts: String,
    id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    #[error("cursor is not valid base64")]
    Encoding,
    #[error("cursor payload is malformed")]
    Payload,
    #[error("cursor timestamp is invalid")]
    Timestamp,
    #[error("cursor id is negative")]
    NegativeId,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: ArticleId) -> Self {
        Cursor { created_at, id }
    }

    pub fn of(article: &Article) -> Self {
        Cursor::new(article.created_at, article.id)
    }

    pub fn encode(&self) -> String {
        let wire = CursorWire {
            ts: self.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            id: self.id.0,
        };
        // CursorWire only holds a String and an i64.
        let raw = serde_json::to_vec(&wire).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('=').as_bytes())
            .map_err(|_| CursorError::Encoding)?;
        let wire: CursorWire = serde_json::from_slice(&raw).map_err(|_| CursorError::Payload)?;
        let created_at = DateTime::parse_from_rfc3339(&wire.ts)
            .map_err(|_| CursorError::Timestamp)?
            .with_timezone(&Utc);
        if wire.id < 0 {
            return Err(CursorError::NegativeId);
        }
        Ok(Cursor {
            created_at,
            id: ArticleId(wire.id),
        })
    }

    /// True when `article` sorts strictly after this position in the
    /// descending walk.
    pub fn precedes(&self, article: &Article) -> bool {
        (article.created_at, article.id) < (self.created_at, self.id)
    }

    /// True when `article` sorts strictly before this position in the
    /// descending walk.
    pub fn follows(&self, article: &Article) -> bool {
        (article.created_at, article.id) > (self.created_at, self.id)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Cursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cursor::decode(s)
    }
}

impl Serialize for Cursor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Cursor::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeysetDirection {
    #[default]
    Next,
    Prev,
}
