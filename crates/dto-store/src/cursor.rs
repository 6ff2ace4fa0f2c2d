//! Opaque pagination cursor: base64url of `"{created_at_iso}|{id}"`.
//!
//! Listing order is `created_at DESC, id DESC`; the cursor encodes the last
//! row of the previous page so the next page can continue strictly after it
//! in that composite order.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};

/// Decoded cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn encode(created_at: DateTime<Utc>, id: &str) -> String {
        let raw = format!("{}|{}", created_at.to_rfc3339(), id);
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(s: &str) -> StoreResult<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|_| StoreError::MalformedCursor)?;
        let raw = String::from_utf8(raw).map_err(|_| StoreError::MalformedCursor)?;

        let (created_at_str, id) = raw.split_once('|').ok_or(StoreError::MalformedCursor)?;
        if id.is_empty() {
            return Err(StoreError::MalformedCursor);
        }
        let created_at = DateTime::parse_from_rfc3339(created_at_str)
            .map_err(|_| StoreError::MalformedCursor)?
            .with_timezone(&Utc);

        Ok(Cursor {
            created_at,
            id: id.to_string(),
        })
    }
}
