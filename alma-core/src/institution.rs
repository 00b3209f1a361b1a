//! Institution record model
//!
//! The only value type that flows through the resolver. Raw external payloads
//! never travel past [`normalize_record`]; everything downstream works with a
//! typed [`Institution`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{DOCUMENT_KEY_SEPARATOR, PLACEHOLDER_NAME, UNKNOWN_STATE};

/// A normalized record describing one educational institution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Institution {
    pub name: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Affiliating body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    /// Ownership or category classifier (e.g. government, private).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Institution {
    /// Create a record with only the required fields set.
    pub fn new(name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: state.into(),
            city: None,
            university: None,
            kind: None,
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_university(mut self, university: impl Into<String>) -> Self {
        self.university = Some(university.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Key addressing this record in the persistent store.
    pub fn document_key(&self) -> String {
        derive_document_key(self)
    }

    /// Field-level merge used by idempotent upserts.
    ///
    /// Required fields take the incoming value. Optional fields take the
    /// incoming value when present and keep the stored one otherwise.
    pub fn merged_with(self, incoming: Institution) -> Institution {
        Institution {
            name: incoming.name,
            state: incoming.state,
            city: incoming.city.or(self.city),
            university: incoming.university.or(self.university),
            kind: incoming.kind.or(self.kind),
        }
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Accepted source field names, in priority order, per target field.
pub const NAME_ALIASES: &[&str] = &["name", "college name", "college_name"];
pub const STATE_ALIASES: &[&str] = &["state"];
pub const CITY_ALIASES: &[&str] = &["city"];
pub const UNIVERSITY_ALIASES: &[&str] = &["university"];
pub const KIND_ALIASES: &[&str] = &["type", "college type"];

/// First non-blank string found under any of `aliases`.
fn first_text(object: &serde_json::Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        object
            .get(*alias)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Convert one loosely-shaped external item into an [`Institution`].
///
/// Returns `None` when the item is not an object, has no usable name, or
/// carries the placeholder name the source emits for unparseable entries.
pub fn normalize_record(raw: &Value) -> Option<Institution> {
    let object = raw.as_object()?;

    let name = first_text(object, NAME_ALIASES)?;
    if name == PLACEHOLDER_NAME {
        return None;
    }

    Some(Institution {
        name,
        state: first_text(object, STATE_ALIASES).unwrap_or_else(|| UNKNOWN_STATE.to_string()),
        city: first_text(object, CITY_ALIASES),
        university: first_text(object, UNIVERSITY_ALIASES),
        kind: first_text(object, KIND_ALIASES),
    })
}

// ============================================================================
// DOCUMENT KEYS
// ============================================================================

/// Characters dropped outright instead of becoming a separator, so that
/// "St. Xavier's" and "st xaviers" share a key.
const ELIDED_CHARS: &[char] = &['\'', '\u{2018}', '\u{2019}', '`'];

/// Derive the persistent-store key for a record.
///
/// `lowercase(name + "-" + state)` with every run of characters outside
/// `[a-z0-9]` collapsed into one separator and no leading/trailing separator.
/// Two institutions with the same name and state collide by construction.
pub fn derive_document_key(institution: &Institution) -> String {
    document_key(&institution.name, &institution.state)
}

/// Key derivation over the raw name/state pair.
pub fn document_key(name: &str, state: &str) -> String {
    let raw = format!("{}{}{}", name, DOCUMENT_KEY_SEPARATOR, state).to_lowercase();
    let mut key = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in raw.chars() {
        if ELIDED_CHARS.contains(&c) {
            continue;
        }
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !key.is_empty() {
                key.push(DOCUMENT_KEY_SEPARATOR);
            }
            pending_separator = false;
            key.push(c);
        } else {
            pending_separator = true;
        }
    }

    key
}
