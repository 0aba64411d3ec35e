// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized view of the profile returned by the Identity API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{IdentityError, Operation};

/// The signed-in user's profile.
///
/// Fields the server sends that are not modeled here are kept in `extra`
/// and serialized back at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Normalize a raw profile payload.
    ///
    /// `id` accepts strings or numbers. `display_name` falls back to `name`,
    /// then to `username`. `avatar_url` falls back to `avatar`. The aliases
    /// are read but stay in `extra`.
    pub fn from_raw(raw: Value) -> Result<Self, IdentityError> {
        let Value::Object(mut fields) = raw else {
            return Err(IdentityError::Malformed {
                operation: Operation::Profile,
                detail: "profile is not a JSON object".to_owned(),
            });
        };

        let id = match fields.remove("id") {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let username = take_string(&mut fields, "username").unwrap_or_default();
        let email = take_string(&mut fields, "email").unwrap_or_default();
        let display_name = take_string(&mut fields, "display_name")
            .filter(|s| !s.is_empty())
            .or_else(|| peek_string(&fields, "name"))
            .unwrap_or_else(|| username.clone());
        let avatar_url = take_string(&mut fields, "avatar_url")
            .filter(|s| !s.is_empty())
            .or_else(|| peek_string(&fields, "avatar"));

        Ok(Self { id, username, display_name, email, avatar_url, extra: fields })
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn peek_string(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_owned)
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
