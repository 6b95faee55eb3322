//! Provider user profile and identity derivation

use serde::{Deserialize, Serialize};

/// User record returned by the provider's session-info endpoint.
///
/// Every field is optional. Real responses omit fields freely depending on
/// account type, and some return empty strings where a value is missing, so
/// derivation treats empty as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<String>,

    /// Legacy identifier field still present on some accounts
    #[serde(default)]
    pub userid: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

impl UserProfile {
    /// Best available human-readable name.
    ///
    /// Fallback order: displayName, name, username, email, id. The order is
    /// part of the caller-facing contract; the UI shows whatever this
    /// resolves to.
    pub fn resolve_name(&self) -> Option<&str> {
        non_empty(&self.display_name)
            .or_else(|| non_empty(&self.name))
            .or_else(|| non_empty(&self.username))
            .or_else(|| non_empty(&self.email))
            .or_else(|| non_empty(&self.id))
    }

    /// Provider subject identifier, `id` with `userid` as the legacy fallback.
    pub fn subject(&self) -> Option<&str> {
        non_empty(&self.id).or_else(|| non_empty(&self.userid))
    }

    pub fn email(&self) -> Option<&str> {
        non_empty(&self.email)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
