//! Correlation data carried through the OAuth redirect
//!
//! The provider echoes the `state` parameter back unchanged, so the panel's
//! document context (document/workspace/element identifiers) rides through
//! the consent round trip as an opaque string. This is a carrier, not a
//! trust boundary: the value is base64-wrapped JSON with no signature, over
//! a channel already protected by TLS and the provider's redirect-URI
//! validation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Document context the panel was opened with.
///
/// Every field is optional: the panel may start the sign-in flow before the
/// host application has supplied a full triple, and a lost field must not
/// abort the flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectState {
    #[serde(rename = "docId", default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    #[serde(rename = "workId", default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,

    #[serde(rename = "elId", default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
}

impl RedirectState {
    pub fn new(
        document_id: Option<String>,
        workspace_id: Option<String>,
        element_id: Option<String>,
    ) -> Self {
        Self {
            document_id,
            workspace_id,
            element_id,
        }
    }

    /// Serialize to the opaque string placed in the authorize URL.
    pub fn encode(&self) -> String {
        // A struct of optional strings always serializes
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Recover correlation data from a callback's `state` value.
    ///
    /// Never fails hard: anything that does not decode (bad base64, bad
    /// JSON) yields `None`, which callers treat as "no correlation
    /// available" rather than an error. Losing correlation must not break
    /// the sign-in itself.
    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}
