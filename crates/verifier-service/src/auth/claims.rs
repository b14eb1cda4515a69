//! Verified claim set.
//!
//! Holds every claim of a validated token as an ordered name → string map
//! plus the caller's display name. Claim values are redacted in Debug output
//! to prevent exposure in logs.

use serde_json::{Map, Value};
use std::fmt;

/// Claims consulted, in order, for the caller's display name.
pub const DISPLAY_NAME_CLAIMS: [&str; 5] =
    ["name", "preferred_username", "upn", "unique_name", "sub"];

/// Claims of a validated token.
///
/// Immutable once built. Order follows the token payload.
#[derive(Clone, PartialEq, Eq)]
pub struct ClaimSet {
    display_name: Option<String>,
    claims: Vec<(String, String)>,
}

/// Custom Debug implementation that redacts claim values.
///
/// Values include subject identifiers and personal data; only the claim
/// names are shown.
impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.claims.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("ClaimSet")
            .field("display_name", &self.display_name.as_ref().map(|_| "[REDACTED]"))
            .field("claims", &names)
            .finish()
    }
}

/// Render a claim value: strings verbatim, anything else as compact JSON.
pub fn render_claim_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ClaimSet {
    /// Project a verified token payload.
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        let claims: Vec<(String, String)> = payload
            .iter()
            .map(|(name, value)| (name.clone(), render_claim_value(value)))
            .collect();

        let display_name = DISPLAY_NAME_CLAIMS.iter().find_map(|wanted| {
            claims
                .iter()
                .find(|(name, _)| name.as_str() == *wanted)
                .map(|(_, value)| value.clone())
        });

        Self {
            display_name,
            claims,
        }
    }

    /// Caller's display name, `None` when no candidate claim is present.
    ///
    /// The first present candidate wins even when its value is empty.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Rendered value of a claim.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|(claim, _)| claim == name)
            .map(|(_, value)| value.as_str())
    }

    /// Claims in payload order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.claims
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Claims as an ordered JSON object of strings.
    pub fn to_json_object(&self) -> Map<String, Value> {
        self.claims
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect()
    }
}
