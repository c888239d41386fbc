// Enumeration request building

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sentinel region that asks the backend to enumerate every enabled region.
pub const ALL_REGIONS: &str = "ALL";

/// Body of `POST /enumerate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumerationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    pub assume_roles: Vec<String>,
    pub regions: Vec<String>,
    /// Reserved for per-service toggles; always sent empty for now.
    pub services: Map<String, Value>,
}

impl EnumerationRequest {
    pub fn new() -> Self {
        Self {
            regions: vec![ALL_REGIONS.to_string()],
            ..Self::default()
        }
    }

    pub fn with_profile(mut self, profile: Option<&str>) -> Self {
        self.profile = non_empty(profile);
        self
    }

    pub fn with_static_credentials(
        mut self,
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
        session_token: Option<&str>,
    ) -> Self {
        self.access_key_id = non_empty(access_key_id);
        self.secret_access_key = non_empty(secret_access_key);
        self.session_token = non_empty(session_token);
        self
    }

    /// Accepts the raw comma-separated role list as typed by the operator.
    pub fn with_assume_roles(mut self, raw: &str) -> Self {
        self.assume_roles = parse_role_list(raw);
        self
    }

    /// Accepts the raw comma-separated region list as typed by the operator.
    pub fn with_regions(mut self, raw: &str) -> Self {
        self.regions = parse_region_list(raw);
        self
    }

    pub fn is_all_regions(&self) -> bool {
        self.regions.iter().any(|r| r == ALL_REGIONS)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Split a comma-separated list into trimmed, non-empty entries, keeping order.
pub fn parse_role_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Like [`parse_role_list`], but `all` in any case becomes the `ALL` sentinel
/// and an empty list means every region.
pub fn parse_region_list(raw: &str) -> Vec<String> {
    let regions: Vec<String> = parse_role_list(raw)
        .into_iter()
        .map(|r| {
            if r.eq_ignore_ascii_case(ALL_REGIONS) {
                ALL_REGIONS.to_string()
            } else {
                r
            }
        })
        .collect();

    if regions.is_empty() {
        vec![ALL_REGIONS.to_string()]
    } else {
        regions
    }
}
