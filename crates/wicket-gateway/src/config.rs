//! Gateway configuration: TOML file or in-code construction.

use crate::rules::ProxyVerifier;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::info;
use wicket_rpc::{Identity, WicketError, WicketResult};

/// Top-level gateway configuration.
///
/// Every field has a default, so an empty file (or `GatewayConfig::default()`)
/// yields a fully permissive gateway: no filters, no address rules, a bounded
/// routing table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub filters: FilterSection,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub forward: ForwardSection,
}

/// `[filters]` section: per-session allow-list seeds.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterSection {
    /// Identity categories a client may invoke on.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Adapter ids a client may reach through indirect proxies.
    #[serde(default)]
    pub adapter_ids: Vec<String>,
    /// Full identities (`category/name`) a client may invoke on.
    #[serde(default)]
    pub identities: Vec<String>,
    /// Whether each session's user id is added to its category filter:
    /// 0 = no, 1 = the user id itself, 2 = the user id prefixed with `_`.
    #[serde(default)]
    pub add_user_to_categories: AddUserMode,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            adapter_ids: Vec::new(),
            identities: Vec::new(),
            add_user_to_categories: AddUserMode::Off,
        }
    }
}

/// How a session's user id is folded into its category filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddUserMode {
    #[default]
    Off,
    UserId,
    PrefixedUserId,
}

// Configured as the integers 0/1/2.
impl<'de> Deserialize<'de> for AddUserMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match u8::deserialize(deserializer)? {
            0 => Ok(AddUserMode::Off),
            1 => Ok(AddUserMode::UserId),
            2 => Ok(AddUserMode::PrefixedUserId),
            other => Err(D::Error::custom(format!(
                "add_user_to_categories must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

/// `[routing]` section: address rules and routing-table limits.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingSection {
    /// Space-separated accept rules, e.g. `"10.0.0.*:[80,443] backend*"`.
    #[serde(default)]
    pub accept: String,
    /// Space-separated reject rules.
    #[serde(default)]
    pub reject: String,
    #[serde(default = "default_max_table_size")]
    pub max_table_size: usize,
    /// Longest accepted stringified proxy; 0 disables the check.
    #[serde(default)]
    pub max_proxy_length: usize,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            accept: String::new(),
            reject: String::new(),
            max_table_size: default_max_table_size(),
            max_proxy_length: 0,
        }
    }
}

/// `[forward]` section: whether the session's authorization context is
/// attached to forwarded calls, per direction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForwardSection {
    #[serde(default)]
    pub client_context: bool,
    #[serde(default)]
    pub server_context: bool,
}

fn default_max_table_size() -> usize {
    1000
}

impl GatewayConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> WicketResult<Self> {
        info!(path = %path.display(), "loading gateway config");
        let content = std::fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&content)
            .map_err(|e| WicketError::InvalidConfig(format!("config parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject malformed settings up front: bad address rules, unparsable
    /// identity seeds, or a zero table capacity never make it past here.
    pub fn validate(&self) -> WicketResult<()> {
        ProxyVerifier::new(
            &self.routing.accept,
            &self.routing.reject,
            self.routing.max_proxy_length,
        )?;
        if self.routing.max_table_size == 0 {
            return Err(WicketError::InvalidConfig(
                "routing.max_table_size must be at least 1".into(),
            ));
        }
        for entry in &self.filters.identities {
            Identity::parse(entry)
                .map_err(|e| WicketError::InvalidConfig(format!("filters.identities: {e}")))?;
        }
        Ok(())
    }
}
