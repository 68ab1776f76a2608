//! Stable identifiers for catalogue entities
//!
//! Every identifier is a pure function of its inputs, so re-running a
//! pipeline against unchanged upstream data yields the same URNs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for container guids. Fixed so guids survive across runs.
const CONTAINER_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_0c0e_8d4a_4f5e_9a51_2c7d_3e9b_a410);

/// Default mail domain appended to bare owner names.
pub const DEFAULT_MAIL_DOMAIN: &str = "justice.gov.uk";

/// Which platform (and optionally which instance of it) entities belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(rename = "platform", default = "default_platform")]
    pub name: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default = "default_env")]
    pub env: String,
}

fn default_platform() -> String {
    "dbt".to_string()
}

fn default_env() -> String {
    "PROD".to_string()
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            name: default_platform(),
            instance: None,
            env: default_env(),
        }
    }
}

impl Platform {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    pub fn platform_urn(&self) -> String {
        format!("urn:li:dataPlatform:{}", self.name)
    }

    pub fn instance_urn(&self) -> Option<String> {
        self.instance
            .as_ref()
            .map(|instance| format!("urn:li:dataPlatformInstance:({},{})", self.platform_urn(), instance))
    }

    pub fn dataset_urn(&self, name: &str) -> String {
        let qualified = match &self.instance {
            Some(instance) => format!("{}.{}", instance, name),
            None => name.to_string(),
        };
        format!("urn:li:dataset:({},{},{})", self.platform_urn(), qualified, self.env)
    }

    /// Container URN derived from a v5 guid over the container's full key.
    pub fn container_urn(&self, name: &str) -> String {
        let key = format!(
            "{}|{}|{}|{}",
            self.name,
            self.instance.as_deref().unwrap_or(""),
            self.env,
            name
        );
        let guid = Uuid::new_v5(&CONTAINER_NAMESPACE, key.as_bytes());
        format!("urn:li:container:{}", guid.simple())
    }

    pub fn chart_urn(&self, id: &str) -> String {
        format!("urn:li:chart:({},{})", self.name, id)
    }

    pub fn dashboard_urn(&self, id: &str) -> String {
        format!("urn:li:dashboard:({},{})", self.name, id)
    }
}

pub fn domain_urn(name: &str) -> String {
    format!("urn:li:domain:{}", name)
}

pub fn tag_urn(name: &str) -> String {
    format!("urn:li:tag:{}", name)
}

/// The tag name inside a tag URN.
pub fn tag_name(urn: &str) -> Option<&str> {
    urn.strip_prefix("urn:li:tag:").filter(|name| !name.is_empty())
}

pub fn user_urn(id: &str) -> String {
    format!("urn:li:corpuser:{}", id)
}

/// A catalogue user derived from an owner email or bare user name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerIdentity {
    pub urn: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl OwnerIdentity {
    /// Normalize an owner as written in upstream metadata.
    ///
    /// Values already in URN form pass through untouched. Anything else is
    /// treated as an email, with the default mail domain appended when it
    /// does not already end in `.gov.uk`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.starts_with("urn:li:") {
            return Some(Self {
                urn: raw.to_string(),
                email: None,
                display_name: None,
            });
        }

        let email = if raw.ends_with(".gov.uk") {
            raw.to_string()
        } else {
            format!("{}@{}", raw, DEFAULT_MAIL_DOMAIN)
        };
        let local = email.split('@').next().unwrap_or(&email).to_string();
        Some(Self {
            urn: user_urn(&local),
            display_name: Some(local.replace('.', " ")),
            email: Some(email),
        })
    }

    /// Whether a user entity should be created for this owner.
    pub fn is_user(&self) -> bool {
        self.email.is_some()
    }
}
