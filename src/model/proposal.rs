//! Upsert proposals: one aspect of one entity, ready for the sink

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which aspect of an entity a proposal writes.
///
/// A run emits at most one proposal per `(target, AspectKind)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectKind {
    /// A domain label entity
    DomainDefinition,
    /// A tag label entity
    TagDefinition,
    /// A user entity
    UserInfo,
    /// Container creation: name, subtype, description
    Container,
    /// Dashboard creation: title and member charts
    Dashboard,
    /// Entity properties, including custom key/value properties
    Properties,
    TagSet,
    DomainSet,
    Ownership,
    /// Link from an entity to its parent container
    Containment,
    SubTypes,
    PlatformInstance,
}

impl std::fmt::Display for AspectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DomainDefinition => "domainProperties",
            Self::TagDefinition => "tagProperties",
            Self::UserInfo => "corpUserInfo",
            Self::Container => "containerProperties",
            Self::Dashboard => "dashboardInfo",
            Self::Properties => "properties",
            Self::TagSet => "globalTags",
            Self::DomainSet => "domains",
            Self::Ownership => "ownership",
            Self::Containment => "container",
            Self::SubTypes => "subTypes",
            Self::PlatformInstance => "dataPlatformInstance",
        };
        write!(f, "{}", name)
    }
}

/// The payload of a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "aspect", rename_all = "snake_case")]
pub enum Aspect {
    DomainDefinition {
        name: String,
    },
    TagDefinition {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    UserInfo {
        display_name: String,
        email: String,
        active: bool,
    },
    Container {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qualified_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified: Option<i64>,
    },
    Dashboard {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external_url: Option<String>,
        charts: Vec<String>,
    },
    Properties {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qualified_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified: Option<i64>,
        custom_properties: BTreeMap<String, String>,
    },
    TagSet {
        tags: Vec<String>,
    },
    DomainSet {
        domains: Vec<String>,
    },
    Ownership {
        owners: Vec<String>,
        ownership_type: String,
    },
    Containment {
        container: String,
    },
    SubTypes {
        type_names: Vec<String>,
    },
    PlatformInstance {
        platform: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance: Option<String>,
    },
}

impl Aspect {
    pub fn kind(&self) -> AspectKind {
        match self {
            Self::DomainDefinition { .. } => AspectKind::DomainDefinition,
            Self::TagDefinition { .. } => AspectKind::TagDefinition,
            Self::UserInfo { .. } => AspectKind::UserInfo,
            Self::Container { .. } => AspectKind::Container,
            Self::Dashboard { .. } => AspectKind::Dashboard,
            Self::Properties { .. } => AspectKind::Properties,
            Self::TagSet { .. } => AspectKind::TagSet,
            Self::DomainSet { .. } => AspectKind::DomainSet,
            Self::Ownership { .. } => AspectKind::Ownership,
            Self::Containment { .. } => AspectKind::Containment,
            Self::SubTypes { .. } => AspectKind::SubTypes,
            Self::PlatformInstance { .. } => AspectKind::PlatformInstance,
        }
    }
}

/// An instruction to create-or-update one aspect of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertProposal {
    pub target: String,
    #[serde(flatten)]
    pub aspect: Aspect,
}

impl UpsertProposal {
    pub fn new(target: impl Into<String>, aspect: Aspect) -> Self {
        Self {
            target: target.into(),
            aspect,
        }
    }

    pub fn kind(&self) -> AspectKind {
        self.aspect.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_serializes_flat_with_aspect_tag() {
        let proposal = UpsertProposal::new(
            "urn:li:dataset:(urn:li:dataPlatform:dbt,db.t,PROD)",
            Aspect::DomainSet {
                domains: vec!["urn:li:domain:Prison".into()],
            },
        );
        let json = serde_json::to_value(&proposal).unwrap();
        assert_eq!(json["aspect"], "domain_set");
        assert_eq!(json["domains"][0], "urn:li:domain:Prison");
        assert_eq!(proposal.kind(), AspectKind::DomainSet);
    }

    #[test]
    fn aspect_kinds_display_as_catalogue_aspect_names() {
        assert_eq!(AspectKind::Containment.to_string(), "container");
    }
}
