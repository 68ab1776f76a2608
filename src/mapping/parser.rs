//! Name parser: `database__table` node names to `(database, table)`
//!
//! Two conventions exist for where the database name comes from. Each
//! integration point picks one explicitly via [`SplitConvention`]; nothing in
//! this module guesses.

use crate::model::{NodeDescriptor, ResolvedIdentity};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Separator between database and table in a node name.
pub const SEPARATOR: &str = "__";

/// Which field carries authority for the database name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitConvention {
    /// `schema` names the database; the table is the suffix after the last
    /// separator in the last fqn segment.
    #[default]
    SchemaAuthoritative,
    /// The database is the prefix before the first separator in the last
    /// fqn segment; the table is everything after it.
    FqnPrefix,
}

/// Why a node could not be mapped. Recoverable: the node is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedNode {
    #[error("node {0} has an empty fully qualified name")]
    EmptyName(String),
    #[error("node {node}: `{segment}` does not match database__table format")]
    MissingSeparator { node: String, segment: String },
    #[error("node {0} has no schema to take the database name from")]
    MissingSchema(String),
}

/// Parses node names under one fixed convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameParser {
    convention: SplitConvention,
}

impl NameParser {
    pub fn new(convention: SplitConvention) -> Self {
        Self { convention }
    }

    pub fn convention(&self) -> SplitConvention {
        self.convention
    }

    /// Resolve a node to its identity, or say why it cannot be resolved.
    ///
    /// More than one separator is accepted but logged, since only one split
    /// point is honoured.
    pub fn parse(&self, node: &NodeDescriptor) -> Result<ResolvedIdentity, MalformedNode> {
        let segment = node
            .table_segment()
            .ok_or_else(|| MalformedNode::EmptyName(node.unique_id.clone()))?;

        if !matches_convention(segment) {
            warn!(node = %node.unique_id, segment, "name does not match database__table format");
            return Err(MalformedNode::MissingSeparator {
                node: node.unique_id.clone(),
                segment: segment.to_string(),
            });
        }

        if segment.matches(SEPARATOR).count() > 1 {
            warn!(
                node = %node.unique_id,
                segment,
                "name has multiple double underscores which will confuse parsing"
            );
        }

        match self.convention {
            SplitConvention::SchemaAuthoritative => {
                let database = node
                    .schema
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| MalformedNode::MissingSchema(node.unique_id.clone()))?;
                let table = segment.rsplit(SEPARATOR).next().unwrap_or(segment);
                Ok(ResolvedIdentity::new(database, table))
            }
            SplitConvention::FqnPrefix => {
                let (database, table) = segment.split_once(SEPARATOR).unwrap_or((segment, ""));
                Ok(ResolvedIdentity::new(database, table))
            }
        }
    }

    /// Parse, logging and discarding malformed nodes.
    pub fn parse_or_skip(&self, node: &NodeDescriptor) -> Option<ResolvedIdentity> {
        match self.parse(node) {
            Ok(identity) => Some(identity),
            Err(err) => {
                debug!(error = %err, "skipping node");
                None
            }
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when the name starts with `<word>__<word>`.
///
/// Word characters include `_`, so `a___b` qualifies (`a_` + `__` + `b`) but
/// `__b` and `a__` do not.
fn matches_convention(segment: &str) -> bool {
    let chars: Vec<char> = segment.chars().collect();
    for i in 1..chars.len().saturating_sub(2) {
        if chars[i] == '_'
            && chars[i + 1] == '_'
            && chars[..i].iter().all(|&c| is_word_char(c))
            && is_word_char(chars[i + 2])
        {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceKind;

    fn model(name: &str, schema: Option<&str>) -> NodeDescriptor {
        let node = NodeDescriptor::new(
            format!("model.x.{}", name),
            ResourceKind::Model,
            &["mojap", "prison", name],
        );
        match schema {
            Some(s) => node.with_schema(s),
            None => node,
        }
    }

    #[test]
    fn fqn_prefix_splits_on_first_separator() {
        let parser = NameParser::new(SplitConvention::FqnPrefix);
        let identity = parser.parse(&model("x__y", None)).unwrap();
        assert_eq!(identity, ResolvedIdentity::new("x", "y"));
    }

    #[test]
    fn schema_authoritative_takes_suffix_after_last_separator() {
        let parser = NameParser::new(SplitConvention::SchemaAuthoritative);
        let identity = parser
            .parse(&model("prison__table1", Some("prison_database")))
            .unwrap();
        assert_eq!(identity, ResolvedIdentity::new("prison_database", "table1"));
    }

    #[test]
    fn multiple_separators_are_accepted() {
        let schema = NameParser::new(SplitConvention::SchemaAuthoritative);
        let prefix = NameParser::new(SplitConvention::FqnPrefix);
        let node = model("a__b__c", Some("a_db"));

        assert_eq!(schema.parse(&node).unwrap(), ResolvedIdentity::new("a_db", "c"));
        assert_eq!(prefix.parse(&node).unwrap(), ResolvedIdentity::new("a", "b__c"));
    }

    #[test]
    fn name_without_separator_is_invalid() {
        let parser = NameParser::new(SplitConvention::FqnPrefix);
        let err = parser.parse(&model("postcodes", None)).unwrap_err();
        assert!(matches!(err, MalformedNode::MissingSeparator { .. }));
        assert!(parser.parse_or_skip(&model("postcodes", None)).is_none());
    }

    #[test]
    fn separator_needs_text_on_both_sides() {
        let parser = NameParser::new(SplitConvention::FqnPrefix);
        assert!(parser.parse(&model("__table", None)).is_err());
        assert!(parser.parse(&model("database__", None)).is_err());
        assert!(parser.parse(&model("a___b", None)).is_ok());
    }

    #[test]
    fn empty_name_is_invalid() {
        let parser = NameParser::default();
        let node = NodeDescriptor::new("model.x.empty", ResourceKind::Model, &[]);
        assert_eq!(
            parser.parse(&node).unwrap_err(),
            MalformedNode::EmptyName("model.x.empty".into())
        );
    }

    #[test]
    fn schema_authoritative_requires_schema() {
        let parser = NameParser::new(SplitConvention::SchemaAuthoritative);
        let err = parser.parse(&model("prison__table1", None)).unwrap_err();
        assert!(matches!(err, MalformedNode::MissingSchema(_)));
    }
}
