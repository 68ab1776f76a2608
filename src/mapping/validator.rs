//! Validator: configured labels must already exist in the catalogue
//!
//! Static mapping tables are hand-edited. A typo there would otherwise
//! create a new domain or tag as a side effect of ingestion, so the run is
//! stopped before anything is emitted.

use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Which catalogue label list a check runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelKind {
    Domain,
    Tag,
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain => write!(f, "domain"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} `{label}` is configured but does not exist in the catalogue")]
    UnknownLabel { kind: LabelKind, label: String },
}

impl ValidationError {
    pub fn label(&self) -> &str {
        match self {
            Self::UnknownLabel { label, .. } => label,
        }
    }
}

/// Case-insensitive membership check of `configured` in `ground_truth`.
///
/// Labels are checked in sorted order and the first missing one fails the
/// whole check, so the error is the same on every run.
pub fn validate(
    kind: LabelKind,
    configured: &BTreeSet<String>,
    ground_truth: &BTreeSet<String>,
) -> Result<(), ValidationError> {
    let known: BTreeSet<String> = ground_truth.iter().map(|l| l.to_lowercase()).collect();

    match configured.iter().find(|label| !known.contains(&label.to_lowercase())) {
        Some(missing) => Err(ValidationError::UnknownLabel {
            kind,
            label: missing.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(labels: &[&str]) -> BTreeSet<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn known_labels_pass() {
        let truth = set(&["prison", "probation"]);
        assert!(validate(LabelKind::Domain, &set(&["prison", "probation"]), &truth).is_ok());
        assert!(validate(LabelKind::Domain, &BTreeSet::new(), &truth).is_ok());
    }

    #[test]
    fn unknown_label_is_named() {
        let err = validate(
            LabelKind::Domain,
            &set(&["prison", "legal-aid"]),
            &set(&["prison", "probation"]),
        )
        .unwrap_err();
        assert_eq!(err.label(), "legal-aid");
        assert!(err.to_string().contains("legal-aid"));
    }

    #[test]
    fn membership_ignores_case() {
        let truth = set(&["Prison", "Courts and tribunals"]);
        assert!(validate(LabelKind::Tag, &set(&["prison", "COURTS AND TRIBUNALS"]), &truth).is_ok());
    }

    #[test]
    fn first_missing_label_in_sorted_order_is_reported() {
        let err = validate(LabelKind::Tag, &set(&["zeta", "alpha"]), &set(&["prison"])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownLabel {
                kind: LabelKind::Tag,
                label: "alpha".into()
            }
        );
    }
}
