//! Domain name formatter
//!
//! Turns raw domain strings from manifests and mapping tables into the
//! human-readable labels shown in the catalogue:
//! - `courts` -> `Courts`
//! - `opg` -> `OPG`
//! - `electronic_monitoring` -> `Electronic monitoring`

use std::collections::BTreeSet;

/// Organisational abbreviations kept in upper case.
pub const DEFAULT_ACRONYMS: [&str; 6] = ["OPG", "HMPPS", "HMCTS", "LAA", "CICA", "HQ"];

/// Canonicalizes raw domain names. Pure; holds only the acronym table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainNameFormatter {
    acronyms: BTreeSet<String>,
}

impl Default for DomainNameFormatter {
    fn default() -> Self {
        Self::with_acronyms(DEFAULT_ACRONYMS)
    }
}

impl DomainNameFormatter {
    pub fn with_acronyms<I, S>(acronyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            acronyms: acronyms
                .into_iter()
                .map(|a| a.as_ref().trim().to_uppercase())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    pub fn is_acronym(&self, raw: &str) -> bool {
        self.acronyms.contains(&raw.to_uppercase())
    }

    pub fn format(&self, raw: &str) -> String {
        let upper = raw.to_uppercase();
        if self.acronyms.contains(&upper) {
            return upper;
        }

        let mut chars = raw.chars();
        let capitalized = match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.as_str().to_lowercase().chars())
                .collect::<String>(),
            None => String::new(),
        };
        capitalized.replace('_', " ")
    }
}

/// Format with the default acronym table.
pub fn format_domain_name(raw: &str) -> String {
    DomainNameFormatter::default().format(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acronyms_map_to_exact_uppercase() {
        assert_eq!(format_domain_name("opg"), "OPG");
        assert_eq!(format_domain_name("Hmpps"), "HMPPS");
        assert_eq!(format_domain_name("HQ"), "HQ");
    }

    #[test]
    fn words_are_capitalized_and_underscores_spaced() {
        assert_eq!(format_domain_name("electronic_monitoring"), "Electronic monitoring");
        assert_eq!(format_domain_name("courts"), "Courts");
        assert_eq!(format_domain_name("PRISON"), "Prison");
        assert_eq!(format_domain_name(""), "");
    }

    #[test]
    fn formatting_is_idempotent() {
        let formatter = DomainNameFormatter::default();
        for raw in ["electronic_monitoring", "opg", "courts", "Prisons and probation", "laa"] {
            let once = formatter.format(raw);
            assert_eq!(formatter.format(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn custom_acronym_table() {
        let formatter = DomainNameFormatter::with_acronyms(["moj", " yjb "]);
        assert_eq!(formatter.format("moj"), "MOJ");
        assert_eq!(formatter.format("yjb"), "YJB");
        assert_eq!(formatter.format("opg"), "Opg");
        assert!(formatter.is_acronym("Moj"));
    }
}
