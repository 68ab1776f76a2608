//! Reconciliation core: name parsing, label resolution, merging, validation
//!
//! Everything here is synchronous and side-effect free apart from logging.
//! Sources feed it; the proposal builder in `adapter` consumes its output.

mod formatter;
mod merger;
mod parser;
mod resolver;
mod validator;

pub use formatter::{format_domain_name, DomainNameFormatter, DEFAULT_ACRONYMS};
pub use merger::{MetadataMerger, RecordSet, DISPLAY_MARKER};
pub use parser::{MalformedNode, NameParser, SplitConvention, SEPARATOR};
pub use resolver::{
    DatabaseDomains, DomainAssignment, DomainResolver, LabelMapping, LabelStyle, ResolutionInput,
    ResolutionMode, ResolutionPolicy,
};
pub use validator::{validate, LabelKind, ValidationError};
