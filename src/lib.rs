// Payroll Census Reconciliation - Core Library
// Exposes the reconciliation pipeline for the CLI and tests

pub mod error;
pub mod identity;       // Identity Normalizer - names, dates, cross-source key
pub mod table;          // Immutable table value shared by every stage
pub mod matcher;        // Name Matcher - identity document names → census names
pub mod pivot;          // Pivot Engine - long payroll rows → wide columns
pub mod parser;         // Source Parsers - census, payroll, identity document
pub mod config;
pub mod pipeline;       // Merge & Cleanup Pipeline
pub mod logging;

// Re-export commonly used types
pub use error::{ReconcileError, Result};
pub use identity::{
    date_diff_days, generate_identity_key, normalize_date, remove_middle_initial,
    DateInput, EmployeeIdentity,
};
pub use table::{Column, Record, Table, Value};
pub use matcher::{
    CandidateStrategy, CanonicalNames, MatchOutcome, NameMatcher, NameSsnRecord, RawNameEntry,
};
pub use pivot::{recast, sum_by_key, Aggregate, Reducer, Reducers};
pub use parser::{
    CensusExport, CensusParser, DocumentParser, IdentityDocument, PayrollExport, PayrollParser,
    SourceParser, SourceType,
};
pub use config::{ContributionMapping, PipelineConfig};
pub use pipeline::{
    convert, output_file_name, run, Conversion, ConversionReport, SourceFiles,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
