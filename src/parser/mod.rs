// 🏗️ Source Parsers - one parser per input export
//
// Census and payroll arrive as CSV exports, the identity document as HTML.
// Each parser loads its source into a value the pipeline can reconcile; all of
// them must derive identity keys through crate::identity so keys line up.

pub mod census;
pub mod document;
pub mod payroll;

use crate::error::Result;
use crate::identity::EmployeeIdentity;
use crate::matcher::NAME_COLUMN;
use crate::table::{Record, Table};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use census::{CensusExport, CensusParser};
pub use document::{DocumentParser, IdentityDocument};
pub use payroll::{PayrollExport, PayrollParser};

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceType - which of the three exports a file is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Census,
    Payroll,
    IdentityDocument,
}

impl SourceType {
    /// Human-readable name for display and error messages
    pub fn name(&self) -> &str {
        match self {
            SourceType::Census => "census export",
            SourceType::Payroll => "payroll export",
            SourceType::IdentityDocument => "identity document",
        }
    }

    /// Short code for internal use
    pub fn code(&self) -> &str {
        match self {
            SourceType::Census => "census",
            SourceType::Payroll => "payroll",
            SourceType::IdentityDocument => "w2",
        }
    }
}

/// SourceParser - load one source file
pub trait SourceParser {
    type Output;

    /// Parse the file at `file_path`; any malformed content aborts the run
    fn parse(&self, file_path: &Path) -> Result<Self::Output>;

    fn source_type(&self) -> SourceType;
}

/// Identity of one export row; a blank birth date leaves it without a key
pub(crate) fn row_identity(record: &Record) -> EmployeeIdentity {
    let birth_date = record.text(census::BIRTH_DATE);
    let birth_date = if birth_date.trim().is_empty() {
        None
    } else {
        Some(birth_date)
    };
    EmployeeIdentity::new(record.text(NAME_COLUMN), birth_date)
}

/// Read a tabular export. The first data row under the header is a
/// throwaway line both exports carry, so it is skipped.
pub(crate) fn read_export(file_path: &Path) -> Result<Table> {
    Ok(Table::from_csv_path(file_path)?.skip(1))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_source_type_names() {
        assert_eq!(SourceType::Census.name(), "census export");
        assert_eq!(SourceType::Payroll.name(), "payroll export");
        assert_eq!(SourceType::IdentityDocument.code(), "w2");
    }

    #[test]
    fn test_read_export_skips_throwaway_row() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Employee Name,Birth Date\nReport generated 01/02/2024,\nDoe,1/1/80\n").unwrap();

        let table = read_export(file.path()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_read_export_missing_file() {
        assert!(read_export(Path::new("does_not_exist.csv")).is_err());
    }
}
