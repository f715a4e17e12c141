// Census export: one demographic row per employee.
//
// Loaded in two steps because the name matcher needs the census name list
// before the census rows can be enriched with SSNs from the identity document.

use super::{read_export, row_identity, SourceParser, SourceType};
use crate::error::Result;
use crate::matcher::{records_to_table, CanonicalNames, NameSsnRecord, NAME_COLUMN};
use crate::table::{Table, Value};
use std::path::Path;
use tracing::info;

pub const BIRTH_DATE: &str = "Birth Date";
pub const HIRE_DATE: &str = "Hire Date";
pub const TERMINATION_DATE: &str = "Termination Date";
pub const XID_COLUMN: &str = "Employee XID";

pub struct CensusParser;

impl CensusParser {
    pub fn new() -> Self {
        CensusParser
    }
}

impl Default for CensusParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for CensusParser {
    type Output = CensusExport;

    fn parse(&self, file_path: &Path) -> Result<CensusExport> {
        let table = read_export(file_path)?;
        CensusExport::from_table(table)
    }

    fn source_type(&self) -> SourceType {
        SourceType::Census
    }
}

/// Census rows as exported, before identity enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct CensusExport {
    table: Table,
}

impl CensusExport {
    pub fn from_table(table: Table) -> Result<Self> {
        let source = SourceType::Census.name();
        table.require_column(NAME_COLUMN, source)?;
        table.require_column(BIRTH_DATE, source)?;
        info!("Loaded {} census rows", table.len());
        Ok(CensusExport { table })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Employee names in census order
    pub fn employee_names(&self) -> Vec<String> {
        self.table
            .values(NAME_COLUMN)
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    /// The census name list the matcher reconciles against
    pub fn canonical_names(&self) -> CanonicalNames {
        CanonicalNames::new(self.employee_names())
    }

    /// Join matched SSNs on employee name, then derive each row's identity key.
    ///
    /// Rows without a birth date get a blank key and can never join payroll.
    pub fn enrich(self, name_ssn: &[NameSsnRecord]) -> Result<Table> {
        let ssn_table = records_to_table(name_ssn);
        let joined = self.table.left_join(&ssn_table, NAME_COLUMN)?;

        let enriched = joined.upsert_field(XID_COLUMN, |record| {
            Ok(Value::from(row_identity(record).xid()?))
        })?;

        let without_key = enriched
            .values(XID_COLUMN)
            .map(|values| values.iter().filter(|v| v.is_blank()).count())
            .unwrap_or(0);
        if without_key > 0 {
            info!("{} census rows have no birth date and cannot be joined", without_key);
        }

        Ok(enriched)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatchOutcome, SSN_COLUMN};

    fn census() -> CensusExport {
        let csv = "Employee Name,Birth Date,Hire Date,Termination Date\n\
                   \"Doe, John\",1/1/80,2/1/2010,\n\
                   \"Roe, Jane A\",12/5/1975,3/3/2015,\n\
                   \"Nobody, Baby\",,4/4/2020,\n";
        CensusExport::from_table(Table::from_csv_reader(csv.as_bytes()).unwrap()).unwrap()
    }

    fn record(name: &str, ssn: &str) -> NameSsnRecord {
        NameSsnRecord {
            matched_name: name.to_string(),
            ssn: ssn.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            outcome: MatchOutcome::Unresolved,
        }
    }

    #[test]
    fn test_employee_names_in_order() {
        assert_eq!(
            census().employee_names(),
            vec!["Doe, John".to_string(), "Roe, Jane A".to_string(), "Nobody, Baby".to_string()]
        );
    }

    #[test]
    fn test_requires_birth_date_column() {
        let csv = "Employee Name\n\"Doe, John\"\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert!(CensusExport::from_table(table).is_err());
    }

    #[test]
    fn test_enrich_adds_ssn_and_identity_key() {
        let table = census().enrich(&[record("Doe, John", "123-45-6789")]).unwrap();

        let ssn = table.column(SSN_COLUMN).index().unwrap();
        let xid = table.column(XID_COLUMN).index().unwrap();

        assert_eq!(table.rows()[0][ssn], Value::text("123-45-6789"));
        assert_eq!(table.rows()[0][xid], Value::text("Doe, John 01/01/80"));
        assert_eq!(table.rows()[1][ssn], Value::Null);
        assert_eq!(table.rows()[1][xid], Value::text("Roe, Jane 12/05/75"));
        assert_eq!(table.rows()[2][xid], Value::Null);
    }

    #[test]
    fn test_enrich_overwrites_exported_key_column() {
        let csv = "Employee Name,Birth Date,Employee XID\n\"Doe, John\",1/1/1980,stale\n";
        let export = CensusExport::from_table(Table::from_csv_reader(csv.as_bytes()).unwrap()).unwrap();
        let table = export.enrich(&[]).unwrap();

        let xid = table.column(XID_COLUMN).index().unwrap();
        assert_eq!(table.rows()[0][xid], Value::text("Doe, John 01/01/80"));
        assert_eq!(table.header().iter().filter(|h| *h == XID_COLUMN).count(), 1);
    }
}
