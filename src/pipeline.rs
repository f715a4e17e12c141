// ⚖️ Merge & Cleanup Pipeline - census + payroll + identity document → export
//
// A strictly linear chain: parse → match → pivot → join → cleanup → rename.
// Every stage takes a table and returns a new one; nothing is written until
// the whole chain has succeeded.

use crate::config::{ContributionMapping, PipelineConfig};
use crate::error::{ReconcileError, Result};
use crate::identity::{date_diff_days, normalize_date, DateInput, DATE_FORMAT};
use crate::matcher::{NameMatcher, NameSsnRecord, NAME_COLUMN, SSN_COLUMN};
use crate::parser::census::{BIRTH_DATE, HIRE_DATE, TERMINATION_DATE, XID_COLUMN};
use crate::parser::payroll::{CHECK_DATE, PERIOD_HOURS, REGULAR_EARNING};
use crate::parser::{
    CensusExport, CensusParser, DocumentParser, IdentityDocument, PayrollExport, PayrollParser,
    SourceParser,
};
use crate::table::{Column, Table, Value};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

pub const PERIOD_GROSS_PAY: &str = "Period Gross Pay";
pub const YTD_HOURS: &str = "Year to Date Hours Worked";

/// Shared date columns normalized to MM/DD/YYYY after the join
pub const DATE_COLUMNS: [&str; 4] = [BIRTH_DATE, HIRE_DATE, TERMINATION_DATE, CHECK_DATE];

/// Internal column → column name expected by the benefits platform
pub const EXPORT_COLUMNS: [(&str, &str); 18] = [
    ("Employee Address Line 1", "Street Address #1"),
    ("Employee Address Line 2", "Street Address #2"),
    ("Employee City", "City"),
    ("Employee State", "State"),
    ("Employee ZIP", "Zip Code"),
    ("Employee Telephone Number", "Phone"),
    ("Personal Email", "Email Address"),
    ("Work Email", "Secondary Email Address"),
    (HIRE_DATE, "Date of Hire"),
    (BIRTH_DATE, "Date of Birth"),
    (TERMINATION_DATE, "Date of Termination"),
    (SSN_COLUMN, "Social Security Number"),
    (PERIOD_GROSS_PAY, "Current Period Compensation"),
    (PERIOD_HOURS, "Current Period Hours"),
    ("Pre-tax Contribution", "Pre-tax Contribution Amount"),
    ("Roth Contribution", "Roth Contribution Amount"),
    ("Loan Repayment", "Loan Payment"),
    (YTD_HOURS, "YTD Hours"),
];

/// Columns the destination format requires but nothing here fills
pub const BLANK_EXPORT_COLUMNS: [&str; 3] = ["Date of Rehire", "Division", "Gross Salary"];

pub fn export_name(internal: &str) -> Option<&'static str> {
    EXPORT_COLUMNS
        .iter()
        .find(|(from, _)| *from == internal)
        .map(|(_, to)| *to)
}

/// Look a column up by its internal name or, once exported, its export name
pub fn resolve_column(table: &Table, internal: &str) -> Column {
    match table.column(internal) {
        Column::Present(idx) => Column::Present(idx),
        Column::Absent => match export_name(internal) {
            Some(external) => table.column(external),
            None => Column::Absent,
        },
    }
}

/// "{prefix}-{Company}-{YYYY-MM-DD}.csv"
pub fn output_file_name(prefix: &str, company: &str, pay_date: NaiveDate) -> String {
    format!("{}-{}-{}.csv", prefix, company, pay_date)
}

// ============================================================================
// RUN INPUTS / OUTPUTS
// ============================================================================

/// The three files one conversion reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFiles {
    pub census: PathBuf,
    pub payroll: PathBuf,
    pub identity_document: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub company: String,
    pub pay_date: NaiveDate,
    pub census_rows: usize,
    pub payroll_transactions: usize,
    pub payroll_employees: usize,
    pub identity_entries: usize,
    pub duplicate_ssns_dropped: usize,
    pub matched_names: usize,
    pub unresolved_names: Vec<String>,
    pub dropped_missing_ssn: usize,
    pub dropped_terminated: usize,
    pub output_rows: usize,
    pub generated_at: DateTime<Utc>,
}

impl ConversionReport {
    pub fn summary(&self) -> String {
        format!(
            "Conversion for {} (pay date {}): {} census rows, {} payroll employees, {}/{} names matched, {} rows dropped without SSN, {} dropped as long terminated, {} rows out",
            self.company,
            self.pay_date,
            self.census_rows,
            self.payroll_employees,
            self.matched_names,
            self.matched_names + self.unresolved_names.len(),
            self.dropped_missing_ssn,
            self.dropped_terminated,
            self.output_rows
        )
    }
}

/// The finished export and what it took to build it
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub company: String,
    pub pay_date: NaiveDate,
    pub table: Table,
    pub name_matches: Vec<NameSsnRecord>,
    pub report: ConversionReport,
}

impl Conversion {
    pub fn file_name(&self, prefix: &str) -> String {
        output_file_name(prefix, &self.company, self.pay_date)
    }

    /// Write the export CSV into `output_dir`, plus the JSON run report when
    /// `report` is given. Returns the CSV path.
    ///
    /// The report is serialized before anything is written, and the CSV is
    /// removed again if a later write fails: either both files exist or neither.
    pub fn write_outputs(&self, output_dir: &Path, prefix: &str, report: Option<&Path>) -> Result<PathBuf> {
        let report_json = report
            .map(|_| serde_json::to_string_pretty(&self.report))
            .transpose()?;

        fs::create_dir_all(output_dir)?;
        let output_path = output_dir.join(self.file_name(prefix));

        let written = File::create(&output_path)
            .map_err(ReconcileError::from)
            .and_then(|file| self.table.write_csv(file))
            .and_then(|()| match (report, report_json) {
                (Some(path), Some(json)) => fs::write(path, json).map_err(ReconcileError::from),
                _ => Ok(()),
            });
        if let Err(e) = written {
            let _ = fs::remove_file(&output_path);
            return Err(e);
        }

        info!("Wrote {} rows to {}", self.table.len(), output_path.display());
        Ok(output_path)
    }
}

// ============================================================================
// DRIVER
// ============================================================================

/// Read all three sources and convert them
pub fn run(sources: &SourceFiles, config: &PipelineConfig) -> Result<Conversion> {
    let census = CensusParser::new().parse(&sources.census)?;
    let document = DocumentParser::new().parse(&sources.identity_document)?;
    let payroll = PayrollParser::new().parse(&sources.payroll)?;
    convert(census, payroll, document, config)
}

/// Convert already-loaded sources
pub fn convert(
    census: CensusExport,
    payroll: PayrollExport,
    document: IdentityDocument,
    config: &PipelineConfig,
) -> Result<Conversion> {
    let pay_date = payroll
        .pay_date
        .ok_or_else(|| ReconcileError::format("payroll export has no check date"))?;
    let census_rows = census.table().len();

    let matcher = NameMatcher::new(census.canonical_names());
    let name_matches = matcher.match_all(&document.entries)?;
    let unresolved_names: Vec<String> = name_matches
        .iter()
        .filter(|r| !r.is_matched())
        .map(|r| r.matched_name.clone())
        .collect();
    info!(
        "Matched {} of {} identity document names",
        name_matches.len() - unresolved_names.len(),
        name_matches.len()
    );

    let census_table = census.enrich(&name_matches)?;
    let merged = merge_sources(&census_table, &payroll.table)?;
    let merged = normalize_date_columns(merged)?;
    let merged = add_contribution_columns(merged, &config.contributions, &config.source_tag)?;
    let (cleaned, stats) = final_cleanup(merged, pay_date, config.retention_days)?;
    let table = format_for_export(cleaned);

    info!("Conversion produced {} rows", table.len());

    let report = ConversionReport {
        company: document.company.clone(),
        pay_date,
        census_rows,
        payroll_transactions: payroll.transaction_rows,
        payroll_employees: payroll.table.len(),
        identity_entries: document.entries.len(),
        duplicate_ssns_dropped: document.entries.len() - name_matches.len(),
        matched_names: name_matches.len() - unresolved_names.len(),
        unresolved_names,
        dropped_missing_ssn: stats.dropped_missing_ssn,
        dropped_terminated: stats.dropped_terminated,
        output_rows: table.len(),
        generated_at: Utc::now(),
    };

    Ok(Conversion {
        company: document.company,
        pay_date,
        table,
        name_matches,
        report,
    })
}

// ============================================================================
// STAGES
// ============================================================================

/// Census ⟕ payroll on identity key; census rows without payroll are kept
pub fn merge_sources(census: &Table, payroll: &Table) -> Result<Table> {
    let merged = census.clone().left_join(payroll, XID_COLUMN)?;
    info!("Merged census and payroll into {} rows", merged.len());
    Ok(merged)
}

/// Rewrite the shared date columns as MM/DD/YYYY; blanks become null
pub fn normalize_date_columns(table: Table) -> Result<Table> {
    DATE_COLUMNS.iter().try_fold(table, |table, column| {
        table.convert(column, |value| {
            if value.is_blank() {
                return Ok(Value::Null);
            }
            Ok(Value::text(normalize_date(&value.to_string(), DATE_FORMAT)?))
        })
    })
}

/// Fold each mapping's source columns into its output column.
///
/// The output column is created zero-filled when missing. Consumed source
/// columns stay in the table, renamed "{source_tag} {column}".
pub fn add_contribution_columns(
    table: Table,
    mappings: &[ContributionMapping],
    source_tag: &str,
) -> Result<Table> {
    let mut table = table;
    for mapping in mappings {
        table = merge_columns(table, mapping, source_tag)?;
    }
    Ok(table)
}

fn merge_columns(table: Table, mapping: &ContributionMapping, source_tag: &str) -> Result<Table> {
    let output = mapping.output.as_str();
    let mut table = if table.has_column(output) {
        table
    } else {
        table.add_constant(output, Value::Number(0.0))
    };

    for alias in &mapping.aliases {
        if alias == output || !table.has_column(alias) {
            continue;
        }
        table = table.convert_with_record(output, |record| {
            let current = record.get(output).map_or(Ok(0.0), Value::amount_or_zero)?;
            let addition = record.get(alias).map_or(Ok(0.0), Value::amount_or_zero)?;
            Ok(Value::Number(current + addition))
        })?;
        table = table.rename(alias, &format!("{} {}", source_tag, alias));
    }

    Ok(table)
}

/// Rows removed by the cleanup filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub dropped_missing_ssn: usize,
    pub dropped_terminated: usize,
}

/// Steps 4–9: SSN filter, hour columns, unnamed columns, name column, gross
/// pay, retention. Running it on its own output changes nothing.
pub fn final_cleanup(table: Table, pay_date: NaiveDate, retention_days: i64) -> Result<(Table, CleanupStats)> {
    let mut stats = CleanupStats::default();

    let before = table.len();
    let table = drop_missing_ssn(table);
    stats.dropped_missing_ssn = before - table.len();

    let table = ensure_columns(table, &[PERIOD_HOURS, YTD_HOURS]);
    let table = table.cutout("").cutout(NAME_COLUMN);
    let table = gross_pay_column(table);

    let before = table.len();
    let table = drop_old_terminated(table, pay_date, retention_days);
    stats.dropped_terminated = before - table.len();

    info!(
        "Cleanup dropped {} rows without SSN and {} long-terminated rows",
        stats.dropped_missing_ssn, stats.dropped_terminated
    );
    Ok((table, stats))
}

pub fn drop_missing_ssn(table: Table) -> Table {
    match resolve_column(&table, SSN_COLUMN) {
        Column::Present(idx) => table.select(|record| !record.values()[idx].is_blank()),
        Column::Absent => table,
    }
}

/// Null-filled columns for any of `names` not already present
pub fn ensure_columns(table: Table, names: &[&str]) -> Table {
    names.iter().fold(table, |table, name| {
        if resolve_column(&table, name).is_present() {
            table
        } else {
            table.add_constant(name, Value::Null)
        }
    })
}

/// Regular pay becomes "Period Gross Pay"; without it the column is null
pub fn gross_pay_column(table: Table) -> Table {
    if table.has_column(REGULAR_EARNING) {
        table.rename(REGULAR_EARNING, PERIOD_GROSS_PAY)
    } else {
        ensure_columns(table, &[PERIOD_GROSS_PAY])
    }
}

/// Retention rule: drop rows terminated `days` or more from the pay date.
/// A missing termination date counts as 0 days, so the row stays.
pub fn drop_old_terminated(table: Table, pay_date: NaiveDate, days: i64) -> Table {
    let idx = match resolve_column(&table, TERMINATION_DATE) {
        Column::Present(idx) => idx,
        Column::Absent => return table,
    };
    table.select(|record| {
        let termination = record.values()[idx].to_string();
        let diff = date_diff_days(
            Some(DateInput::Parsed(pay_date)),
            Some(DateInput::Text(&termination)),
        )
        .unwrap_or(0);
        diff < days
    })
}

/// Rename to the destination's column names and add its blank columns
pub fn format_for_export(table: Table) -> Table {
    let renamed = EXPORT_COLUMNS
        .iter()
        .fold(table, |table, (from, to)| table.rename(from, to));
    BLANK_EXPORT_COLUMNS.iter().fold(renamed, |table, name| {
        if table.has_column(name) {
            table
        } else {
            table.add_constant(name, Value::Null)
        }
    })
}

// ============================================================================
// TESTS
// ============================================================================
