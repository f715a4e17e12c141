// Payroll export: long-format rows, one per earning/deduction transaction.
//
// Rows are keyed by identity and check date, then pivoted into one wide row
// per employee: a column per deduction type, a column per earning type, and
// optionally the summed hours for the period.

use super::{read_export, row_identity, SourceParser, SourceType};
use crate::error::Result;
use crate::identity::parse_date;
use crate::matcher::NAME_COLUMN;
use crate::parser::census::{BIRTH_DATE, XID_COLUMN};
use crate::pivot::{recast, sum_by_key, Aggregate, Reducer, Reducers};
use crate::table::{Table, Value};
use chrono::NaiveDate;
use std::path::Path;
use tracing::{debug, info};

pub const CHECK_DATE: &str = "Payroll Check Date";
pub const EARNING_DESCRIPTION: &str = "Payroll Earning Description";
pub const EARNING_AMOUNT: &str = "Payroll Earning Amount";
pub const DEDUCTION_DESCRIPTION: &str = "Payroll Deduction Description";
pub const DEDUCTION_AMOUNT: &str = "Payroll Deduction Amount";
pub const EARNING_HOURS: &str = "Payroll Earning Hours";

/// Earning type whose amounts add up to gross pay
pub const REGULAR_EARNING: &str = "Regular";
pub const PERIOD_HOURS: &str = "Period Hours Worked";

const REQUIRED_COLUMNS: [&str; 7] = [
    NAME_COLUMN,
    BIRTH_DATE,
    CHECK_DATE,
    EARNING_DESCRIPTION,
    EARNING_AMOUNT,
    DEDUCTION_DESCRIPTION,
    DEDUCTION_AMOUNT,
];

pub struct PayrollParser;

impl PayrollParser {
    pub fn new() -> Self {
        PayrollParser
    }
}

impl Default for PayrollParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for PayrollParser {
    type Output = PayrollExport;

    fn parse(&self, file_path: &Path) -> Result<PayrollExport> {
        let raw = read_export(file_path)?;
        PayrollExport::from_raw(raw)
    }

    fn source_type(&self) -> SourceType {
        SourceType::Payroll
    }
}

/// Pivoted payroll: one row per employee plus the run's check date
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollExport {
    pub table: Table,
    pub pay_date: Option<NaiveDate>,
    pub transaction_rows: usize,
}

impl PayrollExport {
    pub fn from_raw(raw: Table) -> Result<Self> {
        for column in REQUIRED_COLUMNS {
            raw.require_column(column, SourceType::Payroll.name())?;
        }

        let pay_date = first_pay_date(&raw)?;
        let transaction_rows = raw.len();
        let keyed = prepare_transactions(raw)?;
        let table = pivot_transactions(&keyed)?;

        info!(
            "Pivoted {} payroll transactions into {} employee rows",
            transaction_rows,
            table.len()
        );

        Ok(PayrollExport {
            table,
            pay_date,
            transaction_rows,
        })
    }
}

/// The run's pay date: the first non-empty check date in the export.
/// Only one check date per run is modelled.
pub fn first_pay_date(raw: &Table) -> Result<Option<NaiveDate>> {
    let first = raw
        .values(CHECK_DATE)
        .and_then(|values| values.into_iter().find(|v| !v.is_blank()).cloned());
    match first {
        Some(value) => Ok(Some(parse_date(&value.to_string())?)),
        None => Ok(None),
    }
}

/// Tag percent-style deduction labels as amounts, derive identity keys and
/// coerce amounts to numbers.
fn prepare_transactions(raw: Table) -> Result<Table> {
    raw.convert(DEDUCTION_DESCRIPTION, |v| Ok(Value::text(v.to_string().replace(" %", " $"))))?
        .upsert_field(XID_COLUMN, |record| {
            Ok(Value::from(row_identity(record).xid()?))
        })?
        .convert(EARNING_AMOUNT, |v| Ok(v.clone().coerce_number()))?
        .convert(DEDUCTION_AMOUNT, |v| Ok(v.clone().coerce_number()))
}

/// Deductions ⟕ earnings ⟕ hours, all keyed by identity
fn pivot_transactions(keyed: &Table) -> Result<Table> {
    let key = [XID_COLUMN, CHECK_DATE];

    let earning_reducers = Reducers::last_value().with(REGULAR_EARNING, Reducer::Sum);
    let earnings = recast(keyed, &key, EARNING_DESCRIPTION, EARNING_AMOUNT, &earning_reducers)?
        .cutout(CHECK_DATE);

    let deductions = recast(
        keyed,
        &key,
        DEDUCTION_DESCRIPTION,
        DEDUCTION_AMOUNT,
        &Reducers::last_value(),
    )?;

    let mut wide = deductions.left_join(&earnings, XID_COLUMN)?;

    match sum_by_key(keyed, XID_COLUMN, EARNING_HOURS, PERIOD_HOURS)? {
        Aggregate::Present(hours) => wide = wide.left_join(&hours, XID_COLUMN)?,
        Aggregate::Absent => debug!("No '{}' column; hours default later", EARNING_HOURS),
    }

    Ok(wide)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Employee Name,Birth Date,Payroll Check Date,Payroll Earning Description,Payroll Earning Amount,Payroll Deduction Description,Payroll Deduction Amount";

    fn export(body: &str) -> PayrollExport {
        let csv = format!("{}\n{}", HEADER, body);
        PayrollExport::from_raw(Table::from_csv_reader(csv.as_bytes()).unwrap()).unwrap()
    }

    fn cell<'a>(table: &'a Table, row: usize, column: &str) -> &'a Value {
        &table.rows()[row][table.column(column).index().unwrap()]
    }

    #[test]
    fn test_regular_rows_are_summed() {
        let payroll = export(
            "\"Doe, John\",1/1/80,3/15/2024,Regular,100.00,401K %,10\n\
             \"Doe, John\",1/1/80,3/15/2024,Regular,50.00,Roth,5\n",
        );

        assert_eq!(payroll.table.len(), 1);
        assert_eq!(cell(&payroll.table, 0, REGULAR_EARNING), &Value::Number(150.0));
        assert_eq!(cell(&payroll.table, 0, XID_COLUMN), &Value::text("Doe, John 01/01/80"));
    }

    #[test]
    fn test_row_without_birth_date_pivots_into_orphan_row() {
        let payroll = export(
            "\"Doe, John\",1/1/80,3/15/2024,Regular,100,401K %,10\n\
             \"Roe, Jane\",,3/15/2024,Regular,200,Roth,5\n",
        );

        assert_eq!(payroll.table.len(), 2);
        assert_eq!(cell(&payroll.table, 0, XID_COLUMN), &Value::text("Doe, John 01/01/80"));
        assert_eq!(cell(&payroll.table, 1, XID_COLUMN), &Value::Null);
        assert_eq!(cell(&payroll.table, 1, "Roth"), &Value::Number(5.0));
        // blank keys never join, so the orphan's earnings stay behind
        assert_eq!(cell(&payroll.table, 1, REGULAR_EARNING), &Value::Null);
    }

    #[test]
    fn test_percent_deduction_labels_become_amount_labels() {
        let payroll = export("\"Doe, John\",1/1/80,3/15/2024,Regular,100,401K %,10\n");

        assert!(payroll.table.has_column("401K $"));
        assert!(!payroll.table.has_column("401K %"));
        assert_eq!(cell(&payroll.table, 0, "401K $"), &Value::Number(10.0));
    }

    #[test]
    fn test_pay_date_is_first_non_empty_check_date() {
        let payroll = export(
            "\"Doe, John\",1/1/80,,Bonus,5,,\n\
             \"Doe, John\",1/1/80,3/15/24,Regular,100,,\n",
        );
        assert_eq!(payroll.pay_date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn test_hours_absent_without_hours_column() {
        let payroll = export("\"Doe, John\",1/1/80,3/15/2024,Regular,100,,\n");
        assert!(!payroll.table.has_column(PERIOD_HOURS));
    }

    #[test]
    fn test_hours_summed_per_employee() {
        let csv = format!(
            "{},Payroll Earning Hours\n{}\n{}\n",
            HEADER,
            "\"Doe, John\",1/1/80,3/15/2024,Regular,100,,,40",
            "\"Doe, John\",1/1/80,3/15/2024,Overtime,30,,,2.5"
        );
        let payroll = PayrollExport::from_raw(Table::from_csv_reader(csv.as_bytes()).unwrap()).unwrap();

        assert_eq!(cell(&payroll.table, 0, PERIOD_HOURS), &Value::Number(42.5));
        assert_eq!(cell(&payroll.table, 0, "Overtime"), &Value::Number(30.0));
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "Employee Name,Birth Date\n\"Doe, John\",1/1/80\n";
        let raw = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert!(PayrollExport::from_raw(raw).is_err());
    }

    #[test]
    fn test_malformed_birth_date_is_fatal() {
        let csv = format!("{}\n\"Doe, John\",soon,3/15/2024,Regular,1,,\n", HEADER);
        let raw = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert!(PayrollExport::from_raw(raw).is_err());
    }
}
