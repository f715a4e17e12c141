// 📋 Table - immutable tabular value passed between pipeline stages
//
// Census and payroll exports carry open-ended column sets (address fields,
// one column per deduction type), so stages work on an ordered header plus
// rows of loosely typed cells. Every transformation consumes the table and
// returns a new one; no stage mutates a shared table.

use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

// ============================================================================
// CELL VALUES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Null, or text that is empty after trimming
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Number(_) => false,
        }
    }

    /// Numeric coercion applied to exported amounts.
    ///
    /// Blank text becomes Null, numeric-looking text becomes a Number,
    /// anything else is left as text.
    pub fn coerce_number(self) -> Value {
        match self {
            Value::Text(s) => {
                if s.trim().is_empty() {
                    Value::Null
                } else if let Some(n) = parse_amount(&s) {
                    Value::Number(n)
                } else {
                    Value::Text(s)
                }
            }
            other => other,
        }
    }

    /// Amount with missing values counted as zero
    pub fn amount_or_zero(&self) -> Result<f64> {
        match self {
            Value::Null => Ok(0.0),
            Value::Number(n) => Ok(*n),
            Value::Text(s) if s.trim().is_empty() => Ok(0.0),
            Value::Text(s) => parse_amount(s)
                .ok_or_else(|| ReconcileError::format(format!("not an amount: '{}'", s))),
        }
    }

    /// String form used as a join key; blank values have no key
    pub fn key(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        Some(self.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => write!(f, "{}", s),
            // Rounded to strip float noise from summed amounts
            Value::Number(n) => write!(f, "{}", (n * 10_000.0).round() / 10_000.0),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Option<String>> for Value {
    fn from(s: Option<String>) -> Self {
        s.map(Value::Text).unwrap_or(Value::Null)
    }
}

/// Parse "1,234.50", "$12" or " 7 " as a number
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '$')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

// ============================================================================
// SCHEMA CAPABILITY
// ============================================================================

/// Result of looking a column up by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Present(usize),
    Absent,
}

impl Column {
    pub fn is_present(&self) -> bool {
        matches!(self, Column::Present(_))
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Column::Present(idx) => Some(*idx),
            Column::Absent => None,
        }
    }
}

// ============================================================================
// RECORD VIEW
// ============================================================================

/// Borrowed view of one row, addressable by column name
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    header: &'a [String],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        let idx = self.header.iter().position(|h| h == name)?;
        self.values.get(idx)
    }

    /// Cell as text; absent columns and nulls read as ""
    pub fn text(&self, name: &str) -> String {
        self.get(name).map(|v| v.to_string()).unwrap_or_default()
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table; short rows are padded with Null, long rows truncated
    pub fn new(header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = header.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Table { header, rows }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            ReconcileError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open file {}: {}", path.display(), e),
            ))
        })?;
        Self::from_csv_reader(file)
    }

    /// Read CSV text with a header row; every cell starts out as Text
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.iter().map(Value::from).collect());
        }

        Ok(Table::new(header, rows))
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Column {
        match self.header.iter().position(|h| h == name) {
            Some(idx) => Column::Present(idx),
            None => Column::Absent,
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_present()
    }

    /// Column index, or MissingColumn naming the source being read
    pub fn require_column(&self, name: &str, source_name: &str) -> Result<usize> {
        self.column(name)
            .index()
            .ok_or_else(|| ReconcileError::missing_column(source_name, name))
    }

    /// All values of one column, or None when the column is absent
    pub fn values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column(name).index()?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    // ========================================================================
    // TRANSFORMATIONS (each returns a new table)
    // ========================================================================

    pub fn skip(mut self, n: usize) -> Table {
        let n = n.min(self.rows.len());
        self.rows.drain(..n);
        self
    }

    /// Append a column computed from each row
    pub fn add_field<F>(mut self, name: &str, mut f: F) -> Result<Table>
    where
        F: FnMut(&Record) -> Result<Value>,
    {
        let mut computed = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let record = Record {
                header: &self.header,
                values: row,
            };
            computed.push(f(&record)?);
        }
        self.header.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(computed) {
            row.push(value);
        }
        Ok(self)
    }

    /// Append a column holding the same value in every row
    pub fn add_constant(self, name: &str, value: Value) -> Table {
        let mut table = self;
        table.header.push(name.to_string());
        for row in table.rows.iter_mut() {
            row.push(value.clone());
        }
        table
    }

    /// Overwrite `name` with computed values, appending it when absent
    pub fn upsert_field<F>(self, name: &str, f: F) -> Result<Table>
    where
        F: FnMut(&Record) -> Result<Value>,
    {
        match self.column(name) {
            Column::Absent => self.add_field(name, f),
            Column::Present(_) => self.convert_with_record(name, f),
        }
    }

    /// Replace each value of `name`; absent columns are left alone
    pub fn convert<F>(self, name: &str, mut f: F) -> Result<Table>
    where
        F: FnMut(&Value) -> Result<Value>,
    {
        let idx = match self.column(name) {
            Column::Present(idx) => idx,
            Column::Absent => return Ok(self),
        };
        let mut table = self;
        for row in table.rows.iter_mut() {
            let new_value = f(&row[idx])?;
            row[idx] = new_value;
        }
        Ok(table)
    }

    /// Replace each value of `name` using the whole row
    pub fn convert_with_record<F>(self, name: &str, mut f: F) -> Result<Table>
    where
        F: FnMut(&Record) -> Result<Value>,
    {
        let idx = match self.column(name) {
            Column::Present(idx) => idx,
            Column::Absent => return Ok(self),
        };
        let mut table = self;
        let header = &table.header;
        for row in table.rows.iter_mut() {
            let new_value = f(&Record {
                header,
                values: row.as_slice(),
            })?;
            row[idx] = new_value;
        }
        Ok(table)
    }

    /// Remove every column called `name`
    pub fn cutout(self, name: &str) -> Table {
        if !self.has_column(name) {
            return self;
        }
        let keep: Vec<bool> = self.header.iter().map(|h| h != name).collect();
        let header = self
            .header
            .into_iter()
            .zip(&keep)
            .filter_map(|(h, &k)| k.then_some(h))
            .collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&keep)
                    .filter_map(|(v, &k)| k.then_some(v))
                    .collect()
            })
            .collect();
        Table { header, rows }
    }

    pub fn rename(mut self, from: &str, to: &str) -> Table {
        for h in self.header.iter_mut() {
            if h == from {
                *h = to.to_string();
            }
        }
        self
    }

    pub fn select<F>(self, mut keep: F) -> Table
    where
        F: FnMut(&Record) -> bool,
    {
        let header = self.header;
        let rows = self
            .rows
            .into_iter()
            .filter(|row| {
                keep(&Record {
                    header: &header,
                    values: row,
                })
            })
            .collect();
        Table { header, rows }
    }

    /// Left join on `key`.
    ///
    /// Every left row survives in order; a left row matching several right rows
    /// is repeated once per match. Blank keys never match anything.
    pub fn left_join(self, right: &Table, key: &str) -> Result<Table> {
        let left_idx = self.require_column(key, "left side of join")?;
        let right_idx = right.require_column(key, "right side of join")?;

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, row) in right.rows.iter().enumerate() {
            if let Some(k) = row[right_idx].key() {
                index.entry(k).or_default().push(pos);
            }
        }

        let right_cols: Vec<usize> = (0..right.header.len()).filter(|&i| i != right_idx).collect();

        let mut header = self.header;
        header.extend(right_cols.iter().map(|&i| right.header[i].clone()));

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in self.rows {
            let matches = row[left_idx].key().and_then(|k| index.get(&k));
            match matches {
                Some(positions) => {
                    for &pos in positions {
                        let mut joined = row.clone();
                        joined.extend(right_cols.iter().map(|&i| right.rows[pos][i].clone()));
                        rows.push(joined);
                    }
                }
                None => {
                    let mut joined = row;
                    joined.extend(right_cols.iter().map(|_| Value::Null));
                    rows.push(joined);
                }
            }
        }

        Ok(Table { header, rows })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            vec!["id".into(), "name".into(), "amount".into()],
            vec![
                vec!["1".into(), "Ann".into(), "10.50".into()],
                vec!["2".into(), "Bob".into(), "".into()],
                vec!["".into(), "Orphan".into(), "3".into()],
            ],
        )
    }

    #[test]
    fn test_from_csv_reader_reads_header_and_rows() {
        let csv = "Employee Name,Birth Date\nthrowaway,\n\"Doe, John\",1/1/80\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap().skip(1);

        assert_eq!(table.header(), &["Employee Name".to_string(), "Birth Date".to_string()]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0][0], Value::text("Doe, John"));
    }

    #[test]
    fn test_column_capability() {
        let table = sample();
        assert_eq!(table.column("name"), Column::Present(1));
        assert_eq!(table.column("missing"), Column::Absent);
        assert!(table.values("missing").is_none());
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(Value::text("1,234.50").coerce_number(), Value::Number(1234.5));
        assert_eq!(Value::text("  ").coerce_number(), Value::Null);
        assert_eq!(Value::text("n/a").coerce_number(), Value::text("n/a"));
    }

    #[test]
    fn test_amount_or_zero() {
        assert_eq!(Value::Null.amount_or_zero().unwrap(), 0.0);
        assert_eq!(Value::text("").amount_or_zero().unwrap(), 0.0);
        assert_eq!(Value::text("$12.25").amount_or_zero().unwrap(), 12.25);
        assert!(Value::text("twelve").amount_or_zero().is_err());
    }

    #[test]
    fn test_number_display_strips_float_noise() {
        assert_eq!(Value::Number(1000.0).to_string(), "1000");
        assert_eq!(Value::Number(0.1 + 0.2).to_string(), "0.3");
        assert_eq!(Value::Number(150.25).to_string(), "150.25");
    }

    #[test]
    fn test_cutout_and_rename() {
        let table = sample().cutout("amount").rename("name", "Employee");
        assert_eq!(table.header(), &["id".to_string(), "Employee".to_string()]);
        assert_eq!(table.rows()[0].len(), 2);
    }

    #[test]
    fn test_cutout_absent_column_is_noop() {
        let table = sample();
        assert_eq!(table.clone().cutout("nope"), table);
    }

    #[test]
    fn test_convert_with_record() {
        let table = sample()
            .convert_with_record("amount", |r| {
                Ok(Value::text(format!("{}:{}", r.text("name"), r.text("amount"))))
            })
            .unwrap();
        assert_eq!(table.rows()[0][2], Value::text("Ann:10.50"));
    }

    #[test]
    fn test_upsert_overwrites_existing_column() {
        let table = sample().upsert_field("name", |_| Ok(Value::text("x"))).unwrap();
        assert_eq!(table.header().len(), 3);
        assert_eq!(table.rows()[1][1], Value::text("x"));
    }

    #[test]
    fn test_left_join_keeps_unmatched_and_skips_blank_keys() {
        let right = Table::new(
            vec!["id".into(), "score".into()],
            vec![
                vec!["1".into(), "A".into()],
                vec!["".into(), "should not join".into()],
            ],
        );
        let joined = sample().left_join(&right, "id").unwrap();

        assert_eq!(joined.len(), 3);
        assert_eq!(joined.header().last().unwrap(), "score");
        assert_eq!(joined.rows()[0][3], Value::text("A"));
        assert_eq!(joined.rows()[1][3], Value::Null);
        assert_eq!(joined.rows()[2][3], Value::Null);
    }

    #[test]
    fn test_left_join_repeats_multiple_matches() {
        let right = Table::new(
            vec!["id".into(), "score".into()],
            vec![vec!["1".into(), "A".into()], vec!["1".into(), "B".into()]],
        );
        let joined = sample().left_join(&right, "id").unwrap();
        assert_eq!(joined.len(), 4);
        assert_eq!(joined.rows()[1][3], Value::text("B"));
    }

    #[test]
    fn test_left_join_requires_key() {
        let right = Table::new(vec!["other".into()], vec![]);
        assert!(sample().left_join(&right, "id").is_err());
    }

    #[test]
    fn test_write_csv() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Number(2.0), Value::Null]],
        );
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a,b\n2,\n");
    }
}
