// 🔄 Pivot Engine - long transaction rows → wide per-employee columns
//
// A payroll export has one row per (employee, check date, transaction type).
// recast() turns each distinct transaction type into its own column; when
// several rows land in the same cell the column's reducer decides the value.

use crate::error::Result;
use crate::table::{Table, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// REDUCERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reducer {
    /// Add every value (blank counts as zero)
    Sum,
    /// Keep the value of the last row seen
    Last,
}

impl Reducer {
    fn reduce(&self, values: Vec<Value>) -> Result<Value> {
        match self {
            Reducer::Sum => {
                let mut total = 0.0;
                for value in &values {
                    total += value.amount_or_zero()?;
                }
                Ok(Value::Number(total))
            }
            Reducer::Last => Ok(values.into_iter().last().unwrap_or(Value::Null)),
        }
    }
}

/// Reducer per output column, with a fallback for unlisted columns
#[derive(Debug, Clone)]
pub struct Reducers {
    default: Reducer,
    by_column: HashMap<String, Reducer>,
}

impl Reducers {
    pub fn last_value() -> Self {
        Reducers {
            default: Reducer::Last,
            by_column: HashMap::new(),
        }
    }

    /// Builder pattern: override the reducer for one column
    pub fn with(mut self, column: impl Into<String>, reducer: Reducer) -> Self {
        self.by_column.insert(column.into(), reducer);
        self
    }

    pub fn for_column(&self, column: &str) -> Reducer {
        self.by_column.get(column).copied().unwrap_or(self.default)
    }
}

impl Default for Reducers {
    fn default() -> Self {
        Self::last_value()
    }
}

// ============================================================================
// RECAST
// ============================================================================

/// Pivot `variable_field`/`value_field` pairs into columns, one row per key.
///
/// Output header is the key fields followed by each distinct variable in order
/// of first appearance. Groups keep the order in which their key first appears.
/// Cells with no source row are Null.
pub fn recast(
    table: &Table,
    key: &[&str],
    variable_field: &str,
    value_field: &str,
    reducers: &Reducers,
) -> Result<Table> {
    let key_idx: Vec<usize> = key
        .iter()
        .map(|k| table.require_column(k, "pivot input"))
        .collect::<Result<_>>()?;
    let var_idx = table.require_column(variable_field, "pivot input")?;
    let val_idx = table.require_column(value_field, "pivot input")?;

    let mut groups: Vec<Vec<Value>> = Vec::new();
    let mut group_lookup: HashMap<Vec<String>, usize> = HashMap::new();
    let mut variables: Vec<String> = Vec::new();
    let mut variable_lookup: HashMap<String, usize> = HashMap::new();
    let mut cells: HashMap<(usize, usize), Vec<Value>> = HashMap::new();

    for row in table.rows() {
        let group_key: Vec<String> = key_idx.iter().map(|&i| row[i].to_string()).collect();
        let group = match group_lookup.get(&group_key) {
            Some(&g) => g,
            None => {
                groups.push(key_idx.iter().map(|&i| row[i].clone()).collect());
                group_lookup.insert(group_key, groups.len() - 1);
                groups.len() - 1
            }
        };

        let variable = row[var_idx].to_string();
        let var = match variable_lookup.get(&variable) {
            Some(&v) => v,
            None => {
                variables.push(variable.clone());
                variable_lookup.insert(variable, variables.len() - 1);
                variables.len() - 1
            }
        };

        cells.entry((group, var)).or_default().push(row[val_idx].clone());
    }

    let mut header: Vec<String> = key.iter().map(|k| k.to_string()).collect();
    header.extend(variables.iter().cloned());

    let mut rows = Vec::with_capacity(groups.len());
    for (g, key_values) in groups.into_iter().enumerate() {
        let mut row = key_values;
        for (v, variable) in variables.iter().enumerate() {
            let value = match cells.remove(&(g, v)) {
                Some(values) => reducers.for_column(variable).reduce(values)?,
                None => Value::Null,
            };
            row.push(value);
        }
        rows.push(row);
    }

    Ok(Table::new(header, rows))
}

// ============================================================================
// KEYED SUM
// ============================================================================

/// Outcome of an aggregation over a column the source may not carry
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Present(Table),
    Absent,
}

/// Sum `value_field` per distinct `key` into a two-column table
/// `[key, output_field]`. Blank values count as zero.
pub fn sum_by_key(table: &Table, key: &str, value_field: &str, output_field: &str) -> Result<Aggregate> {
    let val_idx = match table.column(value_field).index() {
        Some(idx) => idx,
        None => return Ok(Aggregate::Absent),
    };
    let key_idx = table.require_column(key, "aggregation input")?;

    let mut order: Vec<Value> = Vec::new();
    let mut totals: HashMap<String, f64> = HashMap::new();

    for row in table.rows() {
        let group = row[key_idx].to_string();
        let amount = row[val_idx].amount_or_zero()?;
        match totals.get_mut(&group) {
            Some(total) => *total += amount,
            None => {
                order.push(row[key_idx].clone());
                totals.insert(group, amount);
            }
        }
    }

    let rows = order
        .into_iter()
        .map(|k| {
            let total = totals.get(&k.to_string()).copied().unwrap_or(0.0);
            vec![k, Value::Number(total)]
        })
        .collect();

    Ok(Aggregate::Present(Table::new(
        vec![key.to_string(), output_field.to_string()],
        rows,
    )))
}

// ============================================================================
// TESTS
// ============================================================================
