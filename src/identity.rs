// 🪪 Identity Normalizer - canonical names, dates and the cross-source key
//
// The identity key (XID) is the only join key between the census export and
// the payroll export. Every parser must derive it through EmployeeIdentity::xid
// so both sides produce byte-identical keys.

use crate::error::{ReconcileError, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Output format used everywhere a full date is rendered
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Output format used inside identity keys (two-digit year)
pub const KEY_DATE_FORMAT: &str = "%m/%d/%y";

static LEADING_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)/(\d+)/(\d+)").expect("leading date pattern is valid"));

static TRAILING_INITIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)\s[A-Za-z]$").expect("middle initial pattern is valid"));

// ============================================================================
// DATES
// ============================================================================

/// Parse the `M/D/Y` token `raw` starts with, ignoring anything after it.
///
/// Two digits after the last separator mean a two-digit year, which pivots
/// the same way strptime's `%y` does: 00-68 → 20xx, 69-99 → 19xx.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let caps = LEADING_DATE
        .captures(raw)
        .ok_or_else(|| ReconcileError::format(format!("no leading date in '{}'", raw)))?;

    let number = |idx: usize| -> Result<i32> {
        caps[idx]
            .parse::<i32>()
            .map_err(|_| ReconcileError::format(format!("date component out of range in '{}'", raw)))
    };

    let month = number(1)?;
    let day = number(2)?;
    let year_digits = &caps[3];
    let mut year = number(3)?;
    if year_digits.len() == 2 {
        year += if year < 69 { 2000 } else { 1900 };
    }

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .ok_or_else(|| ReconcileError::format(format!("not a calendar date: '{}'", raw)))
}

/// Normalize a date string to `output_format` (strftime syntax).
///
/// `normalize_date("3/4/99 garbage", "%m/%d/%Y") == "03/04/1999"`
pub fn normalize_date(raw: &str, output_format: &str) -> Result<String> {
    let date = parse_date(raw)?;
    format_date(date, output_format)
}

pub fn format_date(date: NaiveDate, output_format: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(output_format))
        .map_err(|_| ReconcileError::format(format!("invalid date format '{}'", output_format)))?;
    Ok(out)
}

/// A date that is either already parsed or still an `MM/DD/YYYY` string
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DateInput<'a> {
    Parsed(NaiveDate),
    Text(&'a str),
}

impl DateInput<'_> {
    fn resolve(&self) -> Option<NaiveDate> {
        match self {
            DateInput::Parsed(date) => Some(*date),
            DateInput::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
            }
        }
    }
}

impl From<NaiveDate> for DateInput<'_> {
    fn from(date: NaiveDate) -> Self {
        DateInput::Parsed(date)
    }
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(text: &'a str) -> Self {
        DateInput::Text(text)
    }
}

/// Absolute number of days between two dates.
///
/// Returns `None` when either side is absent, empty or not an `MM/DD/YYYY` date.
pub fn date_diff_days(date1: Option<DateInput>, date2: Option<DateInput>) -> Option<i64> {
    let first = date1?.resolve()?;
    let second = date2?.resolve()?;
    Some((second - first).num_days().abs())
}

// ============================================================================
// NAMES
// ============================================================================

/// Drop a trailing single-letter middle initial: "Smith Jr A" → "Smith Jr"
pub fn remove_middle_initial(name: &str) -> String {
    match TRAILING_INITIAL.captures(name) {
        Some(caps) => caps[1].trim().to_string(),
        None => name.trim().to_string(),
    }
}

// ============================================================================
// IDENTITY KEY
// ============================================================================

/// Cross-source identity key: "{name without middle initial} {MM/DD/YY}".
///
/// No birthdate means no key; the row can never be joined.
pub fn generate_identity_key(name: &str, birth_date_raw: &str) -> Result<Option<String>> {
    if birth_date_raw.trim().is_empty() {
        return Ok(None);
    }
    let date = normalize_date(birth_date_raw, KEY_DATE_FORMAT)?;
    Ok(Some(format!("{} {}", remove_middle_initial(name), date)))
}

/// EmployeeIdentity - name + birthdate, the inputs of the identity key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeIdentity {
    pub name: String,
    pub birth_date: Option<String>,
}

impl EmployeeIdentity {
    pub fn new(name: impl Into<String>, birth_date: Option<String>) -> Self {
        EmployeeIdentity {
            name: name.into(),
            birth_date,
        }
    }

    pub fn xid(&self) -> Result<Option<String>> {
        match &self.birth_date {
            Some(birth) => generate_identity_key(&self.name, birth),
            None => Ok(None),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
