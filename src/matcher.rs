// 🔍 Name Matcher - reconcile benefits-statement names with census names
//
// The identity document prints names as "LAST,FIRSTM" / "Last,FirstM" with the
// middle initial glued onto the first name. Each raw name is run through an
// ordered cascade of candidate strategies and the first candidate found in the
// census name list wins. Misses are soft: the last candidate is kept and the
// SSN is carried through regardless.

use crate::error::{ReconcileError, Result};
use crate::identity::remove_middle_initial;
use crate::table::{Table, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

pub const NAME_COLUMN: &str = "Employee Name";
pub const SSN_COLUMN: &str = "SSN";
pub const FIRST_NAME_COLUMN: &str = "First Name";
pub const LAST_NAME_COLUMN: &str = "Last Name";

// ============================================================================
// INPUT / OUTPUT RECORDS
// ============================================================================

/// One name/identifier pair as printed in the identity document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNameEntry {
    pub raw_name: String,
    pub ssn: String,
}

impl RawNameEntry {
    pub fn new(raw_name: impl Into<String>, ssn: impl Into<String>) -> Self {
        RawNameEntry {
            raw_name: raw_name.into(),
            ssn: ssn.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Found in the census list by this strategy
    Matched(CandidateStrategy),
    /// Cascade exhausted; `matched_name` holds the last candidate tried
    Unresolved,
}

/// NameSsnRecord - best-effort census name for one identity document entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameSsnRecord {
    pub matched_name: String,
    pub ssn: String,
    pub first_name: String,
    pub last_name: String,
    pub outcome: MatchOutcome,
}

impl NameSsnRecord {
    pub fn is_matched(&self) -> bool {
        matches!(self.outcome, MatchOutcome::Matched(_))
    }
}

// ============================================================================
// NAME PARTS
// ============================================================================

/// A raw "Last,First" name split on its first comma
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts {
    pub raw: String,
    pub last: String,
    pub first: String,
}

impl NameParts {
    pub fn parse(raw: &str) -> Result<Self> {
        let without_initial = remove_middle_initial(raw);
        let (last, first) = without_initial.split_once(',').ok_or_else(|| {
            ReconcileError::format(format!("name '{}' is not in 'Last,First' form", raw))
        })?;
        Ok(NameParts {
            raw: raw.trim().to_string(),
            last: last.trim().to_string(),
            first: first.trim().to_string(),
        })
    }

    /// All cased characters uppercase, and at least one of them
    pub fn first_is_shouted(&self) -> bool {
        self.first.chars().any(|c| c.is_uppercase()) && !self.first.chars().any(|c| c.is_lowercase())
    }

    fn first_ends_uppercase(&self) -> bool {
        self.first.chars().last().is_some_and(char::is_uppercase)
    }
}

// ============================================================================
// CANDIDATE STRATEGIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateStrategy {
    /// The raw name exactly as printed
    AsWritten,
    /// "Last, First" with no middle initial
    WithoutMiddleInitial,
    /// Last character of the first name is a glued-on middle initial: "Last, Firs T"
    TrailingInitial,
}

/// A name to look up, plus the first name it implies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub first_name: String,
}

impl CandidateStrategy {
    pub fn candidate(&self, parts: &NameParts) -> Option<Candidate> {
        match self {
            CandidateStrategy::AsWritten => Some(Candidate {
                name: parts.raw.clone(),
                first_name: parts.first.clone(),
            }),
            CandidateStrategy::WithoutMiddleInitial => Some(Candidate {
                name: format!("{}, {}", parts.last, parts.first),
                first_name: parts.first.clone(),
            }),
            CandidateStrategy::TrailingInitial => {
                let mut chars = parts.first.chars();
                let initial = chars.next_back()?;
                let first: String = chars.collect();
                if first.is_empty() {
                    return None;
                }
                Some(Candidate {
                    name: format!("{}, {} {}", parts.last, first, initial),
                    first_name: first,
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CandidateStrategy::AsWritten => "as written",
            CandidateStrategy::WithoutMiddleInitial => "without middle initial",
            CandidateStrategy::TrailingInitial => "trailing middle initial",
        }
    }
}

/// Ordered strategies to try once the raw name itself has missed.
///
/// A shouted first name ("JANEB") may or may not carry an initial, so both
/// readings are tried, plain first. A mixed-case first name ending in a
/// capital ("JaneB") is read as carrying one; otherwise it is used as is.
pub fn cascade_for(parts: &NameParts) -> Vec<CandidateStrategy> {
    if parts.first_is_shouted() {
        vec![CandidateStrategy::WithoutMiddleInitial, CandidateStrategy::TrailingInitial]
    } else if parts.first_ends_uppercase() {
        vec![CandidateStrategy::TrailingInitial]
    } else {
        vec![CandidateStrategy::WithoutMiddleInitial]
    }
}

// ============================================================================
// CANONICAL NAME LIST
// ============================================================================

/// Census employee names, looked up ignoring case and spacing
#[derive(Debug, Clone, Default)]
pub struct CanonicalNames {
    by_folded: HashMap<String, String>,
}

fn fold(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl CanonicalNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_folded = HashMap::new();
        for name in names {
            let name = name.as_ref();
            if name.trim().is_empty() {
                continue;
            }
            by_folded.entry(fold(name)).or_insert_with(|| name.to_string());
        }
        CanonicalNames { by_folded }
    }

    /// Census spelling of `name`, if the census has it
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.by_folded.get(&fold(name)).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_folded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_folded.is_empty()
    }
}

// ============================================================================
// NAME MATCHER
// ============================================================================

pub struct NameMatcher {
    canonical: CanonicalNames,
}

impl NameMatcher {
    pub fn new(canonical: CanonicalNames) -> Self {
        if canonical.is_empty() {
            warn!("Census has no employee names; every identity document name will be unresolved");
        } else {
            debug!("Matching against {} census names", canonical.len());
        }
        NameMatcher { canonical }
    }

    /// Resolve one entry. Only a name without a comma is an error.
    pub fn match_entry(&self, entry: &RawNameEntry) -> Result<NameSsnRecord> {
        let parts = NameParts::parse(&entry.raw_name)?;

        let found = |candidate: &Candidate, strategy: CandidateStrategy, canonical: &str| {
            info!("name {} found in employee names", canonical);
            NameSsnRecord {
                matched_name: canonical.to_string(),
                ssn: entry.ssn.clone(),
                first_name: candidate.first_name.clone(),
                last_name: parts.last.clone(),
                outcome: MatchOutcome::Matched(strategy),
            }
        };

        if let Some(as_written) = CandidateStrategy::AsWritten.candidate(&parts) {
            if let Some(canonical) = self.canonical.lookup(&as_written.name) {
                return Ok(found(&as_written, CandidateStrategy::AsWritten, canonical));
            }
        }
        debug!("name {} NOT found in employee names", parts.raw);

        let mut last_attempt: Option<Candidate> = None;
        for strategy in cascade_for(&parts) {
            let candidate = match strategy.candidate(&parts) {
                Some(c) => c,
                None => continue,
            };
            if let Some(canonical) = self.canonical.lookup(&candidate.name) {
                return Ok(found(&candidate, strategy, canonical));
            }
            debug!("name {} NOT found in employee names ({})", candidate.name, strategy.name());
            last_attempt = Some(candidate);
        }

        let fallback = last_attempt.unwrap_or(Candidate {
            name: parts.raw.clone(),
            first_name: parts.first.clone(),
        });
        warn!(
            "name {} NOT found in employee names; keeping best guess '{}'",
            entry.raw_name, fallback.name
        );

        Ok(NameSsnRecord {
            matched_name: fallback.name,
            ssn: entry.ssn.clone(),
            first_name: fallback.first_name,
            last_name: parts.last,
            outcome: MatchOutcome::Unresolved,
        })
    }

    /// Resolve every entry, then keep the first record per SSN
    pub fn match_all(&self, entries: &[RawNameEntry]) -> Result<Vec<NameSsnRecord>> {
        let records = entries
            .iter()
            .map(|entry| self.match_entry(entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(dedup_by_ssn(records))
    }
}

/// First occurrence of each SSN wins
pub fn dedup_by_ssn(records: Vec<NameSsnRecord>) -> Vec<NameSsnRecord> {
    let mut seen = HashSet::new();
    let before = records.len();
    let kept: Vec<NameSsnRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.ssn.clone()))
        .collect();
    if kept.len() < before {
        info!("Dropped {} duplicate SSN entries", before - kept.len());
    }
    kept
}

/// Join-ready table: Employee Name, SSN, First Name, Last Name
pub fn records_to_table(records: &[NameSsnRecord]) -> Table {
    let header = vec![
        NAME_COLUMN.to_string(),
        SSN_COLUMN.to_string(),
        FIRST_NAME_COLUMN.to_string(),
        LAST_NAME_COLUMN.to_string(),
    ];
    let rows = records
        .iter()
        .map(|r| {
            vec![
                Value::text(r.matched_name.as_str()),
                Value::text(r.ssn.as_str()),
                Value::text(r.first_name.as_str()),
                Value::text(r.last_name.as_str()),
            ]
        })
        .collect();
    Table::new(header, rows)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(names: &[&str]) -> NameMatcher {
        NameMatcher::new(CanonicalNames::new(names.iter().copied()))
    }

    #[test]
    fn test_parse_splits_on_first_comma() {
        let parts = NameParts::parse("SMITH,JANE B").unwrap();
        assert_eq!(parts.last, "SMITH");
        assert_eq!(parts.first, "JANE");
        assert_eq!(parts.raw, "SMITH,JANE B");
    }

    #[test]
    fn test_parse_rejects_missing_comma() {
        let err = NameParts::parse("JANE SMITH").unwrap_err();
        assert!(matches!(err, ReconcileError::Format(_)));
    }

    #[test]
    fn test_strategy_without_middle_initial() {
        let parts = NameParts::parse("DOE,JOHN").unwrap();
        let c = CandidateStrategy::WithoutMiddleInitial.candidate(&parts).unwrap();
        assert_eq!(c.name, "DOE, JOHN");
    }

    #[test]
    fn test_strategy_trailing_initial() {
        let parts = NameParts::parse("Smith,JaneB").unwrap();
        let c = CandidateStrategy::TrailingInitial.candidate(&parts).unwrap();
        assert_eq!(c.name, "Smith, Jane B");
        assert_eq!(c.first_name, "Jane");
    }

    #[test]
    fn test_strategy_trailing_initial_needs_two_letters() {
        let parts = NameParts::parse("Smith,J").unwrap();
        assert!(CandidateStrategy::TrailingInitial.candidate(&parts).is_none());
    }

    #[test]
    fn test_cascade_order() {
        let shouted = NameParts::parse("SMITH,JANEB").unwrap();
        assert_eq!(
            cascade_for(&shouted),
            vec![CandidateStrategy::WithoutMiddleInitial, CandidateStrategy::TrailingInitial]
        );

        let glued = NameParts::parse("Smith,JaneB").unwrap();
        assert_eq!(cascade_for(&glued), vec![CandidateStrategy::TrailingInitial]);

        let plain = NameParts::parse("Smith,Jane").unwrap();
        assert_eq!(cascade_for(&plain), vec![CandidateStrategy::WithoutMiddleInitial]);
    }

    #[test]
    fn test_shouted_name_with_glued_initial_resolves() {
        let m = matcher(&["Smith, Jane B"]);
        let record = m.match_entry(&RawNameEntry::new("SMITH,JANEB", "111-22-3333")).unwrap();

        assert_eq!(record.matched_name, "Smith, Jane B");
        assert_eq!(record.outcome, MatchOutcome::Matched(CandidateStrategy::TrailingInitial));
        assert!(record.is_matched());
    }

    #[test]
    fn test_shouted_name_without_initial_resolves_first() {
        let m = matcher(&["Doe, John", "Doe, Joh N"]);
        let record = m.match_entry(&RawNameEntry::new("DOE,JOHN", "123-45-6789")).unwrap();

        assert_eq!(record.matched_name, "Doe, John");
        assert_eq!(record.outcome, MatchOutcome::Matched(CandidateStrategy::WithoutMiddleInitial));
    }

    #[test]
    fn test_exact_name_accepted_as_written() {
        let m = matcher(&["Lee, Ann"]);
        let record = m.match_entry(&RawNameEntry::new("Lee, Ann", "1")).unwrap();
        assert_eq!(record.outcome, MatchOutcome::Matched(CandidateStrategy::AsWritten));
    }

    #[test]
    fn test_unmatched_name_still_produces_record() {
        let m = matcher(&["Doe, John"]);
        let record = m.match_entry(&RawNameEntry::new("NOBODY,KNOWNX", "999-99-9999")).unwrap();

        assert_eq!(record.outcome, MatchOutcome::Unresolved);
        assert_eq!(record.matched_name, "NOBODY, KNOWN X");
        assert_eq!(record.ssn, "999-99-9999");
    }

    #[test]
    fn test_match_all_one_record_per_entry_then_dedup() {
        let m = matcher(&["Doe, John"]);
        let entries = vec![
            RawNameEntry::new("DOE,JOHN", "123-45-6789"),
            RawNameEntry::new("Stranger,Someone", "555-55-5555"),
            RawNameEntry::new("DOE,JOHNNY", "123-45-6789"),
        ];
        let records = m.match_all(&entries).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].matched_name, "Doe, John");
        assert_eq!(records[1].ssn, "555-55-5555");
        assert_eq!(records[1].matched_name, "Stranger, Someone");
        assert_eq!(records[1].outcome, MatchOutcome::Unresolved);
    }

    #[test]
    fn test_unmatched_mixed_case_name_keeps_attempted_spelling() {
        let m = matcher(&["Doe, John"]);

        let plain = m.match_entry(&RawNameEntry::new("Stranger,Someone", "1")).unwrap();
        assert_eq!(plain.outcome, MatchOutcome::Unresolved);
        assert_eq!(plain.matched_name, "Stranger, Someone");

        let glued = m.match_entry(&RawNameEntry::new("Stranger,SomeoneX", "2")).unwrap();
        assert_eq!(glued.outcome, MatchOutcome::Unresolved);
        assert_eq!(glued.matched_name, "Stranger, Someone X");
    }

    #[test]
    fn test_empty_census_resolves_nothing() {
        let canonical = CanonicalNames::new(["", "  "]);
        assert!(canonical.is_empty());

        let record = NameMatcher::new(canonical)
            .match_entry(&RawNameEntry::new("DOE,JOHN", "1"))
            .unwrap();
        assert_eq!(record.outcome, MatchOutcome::Unresolved);
    }

    #[test]
    fn test_records_to_table() {
        let m = matcher(&["Doe, John"]);
        let records = m.match_all(&[RawNameEntry::new("DOE,JOHN", "123-45-6789")]).unwrap();
        let table = records_to_table(&records);

        assert_eq!(table.header()[0], NAME_COLUMN);
        assert_eq!(table.rows()[0][1], Value::text("123-45-6789"));
        assert_eq!(table.rows()[0][3], Value::text("DOE"));
    }
}
