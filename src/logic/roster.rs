//! Roster import (pasted text, spreadsheet CSV) and match-history export.

use crate::models::{MatchRecord, PlayerId, Side, Tier};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Attendance values that mark a roster row as present (compared case-insensitively).
pub const PRESENT_VALUES: [&str; 5] = ["出席", "有出席", "present", "yes", "y"];

#[derive(Debug)]
pub enum RosterError {
    Csv(csv::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for RosterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterError::Csv(e) => write!(f, "Invalid roster CSV: {}", e),
            RosterError::Io(e) => write!(f, "Failed to write CSV: {}", e),
        }
    }
}

impl std::error::Error for RosterError {}

impl From<csv::Error> for RosterError {
    fn from(e: csv::Error) -> Self {
        RosterError::Csv(e)
    }
}

impl From<std::io::Error> for RosterError {
    fn from(e: std::io::Error) -> Self {
        RosterError::Io(e)
    }
}

fn default_present() -> bool {
    true
}

/// One roster row handed to `RotationSession::import_roster`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub level: f64,
    /// Tier B when absent.
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default = "default_present")]
    pub present: bool,
}

impl RosterEntry {
    pub fn new(name: impl Into<String>, level: f64) -> Self {
        Self {
            name: name.into(),
            level,
            tier: None,
            present: true,
        }
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn absent(mut self) -> Self {
        self.present = false;
        self
    }
}

/// An input row that was not imported, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based line (or entry) number.
    pub line: usize,
    pub content: String,
    pub reason: String,
}

impl SkippedRow {
    pub fn new(line: usize, content: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            line,
            content: content.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of an import: who was added, what was skipped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterReport {
    pub imported: Vec<PlayerId>,
    pub skipped: Vec<SkippedRow>,
}

pub fn is_present(attendance: &str) -> bool {
    let value = attendance.trim();
    PRESENT_VALUES.iter().any(|p| p.eq_ignore_ascii_case(value))
}

/// Split a pasted line like `Alice3.5` or `Bob 4` into name and level.
/// Names may not contain digits, so `A1B2` is rejected.
pub fn parse_batch_line(line: &str) -> Option<(String, f64)> {
    let line = line.trim();
    let name = line.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
    let level = line[name.len()..].parse::<f64>().ok()?;
    let name = name.trim();
    if name.is_empty() || name.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((name.to_string(), level))
}

/// Parse pasted text, one `<name><level>` per line. Blank lines are ignored.
/// Entries come with their 1-based line number.
pub fn parse_batch_text(text: &str) -> (Vec<(usize, RosterEntry)>, Vec<SkippedRow>) {
    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_batch_line(line) {
            Some((name, level)) => entries.push((i + 1, RosterEntry::new(name, level))),
            None => skipped.push(SkippedRow::new(i + 1, line.trim(), "expected <name><level>")),
        }
    }
    (entries, skipped)
}

/// Column positions of a roster sheet, looked up by header name.
struct RosterColumns {
    name: usize,
    level: usize,
    attendance: Option<usize>,
    tier: Option<usize>,
}

impl RosterColumns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let find = |wanted: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(wanted))
        };
        match (find("name"), find("level")) {
            (Some(name), Some(level)) => Self {
                name,
                level,
                attendance: find("attendance"),
                tier: find("tier"),
            },
            // Unlabelled sheet: name, level, attendance, score, tier.
            _ => Self {
                name: 0,
                level: 1,
                attendance: Some(2),
                tier: Some(4),
            },
        }
    }
}

/// Parse a roster CSV with a header row. Rows that cannot be read are
/// skipped and reported; attendance is carried on each entry.
pub fn parse_roster_csv<R: Read>(reader: R) -> Result<(Vec<RosterEntry>, Vec<SkippedRow>), RosterError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = RosterColumns::from_headers(reader.headers()?);

    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    for (i, result) in reader.records().enumerate() {
        // Line 1 is the header.
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                skipped.push(SkippedRow::new(line, "", e.to_string()));
                continue;
            }
        };
        let content = record.iter().collect::<Vec<_>>().join(",");
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let name = record.get(columns.name).unwrap_or("").to_string();
        if name.is_empty() {
            skipped.push(SkippedRow::new(line, content, "missing name"));
            continue;
        }
        let Some(level) = record
            .get(columns.level)
            .and_then(|l| l.parse::<f64>().ok())
            .filter(|l| l.is_finite())
        else {
            skipped.push(SkippedRow::new(line, content, "invalid level"));
            continue;
        };
        let tier = match columns.tier.and_then(|t| record.get(t)) {
            None | Some("") => None,
            Some(t) => match Tier::parse(t) {
                Some(tier) => Some(tier),
                None => {
                    skipped.push(SkippedRow::new(line, content, "invalid tier"));
                    continue;
                }
            },
        };
        let present = columns
            .attendance
            .and_then(|a| record.get(a))
            .map_or(true, is_present);

        entries.push(RosterEntry {
            name,
            level,
            tier,
            present,
        });
    }
    Ok((entries, skipped))
}

fn format_duration(seconds: i64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Write finished matches as spreadsheet rows (court numbers 1-based).
pub fn write_history_csv<W: Write>(records: &[MatchRecord], writer: W) -> Result<(), RosterError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([
        "match_number",
        "date",
        "start_time",
        "end_time",
        "duration",
        "court",
        "team_a_1",
        "team_a_2",
        "team_b_1",
        "team_b_2",
    ])?;
    for record in records {
        let team_a = record.team(Side::A);
        let team_b = record.team(Side::B);
        writer.write_record([
            record.number.to_string(),
            record.start_time.format("%Y-%m-%d").to_string(),
            record.start_time.format("%H:%M:%S").to_string(),
            record.end_time.format("%H:%M:%S").to_string(),
            format_duration(record.duration_seconds()),
            (record.court + 1).to_string(),
            team_a[0].clone(),
            team_a[1].clone(),
            team_b[0].clone(),
            team_b[1].clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
