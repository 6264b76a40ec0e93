// ********* Input data structures ***********

use chrono::{DateTime, Utc};
use std::fmt::Display;

/// A decoded spreadsheet cell.
///
/// The decoding collaborator is responsible for turning the raw file into cells.
/// Blank cells may also show up as text that only contains whitespace.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Blank,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// True when the trimmed string representation of the cell is empty.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Blank => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) | Cell::Bool(_) => false,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Blank => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Cell {
        if s.is_empty() {
            Cell::Blank
        } else {
            Cell::Text(s.to_string())
        }
    }
}

/// One uploaded file, already decoded into rows of cells.
///
/// Row 0 is the header of the export.
#[derive(PartialEq, Debug, Clone)]
pub struct UploadedSheet {
    pub filename: String,
    /// The title of the worksheet the rows come from, when the format has one.
    pub sheet_title: Option<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl UploadedSheet {
    pub fn new(filename: &str, rows: Vec<Vec<Cell>>) -> UploadedSheet {
        UploadedSheet {
            filename: filename.to_string(),
            sheet_title: None,
            rows,
        }
    }

    pub fn with_title(self, title: &str) -> UploadedSheet {
        UploadedSheet {
            sheet_title: Some(title.to_string()),
            ..self
        }
    }
}

/// An entry of the form catalog.
///
/// The slug is unique across the catalog and never changes once assigned.
#[derive(PartialEq, Debug, Clone)]
pub struct FormRecord {
    pub slug: String,
    pub display_name: String,
    pub submission_count: u64,
    /// Maintained by the link redirection service, never by the reconciliation.
    pub click_count: u64,
    pub created_at: Option<DateTime<Utc>>,
}

impl FormRecord {
    pub fn new(slug: &str, display_name: &str, submission_count: u64) -> FormRecord {
        FormRecord {
            slug: slug.to_string(),
            display_name: display_name.to_string(),
            submission_count,
            click_count: 0,
            created_at: None,
        }
    }
}

// ******** Output data structures *********

/// The stage of the matcher that resolved an identity.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum MatchTier {
    /// The normalized name of a form is exactly the identity.
    ExactName,
    /// The normalized name of a form contains the identity.
    NormalizedName,
    /// The identity contains the normalized name of a form.
    /// Only used when `ReconcileOptions::reverse_contains` is set.
    FuzzyContains,
    NoMatch,
}

impl Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchTier::ExactName => "exactName",
            MatchTier::NormalizedName => "normalizedName",
            MatchTier::FuzzyContains => "fuzzyContains",
            MatchTier::NoMatch => "noMatch",
        };
        write!(f, "{}", s)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MatchResult {
    pub identity: String,
    pub matched_slug: Option<String>,
    pub tier: MatchTier,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        self.matched_slug.is_some()
    }
}

/// The write decided for one sheet, before it is applied to the catalog.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReconciliationIntent {
    pub slug: String,
    pub display_name: String,
    /// The identity derived from the file, kept so that operators can check the match.
    pub identity: String,
    pub new_count: u64,
    pub is_new_form: bool,
    /// The count stored before this upload. Absent for new forms.
    pub previous_count: Option<u64>,
    pub tier: MatchTier,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RejectReason {
    NoValidSubmissions,
    /// The file could not be decoded into rows.
    Unreadable(String),
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NoValidSubmissions => write!(f, "no valid submissions found"),
            RejectReason::Unreadable(msg) => write!(f, "could not read file: {}", msg),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RejectedSheet {
    pub filename: String,
    pub reason: RejectReason,
}

/// What happened to one file of an upload.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SheetOutcome {
    Accepted {
        filename: String,
        intent: ReconciliationIntent,
    },
    Rejected(RejectedSheet),
}

impl SheetOutcome {
    pub fn filename(&self) -> &str {
        match self {
            SheetOutcome::Accepted { filename, .. } => filename,
            SheetOutcome::Rejected(r) => &r.filename,
        }
    }
}

/// The decisions taken for a whole upload, in upload order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BatchPlan {
    pub outcomes: Vec<SheetOutcome>,
}

/// The result of an upload that reached the catalog.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<SheetOutcome>,
    /// Number of rows sent in the single batched write (0 if nothing was written).
    pub rows_written: usize,
    /// Number of times the catalog was read and the batch planned.
    pub attempts: u32,
}

// ********* Configuration **********

/// Which form wins when several forms satisfy the same matcher tier.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreak {
    /// The first form in the order returned by the catalog.
    CatalogOrder,
    /// The most recently created form. Forms created earlier in the same
    /// upload count as the most recent ones.
    MostRecent,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReconcileOptions {
    pub tie_break: TieBreak,
    /// Enables the `FuzzyContains` tier.
    pub reverse_contains: bool,
    /// How many times a failed write with a retryable error is planned again
    /// against a fresh catalog read.
    pub max_write_retries: u32,
}

impl ReconcileOptions {
    pub const DEFAULT_OPTIONS: ReconcileOptions = ReconcileOptions {
        tie_break: TieBreak::CatalogOrder,
        reverse_contains: false,
        max_write_retries: 2,
    };
}
