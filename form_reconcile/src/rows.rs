//! Separates submissions from the noise found in spreadsheet exports.

use crate::config::Cell;

/// A row is a submission when at least one of its cells is not blank.
pub fn is_submission_row(row: &[Cell]) -> bool {
    row.iter().any(|c| !c.is_blank())
}

/// The rows of a decoded sheet, without the header row.
pub fn data_rows(matrix: &[Vec<Cell>]) -> &[Vec<Cell>] {
    matrix.get(1..).unwrap_or(&[])
}

/// Counts the submissions in rows that do not include the header.
///
/// Trailing blank rows are common in exports and are not counted. This is a
/// pure count, so it can be used for previews.
pub fn count_submissions(rows: &[Vec<Cell>]) -> u64 {
    rows.iter().filter(|row| is_submission_row(row)).count() as u64
}
