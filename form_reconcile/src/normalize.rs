//! Canonical identities for forms.
//!
//! File names produced by form providers carry a lot of noise: extensions,
//! duplicate counters such as `(1)` or `(1-2)`, and bare counters like `-1-1`.
//! The identity is what is left once all of this is removed.

use lazy_static::lazy_static;
use regex::Regex;

/// The normalized name of the default worksheet of a new workbook.
pub const DEFAULT_SHEET_LABEL: &str = "sheet1";

/// The identity used when neither the file name nor the sheet title carry one.
pub const FALLBACK_FORM_NAME: &str = "default form";

lazy_static! {
    static ref EXTENSION_SUFFIX: Regex = Regex::new(r"(?i)\.(xlsx|xlsm|xlsb|xls|ods|csv|tsv|txt)$").unwrap();
    static ref COUNTER_SUFFIX: Regex = Regex::new(r"\(\d+[-_\s]*\d*\)$").unwrap();
    static ref RANGE_SUFFIX: Regex = Regex::new(r"(?:[-_]\d+)+$").unwrap();
}

/// Normalizes a file name, sheet title or form name.
///
/// The result is lower case, without extension or trailing counters, and
/// uses single spaces as word separators. It never fails: an empty input
/// gives an empty output.
///
/// ```
/// use form_reconcile::normalize::normalize;
///
/// assert_eq!(normalize("Winter_Feedback (1-2).xlsx"), "winter feedback");
/// assert_eq!(normalize("Survey-A-1-1.xlsx"), "survey a");
/// ```
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped = strip_suffixes(&lowered);
    let spaced = stripped.replace(['-', '_'], " ");
    spaced.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Derives the identity of an uploaded sheet.
///
/// The file name is used first. When it gives nothing useful (empty, or the
/// name of a default worksheet), the sheet title is used instead.
pub fn derive_identity(filename: &str, sheet_title: Option<&str>) -> String {
    let from_file = normalize(filename);
    if !from_file.is_empty() && from_file != DEFAULT_SHEET_LABEL {
        return from_file;
    }
    let from_title = normalize(sheet_title.unwrap_or(""));
    if from_title.is_empty() {
        FALLBACK_FORM_NAME.to_string()
    } else {
        from_title
    }
}

// Removes the extension, then the parenthesized counter, then the bare range
// counter. Repeated until nothing changes so that stacked suffixes such as
// `(1) (2)` are all removed.
fn strip_suffixes(lowered: &str) -> &str {
    let mut current = trim_separators(lowered);
    loop {
        let mut next = cut(&EXTENSION_SUFFIX, current);
        next = cut(&COUNTER_SUFFIX, trim_separators(next));
        next = cut(&RANGE_SUFFIX, trim_separators(next));
        next = trim_separators(next);
        if next.len() == current.len() {
            return current;
        }
        current = next;
    }
}

fn cut<'a>(re: &Regex, s: &'a str) -> &'a str {
    match re.find(s) {
        Some(m) => &s[..m.start()],
        None => s,
    }
}

fn trim_separators(s: &str) -> &str {
    s.trim_end_matches(|c: char| c.is_whitespace() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_extension_and_counters() {
        assert_eq!(normalize("My Form (1-2).xlsx"), normalize("My Form"));
        assert_eq!(normalize("My Form (1-2).xlsx"), "my form");
        assert_eq!(normalize("Survey-A-1-1.xlsx"), "survey a");
        assert_eq!(normalize("Survey_A_3"), "survey a");
        assert_eq!(normalize("REPORT.XLSX"), "report");
        assert_eq!(normalize("Feedback (12).csv"), "feedback");
        assert_eq!(normalize("Feedback (1 2)"), "feedback");
        assert_eq!(normalize("Winter Feedback.tsv"), "winter feedback");
        assert_eq!(normalize("Winter Feedback.txt"), "winter feedback");
        assert_eq!(normalize("Winter Feedback.xlsb"), "winter feedback");
        assert_eq!(normalize("Winter Feedback (2).TSV"), "winter feedback");
    }

    #[test]
    fn collapses_separators() {
        assert_eq!(normalize("  Winter -- Feedback__Extra  "), "winter feedback extra");
        assert_eq!(normalize("a\tb\nc"), "a b c");
    }

    #[test]
    fn keeps_numbers_that_are_not_suffixes() {
        assert_eq!(normalize("Survey 2024"), "survey 2024");
        assert_eq!(normalize("Q3 results (draft)"), "q3 results (draft)");
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("-1-1.xlsx"), "");
        assert_eq!(normalize("(3)"), "");
    }

    #[test]
    fn idempotent() {
        let samples = [
            "My Form (1-2).xlsx",
            "a (1) (2)",
            "form (2)-1",
            "a (1)_",
            "a (1_2)",
            "a (1  2)",
            "a (1- 2)",
            "x.csv.xlsx",
            "Survey-A-1-1.xlsx",
            "  Mixed_CASE - name (4).XLSX ",
            "plain",
            "ünïcödé Förm (2)",
            "",
        ];
        for s in samples.iter() {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn identity_falls_back_to_sheet_title() {
        assert_eq!(
            derive_identity("Course Survey.xlsx", Some("Sheet1")),
            "course survey"
        );
        assert_eq!(
            derive_identity("Sheet1.xlsx", Some("Course_Survey")),
            "course survey"
        );
        assert_eq!(derive_identity("(1).xlsx", Some("Responses")), "responses");
        assert_eq!(derive_identity("", None), FALLBACK_FORM_NAME);
        assert_eq!(derive_identity("sheet1.csv", Some("  ")), FALLBACK_FORM_NAME);
    }
}
