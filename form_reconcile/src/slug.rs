//! URL-safe identifiers for new forms.

use std::collections::HashSet;

use crate::normalize::normalize;

/// Used when a display name has no character that can appear in a slug.
const EMPTY_SLUG_BASE: &str = "form";

/// The slug a display name would get if it were free.
///
/// Words of the normalized name are joined with `-`. Only ASCII letters and
/// digits are kept, any other run of characters becomes a single `-`.
pub fn slug_base(display_name: &str) -> String {
    let normalized = normalize(display_name);
    let mut out = String::with_capacity(normalized.len());
    let mut last_dash = true;
    for ch in normalized.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        EMPTY_SLUG_BASE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Generates a slug that is not in `existing`.
///
/// The set is not modified: callers that generate several slugs for the same
/// upload must add each one to their working set before generating the next.
///
/// ```
/// use std::collections::HashSet;
/// use form_reconcile::slug::generate_slug;
///
/// let mut taken: HashSet<String> = HashSet::new();
/// let first = generate_slug("Course Survey", &taken);
/// taken.insert(first.clone());
/// let second = generate_slug("course-survey (1).xlsx", &taken);
/// assert_eq!(first, "course-survey");
/// assert_eq!(second, "course-survey-1");
/// ```
pub fn generate_slug(display_name: &str, existing: &HashSet<String>) -> String {
    let base = slug_base(display_name);
    if !existing.contains(&base) {
        return base;
    }
    let mut counter: u64 = 1;
    loop {
        let candidate = format!("{}-{}", base, counter);
        if !existing.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_is_url_safe() {
        assert_eq!(slug_base("Winter Feedback"), "winter-feedback");
        assert_eq!(slug_base("Q&A / Day 2"), "q-a-day-2");
        assert_eq!(slug_base("Café Survey"), "caf-survey");
        assert_eq!(slug_base("???"), "form");
        assert_eq!(slug_base(""), "form");
    }

    #[test]
    fn skips_taken_slugs() {
        let taken: HashSet<String> = ["survey-a", "survey-a-1", "survey-a-3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(generate_slug("Survey A", &taken), "survey-a-2");
        assert_eq!(generate_slug("Survey B", &taken), "survey-b");
    }

    #[test]
    fn distinct_within_a_batch() {
        let names = [
            "Survey A",
            "survey-a",
            "SURVEY_A (1).xlsx",
            "Survey A-1-1",
            "survey   a",
        ];
        let mut working: HashSet<String> = HashSet::new();
        let mut generated: Vec<String> = Vec::new();
        for n in names.iter() {
            let s = generate_slug(n, &working);
            working.insert(s.clone());
            generated.push(s);
        }
        let unique: HashSet<&String> = generated.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(generated[0], "survey-a");
        assert_eq!(generated[4], "survey-a-4");
    }
}
