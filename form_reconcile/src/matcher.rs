//! Resolves an identity against the forms of the catalog.
//!
//! The tiers are tried in order and the first hit wins:
//! - `ExactName`: the normalized name of the form is the identity
//! - `NormalizedName`: the normalized name of the form contains the identity
//! - `FuzzyContains` (opt-in): the identity contains the normalized name of the form
//!
//! Within a tier, the first form in the order of the given slice wins. Callers
//! that prefer the most recent form sort the slice beforehand.

use log::debug;

use crate::config::{FormRecord, MatchResult, MatchTier};
use crate::normalize::normalize;

/// Matches with the default tiers (`ExactName` then `NormalizedName`).
pub fn match_form(identity: &str, catalog: &[FormRecord]) -> MatchResult {
    match_form_with(identity, catalog, false)
}

/// Matches an identity, optionally allowing the `FuzzyContains` tier.
///
/// An empty identity never matches anything.
pub fn match_form_with(
    identity: &str,
    catalog: &[FormRecord],
    reverse_contains: bool,
) -> MatchResult {
    if identity.is_empty() {
        return no_match(identity);
    }
    let names: Vec<(String, &FormRecord)> = catalog
        .iter()
        .map(|f| (normalize(&f.display_name), f))
        .collect();

    let found = names
        .iter()
        .find(|(n, _)| n == identity)
        .map(|(_, f)| (*f, MatchTier::ExactName))
        .or_else(|| {
            names
                .iter()
                .find(|(n, _)| n.contains(identity))
                .map(|(_, f)| (*f, MatchTier::NormalizedName))
        })
        .or_else(|| {
            if !reverse_contains {
                return None;
            }
            names
                .iter()
                .find(|(n, _)| !n.is_empty() && identity.contains(n.as_str()))
                .map(|(_, f)| (*f, MatchTier::FuzzyContains))
        });

    match found {
        Some((form, tier)) => {
            debug!(
                "match_form: {:?} -> {:?} ({:?}) tier {}",
                identity, form.slug, form.display_name, tier
            );
            MatchResult {
                identity: identity.to_string(),
                matched_slug: Some(form.slug.clone()),
                tier,
            }
        }
        None => {
            debug!("match_form: {:?} -> no match", identity);
            no_match(identity)
        }
    }
}

fn no_match(identity: &str) -> MatchResult {
    MatchResult {
        identity: identity.to_string(),
        matched_slug: None,
        tier: MatchTier::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[(&str, &str)]) -> Vec<FormRecord> {
        names
            .iter()
            .map(|(slug, name)| FormRecord::new(slug, name, 0))
            .collect()
    }

    #[test]
    fn exact_before_contains() {
        let c = catalog(&[
            ("winter-extra", "Winter Feedback Extra"),
            ("winter", "Winter_Feedback"),
        ]);
        let m = match_form("winter feedback", &c);
        assert_eq!(m.tier, MatchTier::ExactName);
        assert_eq!(m.matched_slug, Some("winter".to_string()));
    }

    #[test]
    fn contains_tier() {
        let c = catalog(&[("w", "Winter Feedback Extra")]);
        let m = match_form("winter feedback", &c);
        assert_eq!(m.tier, MatchTier::NormalizedName);
        assert!(m.is_match());
        assert_eq!(m.matched_slug, Some("w".to_string()));
    }

    #[test]
    fn first_in_order_wins() {
        let c = catalog(&[
            ("b", "Course Survey Spring"),
            ("a", "Course Survey Autumn"),
        ]);
        let m = match_form("course survey", &c);
        assert_eq!(m.matched_slug, Some("b".to_string()));
        let reversed: Vec<FormRecord> = c.iter().rev().cloned().collect();
        let m = match_form("course survey", &reversed);
        assert_eq!(m.matched_slug, Some("a".to_string()));
    }

    #[test]
    fn no_match_is_not_an_error() {
        let c = catalog(&[("w", "Winter Feedback")]);
        let m = match_form("summer feedback", &c);
        assert_eq!(m.tier, MatchTier::NoMatch);
        assert_eq!(m.matched_slug, None);
        assert_eq!(m.identity, "summer feedback");
        assert_eq!(match_form("anything", &[]).tier, MatchTier::NoMatch);
    }

    #[test]
    fn empty_identity_never_matches() {
        let c = catalog(&[("w", "Winter Feedback")]);
        assert_eq!(match_form("", &c).tier, MatchTier::NoMatch);
        assert_eq!(match_form_with("", &c, true).tier, MatchTier::NoMatch);
    }

    #[test]
    fn reverse_contains_is_opt_in() {
        let c = catalog(&[("w", "Winter Feedback"), ("e", "")]);
        let identity = "winter feedback responses";
        assert_eq!(match_form(identity, &c).tier, MatchTier::NoMatch);
        let m = match_form_with(identity, &c, true);
        assert_eq!(m.tier, MatchTier::FuzzyContains);
        assert_eq!(m.matched_slug, Some("w".to_string()));
    }
}
