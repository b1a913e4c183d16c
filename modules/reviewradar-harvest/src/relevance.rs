use reviewradar_common::ProductIdentity;

/// Scoring seam so gates can be tested with an instrumented mock.
pub trait Scorer: Send + Sync {
    fn score(&self, text: &str, identity: &ProductIdentity) -> f32;
}

/// How much of the text's leading window participates in density scoring.
/// Bounding the window keeps long rambling text from outscoring short,
/// on-topic text purely by length.
const LEAD_WINDOW_BYTES: usize = 1500;

// Component weights. The exact values are an implementation choice; only
// the ordinal behavior (more coverage or an exact phrase match never lowers
// the score) is contractual.
const COVERAGE_WEIGHT: f32 = 0.5;
const PHRASE_WEIGHT: f32 = 0.3;
const DENSITY_WEIGHT: f32 = 0.2;

/// Relevance of arbitrary text to a product identity, in [0, 1].
///
/// Combines keyword coverage, exact model+edition phrase presence, and
/// keyword density within the leading window, then squashes into [0, 1].
/// Deterministic, side-effect free, and non-decreasing in keyword coverage
/// with the other factors held fixed.
pub struct RelevanceScorer;

impl Scorer for RelevanceScorer {
    fn score(&self, text: &str, identity: &ProductIdentity) -> f32 {
        if identity.is_empty() || text.trim().is_empty() {
            return 0.0;
        }

        let lowered = text.to_lowercase();

        let matched = identity
            .keywords
            .iter()
            .filter(|k| lowered.contains(k.as_str()))
            .count();
        let coverage = matched as f32 / identity.keywords.len() as f32;

        let phrase = match identity.model_phrase() {
            Some(p) if lowered.contains(&p.to_lowercase()) => 1.0,
            _ => 0.0,
        };

        let density = leading_window_density(&lowered, identity);

        let raw = coverage * COVERAGE_WEIGHT + phrase * PHRASE_WEIGHT + density * DENSITY_WEIGHT;

        squash(raw)
    }
}

/// Keyword occurrences per word within the leading window, scaled so one
/// mention every ten words saturates the component.
fn leading_window_density(lowered: &str, identity: &ProductIdentity) -> f32 {
    let mut end = LEAD_WINDOW_BYTES.min(lowered.len());
    while !lowered.is_char_boundary(end) {
        end -= 1;
    }
    let window = &lowered[..end];

    let words = window.split_whitespace().count().max(1);
    let occurrences: usize = identity
        .keywords
        .iter()
        .map(|k| window.matches(k.as_str()).count())
        .sum();

    ((occurrences as f32 / words as f32) * 10.0).min(1.0)
}

/// Monotonic squash into [0, 1]. Zero stays zero so text with no signal at
/// all never scores above the floor.
fn squash(raw: f32) -> f32 {
    if raw <= 0.0 {
        return 0.0;
    }
    (0.25 + raw * 1.1).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity;

    fn headphones() -> ProductIdentity {
        identity::extract("Sony WH-1000XM5", None)
    }

    #[test]
    fn score_is_always_in_unit_interval() {
        let scorer = RelevanceScorer;
        let id = headphones();
        let long = "wh-1000xm5 ".repeat(500);
        for text in [
            "",
            "nothing relevant here",
            "sony wh-1000xm5 sony wh-1000xm5 sony wh-1000xm5",
            long.as_str(),
        ] {
            let s = scorer.score(text, &id);
            assert!((0.0..=1.0).contains(&s), "score {s} out of range");
        }
    }

    #[test]
    fn ownership_comment_clears_acceptance_threshold() {
        let scorer = RelevanceScorer;
        let s = scorer.score(
            "I've owned the WH-1000XM5 for 3 months, fantastic noise cancellation",
            &headphones(),
        );
        assert!(s >= 0.6, "expected >= 0.6, got {s}");
    }

    #[test]
    fn more_coverage_never_scores_lower() {
        let scorer = RelevanceScorer;
        let id = identity::extract("Sony WH-1000XM5 wireless headphones", None);
        // Same length and shape, increasing keyword coverage.
        let none = scorer.score("these are fine and comfortable to wear daily", &id);
        let some = scorer.score("these sony are fine and comfortable to wear", &id);
        let more = scorer.score("these sony headphones wireless are comfortable", &id);
        assert!(some >= none);
        assert!(more >= some);
    }

    #[test]
    fn exact_phrase_match_raises_score() {
        let scorer = RelevanceScorer;
        let id = headphones();
        let without = scorer.score("sony headphones are decent for travel", &id);
        let with = scorer.score("sony wh-1000xm5 are decent for travel", &id);
        assert!(with > without);
    }

    #[test]
    fn empty_identity_scores_zero() {
        let scorer = RelevanceScorer;
        let empty = identity::extract("", None);
        assert_eq!(scorer.score("sony wh-1000xm5 review", &empty), 0.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = RelevanceScorer;
        let id = headphones();
        let text = "been using the wh-1000xm5 daily, sony nailed the comfort";
        assert_eq!(scorer.score(text, &id), scorer.score(text, &id));
    }
}
