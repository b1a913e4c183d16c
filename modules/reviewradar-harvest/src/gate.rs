use reviewradar_common::ProductIdentity;
use tracing::debug;

use crate::relevance::Scorer;

/// First-person ownership markers. A gate requiring ownership accepts text
/// only when at least one of these appears.
const OWNERSHIP_PHRASES: &[&str] = &[
    "i bought",
    "i own",
    "i have",
    "i've been",
    "i've owned",
    "my experience",
    "my opinion",
    "using for",
    "owned for",
    "pros and cons",
    "recommend",
];

/// Promotional, news, and rumor markers. Any hit rejects the text outright.
const REJECTION_PHRASES: &[&str] = &[
    "announcement",
    "press release",
    "breaking news",
    "just announced",
    "launching",
    "coming soon",
    "leak",
    "rumor",
    "reported",
    "stock alert",
    "price drop",
];

/// A tagged phrase list. Lists are data carried on the gate config so a
/// caller can swap them without touching gate logic.
#[derive(Debug, Clone)]
pub struct PhraseList {
    pub tag: &'static str,
    pub phrases: Vec<String>,
}

impl PhraseList {
    fn from_static(tag: &'static str, phrases: &[&str]) -> Self {
        Self {
            tag,
            phrases: phrases.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn any_in(&self, lowered: &str) -> bool {
        self.phrases.iter().any(|p| lowered.contains(p.as_str()))
    }
}

/// The rule that rejected a piece of text, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRule {
    ContentLength,
    MentionCount,
    OwnershipPhrase,
    RejectionPhrase,
    RelevanceScore,
}

impl std::fmt::Display for GateRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = match self {
            GateRule::ContentLength => "content_length",
            GateRule::MentionCount => "mention_count",
            GateRule::OwnershipPhrase => "ownership_phrase",
            GateRule::RejectionPhrase => "rejection_phrase",
            GateRule::RelevanceScore => "relevance_score",
        };
        write!(f, "{id}")
    }
}

/// Outcome of a gate evaluation. Rejection is the normal fate of most
/// scraped text and is not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Accept { relevance: f32 },
    Reject(GateRule),
}

impl GateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, GateDecision::Accept { .. })
    }
}

/// Per-variant gate tuning. The three constructors mirror the three kinds
/// of text the fetchers push through: thread titles, individual replies,
/// and whole extracted pages.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub min_content_len: usize,
    pub min_model_mentions: usize,
    pub require_ownership: bool,
    pub check_rejection: bool,
    pub relevance_threshold: Option<f32>,
    pub ownership: PhraseList,
    pub rejection: PhraseList,
}

impl GateConfig {
    /// Thread titles and summaries: short text, so only the cheap checks.
    pub fn thread() -> Self {
        Self {
            min_content_len: 20,
            min_model_mentions: 1,
            require_ownership: false,
            check_rejection: true,
            relevance_threshold: None,
            ownership: PhraseList::from_static("ownership", OWNERSHIP_PHRASES),
            rejection: PhraseList::from_static("rejection", REJECTION_PHRASES),
        }
    }

    /// Individual discussion replies.
    pub fn reply() -> Self {
        Self {
            min_content_len: 50,
            min_model_mentions: 1,
            require_ownership: true,
            check_rejection: true,
            relevance_threshold: Some(0.6),
            ownership: PhraseList::from_static("ownership", OWNERSHIP_PHRASES),
            rejection: PhraseList::from_static("rejection", REJECTION_PHRASES),
        }
    }

    /// Whole extracted pages (forum threads after boilerplate stripping).
    pub fn page() -> Self {
        Self {
            min_content_len: 1000,
            min_model_mentions: 2,
            require_ownership: true,
            check_rejection: true,
            relevance_threshold: Some(0.6),
            ownership: PhraseList::from_static("ownership", OWNERSHIP_PHRASES),
            rejection: PhraseList::from_static("rejection", REJECTION_PHRASES),
        }
    }
}

/// Ordered accept/reject rules for scraped text. Rules run in a fixed
/// order and the first failure short-circuits, so the scorer (the only
/// non-trivial rule) is never invoked on text the cheap checks already
/// rejected.
pub struct ContentGate {
    config: GateConfig,
}

impl ContentGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        text: &str,
        identity: &ProductIdentity,
        scorer: &dyn Scorer,
    ) -> GateDecision {
        let lowered = text.to_lowercase();

        if lowered.trim().len() < self.config.min_content_len {
            return self.reject(GateRule::ContentLength);
        }

        if self.config.min_model_mentions > 0 {
            let mentions = identity
                .model
                .as_deref()
                .map(|m| lowered.matches(&m.to_lowercase()).count())
                .unwrap_or(0);
            if mentions < self.config.min_model_mentions {
                return self.reject(GateRule::MentionCount);
            }
        }

        if self.config.require_ownership && !self.config.ownership.any_in(&lowered) {
            return self.reject(GateRule::OwnershipPhrase);
        }

        if self.config.check_rejection && self.config.rejection.any_in(&lowered) {
            return self.reject(GateRule::RejectionPhrase);
        }

        let relevance = match self.config.relevance_threshold {
            Some(threshold) => {
                let score = scorer.score(text, identity);
                if score < threshold {
                    return self.reject(GateRule::RelevanceScore);
                }
                score
            }
            None => 0.0,
        };

        GateDecision::Accept { relevance }
    }

    fn reject(&self, rule: GateRule) -> GateDecision {
        debug!(rule = %rule, "Gate rejected text");
        GateDecision::Reject(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity;
    use crate::relevance::RelevanceScorer;
    use crate::testing::MockScorer;

    fn headphones() -> ProductIdentity {
        identity::extract("Sony WH-1000XM5", None)
    }

    #[test]
    fn price_drop_leak_rejects_on_rejection_phrases() {
        let gate = ContentGate::new(GateConfig::thread());
        let decision = gate.evaluate(
            "Sony WH-1000XM5 price drop incoming according to a leak",
            &headphones(),
            &RelevanceScorer,
        );
        assert_eq!(decision, GateDecision::Reject(GateRule::RejectionPhrase));
    }

    #[test]
    fn ownership_reply_is_accepted() {
        let gate = ContentGate::new(GateConfig::reply());
        let decision = gate.evaluate(
            "I bought the WH-1000XM5 three months ago, fantastic noise cancellation and comfort",
            &headphones(),
            &RelevanceScorer,
        );
        match decision {
            GateDecision::Accept { relevance } => assert!(relevance >= 0.6),
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[test]
    fn short_text_rejects_before_anything_else() {
        let gate = ContentGate::new(GateConfig::reply());
        let decision = gate.evaluate("too short", &headphones(), &RelevanceScorer);
        assert_eq!(decision, GateDecision::Reject(GateRule::ContentLength));
    }

    #[test]
    fn missing_mention_rejects_before_ownership() {
        let gate = ContentGate::new(GateConfig::reply());
        let decision = gate.evaluate(
            "I bought some headphones last year and they are fine for commuting",
            &headphones(),
            &RelevanceScorer,
        );
        assert_eq!(decision, GateDecision::Reject(GateRule::MentionCount));
    }

    #[test]
    fn scorer_is_not_called_when_cheap_rules_fail() {
        let gate = ContentGate::new(GateConfig::reply());
        let scorer = MockScorer::new(1.0);

        // Fails length, mention count, and ownership respectively.
        gate.evaluate("nope", &headphones(), &scorer);
        gate.evaluate(
            "these headphones are decent but nothing special for the price",
            &headphones(),
            &scorer,
        );
        gate.evaluate(
            "the WH-1000XM5 shows up in every best-of list this year somehow",
            &headphones(),
            &scorer,
        );
        assert_eq!(scorer.calls(), 0);

        // Passes rules 1-4, so the scorer runs exactly once.
        gate.evaluate(
            "I bought the WH-1000XM5 three months ago, fantastic noise cancellation",
            &headphones(),
            &scorer,
        );
        assert_eq!(scorer.calls(), 1);
    }

    #[test]
    fn low_score_rejects_on_relevance_rule() {
        let gate = ContentGate::new(GateConfig::reply());
        let scorer = MockScorer::new(0.2);
        let decision = gate.evaluate(
            "I bought the WH-1000XM5 three months ago, fantastic noise cancellation",
            &headphones(),
            &scorer,
        );
        assert_eq!(decision, GateDecision::Reject(GateRule::RelevanceScore));
    }

    #[test]
    fn empty_identity_fails_closed() {
        let gate = ContentGate::new(GateConfig::reply());
        let empty = identity::extract("", None);
        let decision = gate.evaluate(
            "I bought the WH-1000XM5 three months ago, fantastic noise cancellation",
            &empty,
            &RelevanceScorer,
        );
        assert_eq!(decision, GateDecision::Reject(GateRule::MentionCount));
    }
}
