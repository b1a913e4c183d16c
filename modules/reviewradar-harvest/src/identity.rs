use reviewradar_common::ProductIdentity;

/// Titles shorter than this yield an empty identity. Every gate fails
/// closed against an empty identity, so nothing downstream can match.
const MIN_TITLE_LEN: usize = 3;

/// Tokens dropped from the keyword set.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "for", "with", "of", "in", "on", "to", "at", "by", "from",
    "is", "it", "new",
];

/// Qualifier tokens that count as an edition when they follow the model token.
const EDITION_QUALIFIERS: &[&str] = &[
    "pro", "max", "plus", "ultra", "mini", "lite", "se", "ii", "iii", "iv", "2", "3", "4", "5",
    "gen2", "gen3",
];

/// Derive a product identity from a raw title plus an optional brand hint.
///
/// Pure and deterministic: identical input always yields identical output.
/// Tokenizes on whitespace with surrounding punctuation trimmed (internal
/// hyphens survive, so "WH-1000XM5" stays one token). The model candidate
/// is the longest token mixing letters and digits; keywords are the
/// lowercased, stopword-stripped tokens of length >= 2, first-seen order.
pub fn extract(title: &str, brand_hint: Option<&str>) -> ProductIdentity {
    let raw_title = title.to_string();
    let trimmed = title.trim();

    if trimmed.len() < MIN_TITLE_LEN {
        return ProductIdentity {
            raw_title,
            brand: brand_hint.map(|b| b.trim().to_lowercase()).filter(|b| !b.is_empty()),
            model: None,
            edition: None,
            keywords: Vec::new(),
        };
    }

    let tokens: Vec<&str> = trimmed
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect();

    let model = tokens
        .iter()
        .filter(|t| mixes_letters_and_digits(t))
        .max_by_key(|t| t.len())
        .map(|t| t.to_string());

    let edition = model.as_deref().and_then(|m| {
        let idx = tokens.iter().position(|t| *t == m)?;
        let next = tokens.get(idx + 1)?;
        let lowered = next.to_lowercase();
        EDITION_QUALIFIERS
            .contains(&lowered.as_str())
            .then_some(lowered)
    });

    let brand = brand_hint
        .map(|b| b.trim().to_lowercase())
        .filter(|b| !b.is_empty())
        .or_else(|| {
            tokens
                .iter()
                .find(|t| t.chars().all(|c| c.is_alphabetic()))
                .map(|t| t.to_lowercase())
        });

    let mut keywords = Vec::new();
    for token in &tokens {
        let lowered = token.to_lowercase();
        if lowered.len() < 2 || STOPWORDS.contains(&lowered.as_str()) {
            continue;
        }
        if !keywords.contains(&lowered) {
            keywords.push(lowered);
        }
    }

    ProductIdentity {
        raw_title,
        brand,
        model,
        edition,
        keywords,
    }
}

fn mixes_letters_and_digits(token: &str) -> bool {
    token.chars().any(|c| c.is_alphabetic()) && token.chars().any(|c| c.is_ascii_digit())
}
