//! Morphological fallback tokenizer.
//!
//! A deliberately small, deterministic approximation of a
//! part-of-speech tagger: whitespace tokens are classified as
//! verb-like (configured suffix list), noun candidates (Hangul or
//! Latin content words, trailing particles stripped) or discarded.
//! Good enough to route entities to the keyword store when no LLM is
//! reachable; never meant to compete with a real analyzer.

/// Part-of-speech classification for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pos {
    Noun,
    Verb,
    Other,
}

/// Trailing particles stripped from noun candidates, longest first.
const PARTICLES: [&str; 16] = [
    "에서", "에게", "으로", "부터", "까지", "은", "는", "이", "가", "을", "를", "와", "과", "의",
    "에", "로",
];

/// Question words and function words that never become entities.
const STOPWORDS: [&str; 24] = [
    "어디", "어디서", "어디야", "뭐", "뭐야", "무엇", "어떻게", "누구", "누가", "왜", "언제",
    "얼마", "좀", "알려줘", "the", "a", "an", "is", "are", "what", "where", "how", "who", "to",
];

/// Tokenize a query into `(original_form, part_of_speech)` pairs.
///
/// Original forms are preserved so sentence reconstruction can match
/// windows against the raw query text; callers strip particles from
/// noun forms when building entity terms.
#[must_use]
pub fn tokenize(query: &str, verb_suffixes: &[String]) -> Vec<(String, Pos)> {
    query
        .split_whitespace()
        .map(|token| (token.to_string(), classify(token, verb_suffixes)))
        .collect()
}

fn classify(token: &str, verb_suffixes: &[String]) -> Pos {
    if verb_suffixes.iter().any(|suffix| token.ends_with(suffix.as_str())) {
        return Pos::Verb;
    }

    let stripped = strip_particle(token);
    let lowered = stripped.to_lowercase();
    if STOPWORDS.contains(&lowered.as_str()) || STOPWORDS.contains(&token.to_lowercase().as_str())
    {
        return Pos::Other;
    }

    // Single-character leftovers and bare numbers are noise.
    if stripped.chars().count() < 2 || stripped.chars().all(|c| c.is_ascii_digit()) {
        return Pos::Other;
    }

    Pos::Noun
}

/// Strip one trailing particle from a Hangul token.
///
/// Only fires when the remainder keeps at least two characters, which
/// bounds the damage on words that merely end in a particle-shaped
/// syllable.
#[must_use]
pub(crate) fn strip_particle(token: &str) -> String {
    if !token.chars().any(is_hangul) {
        return token.to_string();
    }
    for particle in PARTICLES {
        if let Some(stem) = token.strip_suffix(particle) {
            if stem.chars().count() >= 2 {
                return stem.to_string();
            }
        }
    }
    token.to_string()
}

fn is_hangul(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}
