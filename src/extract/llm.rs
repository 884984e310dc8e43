//! LLM-backed extraction.
//!
//! One tightly bounded completion: exactly three comma-separated
//! keywords (proper nouns preferred) plus a verb-phrase flag, returned
//! as a strict JSON object. The caller owns the timeout; parse
//! failures are surfaced and never retried.

use serde::Deserialize;

use super::{Extraction, KeywordExtractor, Pos, reconstruct_sentences, tokenize};
use crate::error::{Error, Result};
use crate::llm::LlmClient;

const EXTRACTION_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Deserialize)]
struct LlmExtraction {
    keywords: Vec<String>,
    #[serde(default)]
    has_verb_phrase: bool,
}

fn prompt(query: &str) -> String {
    format!(
        "Extract exactly three comma-separated keywords from the question below. \
         Prefer proper nouns (game characters, places, items, monsters). \
         Also say whether the question contains a verb phrase (an action like \
         selling, dropping, going).\n\
         Respond with JSON only, no prose:\n\
         {{\"keywords\": [\"k1\", \"k2\", \"k3\"], \"has_verb_phrase\": false}}\n\
         Question: {query}"
    )
}

/// Run the LLM extraction backend.
pub(super) async fn extract(
    client: &LlmClient,
    extractor: &KeywordExtractor,
    query: &str,
) -> Result<Extraction> {
    let response = client.complete(&prompt(query), EXTRACTION_TEMPERATURE).await?;
    let parsed = parse_response(&response)?;

    let keywords: Vec<String> = parsed
        .keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .take(3)
        .collect();

    // Sentence reconstruction runs on the query's own tokens; the
    // keyword list only tells us which nouns to keep as entities.
    let sentences = if parsed.has_verb_phrase {
        let tagged = tokenize(query, extractor.verb_suffixes());
        let tokens: Vec<String> = tagged.iter().map(|(form, _)| form.clone()).collect();
        let verbal: Vec<bool> = tagged.iter().map(|(_, pos)| *pos == Pos::Verb).collect();
        reconstruct_sentences(&tokens, &verbal, query).0
    } else {
        Vec::new()
    };

    let entities: Vec<String> = keywords
        .iter()
        .filter(|k| !sentences.iter().any(|s| s.contains(k.as_str())))
        .cloned()
        .collect();

    Ok(Extraction {
        raw_tokens: keywords,
        entities,
        sentences,
    })
}

/// Parse the completion, tolerating prose around the JSON object.
fn parse_response(response: &str) -> Result<LlmExtraction> {
    let start = response.find('{');
    let end = response.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &response[s..=e],
        _ => {
            return Err(Error::LlmMalformed {
                snippet: snippet(response),
            });
        }
    };

    serde_json::from_str(json).map_err(|_| Error::LlmMalformed {
        snippet: snippet(response),
    })
}

fn snippet(response: &str) -> String {
    response.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strict_json() {
        let parsed =
            parse_response(r#"{"keywords": ["아이스진", "예티"], "has_verb_phrase": true}"#)
                .unwrap();
        assert_eq!(parsed.keywords.len(), 2);
        assert!(parsed.has_verb_phrase);
    }

    #[test]
    fn test_parse_tolerates_surrounding_prose() {
        let parsed = parse_response(
            "Sure! Here you go:\n{\"keywords\": [\"다크로드\"], \"has_verb_phrase\": false}\nDone.",
        )
        .unwrap();
        assert_eq!(parsed.keywords, vec!["다크로드".to_string()]);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            parse_response("keywords: none"),
            Err(Error::LlmMalformed { .. })
        ));
    }
}
