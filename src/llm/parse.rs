//! Pulling structured JSON out of free-form model output
//!
//! Small local models rarely answer with bare JSON: they wrap it in prose or
//! markdown fences. Callers that ask for JSON run the reply through
//! [`extract_json_object`] before handing it to serde.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No JSON object found in response")]
    NoJsonObject,
    #[error("Could not extract JSON from markdown block")]
    EmptyMarkdownBlock,
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```(?:json|JSON)?\s*\n?([\s\S]*?)\n?```").expect("fence regex is valid")
    })
}

/// Returns the first JSON object embedded in `response`
pub fn extract_json_object(response: &str) -> Result<String, ParseError> {
    let trimmed = response.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Ok(trimmed.to_string());
    }

    if trimmed.contains("```") {
        if let Some(json) = fenced_block()
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
        {
            if json.starts_with('{') && json.ends_with('}') {
                return Ok(json.to_string());
            }
        }
        return Err(ParseError::EmptyMarkdownBlock);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return Ok(trimmed[start..=end].to_string());
        }
    }

    Err(ParseError::NoJsonObject)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_object() {
        assert_eq!(extract_json_object(" {\"a\":1} ").unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_fenced_object() {
        let reply = "Here you go:\n```json\n{\"client_name\": \"John Doe\"}\n```\nAnything else?";
        assert_eq!(
            extract_json_object(reply).unwrap(),
            "{\"client_name\": \"John Doe\"}"
        );
    }

    #[test]
    fn test_object_inside_prose() {
        let reply = "Sure! {\"entities\": []} Let me know.";
        assert_eq!(extract_json_object(reply).unwrap(), "{\"entities\": []}");
    }

    #[test]
    fn test_no_object() {
        assert_eq!(
            extract_json_object("I could not find anyone."),
            Err(ParseError::NoJsonObject)
        );
        assert_eq!(
            extract_json_object("```\nnothing\n```"),
            Err(ParseError::EmptyMarkdownBlock)
        );
    }
}
