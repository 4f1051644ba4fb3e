//! Person-name extraction from free-text meeting requests
//!
//! [`NameExtractor`] sits on top of an [`EntityRecognizer`]: the recognizer
//! labels spans of the request, the extractor picks the first span labelled
//! as a person whose text looks like a name (letters, spaces, apostrophes and
//! hyphens only).
//!
//! Two recognizers ship with the crate:
//!
//! - [`RuleBasedRecognizer`]: in-process capitalization heuristics, no model
//! - [`LlmRecognizer`]: asks the completion endpoint to label entities

mod llm;
mod rules;

pub use llm::LlmRecognizer;
pub use rules::RuleBasedRecognizer;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, warn};

/// Category assigned to a recognized span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityLabel {
    Person,
    Organization,
    Location,
    Date,
    Other(String),
}

impl EntityLabel {
    /// Maps common NER tag names (`PERSON`, `ORG`, `GPE`, ...) to a label
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "PERSON" | "PER" | "PEOPLE" | "NAME" => EntityLabel::Person,
            "ORG" | "ORGANIZATION" | "ORGANISATION" | "COMPANY" => EntityLabel::Organization,
            "GPE" | "LOC" | "LOCATION" | "PLACE" => EntityLabel::Location,
            "DATE" | "TIME" => EntityLabel::Date,
            other => EntityLabel::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityLabel::Person => write!(f, "PERSON"),
            EntityLabel::Organization => write!(f, "ORG"),
            EntityLabel::Location => write!(f, "LOC"),
            EntityLabel::Date => write!(f, "DATE"),
            EntityLabel::Other(tag) => write!(f, "{}", tag),
        }
    }
}

/// A labelled span of the input text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub label: EntityLabel,
    pub text: String,
}

impl Entity {
    pub fn new(label: EntityLabel, text: impl Into<String>) -> Self {
        Self {
            label,
            text: text.into(),
        }
    }

    pub fn person(text: impl Into<String>) -> Self {
        Self::new(EntityLabel::Person, text)
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("entity recognizer {recognizer} failed: {message}")]
    Recognizer { recognizer: String, message: String },
}

/// Outcome of name extraction; `name` is `None` when nobody was found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub name: Option<String>,
}

impl ExtractionResult {
    pub fn found(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    pub fn none() -> Self {
        Self { name: None }
    }
}

/// Labels entities in text
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    /// Entities in the order they appear in `text`
    async fn recognize(&self, text: &str) -> Result<Vec<Entity>, ExtractionError>;

    fn name(&self) -> &str;
}

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z\s'-]+$").expect("name regex is valid"))
}

/// True when `candidate` only contains letters, whitespace, `'` and `-`
pub fn is_plausible_name(candidate: &str) -> bool {
    name_pattern().is_match(candidate)
}

pub struct NameExtractor {
    recognizer: Arc<dyn EntityRecognizer>,
}

impl NameExtractor {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Extractor backed by the in-process rule-based recognizer
    pub fn rule_based() -> Self {
        Self::new(Arc::new(RuleBasedRecognizer::new()))
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Returns the first plausible person name in `text`
    ///
    /// Finding nobody is not an error; only a failing recognizer is.
    pub async fn extract(&self, text: &str) -> Result<ExtractionResult, ExtractionError> {
        let entities = self.recognizer.recognize(text).await?;
        debug!(
            recognizer = self.recognizer.name(),
            "Recognized {} entit(ies): {:?}",
            entities.len(),
            entities
        );

        for entity in entities {
            if entity.label != EntityLabel::Person {
                continue;
            }
            let name = entity.text.trim();
            if is_plausible_name(name) {
                return Ok(ExtractionResult::found(name));
            }
            warn!("Ignoring person entity with implausible name: {:?}", name);
        }

        Ok(ExtractionResult::none())
    }
}

impl fmt::Debug for NameExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameExtractor")
            .field("recognizer", &self.recognizer.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRecognizer(Result<Vec<Entity>, String>);

    #[async_trait]
    impl EntityRecognizer for FixedRecognizer {
        async fn recognize(&self, _text: &str) -> Result<Vec<Entity>, ExtractionError> {
            self.0.clone().map_err(|message| ExtractionError::Recognizer {
                recognizer: "fixed".to_string(),
                message,
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn extractor(entities: Vec<Entity>) -> NameExtractor {
        NameExtractor::new(Arc::new(FixedRecognizer(Ok(entities))))
    }

    #[tokio::test]
    async fn test_first_person_wins() {
        let extractor = extractor(vec![
            Entity::new(EntityLabel::Organization, "Acme Corp"),
            Entity::person("John Doe"),
            Entity::person("Ann Lee"),
        ]);

        assert_eq!(
            extractor.extract("...").await.unwrap(),
            ExtractionResult::found("John Doe")
        );
    }

    #[tokio::test]
    async fn test_implausible_person_is_skipped() {
        let extractor = extractor(vec![
            Entity::person("R2-D2"),
            Entity::person("  Mary-Jane O'Neil "),
        ]);

        assert_eq!(
            extractor.extract("...").await.unwrap().name.as_deref(),
            Some("Mary-Jane O'Neil")
        );
    }

    #[tokio::test]
    async fn test_no_person_is_not_an_error() {
        let extractor = extractor(vec![Entity::new(EntityLabel::Date, "tomorrow")]);
        assert_eq!(extractor.extract("...").await.unwrap(), ExtractionResult::none());
    }

    #[tokio::test]
    async fn test_recognizer_failure_is_an_error() {
        let extractor =
            NameExtractor::new(Arc::new(FixedRecognizer(Err("model missing".to_string()))));
        assert!(extractor.extract("...").await.is_err());
    }

    #[test]
    fn test_label_from_tag() {
        assert_eq!(EntityLabel::from_tag("person"), EntityLabel::Person);
        assert_eq!(EntityLabel::from_tag("ORG"), EntityLabel::Organization);
        assert_eq!(EntityLabel::from_tag("GPE"), EntityLabel::Location);
        assert_eq!(
            EntityLabel::from_tag("money"),
            EntityLabel::Other("MONEY".to_string())
        );
    }

    #[test]
    fn test_plausible_names() {
        assert!(is_plausible_name("John Doe"));
        assert!(is_plausible_name("D'Angelo Smith-Jones"));
        assert!(!is_plausible_name("John Doe (client)"));
        assert!(!is_plausible_name("Agent 47"));
        assert!(!is_plausible_name(""));
    }
}
