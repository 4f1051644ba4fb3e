//! Capitalization-driven entity recognizer
//!
//! Good enough for meeting requests, which name people the way people write
//! them: "with John Doe", "Dr. Jane O'Neil", "Ludwig van Beethoven".
//!
//! Heuristics, in order:
//!
//! - weekdays, relative days and month names next to a number are `Date`
//! - runs of adjacent capitalized words form a span; lowercase particles
//!   (`van`, `de`, ...) may join two capitalized words; `'s` ends a span
//! - a span ending in a company suffix is an `Organization`
//! - a span right after an honorific is a `Person`
//! - a lone capitalized word opening a sentence is skipped (ordinary
//!   sentence capitalization, not evidence of a name)
//! - a span right after `in`/`at`/`near` is a `Location`
//! - everything else is a `Person`

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::{Entity, EntityLabel, EntityRecognizer, ExtractionError};

const HONORIFICS: &[&str] = &[
    "mr", "mrs", "ms", "miss", "mx", "dr", "prof", "sir", "madam", "dame",
];

const WEEKDAYS: &[&str] = &[
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

const RELATIVE_DAYS: &[&str] = &["today", "tomorrow", "tonight", "yesterday"];

const MONTHS: &[&str] = &[
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const PARTICLES: &[&str] = &[
    "van", "von", "de", "der", "den", "del", "della", "da", "di", "du", "la", "le", "bin", "al",
];

const ORG_SUFFIXES: &[&str] = &[
    "inc",
    "llc",
    "ltd",
    "corp",
    "corporation",
    "co",
    "gmbh",
    "plc",
    "company",
    "group",
];

const PLACE_PREPOSITIONS: &[&str] = &["in", "at", "near"];

/// Capitalized words that never start or extend a name
const STOPWORDS: &[&str] = &[
    // request verbs that open most prompts
    "schedule", "book", "set", "setup", "arrange", "plan", "organize", "organise", "create",
    "add", "send", "email", "call", "meet", "find", "check", "remind", "cancel", "move",
    "reschedule", "invite", "let", "lets", "let's", "can", "could", "would", "will", "please",
    // greetings and fillers
    "hi", "hello", "hey", "dear", "thanks", "thank", "ok", "okay", "yes", "no",
    // pronouns, determiners, prepositions
    "i", "i'm", "i'd", "i'll", "we", "you", "he", "she", "they", "it", "my", "our", "your",
    "the", "a", "an", "this", "that", "next", "last", "with", "and", "or", "for", "on", "at",
    "in", "to", "from", "about", "is", "are", "what", "when", "where", "who", "how",
    // meeting vocabulary
    "meeting", "call", "sync", "demo", "review", "standup", "lunch", "dinner", "coffee",
    "zoom", "teams", "skype",
    // abbreviations that are usually all caps
    "asap", "ceo", "cto", "cfo", "coo", "vp", "hr", "pm", "am", "fyi", "re", "eod", "eow",
];

/// In-process recognizer built on capitalization and word lists
#[derive(Debug, Default, Clone)]
pub struct RuleBasedRecognizer;

impl RuleBasedRecognizer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of [`EntityRecognizer::recognize`]
    pub fn entities(&self, text: &str) -> Vec<Entity> {
        let tokens = tokenize(text);
        let mut entities = Vec::new();
        // lone sentence-initial words, kept only when no other person turns up
        let mut tentative = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            if is_date(&tokens, i, text) {
                entities.push(Entity::new(EntityLabel::Date, tokens[i].text));
                i += 1;
                continue;
            }

            if !is_name_word(&tokens, i, text) {
                i += 1;
                continue;
            }

            let mut last = i;
            let mut closed = tokens[i].possessive_len > 0;
            while !closed {
                let next = last + 1;
                if next >= tokens.len() || !adjacent(text, &tokens[last], &tokens[next]) {
                    break;
                }
                if is_name_word(&tokens, next, text) {
                    last = next;
                } else if contains(PARTICLES, &tokens[next].lower)
                    && next + 1 < tokens.len()
                    && adjacent(text, &tokens[next], &tokens[next + 1])
                    && is_name_word(&tokens, next + 1, text)
                {
                    last = next + 1;
                } else {
                    break;
                }
                closed = tokens[last].possessive_len > 0;
            }

            let span_end = tokens[last].end - tokens[last].possessive_len;
            let span = &text[tokens[i].start..span_end];
            let word_count = last - i + 1;
            let previous = i.checked_sub(1).map(|p| tokens[p].lower.as_str());

            let label = if word_count > 1 && contains(ORG_SUFFIXES, &tokens[last].lower) {
                EntityLabel::Organization
            } else if previous.map_or(false, |p| contains(HONORIFICS, p)) {
                EntityLabel::Person
            } else if previous == Some("of") {
                EntityLabel::Organization
            } else if previous.map_or(false, |p| contains(PLACE_PREPOSITIONS, p)) {
                EntityLabel::Location
            } else {
                if word_count == 1 && starts_sentence(&tokens, i, text) {
                    tentative.push(entities.len());
                }
                EntityLabel::Person
            };

            entities.push(Entity::new(label, span));
            i = last + 1;
        }

        let confirmed_person = entities
            .iter()
            .enumerate()
            .any(|(n, e)| e.label == EntityLabel::Person && !tentative.contains(&n));
        if confirmed_person {
            entities = entities
                .into_iter()
                .enumerate()
                .filter(|(n, _)| !tentative.contains(n))
                .map(|(_, e)| e)
                .collect();
        }

        entities
    }
}

#[async_trait]
impl EntityRecognizer for RuleBasedRecognizer {
    async fn recognize(&self, text: &str) -> Result<Vec<Entity>, ExtractionError> {
        Ok(self.entities(text))
    }

    fn name(&self) -> &str {
        "rules"
    }
}

#[derive(Debug)]
struct Token<'a> {
    text: &'a str,
    /// Lowercased word without a trailing possessive
    lower: String,
    start: usize,
    end: usize,
    /// Byte length of a trailing `'s`, 0 when absent
    possessive_len: usize,
}

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9'’\-]*").expect("word regex is valid"))
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    word_pattern()
        .find_iter(text)
        .map(|m| {
            let word = m.as_str();
            let possessive_len = ["'s", "’s"]
                .iter()
                .find(|suffix| word.len() > suffix.len() && word.ends_with(*suffix))
                .map_or(0, |suffix| suffix.len());
            Token {
                text: word,
                lower: word[..word.len() - possessive_len].to_lowercase(),
                start: m.start(),
                end: m.end(),
                possessive_len,
            }
        })
        .collect()
}

fn contains(list: &[&str], word: &str) -> bool {
    list.contains(&word)
}

/// Only whitespace (and no line break) separates the two tokens
fn adjacent(text: &str, left: &Token<'_>, right: &Token<'_>) -> bool {
    let gap = &text[left.end..right.start];
    gap.chars().all(|c| c.is_whitespace() && c != '\n')
}

fn starts_sentence(tokens: &[Token<'_>], i: usize, text: &str) -> bool {
    let Some(prev) = i.checked_sub(1).map(|p| &tokens[p]) else {
        return true;
    };
    if contains(HONORIFICS, &prev.lower) {
        return false;
    }
    text[prev.end..tokens[i].start]
        .chars()
        .any(|c| matches!(c, '.' | '!' | '?' | '\n' | ':'))
}

fn is_numeric(token: &Token<'_>) -> bool {
    token.text.starts_with(|c: char| c.is_ascii_digit())
}

fn is_date(tokens: &[Token<'_>], i: usize, text: &str) -> bool {
    let word = tokens[i].lower.as_str();
    if contains(WEEKDAYS, word) || contains(RELATIVE_DAYS, word) {
        return true;
    }
    if !contains(MONTHS, word) {
        return false;
    }
    let before = i
        .checked_sub(1)
        .map_or(false, |p| is_numeric(&tokens[p]) && adjacent(text, &tokens[p], &tokens[i]));
    let after = tokens
        .get(i + 1)
        .map_or(false, |n| is_numeric(n) && adjacent(text, &tokens[i], n));
    before || after
}

fn is_capitalized(token: &Token<'_>) -> bool {
    token.text.starts_with(|c: char| c.is_ascii_uppercase())
}

fn is_name_word(tokens: &[Token<'_>], i: usize, text: &str) -> bool {
    let token = &tokens[i];
    is_capitalized(token)
        && !contains(STOPWORDS, &token.lower)
        && !contains(HONORIFICS, &token.lower)
        && !is_date(tokens, i, text)
}
