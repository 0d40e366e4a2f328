//! Asking a human for credentials that are not stored yet.

use std::collections::HashSet;

use crate::error::Result;

/// Source of values for missing connection fields.
///
/// Implementations talk to a terminal, a GUI, or a test fixture. Returning
/// `Ok(None)` means the user gave no answer.
pub trait CredentialPrompter {
    fn prompt(&mut self, bundle: &str, field: &str) -> Result<Option<String>>;
}

/// Remembers which `(bundle, field)` pairs were already asked for.
///
/// Owned by the caller and passed to every lookup that may prompt, so a
/// single session asks at most once per pair however many times the value
/// is requested.
#[derive(Debug, Default)]
pub struct PromptSession {
    asked: HashSet<(String, String)>,
}

impl PromptSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ask. Returns false if this pair was already asked.
    pub fn begin(&mut self, bundle: &str, field: &str) -> bool {
        self.asked.insert((bundle.to_string(), field.to_string()))
    }

    pub fn was_asked(&self, bundle: &str, field: &str) -> bool {
        self.asked
            .contains(&(bundle.to_string(), field.to_string()))
    }
}

/// Prompter that answers from a fixed list, for non-interactive hosts.
#[derive(Debug, Default)]
pub struct StaticPrompter {
    answers: Vec<((String, String), String)>,
    /// Every `(bundle, field)` this prompter was asked for, in order.
    pub asked: Vec<(String, String)>,
}

impl StaticPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, bundle: &str, field: &str, value: &str) -> Self {
        self.answers
            .push(((bundle.to_string(), field.to_string()), value.to_string()));
        self
    }
}

impl CredentialPrompter for StaticPrompter {
    fn prompt(&mut self, bundle: &str, field: &str) -> Result<Option<String>> {
        let key = (bundle.to_string(), field.to_string());
        self.asked.push(key.clone());
        Ok(self
            .answers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone()))
    }
}
