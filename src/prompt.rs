use std::collections::BTreeSet;

use crate::error::Result;

/// Answer from an interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Value(T),
    /// Return to the previous decision.
    Back,
    /// Stop the session, keeping decisions already made.
    Quit,
}

/// One selectable option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice<T> {
    pub key: String,
    pub label: String,
    pub value: T,
}

impl<T> Choice<T> {
    pub fn new(key: impl Into<String>, label: impl Into<String>, value: T) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            value,
        }
    }
}

/// Interactive capability supplied by the caller. Every call blocks until
/// the user answers.
pub trait Prompter {
    fn prompt_category(&mut self, description: &str) -> Result<Reply<String>>;

    fn prompt_choice<T: Clone>(&mut self, prompt: &str, options: &[Choice<T>]) -> Result<Reply<T>>;

    fn prompt_tags(&mut self, description: &str) -> Result<Reply<BTreeSet<String>>>;
}

/// Split comma-separated input into a tag set. Blank entries are dropped.
pub fn parse_tags(input: &str) -> BTreeSet<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
