//! Command lines from configuration
//!
//! Lines are split with shell quoting rules but never run through a shell.
//! `{name}` placeholders are substituted per word after splitting, so a value
//! containing spaces stays a single argument.

use std::collections::BTreeMap;
use std::fmt;

use super::builder::ProcessCommandBuilder;
use super::error::ProcessError;

/// Values substituted for `{name}` placeholders
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: BTreeMap<&'static str, String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(name, value.into());
        self
    }

    fn expand(&self, word: &str) -> String {
        self.values
            .iter()
            .fold(word.to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
    }
}

/// A configured command line, split into words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    line: String,
    words: Vec<String>,
}

impl CommandLine {
    pub fn parse(line: &str) -> Result<Self, ProcessError> {
        let words = shell_words::split(line)
            .map_err(|e| ProcessError::invalid_command(line, e.to_string()))?;
        if words.is_empty() {
            return Err(ProcessError::invalid_command(line, "command line is empty"));
        }
        Ok(Self {
            line: line.to_string(),
            words,
        })
    }

    pub fn program(&self) -> &str {
        &self.words[0]
    }

    /// Builder for this line with placeholders expanded
    pub fn to_builder(
        &self,
        placeholders: &Placeholders,
    ) -> Result<ProcessCommandBuilder, ProcessError> {
        let words = self.words.iter().map(|w| placeholders.expand(w)).collect();
        ProcessCommandBuilder::from_words(&self.line, words)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}
