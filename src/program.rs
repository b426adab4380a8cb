//! The front-end's output: instructions, labels, diagnostics, tokens.

use std::collections::HashMap;
use std::fmt;

use crate::error::ParseError;
use crate::instruction::Instruction;
use crate::lexer::Token;
use crate::parser;

/// Mapping from label names to instruction indexes.
///
/// Labels are case-sensitive. A label on an otherwise empty trailing
/// line points one past the last instruction, which makes a branch to
/// it halt cleanly.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    inner: HashMap<String, usize>,
}

impl LabelTable {
    pub fn new() -> LabelTable {
        LabelTable::default()
    }

    /// Defines `name` at `index`. On a duplicate definition the first
    /// one wins and the previous index is returned as the error.
    pub(crate) fn define(&mut self, name: &str, index: usize) -> Result<(), usize> {
        if let Some(&previous) = self.inner.get(name) {
            return Err(previous);
        }

        self.inner.insert(name.to_string(), index);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.inner.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.inner.iter().map(|(name, &index)| (name.as_str(), index))
    }
}

/// A fully parsed program.
///
/// Always produced, even when diagnostics exist; `instructions` may be
/// partial but every element of it is well-formed on its own. The
/// processor refuses to load a program whose `parse_errors` is
/// non-empty; callers that only want colorization use `tokens`.
#[derive(Debug, Clone, Default)]
pub struct ParsedProgram {
    pub instructions: Vec<Instruction>,
    pub labels: LabelTable,
    pub parse_errors: Vec<ParseError>,
    pub tokens: Vec<Token>,
}

impl ParsedProgram {
    /// Parses `source` completely. Never fails; diagnostics are data.
    pub fn parse(source: &str) -> ParsedProgram {
        parser::parse(source)
    }

    pub fn is_valid(&self) -> bool {
        self.parse_errors.is_empty()
    }

    /// Human-readable listing used by the debug views.
    pub fn dump(&self) -> String {
        let mut text = String::new();

        text.push_str("Instructions:\n");
        if self.instructions.is_empty() {
            text.push_str("None\n");
        }
        for (index, instruction) in self.instructions.iter().enumerate() {
            text.push_str(&format!("#{:04}: {}\n", index, instruction));
        }

        text.push_str("\nLabels:\n");
        if self.labels.is_empty() {
            text.push_str("None\n");
        }
        let mut labels: Vec<_> = self.labels.iter().collect();
        labels.sort_by_key(|&(_, index)| index);
        for (name, index) in labels {
            text.push_str(&format!("{} -> #{:04}\n", name, index));
        }

        text.push_str("\nParse errors:\n");
        if self.parse_errors.is_empty() {
            text.push_str("None\n");
        }
        for error in &self.parse_errors {
            text.push_str(&format!("{}\n", error));
        }

        text
    }
}

impl fmt::Display for ParsedProgram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_definition_keeps_the_first() {
        let mut labels = LabelTable::new();

        assert_eq!(labels.define("loop", 2), Ok(()));
        assert_eq!(labels.define("loop", 5), Err(2));
        assert_eq!(labels.get("loop"), Some(2));
    }

    #[test]
    fn labels_are_case_sensitive() {
        let mut labels = LabelTable::new();
        labels.define("Main", 0).unwrap();

        assert!(labels.contains("Main"));
        assert!(!labels.contains("main"));
    }
}
