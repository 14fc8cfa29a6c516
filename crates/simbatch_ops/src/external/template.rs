//! Command template mini-language.
//!
//! A template is a command line with placeholders:
//! - `{0}`, `{1}`, ...: positional arguments
//! - `{seed}`, `{batch_index}`, `{index_in_batch}`, `{submission_index}`:
//!   call metadata
//!
//! `{{` and `}}` produce literal braces. Tokens are separated by any amount
//! of whitespace.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use simbatch_random::SubSeed;
use std::fmt;
use std::str::FromStr;

/// A placeholder inside a command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// Positional argument.
    Positional(usize),
    /// Seed of the call or item.
    Seed,
    /// Batch index.
    BatchIndex,
    /// Position of the item in its batch.
    IndexInBatch,
    /// Identifier of the call.
    SubmissionIndex,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "seed" => Some(Self::Seed),
            "batch_index" => Some(Self::BatchIndex),
            "index_in_batch" => Some(Self::IndexInBatch),
            "submission_index" => Some(Self::SubmissionIndex),
            digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                digits.parse().ok().map(Self::Positional)
            }
            _ => None,
        }
    }

    /// Returns true if filling this placeholder requires metadata.
    ///
    /// `{seed}` does not: without metadata it is drawn from the operation's
    /// random stream.
    #[must_use]
    pub const fn needs_meta(self) -> bool {
        matches!(
            self,
            Self::BatchIndex | Self::IndexInBatch | Self::SubmissionIndex
        )
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional(n) => write!(f, "{n}"),
            Self::Seed => f.write_str("seed"),
            Self::BatchIndex => f.write_str("batch_index"),
            Self::IndexInBatch => f.write_str("index_in_batch"),
            Self::SubmissionIndex => f.write_str("submission_index"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// Values available to fill a template.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bindings<'a> {
    /// Positional arguments.
    pub args: &'a [Value],
    /// Seed, if available.
    pub seed: Option<SubSeed>,
    /// Batch index, if metadata is enabled.
    pub batch_index: Option<u64>,
    /// Item position, if metadata is enabled inside a vectorized call.
    pub index_in_batch: Option<usize>,
    /// Submission index, if metadata is enabled.
    pub submission_index: Option<u64>,
}

/// A parsed command template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandTemplate {
    source: String,
    tokens: Vec<Vec<Segment>>,
}

impl CommandTemplate {
    /// Parses a template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] for an empty template, unbalanced braces
    /// or an unknown placeholder.
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = source
            .split_whitespace()
            .map(|token| parse_token(token).map_err(|reason| template_error(source, reason)))
            .collect::<Result<Vec<_>>>()?;

        if tokens.is_empty() {
            return Err(template_error(source, "template is empty".to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    /// The template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholders in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.tokens.iter().flatten().filter_map(|segment| match segment {
            Segment::Placeholder(p) => Some(*p),
            Segment::Literal(_) => None,
        })
    }

    /// Returns true if the template contains `placeholder`.
    #[must_use]
    pub fn uses(&self, placeholder: Placeholder) -> bool {
        self.placeholders().any(|p| p == placeholder)
    }

    /// First placeholder that requires metadata, if any.
    #[must_use]
    pub fn first_meta_placeholder(&self) -> Option<Placeholder> {
        self.placeholders().find(|p| p.needs_meta())
    }

    /// Renders the template into an argument vector.
    ///
    /// Each rendered token is split on whitespace again, so a list argument
    /// expands into one argument per item.
    ///
    /// # Errors
    ///
    /// Returns an error if a positional argument is missing or a metadata
    /// value is unavailable.
    pub fn render(&self, bindings: &Bindings<'_>) -> Result<Vec<String>> {
        let mut argv = Vec::new();
        for token in &self.tokens {
            let mut rendered = String::new();
            for segment in token {
                match segment {
                    Segment::Literal(text) => rendered.push_str(text),
                    Segment::Placeholder(p) => rendered.push_str(&fill(*p, bindings)?),
                }
            }
            argv.extend(rendered.split_whitespace().map(str::to_string));
        }
        Ok(argv)
    }
}

fn fill(placeholder: Placeholder, bindings: &Bindings<'_>) -> Result<String> {
    let unavailable = |reason: &str| Error::misconfigured(placeholder.to_string(), reason);
    match placeholder {
        Placeholder::Positional(position) => bindings
            .args
            .get(position)
            .map(ToString::to_string)
            .ok_or(Error::MissingArgument {
                position,
                provided: bindings.args.len(),
            }),
        Placeholder::Seed => bindings
            .seed
            .map(|seed| seed.to_string())
            .ok_or_else(|| unavailable("no seed is available for this call")),
        Placeholder::BatchIndex => bindings
            .batch_index
            .map(|index| index.to_string())
            .ok_or_else(|| unavailable("metadata is not enabled for this operation")),
        Placeholder::SubmissionIndex => bindings
            .submission_index
            .map(|index| index.to_string())
            .ok_or_else(|| unavailable("metadata is not enabled for this operation")),
        Placeholder::IndexInBatch => bindings
            .index_in_batch
            .map(|index| index.to_string())
            .ok_or_else(|| unavailable("only available inside a vectorized call with metadata")),
    }
}

fn template_error(source: &str, reason: String) -> Error {
    Error::Template {
        template: source.to_string(),
        reason,
    }
}

fn parse_token(token: &str) -> std::result::Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = token.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => return Err(format!("unclosed placeholder '{{{name}'")),
                    }
                }
                let placeholder = Placeholder::parse(&name)
                    .ok_or_else(|| format!("unknown placeholder '{{{name}}}'"))?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(placeholder));
            }
            '}' => return Err("unmatched '}'".to_string()),
            c => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

impl FromStr for CommandTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CommandTemplate {
    type Error = Error;

    fn try_from(source: String) -> Result<Self> {
        Self::parse(&source)
    }
}

impl From<CommandTemplate> for String {
    fn from(template: CommandTemplate) -> Self {
        template.source
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
