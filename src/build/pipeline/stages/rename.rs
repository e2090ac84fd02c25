//! Pattern-driven rename stage.

use std::collections::HashSet;

use async_trait::async_trait;
use regex::{Captures, Regex};

use crate::build::pipeline::error::compile_pattern;
use crate::build::pipeline::{PipelineContext, PipelineError, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::RenameConfig;

const NAME: &str = "rename";

/// A parsed piece of the `to` template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Group(usize),
}

/// Stage that moves every record whose key matches `from` to a path built
/// from the `to` template.
///
/// `$N` in the template is replaced with capture group `N` of `from` matched
/// against the record's current key (`$0` is the whole match, `$$` a literal
/// dollar sign). Keys are matched once per run, against the snapshot taken
/// when the stage starts, so renamed records are never matched again.
pub struct RenameStage {
    from: Regex,
    to: Vec<Segment>,
}

impl RenameStage {
    /// Compile the pattern and template.
    ///
    /// A template that refers to a group the pattern does not have is
    /// rejected here rather than producing broken paths later.
    pub fn new(config: &RenameConfig) -> Result<Self, PipelineError> {
        let from = compile_pattern(NAME, "from", &config.from)?;
        let to = parse_template(&config.to);

        let groups = from.captures_len() - 1;
        if let Some(index) = to.iter().find_map(|segment| match segment {
            Segment::Group(index) if *index > groups => Some(*index),
            _ => None,
        }) {
            return Err(PipelineError::configuration(
                NAME,
                format!(
                    "template {:?} refers to ${index} but {:?} has {groups} capture group(s)",
                    config.to, config.from
                ),
            ));
        }

        Ok(Self { from, to })
    }

    /// The new key for `path`, or `None` if it does not match.
    pub fn rename(&self, path: &str) -> Option<String> {
        let captures = self.from.captures(path)?;
        Some(self.substitute(&captures))
    }

    fn substitute(&self, captures: &Captures<'_>) -> String {
        self.to
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                // Optional groups that did not participate become empty
                Segment::Group(index) => captures.get(*index).map_or("", |m| m.as_str()),
            })
            .collect()
    }
}

/// Split a template into literals and `$N` group references.
fn parse_template(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            literal.push(c);
            continue;
        }

        match chars.peek() {
            Some('$') => {
                chars.next();
                literal.push('$');
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(*d);
                    chars.next();
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                // Digit runs too long for usize can never be a valid group
                segments.push(Segment::Group(digits.parse().unwrap_or(usize::MAX)));
            }
            _ => literal.push('$'),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

#[async_trait]
impl Stage for RenameStage {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn process(
        &self,
        files: &mut FileStore,
        _ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        let mut renamed: HashSet<String> = HashSet::new();

        for path in files.keys() {
            if renamed.contains(&path) {
                continue;
            }
            let Some(new_path) = self.rename(&path) else {
                continue;
            };
            if new_path.trim_matches('/').is_empty() {
                return Err(StageError::file(
                    path,
                    format!("renaming to {new_path:?} leaves an empty path"),
                ));
            }

            files.relocate(&path, &new_path);
            renamed.insert(new_path);
        }

        Ok(())
    }
}
