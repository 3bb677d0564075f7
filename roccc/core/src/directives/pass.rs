//! Optimization pass files.
//!
//! ```text
//! # comment
//! fully unroll <label>
//! partially unroll <label> <count>
//! generate tile <label1> <label2> <len1> <len2>
//! generate systolic array <label1> <label2> <size>
//! ```
use super::{Buckets, Directive, Rule, parse_lines};
use crate::error::Result;
use crate::fs;
use camino::Utf8Path;
use once_cell::sync::Lazy;
use regex::Captures;
use std::fmt::Display;

/// A loop transformation requested by a pass file. Labels name loops in
/// the C source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassDirective {
    FullUnroll {
        label: String,
    },
    PartialUnroll {
        label: String,
        factor: u32,
    },
    Tile {
        outer: String,
        inner: String,
        outer_len: u32,
        inner_len: u32,
    },
    SystolicArray {
        outer: String,
        inner: String,
        size: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassTag {
    FullUnroll,
    PartialUnroll,
    Tile,
    SystolicArray,
}

impl Directive for PassDirective {
    type Tag = PassTag;

    const TAGS: &'static [PassTag] = &[
        PassTag::FullUnroll,
        PassTag::PartialUnroll,
        PassTag::Tile,
        PassTag::SystolicArray,
    ];

    fn tag(&self) -> PassTag {
        match self {
            PassDirective::FullUnroll { .. } => PassTag::FullUnroll,
            PassDirective::PartialUnroll { .. } => PassTag::PartialUnroll,
            PassDirective::Tile { .. } => PassTag::Tile,
            PassDirective::SystolicArray { .. } => PassTag::SystolicArray,
        }
    }
}

impl Display for PassDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassDirective::FullUnroll { label } => {
                write!(f, "fully unroll {label}")
            }
            PassDirective::PartialUnroll { label, factor } => {
                write!(f, "partially unroll {label} {factor}")
            }
            PassDirective::Tile {
                outer,
                inner,
                outer_len,
                inner_len,
            } => write!(
                f,
                "generate tile {outer} {inner} {outer_len} {inner_len}"
            ),
            PassDirective::SystolicArray { outer, inner, size } => {
                write!(f, "generate systolic array {outer} {inner} {size}")
            }
        }
    }
}

pub type PassBuckets = Buckets<PassDirective>;

fn text(caps: &Captures, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().to_string())
}

fn number(caps: &Captures, name: &str) -> Option<u32> {
    caps.name(name)?.as_str().parse().ok()
}

static RULES: Lazy<Vec<Rule<PassDirective>>> = Lazy::new(|| {
    vec![
        Rule::new(
            r"^[ \t]*fully[ \t]+unroll[ \t]+(?P<label>\w+)[ \t]*$",
            |caps| {
                Some(PassDirective::FullUnroll {
                    label: text(caps, "label")?,
                })
            },
        ),
        Rule::new(
            r"^[ \t]*partially[ \t]+unroll[ \t]+(?P<label>\w+)[ \t]+(?P<factor>\d+)[ \t]*$",
            |caps| {
                Some(PassDirective::PartialUnroll {
                    label: text(caps, "label")?,
                    factor: number(caps, "factor")?,
                })
            },
        ),
        Rule::new(
            r"^[ \t]*generate[ \t]+tile[ \t]+(?P<l1>\w+)[ \t]+(?P<l2>\w+)[ \t]+(?P<t1>\d+)[ \t]+(?P<t2>\d+)[ \t]*$",
            |caps| {
                Some(PassDirective::Tile {
                    outer: text(caps, "l1")?,
                    inner: text(caps, "l2")?,
                    outer_len: number(caps, "t1")?,
                    inner_len: number(caps, "t2")?,
                })
            },
        ),
        Rule::new(
            r"^[ \t]*generate[ \t]+systolic[ \t]+array[ \t]+(?P<l1>\w+)[ \t]+(?P<l2>\w+)[ \t]+(?P<size>\d+)[ \t]*$",
            |caps| {
                Some(PassDirective::SystolicArray {
                    outer: text(caps, "l1")?,
                    inner: text(caps, "l2")?,
                    size: number(caps, "size")?,
                })
            },
        ),
    ]
});

/// Parse pass-file text. `origin` names the file in error messages.
pub fn parse_passes(source: &str, origin: &Utf8Path) -> Result<PassBuckets> {
    parse_lines(RULES.as_slice(), source, origin)
}

/// Parse the pass file at `path`. No file means no optimizations.
pub fn parse_pass_file(path: Option<&Utf8Path>) -> Result<PassBuckets> {
    match path {
        None => {
            log::info!("No pass file defined, default no-optimizations");
            Ok(PassBuckets::new())
        }
        Some(path) => {
            log::info!("Reading pass file {}", path);
            let source = fs::read(path)?;
            parse_passes(&source, path)
        }
    }
}
