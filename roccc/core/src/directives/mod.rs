//! Line-oriented directive files.
//!
//! A directive file is read one line at a time. Each line is either blank, a
//! `#` comment, or matched against an ordered list of [Rule]s; the first
//! matching rule turns it into a typed record that is appended to the
//! [Buckets] entry for its tag. Anything else is a syntax error.
pub mod pass;
pub mod synthesis;

use crate::error::{Error, Result};
use camino::Utf8Path;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fmt::Debug;

pub use pass::{PassBuckets, PassDirective, PassTag, parse_pass_file};
pub use synthesis::{Flavor, SynthesisDirective, SynthesisDirectives};

/// A record parsed from one directive line.
pub trait Directive {
    type Tag: Copy + Ord + Debug + 'static;

    /// Every tag, in the order buckets are reported.
    const TAGS: &'static [Self::Tag];

    fn tag(&self) -> Self::Tag;
}

/// Parsed directives grouped by tag. Every tag has a bucket, possibly empty,
/// and records keep their file order within a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Buckets<D: Directive> {
    buckets: BTreeMap<D::Tag, Vec<D>>,
}

impl<D: Directive> Default for Buckets<D> {
    fn default() -> Self {
        Self {
            buckets: D::TAGS.iter().map(|&tag| (tag, Vec::new())).collect(),
        }
    }
}

impl<D: Directive> Buckets<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, directive: D) {
        self.buckets.entry(directive.tag()).or_default().push(directive);
    }

    /// The records with `tag`, in file order.
    pub fn get(&self, tag: D::Tag) -> &[D] {
        self.buckets.get(&tag).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (D::Tag, &[D])> {
        self.buckets.iter().map(|(tag, ds)| (*tag, ds.as_slice()))
    }
}

/// Extracts a record from the captures of a matching line. Returns `None`
/// when a captured field is out of range.
pub type Extract<D> = fn(&Captures) -> Option<D>;

/// One line form of a directive file.
pub struct Rule<D> {
    pattern: Regex,
    extract: Extract<D>,
}

impl<D> Rule<D> {
    /// Build a rule from a pattern known to be valid.
    pub fn new(pattern: &str, extract: Extract<D>) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("directive pattern is valid"),
            extract,
        }
    }

    fn apply(&self, line: &str) -> Option<Option<D>> {
        self.pattern.captures(line).map(|caps| (self.extract)(&caps))
    }
}

/// What a single line of a directive file turned out to be.
#[derive(Debug, PartialEq, Eq)]
pub enum Line<D> {
    Blank,
    Comment,
    Record(D),
    Unrecognized,
}

static COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#").expect("comment pattern is valid"));

/// Classify `line` against `rules`, first match wins.
pub fn classify<D>(rules: &[Rule<D>], line: &str) -> Line<D> {
    if line.trim().is_empty() {
        return Line::Blank;
    }
    if COMMENT.is_match(line) {
        return Line::Comment;
    }
    for rule in rules {
        match rule.apply(line) {
            Some(Some(record)) => return Line::Record(record),
            Some(None) => return Line::Unrecognized,
            None => {}
        }
    }
    Line::Unrecognized
}

/// Parse every line of `source` with `rules`. `origin` names the source in
/// messages.
pub fn parse_lines<D: Directive>(
    rules: &[Rule<D>],
    source: &str,
    origin: &Utf8Path,
) -> Result<Buckets<D>> {
    let mut buckets = Buckets::new();
    for (idx, line) in source.lines().enumerate() {
        match classify(rules, line) {
            Line::Blank => {}
            Line::Comment => log::debug!("{}: comment: {}", origin, line),
            Line::Record(record) => {
                log::debug!("{}: {:?}", origin, record.tag());
                buckets.push(record);
            }
            Line::Unrecognized => {
                return Err(bad_line(origin, idx + 1, line));
            }
        }
    }
    Ok(buckets)
}

pub(crate) fn bad_line(origin: &Utf8Path, line_no: usize, line: &str) -> Error {
    Error::BadDirective {
        file: origin.to_owned(),
        line_no,
        line: line.to_string(),
    }
}
