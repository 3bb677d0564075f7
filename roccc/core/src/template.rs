//! Command templates with placeholder tokens and insertion markers.
use crate::error::Result;
use crate::fs;
use camino::Utf8Path;
use std::borrow::Cow;

/// Prefix of a line that is replaced by generated lines.
pub const INSERT_MARKER: &str = "### INSERT ";

/// Placeholder tokens and the text that replaces them.
///
/// Replacement is a single left-to-right scan. At each position the longest
/// matching token wins, and replaced text is never scanned again, so `$1`
/// inside a value stays as it is.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    pairs: Vec<(String, String)>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Into<String>, V: Into<String>>(mut self, token: T, value: V) -> Self {
        let token = token.into();
        if token.is_empty() {
            return self;
        }
        self.pairs.retain(|(t, _)| *t != token);
        self.pairs.push((token, value.into()));
        self.pairs.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        self
    }

    fn longest_at(&self, rest: &str) -> Option<&(String, String)> {
        self.pairs.iter().find(|(token, _)| rest.starts_with(token.as_str()))
    }

    /// Replace every token in `text`.
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !self.pairs.iter().any(|(token, _)| text.contains(token.as_str())) {
            return Cow::Borrowed(text);
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            match self.longest_at(rest) {
                Some((token, value)) => {
                    out.push_str(value);
                    rest = &rest[token.len()..];
                }
                None => {
                    out.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        Cow::Owned(out)
    }
}

/// Produces the lines that replace an insertion marker.
pub trait Expander {
    /// Lines for the marker `tag`. `None` means the tag is not known, and an
    /// empty list means there is nothing to insert.
    fn expand(&self, tag: &str) -> Option<Vec<String>>;
}

/// An expander that knows no tags.
pub struct NoMarkers;

impl Expander for NoMarkers {
    fn expand(&self, _tag: &str) -> Option<Vec<String>> {
        None
    }
}

/// A sequence of template lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    lines: Vec<String>,
}

impl Template {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn from_file(path: &Utf8Path) -> Result<Self> {
        log::debug!("Loading template {}", path);
        Ok(Self::new(&fs::read(path)?))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Substitute placeholders and replace markers with the lines `expander`
    /// generates for them.
    pub fn expand<E: Expander>(&self, subst: &Substitutions, expander: &E) -> Vec<String> {
        let mut out = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let generated = line
                .trim_start()
                .strip_prefix(INSERT_MARKER)
                .and_then(|tag| expander.expand(tag.trim()));
            match generated {
                Some(lines) => {
                    log::trace!("{} expands to {} line(s)", line.trim(), lines.len());
                    out.extend(lines);
                }
                None => out.push(subst.apply(line).into_owned()),
            }
        }
        out
    }

    /// Substitute placeholders only. Each line of the result ends in `\n`.
    pub fn instantiate(&self, subst: &Substitutions) -> String {
        self.expand(subst, &NoMarkers)
            .into_iter()
            .map(|line| line + "\n")
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Expander for Fixed {
        fn expand(&self, tag: &str) -> Option<Vec<String>> {
            match tag {
                "TWO" => Some(vec!["a ;".into(), "b ;".into()]),
                "NONE" => Some(vec![]),
                _ => None,
            }
        }
    }

    #[test]
    fn longest_token_wins() {
        let subst = Substitutions::new()
            .with("$1", "fir")
            .with("$10", "ten")
            .with("$2", "$1");
        assert_eq!(subst.apply("load $1.suif $10 $2"), "load fir.suif ten $1");
        assert!(matches!(subst.apply("nothing here"), Cow::Borrowed(_)));
    }

    #[test]
    fn later_value_replaces_earlier() {
        let subst = Substitutions::new().with("X", "1").with("X", "2");
        assert_eq!(subst.apply("X-X"), "2-2");
    }

    #[test]
    fn markers() {
        let template = Template::new(
            "load $1.suif ;\n### INSERT TWO\n### INSERT NONE\n### INSERT OTHER $1\nsave $1 ;",
        );
        let subst = Substitutions::new().with("$1", "fir");
        let lines = template.expand(&subst, &Fixed);
        assert_eq!(
            lines,
            ["load fir.suif ;", "a ;", "b ;", "### INSERT OTHER fir", "save fir ;"]
        );
        assert_eq!(lines, template.expand(&subst, &Fixed));
    }

    #[test]
    fn plain_instantiation() {
        let template = Template::new("THE_DEFAULT_SOURCE_DIR = x\r\n### INSERT TWO");
        let subst = Substitutions::new().with("THE_DEFAULT_SOURCE_DIR", "SRC");
        assert_eq!(template.instantiate(&subst), "SRC = x\n### INSERT TWO\n");
    }
}
