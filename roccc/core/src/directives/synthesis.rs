//! Synthesis directive files (`DIRECTIVES.dat`).
//!
//! Keyword lines name the design and its files. Bracketed blocks carry raw
//! text that is copied byte-for-byte into tool option and project files:
//!
//! ```text
//! TOP_ENTITY fir
//! FILE_VHDL_SYNTHESIZE fir.vhd
//! FILE_VHDL_EXTRA rc100.vhd
//! FILE_SW fir_host.c
//! DEFAULT_SYNTHESIS_OPTIONS_START
//! run
//! -ifn fir.prj
//! DEFAULT_SYNTHESIS_OPTIONS_END
//! ```
//!
//! Which blocks are read depends on the [Flavor] of synthesis; the blocks of
//! other flavors are skipped.
use super::{Buckets, Directive, Line, Rule, bad_line, classify};
use crate::error::{Error, Result};
use crate::fs;
use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::Lazy;

/// The synthesis flow a directive file is read for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Default,
    RascXst,
    RascSynplifyPro,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisDirective {
    TopEntity(String),
    /// A VHDL file produced by the compiler.
    Synthesize(Utf8PathBuf),
    /// A hand-written VHDL file that goes along with the design.
    Extra(Utf8PathBuf),
    /// Host software for the RASC blade.
    HostSource(Utf8PathBuf),
    /// A raw line of synthesis options, terminator included.
    OptionLine(String),
    /// A raw line of project options, terminator included.
    ProjectLine(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SynthesisTag {
    TopEntity,
    Synthesize,
    Extra,
    HostSource,
    Options,
    Project,
}

impl Directive for SynthesisDirective {
    type Tag = SynthesisTag;

    const TAGS: &'static [SynthesisTag] = &[
        SynthesisTag::TopEntity,
        SynthesisTag::Synthesize,
        SynthesisTag::Extra,
        SynthesisTag::HostSource,
        SynthesisTag::Options,
        SynthesisTag::Project,
    ];

    fn tag(&self) -> SynthesisTag {
        match self {
            SynthesisDirective::TopEntity(_) => SynthesisTag::TopEntity,
            SynthesisDirective::Synthesize(_) => SynthesisTag::Synthesize,
            SynthesisDirective::Extra(_) => SynthesisTag::Extra,
            SynthesisDirective::HostSource(_) => SynthesisTag::HostSource,
            SynthesisDirective::OptionLine(_) => SynthesisTag::Options,
            SynthesisDirective::ProjectLine(_) => SynthesisTag::Project,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Options,
    Project,
}

struct Block {
    start: &'static str,
    end: &'static str,
    kind: BlockKind,
    flavor: Flavor,
}

const BLOCKS: &[Block] = &[
    Block {
        start: "DEFAULT_SYNTHESIS_OPTIONS_START",
        end: "DEFAULT_SYNTHESIS_OPTIONS_END",
        kind: BlockKind::Options,
        flavor: Flavor::Default,
    },
    Block {
        start: "SYNTHESIS_OPTIONS_START",
        end: "SYNTHESIS_OPTIONS_END",
        kind: BlockKind::Options,
        flavor: Flavor::Default,
    },
    Block {
        start: "RASC_XST_SYNTHESIS_SCRIPT_OPTIONS_START",
        end: "RASC_XST_SYNTHESIS_SCRIPT_OPTIONS_END",
        kind: BlockKind::Options,
        flavor: Flavor::RascXst,
    },
    Block {
        start: "RASC_XST_PROJECT_OPTIONS_START",
        end: "RASC_XST_PROJECT_OPTIONS_END",
        kind: BlockKind::Project,
        flavor: Flavor::RascXst,
    },
    Block {
        start: "RASC_SYNPLIFY_PRO_PROJECT_OPTIONS_START",
        end: "RASC_SYNPLIFY_PRO_PROJECT_OPTIONS_END",
        kind: BlockKind::Project,
        flavor: Flavor::RascSynplifyPro,
    },
];

/// Where the parser is within a directive file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionState {
    Scanning,
    ReadingOptionBlock { end: &'static str },
    ReadingProjectBlock { end: &'static str },
    SkippingBlock { end: &'static str },
}

static KEYWORDS: Lazy<Vec<Rule<SynthesisDirective>>> = Lazy::new(|| {
    vec![
        Rule::new(r"^TOP_ENTITY\s+(\S+)\s*$", |caps| {
            Some(SynthesisDirective::TopEntity(caps[1].to_string()))
        }),
        Rule::new(r"^FILE_VHDL_SYNTHESIZE\s+(\S+)\s*$", |caps| {
            Some(SynthesisDirective::Synthesize(Utf8PathBuf::from(&caps[1])))
        }),
        Rule::new(r"^FILE_VHDL_EXTRA\s+(\S+)\s*$", |caps| {
            Some(SynthesisDirective::Extra(Utf8PathBuf::from(&caps[1])))
        }),
        Rule::new(r"^FILE_SW\s+(\S+)\s*$", |caps| {
            Some(SynthesisDirective::HostSource(Utf8PathBuf::from(&caps[1])))
        }),
    ]
});

/// The directives of one synthesis run.
#[derive(Debug, Clone)]
pub struct SynthesisDirectives {
    source: Utf8PathBuf,
    buckets: Buckets<SynthesisDirective>,
}

impl SynthesisDirectives {
    /// Parse directive text for `flavor`. `origin` names the file in
    /// messages.
    pub fn parse(source: &str, origin: &Utf8Path, flavor: Flavor) -> Result<Self> {
        let mut buckets = Buckets::new();
        let mut state = SectionState::Scanning;
        let mut last_line = 0;

        for (idx, raw) in source.split_inclusive('\n').enumerate() {
            let line = raw.trim_end_matches(['\n', '\r']);
            let line_no = idx + 1;
            last_line = line_no;

            match state {
                SectionState::Scanning => {
                    if let Some(block) = start_marker(line) {
                        state = match block.kind {
                            _ if block.flavor != flavor => {
                                log::debug!("{origin}:{line_no}: skipping {}", block.start);
                                SectionState::SkippingBlock { end: block.end }
                            }
                            BlockKind::Options => {
                                SectionState::ReadingOptionBlock { end: block.end }
                            }
                            BlockKind::Project => {
                                SectionState::ReadingProjectBlock { end: block.end }
                            }
                        };
                        continue;
                    }
                    match classify(KEYWORDS.as_slice(), line) {
                        Line::Blank => {}
                        Line::Comment => log::debug!("{origin}: comment: {line}"),
                        Line::Record(record) => buckets.push(record),
                        Line::Unrecognized => {
                            return Err(bad_line(origin, line_no, line));
                        }
                    }
                }
                SectionState::ReadingOptionBlock { end }
                | SectionState::ReadingProjectBlock { end }
                | SectionState::SkippingBlock { end }
                    if line.trim_start().starts_with(end) =>
                {
                    state = SectionState::Scanning;
                }
                _ if line.starts_with('#') => {}
                SectionState::ReadingOptionBlock { .. } => {
                    buckets.push(SynthesisDirective::OptionLine(raw.to_string()))
                }
                SectionState::ReadingProjectBlock { .. } => {
                    buckets.push(SynthesisDirective::ProjectLine(raw.to_string()))
                }
                SectionState::SkippingBlock { .. } => {}
            }
        }

        match state {
            SectionState::Scanning => Ok(Self {
                source: origin.to_owned(),
                buckets,
            }),
            SectionState::ReadingOptionBlock { end }
            | SectionState::ReadingProjectBlock { end }
            | SectionState::SkippingBlock { end } => Err(Error::MissingDirective {
                file: origin.to_owned(),
                message: format!("block not closed by {end} before line {}", last_line + 1),
            }),
        }
    }

    /// Read and parse the directive file at `path`.
    pub fn from_file(path: &Utf8Path, flavor: Flavor) -> Result<Self> {
        log::info!("Reading synthesis directives {}", path);
        let text = fs::read(path)?;
        Self::parse(&text, path, flavor)
    }

    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    pub fn buckets(&self) -> &Buckets<SynthesisDirective> {
        &self.buckets
    }

    /// The top-level entity. When given more than once the last one wins.
    pub fn top_entity(&self) -> Result<&str> {
        self.buckets
            .get(SynthesisTag::TopEntity)
            .iter()
            .rev()
            .find_map(|d| match d {
                SynthesisDirective::TopEntity(name) => Some(name.as_str()),
                _ => None,
            })
            .ok_or_else(|| Error::MissingDirective {
                file: self.source.clone(),
                message: "no TOP_ENTITY given".to_string(),
            })
    }

    fn paths(&self, tag: SynthesisTag) -> impl Iterator<Item = &Utf8Path> {
        self.buckets.get(tag).iter().filter_map(|d| match d {
            SynthesisDirective::Synthesize(p)
            | SynthesisDirective::Extra(p)
            | SynthesisDirective::HostSource(p) => Some(p.as_path()),
            _ => None,
        })
    }

    /// Compiler-generated VHDL files, in file order.
    pub fn synthesize_files(&self) -> impl Iterator<Item = &Utf8Path> {
        self.paths(SynthesisTag::Synthesize)
    }

    /// Additional VHDL files, in file order.
    pub fn extra_files(&self) -> impl Iterator<Item = &Utf8Path> {
        self.paths(SynthesisTag::Extra)
    }

    pub fn host_source(&self) -> Option<&Utf8Path> {
        self.paths(SynthesisTag::HostSource).last()
    }

    fn raw(&self, tag: SynthesisTag) -> String {
        self.buckets
            .get(tag)
            .iter()
            .filter_map(|d| match d {
                SynthesisDirective::OptionLine(text)
                | SynthesisDirective::ProjectLine(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The option block, exactly as written.
    pub fn options_text(&self) -> String {
        self.raw(SynthesisTag::Options)
    }

    /// The project block, exactly as written.
    pub fn project_text(&self) -> String {
        self.raw(SynthesisTag::Project)
    }
}

/// The block opened by `line`. Markers match by prefix; anything after
/// the marker is ignored.
fn start_marker(line: &str) -> Option<&'static Block> {
    let line = line.trim_start();
    BLOCKS.iter().find(|block| line.starts_with(block.start))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTIVES: &str = "\
# fir filter
TOP_ENTITY fir
FILE_VHDL_SYNTHESIZE fir.vhd
FILE_VHDL_SYNTHESIZE ROCCC_utility_lib.vhd
FILE_VHDL_EXTRA rc100.vhd
FILE_SW fir_host.c

DEFAULT_SYNTHESIS_OPTIONS_START
run
  -ifn fir.prj\t
# dropped
-p xc4vlx200-ff1513-10
DEFAULT_SYNTHESIS_OPTIONS_END
RASC_XST_PROJECT_OPTIONS_START
vhdl work $RASC/design/acs_adr.vhd
RASC_XST_PROJECT_OPTIONS_END
RASC_XST_SYNTHESIS_SCRIPT_OPTIONS_START
run -ifn fir.prj -ofn fir
RASC_XST_SYNTHESIS_SCRIPT_OPTIONS_END
RASC_SYNPLIFY_PRO_PROJECT_OPTIONS_START
project -result_file ./rev_1/fir.edf
RASC_SYNPLIFY_PRO_PROJECT_OPTIONS_END
";

    fn parse(source: &str, flavor: Flavor) -> Result<SynthesisDirectives> {
        SynthesisDirectives::parse(source, Utf8Path::new("DIRECTIVES.dat"), flavor)
    }

    #[test]
    fn default_flavor() {
        let d = parse(DIRECTIVES, Flavor::Default).unwrap();
        assert_eq!(d.top_entity().unwrap(), "fir");
        assert_eq!(
            d.synthesize_files().map(Utf8Path::as_str).collect::<Vec<_>>(),
            ["fir.vhd", "ROCCC_utility_lib.vhd"]
        );
        assert_eq!(
            d.extra_files().map(Utf8Path::as_str).collect::<Vec<_>>(),
            ["rc100.vhd"]
        );
        assert_eq!(d.host_source(), Some(Utf8Path::new("fir_host.c")));
        assert_eq!(
            d.options_text(),
            "run\n  -ifn fir.prj\t\n-p xc4vlx200-ff1513-10\n"
        );
        assert_eq!(d.project_text(), "");
    }

    #[test]
    fn rasc_flavors() {
        let xst = parse(DIRECTIVES, Flavor::RascXst).unwrap();
        assert_eq!(xst.options_text(), "run -ifn fir.prj -ofn fir\n");
        assert_eq!(xst.project_text(), "vhdl work $RASC/design/acs_adr.vhd\n");

        let synplify = parse(DIRECTIVES, Flavor::RascSynplifyPro).unwrap();
        assert_eq!(synplify.options_text(), "");
        assert_eq!(
            synplify.project_text(),
            "project -result_file ./rev_1/fir.edf\n"
        );
    }

    #[test]
    fn keeps_carriage_returns() {
        let d = parse(
            "TOP_ENTITY t\r\nSYNTHESIS_OPTIONS_START\r\n-opt_mode Speed\r\nSYNTHESIS_OPTIONS_END\r\n",
            Flavor::Default,
        )
        .unwrap();
        assert_eq!(d.top_entity().unwrap(), "t");
        assert_eq!(d.options_text(), "-opt_mode Speed\r\n");
    }

    #[test]
    fn last_top_entity_wins() {
        let d = parse("TOP_ENTITY a\nTOP_ENTITY b\n", Flavor::Default).unwrap();
        assert_eq!(d.top_entity().unwrap(), "b");
    }

    #[test]
    fn errors() {
        let missing_top = parse("FILE_VHDL_SYNTHESIZE a.vhd\n", Flavor::Default)
            .unwrap()
            .top_entity()
            .unwrap_err();
        assert_eq!(missing_top.exit_code(), 6);

        match parse("TOP_ENTITY a\nSTART\n", Flavor::Default) {
            Err(Error::BadDirective { line_no: 2, line, .. }) => {
                assert_eq!(line, "START")
            }
            other => panic!("unexpected {other:?}"),
        }

        let unterminated =
            parse("TOP_ENTITY a\nSYNTHESIS_OPTIONS_START\nrun\n", Flavor::Default)
                .unwrap_err();
        assert!(matches!(unterminated, Error::MissingDirective { .. }));

        let keyword_without_value = parse("TOP_ENTITY\n", Flavor::Default).unwrap_err();
        assert!(matches!(keyword_without_value, Error::BadDirective { .. }));

        match parse("TOP_ENTITY a b\n", Flavor::Default) {
            Err(Error::BadDirective { line_no: 1, line, .. }) => {
                assert_eq!(line, "TOP_ENTITY a b")
            }
            other => panic!("unexpected {other:?}"),
        }
        let two_files = parse("FILE_VHDL_SYNTHESIZE a.vhd b.vhd\n", Flavor::Default);
        assert!(matches!(two_files, Err(Error::BadDirective { .. })));
    }

    #[test]
    fn trailing_whitespace_after_value() {
        let d = parse("TOP_ENTITY fir \t\n", Flavor::Default).unwrap();
        assert_eq!(d.top_entity().unwrap(), "fir");
    }

    #[test]
    fn markers_match_by_prefix() {
        let d = parse(
            "TOP_ENTITY t\nDEFAULT_SYNTHESIS_OPTIONS_START extra words\nrun\nDEFAULT_SYNTHESIS_OPTIONS_END -- done\nFILE_SW host.c\n",
            Flavor::Default,
        )
        .unwrap();
        assert_eq!(d.options_text(), "run\n");
        assert_eq!(d.host_source(), Some(Utf8Path::new("host.c")));

        let xst = parse(
            "RASC_XST_PROJECT_OPTIONS_START_v2\nvhdl work a.vhd\nRASC_XST_PROJECT_OPTIONS_END\n",
            Flavor::RascXst,
        )
        .unwrap();
        assert_eq!(xst.project_text(), "vhdl work a.vhd\n");
    }
}
