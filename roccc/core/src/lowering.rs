//! The lowering chain from high-level CIRRF to VHDL.
//!
//! Every pass reads `<prefix>.<previous suffix>` and writes
//! `<prefix>.<suffix>`. A range argument such as `fir.peep:df` selects the
//! passes strictly after the first name up to and including the second.
use crate::config::ToolConfig;
use crate::error::{Error, Result};
use crate::exec::Invocation;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoweringPass {
    pub name: &'static str,
    pub program: &'static str,
    pub args: &'static [&'static str],
    pub suffix: &'static str,
}

const fn lowering(
    name: &'static str,
    program: &'static str,
    suffix: &'static str,
) -> LoweringPass {
    LoweringPass {
        name,
        program,
        args: &[],
        suffix,
    }
}

/// The chain in execution order. The first entry is the C source itself.
pub const PASSES: &[LoweringPass] = &[
    lowering("C", "", "c"),
    lowering("GCC2SUIF", "gcc2suif", "suif"),
    lowering("LOWER", "do_lower", "lsf"),
    lowering("S2M", "do_s2m", "svm"),
    lowering("IL2CFG", "do_il2cfg", "cfg"),
    LoweringPass {
        name: "CFG2SSA",
        program: "do_cfg2ssa",
        args: &["-build_minimal_form"],
        suffix: "ssa",
    },
    lowering("SSA2CFG", "do_ssa2cfg", "ssacfg"),
    lowering("DCESSA", "do_dcessa", "dcessa"),
    lowering("PEEP", "do_peep", "peep"),
    lowering("PREPROCESS", "do_preprocess", "ppr"),
    lowering("KERNELCFG2DF", "do_kernelcfg2df", "df"),
    lowering("EXPORTBITWIDTH", "do_export_bitwidth", "xbw"),
    lowering("BITRESIZING", "do_bitresizing", "brs"),
    lowering("PLD", "do_pld", "pld"),
    lowering("PLD_GIPCORE", "do_pld_gipcore", "pld_gipcore"),
    lowering("HDLGEN", "do_hdlgen", "hdl"),
];

/// The pass after which the data-flow graph can be drawn.
pub const GRAPH_PASS: &str = "KERNELCFG2DF";

/// Find a pass by name or output suffix, ignoring case.
pub fn find_pass(name: &str) -> Option<usize> {
    PASSES.iter().position(|pass| {
        pass.name.eq_ignore_ascii_case(name) || pass.suffix.eq_ignore_ascii_case(name)
    })
}

/// A contiguous run of lowering passes over one file prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRange {
    prefix: String,
    input: Utf8PathBuf,
    start: usize,
    end: usize,
}

impl PassRange {
    /// The whole chain, starting from `<prefix>.c`.
    pub fn full<S: Into<String>>(prefix: S) -> Self {
        let prefix = prefix.into();
        Self {
            input: format!("{prefix}.c").into(),
            prefix,
            start: 0,
            end: PASSES.len() - 1,
        }
    }

    /// Parse `prefix.c` or `prefix.START:END`. A single name other than the
    /// C source is rejected.
    pub fn parse(arg: &str) -> Result<Self> {
        let invalid = |why: &str| Error::InvalidRange(format!("{arg}: {why}"));
        let (prefix, ext) = arg
            .rsplit_once('.')
            .filter(|(prefix, ext)| {
                !prefix.is_empty() && !prefix.ends_with('/') && !ext.contains('/')
            })
            .ok_or_else(|| invalid("expected <prefix>.<extension>"))?;
        let lookup = |name: &str| {
            find_pass(name).ok_or_else(|| invalid(&format!("unknown pass `{name}`")))
        };

        let (first, start, end) = match ext.split_once(':') {
            None => match lookup(ext)? {
                0 => (ext, 0, PASSES.len() - 1),
                _ => return Err(invalid("expected <prefix>.c or <prefix>.START:END")),
            },
            Some((first, last)) => (first, lookup(first)?, lookup(last)?),
        };
        if start >= end {
            return Err(invalid(&format!(
                "{} does not come before {}",
                PASSES[start].name, PASSES[end].name
            )));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            input: format!("{prefix}.{first}").into(),
            start,
            end,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The file the first selected pass reads.
    pub fn input_file(&self) -> &Utf8Path {
        &self.input
    }

    /// The passes that run, in order.
    pub fn passes(&self) -> &'static [LoweringPass] {
        &PASSES[self.start + 1..=self.end]
    }

    pub fn first(&self) -> &'static LoweringPass {
        &PASSES[self.start]
    }

    pub fn last(&self) -> &'static LoweringPass {
        &PASSES[self.end]
    }

    /// Whether a pass named `name` is in the range.
    pub fn includes(&self, name: &str) -> bool {
        self.passes().iter().any(|pass| pass.name == name)
    }

    fn file(&self, suffix: &str) -> String {
        if self.start > 0 && suffix == PASSES[self.start].suffix {
            self.input.to_string()
        } else {
            format!("{}.{suffix}", self.prefix)
        }
    }

    /// The commands for this range, run in `dir`. With `graph`, the
    /// data-flow graph is drawn right after it is built.
    pub fn invocations(
        &self,
        dir: &Utf8Path,
        tools: &ToolConfig,
        graph: bool,
    ) -> Vec<Invocation> {
        let mut out = Vec::new();
        for idx in self.start + 1..=self.end {
            let pass = &PASSES[idx];
            let input = self.file(PASSES[idx - 1].suffix);
            let invocation = if pass.name == "GCC2SUIF" {
                Invocation::new(&tools.gcc2suif).arg(input)
            } else {
                Invocation::new(pass.program)
                    .args(pass.args.iter().copied())
                    .arg(input)
                    .arg(self.file(pass.suffix))
            };
            out.push(invocation.current_dir(dir));
            if graph && pass.name == GRAPH_PASS {
                out.push(
                    Invocation::new(&tools.dot_graph)
                        .arg(self.file(pass.suffix))
                        .current_dir(dir),
                );
            }
        }
        out
    }
}

impl Display for PassRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}:{}",
            self.prefix,
            self.first().suffix.to_uppercase(),
            self.last().suffix.to_uppercase()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(range: &PassRange, graph: bool) -> Vec<String> {
        range
            .invocations(Utf8Path::new("."), &ToolConfig::default(), graph)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn whole_chain() {
        let range = PassRange::parse("fir-hicirrf.c").unwrap();
        assert_eq!(range, PassRange::full("fir-hicirrf"));
        assert_eq!(range.passes().len(), PASSES.len() - 1);
        let cmds = commands(&range, false);
        assert_eq!(cmds[0], "gcc2suif fir-hicirrf.c");
        assert_eq!(cmds[1], "do_lower fir-hicirrf.suif fir-hicirrf.lsf");
        assert_eq!(
            cmds[4],
            "do_cfg2ssa -build_minimal_form fir-hicirrf.cfg fir-hicirrf.ssa"
        );
        assert_eq!(
            cmds.last().unwrap(),
            "do_hdlgen fir-hicirrf.pld_gipcore fir-hicirrf.hdl"
        );
    }

    #[test]
    fn sub_range() {
        let range = PassRange::parse("dir/fir.peep:df").unwrap();
        assert_eq!(range.prefix(), "dir/fir");
        assert_eq!(range.input_file().as_str(), "dir/fir.peep");
        assert_eq!(
            commands(&range, true),
            [
                "do_preprocess dir/fir.peep dir/fir.ppr",
                "do_kernelcfg2df dir/fir.ppr dir/fir.df",
                "do_print_dot_graph dir/fir.df",
            ]
        );
        assert!(range.includes(GRAPH_PASS));
        assert_eq!(range.to_string(), "dir/fir PEEP:DF");
    }

    #[test]
    fn names_and_suffixes_ignore_case() {
        let by_name = PassRange::parse("fir.PREPROCESS:Hdlgen").unwrap();
        let by_suffix = PassRange::parse("fir.ppr:hdl").unwrap();
        assert_eq!(by_name.passes(), by_suffix.passes());
        assert_eq!(by_name.passes()[0].name, "KERNELCFG2DF");
        assert_eq!(by_name.input_file().as_str(), "fir.PREPROCESS");
    }

    #[test]
    fn single_name_must_be_c_source() {
        match PassRange::parse("fir.xbw") {
            Err(Error::InvalidRange(message)) => {
                assert!(message.contains("<prefix>.START:END"), "{message}")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(PassRange::parse("fir.C").unwrap().passes().len(), PASSES.len() - 1);
    }

    #[test]
    fn range_to_hdlgen() {
        let range = PassRange::parse("fir.xbw:hdl").unwrap();
        assert_eq!(range.first().name, "EXPORTBITWIDTH");
        assert_eq!(range.last().name, "HDLGEN");
        assert!(!range.includes(GRAPH_PASS));
        assert!(commands(&range, true).iter().all(|c| !c.contains("dot")));
    }

    #[test]
    fn invalid_ranges() {
        for arg in [
            "fir.df:peep",
            "fir.peep:peep",
            "fir.peep:nope",
            "fir",
            "fir.hdl",
            "fir.peep",
            ".c",
        ] {
            let err = PassRange::parse(arg).unwrap_err();
            assert_eq!(err.exit_code(), 9, "{arg}");
        }
    }
}
