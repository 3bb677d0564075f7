//! Regression compiles over a code repository.
//!
//! `COMPILE_DIR_LIST` names the directories to compile, one per line. A
//! directory with a single C file and at most one pass file is compiled in
//! place; otherwise every (C file, pass file) pair gets its own
//! `<c prefix>-<pass prefix>` subdirectory.
use crate::error::{Error, Result};
use crate::fs;
use crate::job::HICIRRF_SUFFIX;
use camino::{Utf8Path, Utf8PathBuf};

pub const DIR_LIST: &str = "COMPILE_DIR_LIST";

/// The directories listed in a `COMPILE_DIR_LIST`. Lines starting with `#`
/// and blank lines are skipped.
pub fn parse_dir_list(text: &str) -> Vec<Utf8PathBuf> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Utf8PathBuf::from)
        .collect()
}

/// One compile of a regression run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    /// How the case is reported, relative to the repository.
    pub name: String,
    /// Where the compile runs.
    pub workdir: Utf8PathBuf,
    pub source: Utf8PathBuf,
    pub passes: Option<Utf8PathBuf>,
}

impl Case {
    /// Whether inputs have to be copied into a fresh directory first.
    pub fn needs_copy(&self) -> bool {
        self.source.parent() != Some(self.workdir.as_path())
    }

    /// The arguments of the nested `compile` run, relative to the workdir.
    pub fn compile_args(&self) -> Result<Vec<String>> {
        let mut args = vec![fs::file_name(&self.source)?.to_string()];
        if let Some(passes) = &self.passes {
            args.push(fs::file_name(passes)?.to_string());
        }
        Ok(args)
    }
}

/// The compiles for the listed directory `entry` of the repository copy at
/// `root`.
pub fn plan_cases(root: &Utf8Path, entry: &Utf8Path) -> Result<Vec<Case>> {
    let dir = root.join(entry);
    let fail = |message: &str| Error::Job {
        job: entry.to_string(),
        message: message.to_string(),
    };
    if !dir.is_dir() {
        return Err(fail("not a directory"));
    }
    let sources: Vec<_> = fs::files_with_extension(&dir, "c")?
        .into_iter()
        .filter(|p| !p.as_str().ends_with(&format!("{HICIRRF_SUFFIX}.c")))
        .collect();
    let passes = fs::files_with_extension(&dir, "pass")?;

    match (sources.as_slice(), passes.as_slice()) {
        ([], _) => Err(fail("no C file found")),
        ([source], [] | [_]) => Ok(vec![Case {
            name: entry.to_string(),
            workdir: dir.clone(),
            source: source.clone(),
            passes: passes.first().cloned(),
        }]),
        (_, []) => Err(fail("several C files need at least one pass file")),
        (sources, passes) => {
            let mut cases = Vec::new();
            for source in sources {
                for pass in passes {
                    let sub = format!(
                        "{}-{}",
                        fs::file_prefix(source)?,
                        fs::file_prefix(pass)?
                    );
                    cases.push(Case {
                        name: format!("{entry}/{sub}"),
                        workdir: dir.join(&sub),
                        source: source.clone(),
                        passes: Some(pass.clone()),
                    });
                }
            }
            Ok(cases)
        }
    }
}

/// Outcomes of a regression run, in execution order.
#[derive(Debug, Default)]
pub struct Tally {
    results: Vec<(String, i32)>,
}

impl Tally {
    pub fn record<S: Into<String>>(&mut self, name: S, code: i32) {
        self.results.push((name.into(), code));
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|(_, code)| *code != 0).count()
    }

    /// `PASS :`/`FAIL :` per compile, then the totals.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (name, code) in &self.results {
            let verdict = if *code == 0 { "PASS" } else { "FAIL" };
            out.push_str(&format!("{verdict} : {name}\n"));
        }
        out.push_str(&format!("Total compiled = {}\n", self.total()));
        out.push_str(&format!("Passed # = {}\n", self.total() - self.failures()));
        out.push_str(&format!("Failed # = {}\n", self.failures()));
        out
    }
}
