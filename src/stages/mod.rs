//! The work behind each subcommand.
//!
//! Every stage is a function over a [Driver], which carries the session, the
//! loaded configuration, and the toolchain variables checked at startup. The
//! stages never change the process working directory: each invocation names
//! the directory it runs in.
use camino::{Utf8Path, Utf8PathBuf};
use roccc_core::config::GlobalConfig;
use roccc_core::env::{EnvVar, Toolchain};
use roccc_core::{Error, Invocation, Result, Sequencer, Session, Stage};

pub mod compile;
pub mod frontend;
pub mod job;
pub mod lowering;
pub mod regress;
pub mod synthesis;

pub struct Driver {
    pub session: Session,
    pub config: GlobalConfig,
    toolchain: Toolchain,
    overrides: Vec<String>,
}

impl Driver {
    /// `overrides` are the `--set` arguments, forwarded to nested runs.
    pub fn new(session: Session, config: GlobalConfig, overrides: Vec<String>) -> Self {
        Self {
            session,
            config,
            toolchain: Toolchain::default(),
            overrides,
        }
    }

    /// Check that `vars` are set, reporting every missing one at once.
    pub fn require(&mut self, vars: &[EnvVar]) -> Result<()> {
        let found = Toolchain::require(vars)?;
        self.toolchain.extend(found);
        Ok(())
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn sequencer(&self, stage: Stage) -> Sequencer<'_> {
        Sequencer::new(&self.session, stage)
    }

    /// A run of this executable's `compile` subcommand in `dir`, with the
    /// same verbosity and configuration overrides as this one.
    pub fn nested_compile<I, S>(&self, dir: &Utf8Path, args: I) -> Result<Invocation>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let exe = current_exe()?;
        let mut invocation = Invocation::new(exe.as_str()).args(self.session.verbose_args());
        for set in &self.overrides {
            invocation = invocation.arg("--set").arg(set.as_str());
        }
        Ok(invocation
            .arg("compile")
            .args(args)
            .current_dir(dir)
            .nested())
    }
}

fn current_exe() -> Result<Utf8PathBuf> {
    let context = "locating the roccc executable";
    let exe = std::env::current_exe().map_err(|e| Error::fs(context, e))?;
    Utf8PathBuf::from_path_buf(exe)
        .map_err(|_| Error::fs(context, std::io::Error::other("path is not valid UTF-8")))
}
