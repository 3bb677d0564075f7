//! Running external tools.
//!
//! An [Invocation] describes one external program run: what to execute, with
//! which arguments, where, and which exit statuses count as success. A
//! [Sequencer] runs invocations strictly one after another on behalf of a
//! pipeline [Stage], stopping at the first one that does not succeed and
//! turning its [Outcome] into an [Error].
use crate::error::{EXIT_CANCELLED, Error, Result};
use crate::session::Session;
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};

/// A major phase of the pipeline. Failures of external tools are reported
/// with the exit code of the stage that ran them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// C source to SUIF (`gcc2suif`).
    FrontEnd,
    /// The optimization pass driver (`suifdriver`).
    Optimize,
    /// The lowering passes from high-level CIRRF down to VHDL.
    Lowering,
    /// Vendor synthesis, place and route.
    Synthesis,
    /// A nested run of the driver itself.
    Compile,
    /// Archiving, ownership and mail around a job.
    Housekeeping,
}

impl Stage {
    pub fn exit_code(self) -> i32 {
        match self {
            Stage::FrontEnd => 7,
            Stage::Optimize => 8,
            Stage::Lowering => 10,
            Stage::Synthesis => 11,
            Stage::Compile | Stage::Housekeeping => 12,
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::FrontEnd => write!(f, "gcc2suif"),
            Stage::Optimize => write!(f, "suifdriver"),
            Stage::Lowering => write!(f, "lowering"),
            Stage::Synthesis => write!(f, "synthesis"),
            Stage::Compile => write!(f, "compile"),
            Stage::Housekeeping => write!(f, "housekeeping"),
        }
    }
}

/// A signal that terminated a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal(pub i32);

impl Signal {
    pub fn number(self) -> i32 {
        self.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            libc::SIGHUP => "SIGHUP",
            libc::SIGINT => "SIGINT",
            libc::SIGQUIT => "SIGQUIT",
            libc::SIGILL => "SIGILL",
            libc::SIGABRT => "SIGABRT",
            libc::SIGFPE => "SIGFPE",
            libc::SIGKILL => "SIGKILL",
            libc::SIGSEGV => "SIGSEGV",
            libc::SIGPIPE => "SIGPIPE",
            libc::SIGTERM => "SIGTERM",
            _ => "UNKNOWN",
        }
    }

    /// Whether this is the signal an operator sends to cancel a run.
    pub fn is_interrupt(self) -> bool {
        self.0 == libc::SIGINT
    }
}

impl Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How a finished child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Exited normally with a status the invocation does not accept.
    Failed(i32),
    /// Cancelled by the user.
    Interrupted(Signal),
    /// Killed by any other signal.
    Signaled(Signal),
}

fn zero_status(code: i32) -> bool {
    code == 0
}

/// A typed description of one external program run.
#[derive(Debug, Clone)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    workdir: Option<Utf8PathBuf>,
    log_file: Option<Utf8PathBuf>,
    input: Option<Vec<u8>>,
    nested: bool,
    accept: fn(i32) -> bool,
}

impl Invocation {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            log_file: None,
            input: None,
            nested: false,
            accept: zero_status,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the program in `dir` instead of the current directory.
    pub fn current_dir<P: AsRef<Utf8Path>>(mut self, dir: P) -> Self {
        self.workdir = Some(dir.as_ref().to_owned());
        self
    }

    /// Append both stdout and stderr of the program to `path`. A relative
    /// path is taken relative to the working directory of the invocation.
    pub fn log_to<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.log_file = Some(path.as_ref().to_owned());
        self
    }

    /// Feed `bytes` to the program on stdin.
    pub fn input<B: Into<Vec<u8>>>(mut self, bytes: B) -> Self {
        self.input = Some(bytes.into());
        self
    }

    /// Mark this as a run of the driver itself, whose reserved exit code
    /// means the user cancelled it.
    pub fn nested(mut self) -> Self {
        self.nested = true;
        self
    }

    /// Use `accept` to decide which exit statuses count as success.
    pub fn accept(mut self, accept: fn(i32) -> bool) -> Self {
        self.accept = accept;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn workdir(&self) -> Option<&Utf8Path> {
        self.workdir.as_deref()
    }

    fn log_path(&self) -> Option<Utf8PathBuf> {
        let log = self.log_file.as_ref()?;
        Some(match &self.workdir {
            Some(dir) if log.is_relative() => dir.join(log),
            _ => log.clone(),
        })
    }

    /// Start the program, wait for it, and classify how it ended.
    pub fn run(&self) -> std::io::Result<Outcome> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        if let Some(log) = self.log_path() {
            let file = OpenOptions::new().create(true).append(true).open(log)?;
            cmd.stdout(file.try_clone()?).stderr(file);
        }

        let status = match &self.input {
            Some(bytes) => {
                cmd.stdin(Stdio::piped());
                let mut child = cmd.spawn()?;
                // The pipe is closed before waiting so the child sees end of
                // input, and the child is reaped even when the write failed.
                let written = match child.stdin.take() {
                    Some(mut stdin) => stdin.write_all(bytes),
                    None => Ok(()),
                };
                let status = child.wait()?;
                written?;
                status
            }
            None => cmd.status()?,
        };
        Ok(self.classify(status))
    }

    pub fn classify(&self, status: ExitStatus) -> Outcome {
        match (status.code(), status.signal()) {
            (Some(code), _) if (self.accept)(code) => Outcome::Success,
            (Some(EXIT_CANCELLED), _) if self.nested => {
                Outcome::Interrupted(Signal(libc::SIGINT))
            }
            (Some(code), _) => Outcome::Failed(code),
            (None, Some(sig)) if Signal(sig).is_interrupt() => {
                Outcome::Interrupted(Signal(sig))
            }
            (None, Some(sig)) => Outcome::Signaled(Signal(sig)),
            (None, None) => Outcome::Failed(-1),
        }
    }

    /// A shell command line equivalent to this invocation.
    pub fn shell_line(&self) -> String {
        let mut line = self.to_string();
        if let Some(log) = &self.log_file {
            line = format!("{line} >> {} 2>&1", quote(log.as_str()));
        }
        match &self.workdir {
            Some(dir) => format!("(cd {} && {line})", quote(dir.as_str())),
            None => line,
        }
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Quote `word` for a POSIX shell if it needs it.
fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word.chars().all(|c| {
            c.is_ascii_alphanumeric() || "_./:=@%+,-".contains(c)
        });
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.split('\'').join("'\\''"))
    }
}

/// Runs invocations in order for one pipeline stage.
pub struct Sequencer<'a> {
    session: &'a Session,
    stage: Stage,
}

impl<'a> Sequencer<'a> {
    pub fn new(session: &'a Session, stage: Stage) -> Self {
        Self { session, stage }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run one invocation and fail unless it succeeds.
    pub fn run(&self, invocation: &Invocation) -> Result<()> {
        if self.session.dry_run() {
            println!("{}", invocation.shell_line());
            return Ok(());
        }

        log::info!("{}", invocation);
        if let Some(dir) = invocation.workdir() {
            log::debug!("  in {}", dir);
        }
        let outcome = invocation.run().map_err(|source| Error::Spawn {
            stage: self.stage,
            program: invocation.program().to_string(),
            source,
        })?;
        self.check(invocation, outcome)
    }

    /// Run every invocation in turn, stopping at the first failure.
    pub fn run_all<'i, I>(&self, invocations: I) -> Result<()>
    where
        I: IntoIterator<Item = &'i Invocation>,
    {
        for invocation in invocations {
            self.run(invocation)?;
        }
        Ok(())
    }

    fn check(&self, invocation: &Invocation, outcome: Outcome) -> Result<()> {
        let program = invocation.program().to_string();
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed(code) => Err(Error::ToolFailed {
                stage: self.stage,
                program,
                code,
            }),
            Outcome::Interrupted(signal) => Err(Error::Cancelled { signal }),
            Outcome::Signaled(signal) => Err(Error::Signaled {
                stage: self.stage,
                program,
                signal,
            }),
        }
    }
}
