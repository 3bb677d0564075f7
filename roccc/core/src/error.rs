use crate::exec::{Signal, Stage};
use camino::Utf8PathBuf;
use itertools::Itertools;
use thiserror::Error;

/// A type alias for a result with an [Error] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code reserved for runs cancelled by the user.
pub const EXIT_CANCELLED: i32 = 99;

/// Everything that can end a driver invocation early. Each variant maps onto
/// exactly one process exit code through [Error::exit_code].
#[derive(Debug, Error)]
pub enum Error {
    /// Required environment variables are unset or empty.
    #[error("environment variable(s) undefined: {}", .0.iter().join(", "))]
    EnvUndefined(Vec<String>),

    /// The command line could not be understood.
    #[error("{0}")]
    Usage(String),

    /// Options that each make sense alone but not together.
    #[error("invalid argument combination: {0}")]
    InvalidArgMix(String),

    #[error("file \"{0}\" does not exist")]
    FileNotFound(Utf8PathBuf),

    /// A directive line matched none of the known forms.
    #[error("unrecognizable sequence in {file}:{line_no}: {line}")]
    BadDirective {
        file: Utf8PathBuf,
        line_no: usize,
        line: String,
    },

    /// A directive file is well formed but lacks something the stage needs.
    #[error("{file}: {message}")]
    MissingDirective { file: Utf8PathBuf, message: String },

    /// An external tool exited with a nonzero status.
    #[error("{stage} failed: {program} exited with status {code}")]
    ToolFailed {
        stage: Stage,
        program: String,
        code: i32,
    },

    /// An external tool could not be started at all.
    #[error("{stage} failed: could not run {program}: {source}")]
    Spawn {
        stage: Stage,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A tool reported success without producing its output.
    #[error("{stage} failed: {file} was not produced")]
    MissingOutput { stage: Stage, file: Utf8PathBuf },

    /// The user interrupted an external tool.
    #[error("TERMINATED BY USER (SIGNAL = {}) = {signal}", .signal.number())]
    Cancelled { signal: Signal },

    /// An external tool died from a signal other than an interrupt.
    #[error(
        "{stage} failed: {program} TERMINATED BY SIGNAL({}) = {signal}",
        .signal.number()
    )]
    Signaled {
        stage: Stage,
        program: String,
        signal: Signal,
    },

    #[error("invalid pass range: {0}")]
    InvalidRange(String),

    /// A file or directory operation failed.
    #[error("{context}: {source}")]
    Fs {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Copying or moving a directory tree failed.
    #[error("{context}: {source}")]
    Transfer {
        context: String,
        #[source]
        source: fs_extra::error::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// A queued job could not be processed.
    #[error("job {job}: {message}")]
    Job { job: String, message: String },
}

impl Error {
    pub fn usage<S: AsRef<str>>(msg: S) -> Self {
        Self::Usage(msg.as_ref().to_string())
    }

    pub fn arg_mix<S: AsRef<str>>(msg: S) -> Self {
        Self::InvalidArgMix(msg.as_ref().to_string())
    }

    /// Wrap an I/O error with a description of what was being attempted.
    pub fn fs<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Fs {
            context: context.into(),
            source,
        }
    }

    /// The process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::EnvUndefined(_) => 1,
            Error::Usage(_) => 2,
            Error::InvalidArgMix(_) => 3,
            Error::FileNotFound(_) => 4,
            Error::Fs { .. } | Error::Transfer { .. } | Error::Io(_) => 5,
            Error::BadDirective { .. } | Error::MissingDirective { .. } => 6,
            Error::ToolFailed { stage, .. }
            | Error::Spawn { stage, .. }
            | Error::Signaled { stage, .. }
            | Error::MissingOutput { stage, .. } => stage.exit_code(),
            Error::InvalidRange(_) => 9,
            Error::Job { .. } => 12,
            Error::Config(_) => 13,
            Error::Cancelled { .. } => EXIT_CANCELLED,
        }
    }

    /// Whether this error means the user asked for the run to stop.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failures_use_stage_codes() {
        let front = Error::ToolFailed {
            stage: Stage::FrontEnd,
            program: "gcc2suif".into(),
            code: 1,
        };
        let opt = Error::Signaled {
            stage: Stage::Optimize,
            program: "suifdriver".into(),
            signal: Signal(libc::SIGSEGV),
        };
        assert_eq!(front.exit_code(), 7);
        assert_eq!(opt.exit_code(), 8);
        assert_eq!(
            opt.to_string(),
            "suifdriver failed: suifdriver TERMINATED BY SIGNAL(11) = SIGSEGV"
        );
    }

    #[test]
    fn cancellation_is_distinct() {
        let err = Error::Cancelled {
            signal: Signal(libc::SIGINT),
        };
        assert!(err.is_cancellation());
        assert_eq!(err.exit_code(), EXIT_CANCELLED);
        assert_eq!(err.to_string(), "TERMINATED BY USER (SIGNAL = 2) = SIGINT");
    }

    #[test]
    fn missing_variables_are_listed_together() {
        let err = Error::EnvUndefined(vec!["ROCCC_HOME".into(), "NCIHOME".into()]);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "environment variable(s) undefined: ROCCC_HOME, NCIHOME"
        );
    }
}
