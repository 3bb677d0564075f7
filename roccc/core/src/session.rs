use crate::error::Error;
use log::LevelFilter;
use std::io::Write;

/// Settings for one driver invocation, fixed at startup and handed by
/// reference to every stage.
#[derive(Debug, Clone)]
pub struct Session {
    script: String,
    verbosity: u8,
    dry_run: bool,
}

impl Session {
    pub fn new<S: Into<String>>(script: S, verbosity: u8) -> Self {
        Self {
            script: script.into(),
            verbosity,
            dry_run: false,
        }
    }

    /// Print external commands instead of running them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The identifier that prefixes every message of this run.
    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// The log level selected by the verbosity count.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Configure logging to stderr, prefixing each line with the script
    /// identifier. `floor` is the least verbose level to use regardless of
    /// the verbosity count.
    pub fn init_logging(&self, floor: LevelFilter) {
        let script = self.script.clone();
        env_logger::Builder::new()
            .format(move |buf, record| {
                writeln!(buf, "{}: {}", script, record.args())
            })
            .filter_level(std::cmp::max(self.log_level(), floor))
            .target(env_logger::Target::Stderr)
            .init();
    }

    /// Command-line flags that give a nested run the same verbosity.
    pub fn verbose_args(&self) -> Vec<String> {
        vec!["-v".to_string(); self.verbosity as usize]
    }

    /// The terminal message for `err`.
    pub fn error_message(&self, err: &Error) -> String {
        format!("{}: ERROR({}): {}", self.script, err.exit_code(), err)
    }

    /// Print `err` to stderr and return the exit code to terminate with.
    pub fn report(&self, err: &Error) -> i32 {
        eprintln!("{}", self.error_message(err));
        err.exit_code()
    }
}
