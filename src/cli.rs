use crate::stages::compile::{self, CompileOptions};
use crate::stages::job::{self, JobRun};
use crate::stages::synthesis::{self, DIRECTIVES_FILE, SynthesisMode};
use crate::stages::{Driver, frontend, lowering, regress};
use argh::{EarlyExit, FromArgs};
use camino::{Utf8Path, Utf8PathBuf};
use roccc_core::config::{self, GlobalConfig};
use roccc_core::env;
use roccc_core::lowering::PassRange;
use roccc_core::{Error, Result, Session, fs};
use std::process::ExitCode;

/// compile C to high-level CIRRF
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "c2hicirrf")]
pub struct C2Hicirrf {
    /// the C source
    #[argh(positional)]
    pub source: Utf8PathBuf,

    /// loop transformations to apply
    #[argh(positional)]
    pub passes: Option<Utf8PathBuf>,
}

/// lower high-level CIRRF to VHDL
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "hicirrf2vhdl")]
pub struct Hicirrf2Vhdl {
    /// either `prefix.c` for the whole chain, or `prefix.START:END` for a range of
    /// passes
    #[argh(positional)]
    pub target: String,

    /// draw the data-flow graph
    #[argh(switch, short = 'g')]
    pub graph: bool,

    /// synthesize the result with the Xilinx tools
    #[argh(switch)]
    pub default_synthesis: bool,

    /// synthesize the result with XST only
    #[argh(switch)]
    pub default_synthesis_xst_only: bool,

    /// synthesize the result for a RASC blade
    #[argh(switch)]
    pub rasc: bool,
}

/// compile C to VHDL in stage directories
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "compile")]
pub struct Compile {
    /// the C source, or high-level CIRRF with --hicirrf
    #[argh(positional)]
    pub source: Utf8PathBuf,

    /// loop transformations to apply
    #[argh(positional)]
    pub passes: Option<Utf8PathBuf>,

    /// start from high-level CIRRF
    #[argh(switch)]
    pub hicirrf: bool,

    /// draw the data-flow graph
    #[argh(switch, short = 'g')]
    pub graph: bool,

    /// the queued job this compile belongs to
    #[argh(option)]
    pub job: Option<String>,

    /// synthesize the result with the Xilinx tools
    #[argh(switch)]
    pub synthesis: bool,
}

/// synthesize VHDL from a directive file
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "vhdl2fpga")]
pub struct Vhdl2Fpga {
    /// the synthesis directives (default: DIRECTIVES.dat)
    #[argh(positional)]
    pub directives: Option<Utf8PathBuf>,

    /// run the Xilinx tools through timing analysis (the default)
    #[argh(switch)]
    pub default_synthesis: bool,

    /// run XST only
    #[argh(switch)]
    pub default_synthesis_xst_only: bool,

    /// build a RASC blade bitstream with XST
    #[argh(switch)]
    pub rasc_xst: bool,

    /// build a RASC blade bitstream with Synplify Pro
    #[argh(switch)]
    pub rasc_synplify_pro: bool,

    /// prepare a RASC build without running make
    #[argh(switch)]
    pub stop_before_make: bool,
}

/// add a module to the IP library
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "add-module")]
pub struct AddModule {
    /// the C source defining the module
    #[argh(positional)]
    pub source: Utf8PathBuf,

    /// the module name
    #[argh(positional)]
    pub module: String,

    /// the library directory
    #[argh(positional)]
    pub dir: Utf8PathBuf,
}

/// compile the next queued job
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "process-job")]
pub struct ProcessJob {}

/// compile the regression repository
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "test-dir")]
pub struct TestDir {
    /// keep the scratch copy of the repository
    #[argh(switch)]
    pub do_not_remove: bool,
}

/// supported subcommands
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub enum Subcommand {
    C2Hicirrf(C2Hicirrf),
    Hicirrf2Vhdl(Hicirrf2Vhdl),
    Compile(Compile),
    Vhdl2Fpga(Vhdl2Fpga),
    AddModule(AddModule),
    ProcessJob(ProcessJob),
    TestDir(TestDir),
}

impl Subcommand {
    /// The name messages of this run are prefixed with.
    pub fn script(&self) -> &'static str {
        match self {
            Subcommand::C2Hicirrf(_) => "c2hicirrf",
            Subcommand::Hicirrf2Vhdl(_) => "hicirrf2vhdl",
            Subcommand::Compile(_) => "compile",
            Subcommand::Vhdl2Fpga(_) => "vhdl2fpga",
            Subcommand::AddModule(_) => "add-module",
            Subcommand::ProcessJob(_) => "process-job",
            Subcommand::TestDir(_) => "test-dir",
        }
    }
}

#[derive(FromArgs, Debug)]
/// Drive the ROCCC C-to-FPGA toolchain.
pub struct RocccArgs {
    #[argh(subcommand)]
    pub sub: Subcommand,

    /// more progress output; repeat for more
    #[argh(switch, short = 'v')]
    pub verbose: u8,

    /// log level for the driver's own messages
    #[argh(option, long = "log", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,

    /// set a configuration variable (key=value)
    #[argh(option, short = 's')]
    pub set: Vec<String>,

    /// print the external commands instead of running them
    #[argh(switch)]
    pub dry_run: bool,
}

/// Parse `args`, the command line without the program name.
pub fn parse(args: &[&str]) -> std::result::Result<RocccArgs, EarlyExit> {
    RocccArgs::from_args(&["roccc"], args)
}

fn load_config(sets: &[String]) -> Result<GlobalConfig> {
    let figment = config::with_overrides(config::load_config("roccc")?, sets)?;
    GlobalConfig::from_figment(&figment)
}

fn here() -> &'static Utf8Path {
    Utf8Path::new(".")
}

fn dispatch(driver: &mut Driver, sub: Subcommand) -> Result<i32> {
    match sub {
        Subcommand::C2Hicirrf(cmd) => {
            driver.require(env::COMPILER)?;
            frontend::c2hicirrf(driver, here(), &cmd.source, cmd.passes.as_deref())?;
        }
        Subcommand::Hicirrf2Vhdl(cmd) => {
            let mode = SynthesisMode::from_flags(
                cmd.default_synthesis,
                cmd.default_synthesis_xst_only,
                cmd.rasc,
                false,
            )?;
            let synthesize = cmd.default_synthesis || cmd.default_synthesis_xst_only || cmd.rasc;
            let range = PassRange::parse(&cmd.target)?;
            driver.require(env::COMPILER)?;
            if synthesize {
                driver.require(mode.required_vars())?;
            }
            lowering::hicirrf2vhdl(driver, here(), &range, cmd.graph, synthesize.then_some(mode))?;
        }
        Subcommand::Compile(cmd) => {
            driver.require(env::COMPILER)?;
            if cmd.synthesis {
                driver.require(env::SYNTHESIS)?;
            }
            let opts = CompileOptions {
                source: cmd.source,
                passes: cmd.passes,
                hicirrf: cmd.hicirrf,
                graph: cmd.graph,
                job: cmd.job,
                synthesis: cmd.synthesis,
            };
            compile::compile(driver, here(), &opts)?;
        }
        Subcommand::Vhdl2Fpga(cmd) => {
            let mode = SynthesisMode::from_flags(
                cmd.default_synthesis,
                cmd.default_synthesis_xst_only,
                cmd.rasc_xst,
                cmd.rasc_synplify_pro,
            )?;
            if cmd.stop_before_make && !mode.is_rasc() {
                log::warn!("--stop-before-make only applies to RASC synthesis");
            }
            driver.require(mode.required_vars())?;
            let directives = cmd
                .directives
                .unwrap_or_else(|| Utf8PathBuf::from(DIRECTIVES_FILE));
            fs::require_file(&directives)?;
            synthesis::vhdl2fpga(driver, here(), &directives, mode, cmd.stop_before_make)?;
        }
        Subcommand::AddModule(cmd) => {
            driver.require(env::COMPILER)?;
            frontend::add_module(driver, &cmd.source, &cmd.module, &cmd.dir)?;
        }
        Subcommand::ProcessJob(_) => {
            if driver.session.dry_run() {
                return Err(Error::arg_mix("process-job cannot be run with --dry-run"));
            }
            driver.require(env::COMPILER)?;
            match job::process_job(driver)? {
                JobRun::Busy { holder } => {
                    println!("Compiler is busy");
                    if let Some(holder) = holder {
                        println!("Lock held by {holder}");
                    }
                }
                JobRun::Idle => println!("No jobs to process"),
                JobRun::Finished { job } => log::info!("Finished {}", job),
            }
        }
        Subcommand::TestDir(cmd) => {
            if driver.session.dry_run() {
                return Err(Error::arg_mix("test-dir cannot be run with --dry-run"));
            }
            driver.require(env::COMPILER)?;
            let tally = regress::test_dir(driver, cmd.do_not_remove)?;
            print!("{}", tally.report());
            return Ok(i32::try_from(tally.failures()).unwrap_or(i32::MAX));
        }
    }
    Ok(0)
}

/// Run the driver on already parsed arguments and return the exit code.
pub fn run(args: RocccArgs) -> i32 {
    let session = Session::new(args.sub.script(), args.verbose).with_dry_run(args.dry_run);
    session.init_logging(args.log_level);

    let config = match load_config(&args.set) {
        Ok(config) => config,
        Err(e) => return session.report(&e),
    };
    let mut driver = Driver::new(session, config, args.set);
    match dispatch(&mut driver, args.sub) {
        Ok(code) => code,
        Err(e) => driver.session.report(&e),
    }
}

pub fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
    let code = match parse(&argv) {
        Ok(args) => run(args),
        Err(EarlyExit { output, status }) => match status {
            Ok(()) => {
                println!("{output}");
                0
            }
            Err(()) => {
                eprintln!("roccc: ERROR(2): {output}");
                2
            }
        },
    };
    ExitCode::from(u8::try_from(code.clamp(0, 255)).unwrap_or(u8::MAX))
}
