//! The local end-to-end compile.
//!
//! Stage one runs the front end in `compile_hicirrf`, stage two the lowering
//! chain in `compile_lowcirrf`. Each stage works on copies of its inputs and
//! its results are copied back next to the source, so a directory can be
//! recompiled without cleaning it first.
use super::Driver;
use super::frontend;
use super::lowering;
use super::synthesis::SynthesisMode;
use camino::{Utf8Path, Utf8PathBuf};
use roccc_core::job::{HICIRRF_SUFFIX, write_sentinel};
use roccc_core::lowering::PassRange;
use roccc_core::{Error, Result, Stage, fs};

pub const HICIRRF_DIR: &str = "compile_hicirrf";
pub const LOWCIRRF_DIR: &str = "compile_lowcirrf";
pub const ROCCC_HEADER: &str = "roccc.h";

/// Graph renderings copied back after a compile with graphs.
const GRAPH_EXTENSIONS: &[&str] = &["pdf", "ps", "dot"];

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub source: Utf8PathBuf,
    pub passes: Option<Utf8PathBuf>,
    /// `source` is already high-level CIRRF.
    pub hicirrf: bool,
    pub graph: bool,
    /// The queued job this compile belongs to.
    pub job: Option<String>,
    pub synthesis: bool,
}

/// Compile in `dir` and record the outcome there as a `SUCCESS` or `FAILED`
/// sentinel.
pub fn compile(driver: &Driver, dir: &Utf8Path, opts: &CompileOptions) -> Result<()> {
    if let Some(job) = &opts.job {
        log::info!("Job # {}", job);
    }
    let result = run_stages(driver, dir, opts);
    if !driver.session.dry_run() {
        let code = result.as_ref().err().map_or(0, Error::exit_code);
        if let Err(e) = write_sentinel(dir, code) {
            log::warn!("could not record the result: {}", e);
        }
    }
    result
}

fn run_stages(driver: &Driver, dir: &Utf8Path, opts: &CompileOptions) -> Result<()> {
    let source = dir.join(&opts.source);
    fs::require_file(&source)?;
    let hicirrf = if opts.hicirrf {
        if opts.passes.is_some() {
            return Err(Error::arg_mix(
                "a pass file cannot be applied to high-level CIRRF",
            ));
        }
        source
    } else {
        to_hicirrf(driver, dir, &source, opts.passes.as_deref())?
    };
    to_vhdl(driver, dir, &hicirrf, opts)
}

/// Stage one. Returns the high-level CIRRF file copied back into `dir`.
fn to_hicirrf(
    driver: &Driver,
    dir: &Utf8Path,
    source: &Utf8Path,
    passes: Option<&Utf8Path>,
) -> Result<Utf8PathBuf> {
    log::info!("Performing C to HICIRRF stage");
    let stage = dir.join(HICIRRF_DIR);
    fs::ensure_dir(&stage)?;
    let copied = fs::copy_into(source, &stage)?;
    let passes = passes
        .map(|p| fs::copy_into(&dir.join(p), &stage))
        .transpose()?;

    let source_name = Utf8Path::new(fs::file_name(&copied)?);
    let passes_name = passes
        .as_deref()
        .map(fs::file_name)
        .transpose()?
        .map(Utf8Path::new);
    frontend::c2hicirrf(driver, &stage, source_name, passes_name)?;

    let name = format!("{}{HICIRRF_SUFFIX}.c", fs::file_prefix(source)?);
    let produced = stage.join(&name);
    if driver.session.dry_run() {
        return Ok(dir.join(name));
    }
    if !produced.is_file() {
        return Err(Error::MissingOutput {
            stage: Stage::Optimize,
            file: produced,
        });
    }
    let back = fs::copy_into(&produced, dir)?;
    let header = stage.join(ROCCC_HEADER);
    if header.is_file() {
        fs::copy_into(&header, dir)?;
    }
    Ok(back)
}

/// Stage two.
fn to_vhdl(driver: &Driver, dir: &Utf8Path, hicirrf: &Utf8Path, opts: &CompileOptions) -> Result<()> {
    log::info!("Performing HICIRRF to VHDL stage");
    let stage = dir.join(LOWCIRRF_DIR);
    fs::ensure_dir(&stage)?;
    if !driver.session.dry_run() {
        fs::copy_into(hicirrf, &stage)?;
        let header = dir.join(ROCCC_HEADER);
        if header.is_file() {
            fs::copy_into(&header, &stage)?;
        }
    }

    let range = PassRange::full(fs::file_prefix(hicirrf)?);
    let synthesis = opts.synthesis.then_some(SynthesisMode::Default);
    lowering::hicirrf2vhdl(driver, &stage, &range, opts.graph, synthesis)?;

    if driver.session.dry_run() {
        return Ok(());
    }
    for vhdl in fs::files_with_extension(&stage, "vhd")? {
        fs::copy_into(&vhdl, dir)?;
    }
    if opts.graph {
        for ext in GRAPH_EXTENSIONS {
            for graph in fs::files_with_extension(&stage, ext)? {
                fs::copy_into(&graph, dir)?;
            }
        }
    }
    Ok(())
}
