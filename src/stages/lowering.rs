//! High-level CIRRF to VHDL, optionally followed by synthesis of the result.
use super::Driver;
use super::synthesis::{self, DIRECTIVES_FILE, SynthesisMode};
use camino::{Utf8Path, Utf8PathBuf};
use roccc_core::job::HICIRRF_SUFFIX;
use roccc_core::lowering::PassRange;
use roccc_core::{Result, Stage, fs};

/// Where lowered VHDL is gathered for synthesis.
pub const EXPORT_DIR: &str = "EXPORT";

/// The support VHDL shipped with ROCCC, relative to `$ROCCC_HOME`.
pub const VHDL_LIBRARY: &str = "src/vhdl_library";

/// Blade support files, relative to the VHDL library.
const RASC_SUPPORT: &str = "RASC-specific";
const RASC_SUPPORT_FILES: &[&str] = &[
    "Makefile.local.RASC-SYNTHESIS",
    "Makefile.C-COMPILE-SGI-2",
    "alg_block_top.v",
    "alg.h",
];

/// Run the passes of `range` in `dir`, then synthesize the VHDL in an
/// `EXPORT` directory if `synthesis` asks for it.
pub fn hicirrf2vhdl(
    driver: &Driver,
    dir: &Utf8Path,
    range: &PassRange,
    graph: bool,
    synthesis: Option<SynthesisMode>,
) -> Result<()> {
    if !driver.session.dry_run() {
        fs::require_file(&dir.join(range.input_file()))?;
    }
    log::info!("Lowering {}", range);
    let invocations = range.invocations(dir, &driver.config.tools, graph);
    driver.sequencer(Stage::Lowering).run_all(&invocations)?;

    match synthesis {
        Some(mode) => synthesize_export(driver, dir, range.prefix(), mode),
        None => Ok(()),
    }
}

/// The entity a kernel compiled from `<prefix>.c` is named after.
pub fn top_entity(prefix: &str) -> Result<String> {
    let name = fs::file_name(Utf8Path::new(prefix))?;
    Ok(name.strip_suffix(HICIRRF_SUFFIX).unwrap_or(name).to_string())
}

/// Directives for synthesizing `files` with `top` as the top-level entity,
/// used when the user supplies none.
pub fn default_directives(top: &str, files: &[&str], part: &str) -> String {
    let mut out = format!("TOP_ENTITY {top}\n");
    for file in files {
        out.push_str(&format!("FILE_VHDL_SYNTHESIZE {file}\n"));
    }
    out.push_str("DEFAULT_SYNTHESIS_OPTIONS_START\nrun\n");
    out.push_str(&format!("-ifn {top}.prj\n-ifmt mixed\n-ofn {top}\n-ofmt NGC\n"));
    out.push_str(&format!("-p {part}\n-top {top}\n"));
    out.push_str("DEFAULT_SYNTHESIS_OPTIONS_END\n");
    out
}

fn synthesize_export(driver: &Driver, dir: &Utf8Path, prefix: &str, mode: SynthesisMode) -> Result<()> {
    let export = dir.join(EXPORT_DIR);
    fs::ensure_dir(&export)?;

    let library = driver.toolchain().roccc_home()?.join(VHDL_LIBRARY);
    let mut sources: Vec<Utf8PathBuf> = Vec::new();
    if library.is_dir() {
        sources.extend(fs::files_with_extension(&library, "vhd")?);
    } else {
        log::warn!("VHDL library {} not found", library);
    }
    sources.extend(fs::files_with_extension(dir, "vhd")?);
    let mut names = Vec::with_capacity(sources.len());
    for source in &sources {
        fs::copy_into(source, &export)?;
        names.push(fs::file_name(source)?);
    }

    if mode.is_rasc() {
        let support = library.join(RASC_SUPPORT);
        for file in RASC_SUPPORT_FILES {
            let from = support.join(file);
            if from.is_file() && !export.join(file).exists() {
                fs::copy_into(&from, &export)?;
            }
        }
    }

    let directives = export.join(DIRECTIVES_FILE);
    let given = dir.join(DIRECTIVES_FILE);
    if given.is_file() {
        fs::copy_file(&given, &directives)?;
    } else {
        let top = top_entity(prefix)?;
        log::info!("No {} given, synthesizing {} with defaults", DIRECTIVES_FILE, top);
        fs::write(
            &directives,
            &default_directives(&top, &names, &driver.config.synthesis.part),
        )?;
    }
    synthesis::vhdl2fpga(driver, &export, &directives, mode, false)
}
