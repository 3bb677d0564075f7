//! Vendor synthesis from a `DIRECTIVES.dat` file.
//!
//! Everything happens in `SYNTHESIS_DIR` next to the directive file. The
//! default flow writes an XST project and script and runs the Xilinx tools
//! through timing analysis. The RASC flows stage the sources under
//! `SYNTHESIS_DIR/src`, write the blade makefiles, run `make all`, and
//! collect the bitstream in `RASC_EXPORT`.
use super::Driver;
use camino::Utf8Path;
use roccc_core::config::GlobalConfig;
use roccc_core::directives::{Flavor, SynthesisDirectives};
use roccc_core::env::{self, EnvVar};
use roccc_core::template::Substitutions;
use roccc_core::{Error, Invocation, Result, Stage, fs};

pub const DIRECTIVES_FILE: &str = "DIRECTIVES.dat";
pub const SYNTHESIS_DIR: &str = "SYNTHESIS_DIR";
pub const SOURCE_DIR: &str = "src";
pub const RASC_EXPORT_DIR: &str = "RASC_EXPORT";
pub const REPORT_LOG: &str = "SYNTHESIS_REPORT.LOG";

/// Verilog sources of the RASC algorithm wrapper, relative to `$RASC`.
const RASC_WRAPPER_SOURCES: &[&str] = &[
    "design/alg_core/templates/user_space_wrapper.v",
    "design/alg_core/templates/acs_adr.v",
    "design/alg_core/templates/acs_debug_reg.v",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisMode {
    /// XST through place, route and timing analysis.
    Default,
    /// XST alone.
    XstOnly,
    /// A RASC blade bitstream, synthesized with XST.
    RascXst,
    /// A RASC blade bitstream, synthesized with Synplify Pro.
    RascSynplifyPro,
}

impl SynthesisMode {
    /// Pick the mode from its command-line flags. No flag means the default
    /// flow; asking for XST alone implies it.
    pub fn from_flags(
        default: bool,
        xst_only: bool,
        rasc_xst: bool,
        rasc_synplify_pro: bool,
    ) -> Result<Self> {
        match (default || xst_only, rasc_xst, rasc_synplify_pro) {
            (true, true, _) | (true, _, true) => Err(Error::arg_mix(
                "RASC synthesis cannot be combined with default synthesis",
            )),
            (_, true, true) => Err(Error::arg_mix(
                "choose one of --rasc-xst and --rasc-synplify-pro",
            )),
            (_, true, false) => Ok(SynthesisMode::RascXst),
            (_, false, true) => Ok(SynthesisMode::RascSynplifyPro),
            _ if xst_only => Ok(SynthesisMode::XstOnly),
            _ => Ok(SynthesisMode::Default),
        }
    }

    pub fn flavor(self) -> Flavor {
        match self {
            SynthesisMode::Default | SynthesisMode::XstOnly => Flavor::Default,
            SynthesisMode::RascXst => Flavor::RascXst,
            SynthesisMode::RascSynplifyPro => Flavor::RascSynplifyPro,
        }
    }

    pub fn is_rasc(self) -> bool {
        matches!(self, SynthesisMode::RascXst | SynthesisMode::RascSynplifyPro)
    }

    /// The environment the mode needs.
    pub fn required_vars(self) -> &'static [EnvVar] {
        if self.is_rasc() {
            env::RASC_SYNTHESIS
        } else {
            env::SYNTHESIS
        }
    }

    /// The `Makefile.local` tool name and result extension of a RASC flow.
    fn rasc_tool(self) -> (&'static str, &'static str) {
        match self {
            SynthesisMode::RascSynplifyPro => ("synplify_pro", "edf"),
            _ => ("ise_xst", "ngc"),
        }
    }
}

/// The XST project of the default flow. Paths are relative to the directive
/// file, one directory up from `SYNTHESIS_DIR`.
pub fn default_project(directives: &SynthesisDirectives) -> String {
    let mut out = String::new();
    for file in directives.synthesize_files() {
        out.push_str(&format!("vhdl work \"../{file}\"\n"));
    }
    out
}

/// The XST project of the RASC flow: the project block with `$RASC`
/// expanded, the wrapper, then the staged VHDL sources.
pub fn rasc_xst_project(directives: &SynthesisDirectives, rasc: &Utf8Path) -> Result<String> {
    let subst = Substitutions::new().with("$RASC", rasc.as_str());
    let mut out = subst.apply(&directives.project_text()).into_owned();
    out.push_str("verilog work ./src/alg_block_top.v\n");
    for file in directives.extra_files().chain(directives.synthesize_files()) {
        out.push_str(&format!("vhdl work ./{SOURCE_DIR}/{}\n", fs::file_name(file)?));
    }
    Ok(out)
}

/// The Synplify Pro project of the RASC flow.
pub fn synplify_project(directives: &SynthesisDirectives) -> Result<String> {
    let mut out = String::from(
        "set RASC [get_env RASC]\nset THE_PWD [get_env PWD]\nset ALG_DIR $THE_PWD/src\n",
    );
    for source in RASC_WRAPPER_SOURCES {
        out.push_str(&format!("add_file -verilog \"$RASC/{source}\"\n"));
    }
    out.push_str("add_file -verilog \"$ALG_DIR/alg_block_top.v\"\n");
    for file in directives.extra_files().chain(directives.synthesize_files()) {
        out.push_str(&format!("add_file -vhdl \"$ALG_DIR/{}\"\n", fs::file_name(file)?));
    }
    out.push_str(&directives.project_text());
    Ok(out)
}

/// The Xilinx tool runs of the default flow for `top`, in order.
pub fn xilinx_invocations(config: &GlobalConfig, top: &str, xst_only: bool) -> Vec<Invocation> {
    let tools = &config.tools;
    let file = |ext: &str| format!("{top}.{ext}");
    let mut out = vec![
        Invocation::new(tools.xst.as_str())
            .args(["-ifn".to_string(), file("scr"), "-ofn".to_string(), file("syr")]),
    ];
    if xst_only {
        return out;
    }
    out.push(Invocation::new(tools.ngdbuild.as_str()).arg(file("ngc")));
    out.push(
        Invocation::new(tools.map.as_str())
            .args(["-p", config.synthesis.part.as_str()])
            .args(["-cm", "area", "-pr", "b", "-k", "4", "-c", "100"])
            .args(["-o".to_string(), file("ncd"), file("ngd"), file("pcf")]),
    );
    out.push(
        Invocation::new(tools.par.as_str())
            .args(["-w", "-ol", "std", "-t", "1"])
            .args([file("ncd"), file("ncd"), file("pcf")]),
    );
    out.push(
        Invocation::new(tools.trce.as_str())
            .args(["-e", "3", "-s", "10", "-xml", top])
            .args([file("ncd"), "-o".to_string(), file("twr"), file("pcf")]),
    );
    out
}

/// Synthesize the design described by `directives`, a file in `dir`.
pub fn vhdl2fpga(
    driver: &Driver,
    dir: &Utf8Path,
    directives: &Utf8Path,
    mode: SynthesisMode,
    stop_before_make: bool,
) -> Result<()> {
    let directives = SynthesisDirectives::from_file(directives, mode.flavor())?;
    let top = directives.top_entity()?;
    log::info!("Synthesizing {} ({:?})", top, mode);
    if mode.is_rasc() {
        rasc_flow(driver, dir, &directives, top, mode, stop_before_make)
    } else {
        default_flow(driver, dir, &directives, top, mode == SynthesisMode::XstOnly)
    }
}

/// Quiet runs keep the tool chatter in a report file.
fn reported(driver: &Driver, invocation: Invocation) -> Invocation {
    if driver.session.verbosity() < 2 {
        invocation.log_to(REPORT_LOG)
    } else {
        invocation
    }
}

fn default_flow(
    driver: &Driver,
    dir: &Utf8Path,
    directives: &SynthesisDirectives,
    top: &str,
    xst_only: bool,
) -> Result<()> {
    let synth = dir.join(SYNTHESIS_DIR);
    fs::ensure_dir(&synth)?;
    fs::write(&synth.join(format!("{top}.prj")), &default_project(directives))?;
    fs::write(&synth.join(format!("{top}.scr")), &directives.options_text())?;

    let invocations: Vec<_> = xilinx_invocations(&driver.config, top, xst_only)
        .into_iter()
        .map(|inv| reported(driver, inv.current_dir(&synth)))
        .collect();
    driver.sequencer(Stage::Synthesis).run_all(&invocations)?;
    if xst_only {
        log::info!("Stopping after XST");
    }
    Ok(())
}

fn rasc_flow(
    driver: &Driver,
    dir: &Utf8Path,
    directives: &SynthesisDirectives,
    top: &str,
    mode: SynthesisMode,
    stop_before_make: bool,
) -> Result<()> {
    let rasc = driver.toolchain().get(EnvVar::Rasc)?;
    let host_source = directives.host_source();
    if !stop_before_make && host_source.is_none() {
        return Err(Error::MissingDirective {
            file: directives.source().to_owned(),
            message: "no FILE_SW given for the RASC export".to_string(),
        });
    }

    let synth = dir.join(SYNTHESIS_DIR);
    let src = synth.join(SOURCE_DIR);
    fs::ensure_dir(&src)?;
    for file in directives.extra_files().chain(directives.synthesize_files()) {
        fs::copy_into(&dir.join(file), &src)?;
    }

    let project = match mode {
        SynthesisMode::RascSynplifyPro => synplify_project(directives)?,
        _ => rasc_xst_project(directives, rasc)?,
    };
    fs::write(&synth.join(format!("{top}.prj")), &project)?;
    if mode == SynthesisMode::RascXst {
        fs::write(&synth.join(format!("{top}.scr")), &directives.options_text())?;
    }

    fs::rewrite(
        &rasc.join("implementations/templates/Makefile"),
        &synth.join("Makefile"),
        &Substitutions::new()
            .with(
                "${RASC}/implementations/${SYNTHESIS_PROJ}/${SYNTHESIS_PROJ}.ucf",
                "./${SYNTHESIS_PROJ}.ucf",
            )
            .with("python2.4", "python"),
    )?;
    let (tool, ext) = mode.rasc_tool();
    fs::rewrite(
        &dir.join("Makefile.local.RASC-SYNTHESIS"),
        &synth.join("Makefile.local"),
        &Substitutions::new()
            .with("THE_DEFAULT_ALGORITHM_NAME", top)
            .with("THE_DEFAULT_SOURCE_DIR", format!("./{SOURCE_DIR}"))
            .with("THE_DEFAULT_SYNTHESIS_TOOL", tool)
            .with("THE_DEFAULT_SYNTHESIS_RESULT_EXT", ext),
    )?;
    for file in ["alg_block_top.v", "alg.h"] {
        fs::copy_file(&dir.join(file), &src.join(file))?;
    }

    if stop_before_make {
        log::info!("{} is ready for `make all`", synth);
        return Ok(());
    }
    driver.sequencer(Stage::Synthesis).run(&reported(
        driver,
        Invocation::new(driver.config.tools.make.as_str())
            .arg("all")
            .current_dir(&synth),
    ))?;

    match host_source {
        Some(host) if !driver.session.dry_run() => export_rasc(dir, &synth, top, host),
        _ => Ok(()),
    }
}

/// The algorithm name the blade build is exported under. The user name keeps
/// bitstreams of different users apart.
pub fn export_name(top: &str, user: Option<&str>) -> String {
    match user {
        Some(user) if !user.is_empty() => format!("{top}_{user}"),
        _ => top.to_string(),
    }
}

fn export_rasc(dir: &Utf8Path, synth: &Utf8Path, top: &str, host: &Utf8Path) -> Result<()> {
    let export = dir.join(RASC_EXPORT_DIR);
    fs::ensure_dir(&export)?;
    let user = std::env::var("USER").ok();
    let name = export_name(top, user.as_deref());

    for cfg in ["user_space.cfg", "core_services.cfg"] {
        fs::copy_into(&synth.join(cfg), &export)?;
    }
    fs::copy_file(
        &synth.join("rev_1").join(format!("{top}.bin")),
        &export.join(format!("{name}.bin")),
    )?;

    let subst = Substitutions::new().with("DEFAULT_ALGORITHM_NAME", name.as_str());
    fs::rewrite(
        &dir.join("Makefile.C-COMPILE-SGI-2"),
        &export.join("Makefile"),
        &subst,
    )?;
    fs::rewrite(&dir.join(host), &export.join(fs::file_name(host)?), &subst)?;
    log::info!("RASC build exported to {}", export);
    Ok(())
}
