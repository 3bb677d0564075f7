//! C to high-level CIRRF, and registering modules in the IP library.
use super::Driver;
use camino::{Utf8Path, Utf8PathBuf};
use roccc_core::directives::parse_pass_file;
use roccc_core::fs;
use roccc_core::script::{OPTIMIZE_TEMPLATE, module_script, optimization_script};
use roccc_core::template::Template;
use roccc_core::{Invocation, Result, Stage};

/// The source path without its extension, as the pass driver names
/// intermediate files.
fn source_prefix(source: &Utf8Path) -> Result<Utf8PathBuf> {
    fs::file_prefix(source)?;
    Ok(source.with_extension(""))
}

fn optimize_template(driver: &Driver) -> Result<Template> {
    match &driver.config.templates.optimize {
        Some(path) => {
            log::info!("Using optimization template {}", path);
            Template::from_file(path)
        }
        None => Ok(Template::new(OPTIMIZE_TEMPLATE)),
    }
}

/// Compile `source` in `dir` to high-level CIRRF, with the loop
/// transformations requested by `passes`. Relative paths are taken relative
/// to `dir`.
pub fn c2hicirrf(
    driver: &Driver,
    dir: &Utf8Path,
    source: &Utf8Path,
    passes: Option<&Utf8Path>,
) -> Result<()> {
    fs::require_file(&dir.join(source))?;
    let passes = passes.map(|p| dir.join(p));
    if let Some(passes) = &passes {
        fs::require_file(passes)?;
    }
    let buckets = parse_pass_file(passes.as_deref())?;
    for (tag, directives) in buckets.iter() {
        log::debug!("{:?}: {} directive(s)", tag, directives.len());
    }

    let prefix = source_prefix(source)?;
    let script = optimization_script(&optimize_template(driver)?, prefix.as_str(), &buckets);
    log::trace!("optimization script:\n{}", script);

    let tools = &driver.config.tools;
    log::info!("Compiling {} to high-level CIRRF", source);
    driver.sequencer(Stage::FrontEnd).run(
        &Invocation::new(tools.gcc2suif.as_str())
            .arg(source.as_str())
            .current_dir(dir),
    )?;
    driver.sequencer(Stage::Optimize).run(
        &Invocation::new(tools.suifdriver.as_str())
            .arg("-e")
            .arg(script)
            .current_dir(dir),
    )
}

/// Add `module`, defined in `source`, to the IP library in `library`.
pub fn add_module(driver: &Driver, source: &Utf8Path, module: &str, library: &Utf8Path) -> Result<()> {
    fs::require_file(source)?;
    let prefix = source_prefix(source)?;
    let script = module_script(prefix.as_str(), module, library.as_str());

    let tools = &driver.config.tools;
    log::info!("Adding module {} from {} to {}", module, source, library);
    driver
        .sequencer(Stage::FrontEnd)
        .run(&Invocation::new(tools.gcc2suif.as_str()).arg(source.as_str()))?;
    driver.sequencer(Stage::Optimize).run(
        &Invocation::new(tools.suifdriver.as_str())
            .arg("-e")
            .arg(script),
    )
}
