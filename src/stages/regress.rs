//! Regression compiles over the code repository next to the installation.
use super::Driver;
use camino::{Utf8Path, Utf8PathBuf};
use roccc_core::regress::{Case, DIR_LIST, Tally, parse_dir_list, plan_cases};
use roccc_core::{Error, Result, Stage, fs};

/// The repository of test kernels, relative to `$ROCCC_HOME`.
pub const REPOSITORY: &str = "../code-repository";

/// Prefix of the scratch copy a run compiles in.
pub const COPY_PREFIX: &str = "__test_compile_dir_";

/// Compile every listed kernel in a fresh copy of the repository. The copy
/// is removed afterwards unless `keep` is set.
pub fn test_dir(driver: &Driver, keep: bool) -> Result<Tally> {
    let repo = driver.toolchain().roccc_home()?.join(REPOSITORY);
    if !repo.is_dir() {
        return Err(Error::FileNotFound(repo));
    }
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let copy = match repo.parent() {
        Some(parent) => parent.join(format!("{COPY_PREFIX}{stamp}")),
        None => Utf8PathBuf::from(format!("{COPY_PREFIX}{stamp}")),
    };
    log::info!("Copying {} to {}", repo, copy);
    fs::copy_tree(&repo, &copy)?;

    let tally = run_all(driver, &copy);
    if keep {
        log::info!("Keeping {}", copy);
    } else {
        fs::remove_tree(&copy)?;
    }
    tally
}

fn run_all(driver: &Driver, root: &Utf8Path) -> Result<Tally> {
    let list = fs::read(&root.join(DIR_LIST))?;
    let mut tally = Tally::default();
    for entry in parse_dir_list(&list) {
        let cases = match plan_cases(root, &entry) {
            Ok(cases) => cases,
            Err(e) => {
                log::warn!("{}", driver.session.error_message(&e));
                tally.record(entry.as_str(), e.exit_code());
                continue;
            }
        };
        for case in cases {
            let code = match run_case(driver, &case) {
                Ok(()) => 0,
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    log::warn!("{}: {}", case.name, e);
                    e.exit_code()
                }
            };
            tally.record(case.name, code);
        }
    }
    Ok(tally)
}

fn run_case(driver: &Driver, case: &Case) -> Result<()> {
    log::info!("Compiling {}", case.name);
    if case.needs_copy() {
        fs::ensure_dir(&case.workdir)?;
        fs::copy_into(&case.source, &case.workdir)?;
        if let Some(passes) = &case.passes {
            fs::copy_into(passes, &case.workdir)?;
        }
    }
    let invocation = driver.nested_compile(&case.workdir, case.compile_args()?)?;
    driver.sequencer(Stage::Compile).run(&invocation)
}
