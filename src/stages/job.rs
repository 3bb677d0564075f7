//! Processing one job from the queue.
use super::Driver;
use super::compile::{HICIRRF_DIR, LOWCIRRF_DIR};
use super::lowering::VHDL_LIBRARY;
use camino::{Utf8Path, Utf8PathBuf};
use roccc_core::job::{
    COMPILE_LOG, DOWNLOAD_DIR, HICIRRF_SUFFIX, JobInputs, JobQueue, MailCommand, Notification, Notifier,
    USER_INFO_FILE, UserInfo, write_sentinel,
};
use roccc_core::uninterrupt::Uninterrupt;
use roccc_core::{Error, Invocation, Result, Stage, fs};

/// What a `process-job` run did.
#[derive(Debug)]
pub enum JobRun {
    /// Another run holds the queue lock.
    Busy { holder: Option<String> },
    /// The queue is empty.
    Idle,
    /// The job compiled and now lives at `job`.
    Finished { job: Utf8PathBuf },
}

/// Take the queue lock and process the first queued job. A job that fails
/// to compile or package is still moved out of the queue and its submitter
/// notified; the error is returned afterwards.
pub fn process_job(driver: &Driver) -> Result<JobRun> {
    let queue = JobQueue::new(driver.config.jobs.root.clone());
    queue.check()?;
    let Some(_lock) = queue.lock()? else {
        return Ok(JobRun::Busy {
            holder: queue.lock_holder(),
        });
    };
    let Some(job) = queue.next_job()? else {
        return Ok(JobRun::Idle);
    };

    // An interrupt stops the compile, not this process, so the job is
    // still filed away and the lock released.
    let _unint = Uninterrupt::suppress();
    process(driver, &queue, &job)
}

fn process(driver: &Driver, queue: &JobQueue, job: &Utf8Path) -> Result<JobRun> {
    log::info!("Processing job {}", job);
    let user = match UserInfo::from_file(&job.join(USER_INFO_FILE)) {
        Ok(user) => user,
        Err(e) => {
            log::warn!("{}", e);
            UserInfo::default()
        }
    };

    let compiled = JobInputs::locate(job).and_then(|inputs| {
        run_compile(driver, job, &inputs, &user)?;
        Ok(inputs)
    });
    let inputs = match compiled {
        Ok(inputs) => inputs,
        Err(err) => return abandon(driver, queue, job, &user, err),
    };
    // Until the job leaves the queue every failure must file it away, or
    // the next run would pick the same job again.
    let archive = match package(driver, job, &inputs, &user) {
        Ok(archive) => archive,
        Err(err) => return abandon(driver, queue, job, &user, err),
    };
    let done = match file_away(driver, queue, job) {
        Ok(done) => done,
        Err(err) => return abandon(driver, queue, job, &user, err),
    };
    let attachments = vec![done.join(DOWNLOAD_DIR).join(archive)];
    notify(driver, &user, &inputs.source, true, attachments)?;
    Ok(JobRun::Finished { job: done })
}

/// File a job that could not be finished as failed and return `err`.
fn abandon(
    driver: &Driver,
    queue: &JobQueue,
    job: &Utf8Path,
    user: &UserInfo,
    err: Error,
) -> Result<JobRun> {
    log::error!("{}", driver.session.error_message(&err));
    // Record the compile's own code rather than the generic one.
    let code = match &err {
        Error::ToolFailed {
            stage: Stage::Compile,
            code,
            ..
        } => *code,
        other => other.exit_code(),
    };
    // A job that already left the queue only failed to hand over.
    if job.is_dir()
        && let Err(e) = file_failure(driver, queue, job, user, code)
    {
        log::error!("could not file away failed job {}: {}", job, e);
    }
    Err(err)
}

/// The nested compile, with all of its output in the job's compile log.
fn run_compile(driver: &Driver, job: &Utf8Path, inputs: &JobInputs, user: &UserInfo) -> Result<()> {
    let mut args = Vec::new();
    if let Some(id) = &user.job_id {
        args.push("--job".to_string());
        args.push(id.clone());
    }
    args.push(fs::file_name(&inputs.source)?.to_string());
    if let Some(passes) = &inputs.passes {
        args.push(fs::file_name(passes)?.to_string());
    }
    let invocation = driver.nested_compile(job, args)?.log_to(COMPILE_LOG);
    driver.sequencer(Stage::Compile).run(&invocation)
}

/// Fill the download directory of a compiled job and archive it. Returns
/// the archive's file name.
fn package(driver: &Driver, job: &Utf8Path, inputs: &JobInputs, user: &UserInfo) -> Result<String> {
    write_sentinel(job, 0)?;
    let download = job.join(DOWNLOAD_DIR);
    fs::ensure_dir(&download)?;
    for file in inputs.files() {
        fs::copy_into(file, &download)?;
    }
    for vhdl in fs::files_with_extension(job, "vhd")? {
        fs::copy_into(&vhdl, &download)?;
    }
    let hicirrf = inputs.hicirrf_file()?;
    if hicirrf.is_file() {
        fs::copy_into(&hicirrf, &download)?;
    }
    let library = driver.toolchain().roccc_home()?.join(VHDL_LIBRARY);
    if library.is_dir() {
        for vhdl in fs::files_with_extension(&library, "vhd")? {
            fs::copy_into(&vhdl, &download)?;
        }
    } else {
        log::warn!("VHDL library {} not found", library);
    }

    let archive = user.archive_name();
    driver.sequencer(Stage::Housekeeping).run(
        &Invocation::new(driver.config.tools.tar.as_str())
            .args(["czf".to_string(), format!("../{archive}"), ".".to_string()])
            .current_dir(&download),
    )?;
    if !driver.session.dry_run() {
        let built = job.join(&archive);
        let dest = download.join(&archive);
        std::fs::rename(&built, &dest)
            .map_err(|e| Error::fs(format!("moving {built} to {dest}"), e))?;
    }

    for stage in [HICIRRF_DIR, LOWCIRRF_DIR] {
        fs::remove_tree(&job.join(stage))?;
    }
    Ok(archive)
}

/// Record a failed job, move it out of the queue, and tell its submitter.
fn file_failure(driver: &Driver, queue: &JobQueue, job: &Utf8Path, user: &UserInfo, code: i32) -> Result<()> {
    let download = job.join(DOWNLOAD_DIR);
    fs::ensure_dir(&download)?;
    for ext in ["c", "pass"] {
        for file in fs::files_with_extension(job, ext)? {
            fs::copy_into(&file, &download)?;
        }
    }
    for name in [USER_INFO_FILE, COMPILE_LOG] {
        let file = job.join(name);
        if file.is_file() {
            fs::copy_into(&file, &download)?;
        }
    }
    write_sentinel(job, code)?;

    let done = file_away(driver, queue, job)?;
    let done_download = done.join(DOWNLOAD_DIR);
    let mut attachments = Vec::new();
    for ext in ["c", "pass", "txt"] {
        attachments.extend(fs::files_with_extension(&done_download, ext)?);
    }
    attachments.sort();
    let source = fs::files_with_extension(&done, "c")?
        .into_iter()
        .find(|p| !p.as_str().ends_with(&format!("{HICIRRF_SUFFIX}.c")))
        .unwrap_or_else(|| done.clone());
    notify(driver, user, &source, false, attachments)
}

/// Move `job` to the finished area, handing it to the configured owner.
fn file_away(driver: &Driver, queue: &JobQueue, job: &Utf8Path) -> Result<Utf8PathBuf> {
    let done = fs::relocate(job, &queue.compile_dir())?;
    log::info!("Moved job to {}", done);
    if let Some(owner) = &driver.config.jobs.owner {
        driver.sequencer(Stage::Housekeeping).run(
            &Invocation::new(driver.config.tools.chown.as_str())
                .arg("-hR")
                .arg(owner.as_str())
                .arg(done.as_str()),
        )?;
    }
    Ok(done)
}

fn notify(
    driver: &Driver,
    user: &UserInfo,
    source: &Utf8Path,
    success: bool,
    attachments: Vec<Utf8PathBuf>,
) -> Result<()> {
    let source = fs::file_name(source)?;
    match Notification::for_job(user, &driver.config.mail.from, source, success, attachments) {
        Some(message) => {
            MailCommand::new(&driver.session, driver.config.mail.command.as_str())
                .notify(&message)
        }
        None => {
            log::info!("{} left no email address", user.full_name());
            Ok(())
        }
    }
}
