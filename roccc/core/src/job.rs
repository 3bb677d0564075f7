//! The batch job queue.
//!
//! Jobs are directories dropped into `<root>/jobs`. Each holds one C source,
//! an optional pass file, and a `ROCCC_USER.txt` describing who submitted
//! it. Finished jobs, successful or not, end up in `<root>/compile`.
use crate::error::{Error, Result};
use crate::exec::{Invocation, Sequencer, Stage};
use crate::fs;
use crate::lock::JobLock;
use crate::session::Session;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

pub const USER_INFO_FILE: &str = "ROCCC_USER.txt";
pub const COMPILE_LOG: &str = "COMPILE_LOG.txt";
pub const DOWNLOAD_DIR: &str = "download";
pub const SUCCESS_FILE: &str = "SUCCESS";
pub const FAILED_FILE: &str = "FAILED";

/// Suffix of the C file the first compile stage produces.
pub const HICIRRF_SUFFIX: &str = "-hicirrf";

/// Who submitted a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub job_id: Option<String>,
    pub firstname: String,
    pub lastname: String,
    pub email: Option<String>,
}

impl Default for UserInfo {
    fn default() -> Self {
        Self {
            job_id: None,
            firstname: "ROCCC".to_string(),
            lastname: "User".to_string(),
            email: None,
        }
    }
}

impl UserInfo {
    /// Read `key: value` lines. Unknown keys are ignored and lines without a
    /// separator are skipped.
    pub fn parse(text: &str) -> Self {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for line in text.lines() {
            match line.trim_end().split_once(": ") {
                Some((key, value)) => {
                    fields.insert(key.trim(), value.trim());
                }
                None if line.trim().is_empty() => {}
                None => log::warn!("Can't parse line \"{}\"", line),
            }
        }
        let field = |key: &str| {
            fields
                .get(key)
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        };
        let defaults = Self::default();
        Self {
            job_id: field("job_id"),
            firstname: field("firstname").unwrap_or(defaults.firstname),
            lastname: field("lastname").unwrap_or(defaults.lastname),
            email: field("email"),
        }
    }

    pub fn from_file(path: &Utf8Path) -> Result<Self> {
        log::info!("Parsing \"{}\"", path);
        Ok(Self::parse(&fs::read(path)?))
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    /// The mail recipient, if an address was given.
    pub fn recipient(&self) -> Option<String> {
        let email = self.email.as_ref()?;
        Some(format!("{} <{}>", self.full_name(), email))
    }

    pub fn subject(&self, source: &str) -> String {
        match &self.job_id {
            Some(id) => format!("ROCCC Job #{id}: {source}"),
            None => format!("ROCCC Job: {source}"),
        }
    }

    /// Name of the archive handed back to the user.
    pub fn archive_name(&self) -> String {
        format!("job{}.tar.gz", self.job_id.as_deref().unwrap_or_default())
    }
}

/// The queue and finished-job directories under one root.
#[derive(Debug, Clone)]
pub struct JobQueue {
    root: Utf8PathBuf,
}

impl JobQueue {
    pub fn new<P: Into<Utf8PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn jobs_dir(&self) -> Utf8PathBuf {
        self.root.join("jobs")
    }

    pub fn compile_dir(&self) -> Utf8PathBuf {
        self.root.join("compile")
    }

    /// Fail unless the queue directories exist.
    pub fn check(&self) -> Result<()> {
        for dir in [self.root.clone(), self.jobs_dir(), self.compile_dir()] {
            if !dir.is_dir() {
                return Err(Error::fs(
                    format!("cannot access directory {dir}"),
                    std::io::ErrorKind::NotFound.into(),
                ));
            }
        }
        Ok(())
    }

    /// Take the queue lock, or `None` if another run holds it.
    pub fn lock(&self) -> Result<Option<JobLock>> {
        JobLock::try_acquire(&self.jobs_dir())
    }

    /// Who holds the queue lock.
    pub fn lock_holder(&self) -> Option<String> {
        JobLock::holder(&self.jobs_dir())
    }

    /// The first job directory in name order.
    pub fn next_job(&self) -> Result<Option<Utf8PathBuf>> {
        Ok(fs::subdirectories(&self.jobs_dir())?.into_iter().next())
    }
}

/// The input files of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInputs {
    pub source: Utf8PathBuf,
    pub passes: Option<Utf8PathBuf>,
    pub user_info: Utf8PathBuf,
}

impl JobInputs {
    /// Find the inputs in `dir`: exactly one C source, at most one pass file,
    /// and the user info file.
    pub fn locate(dir: &Utf8Path) -> Result<Self> {
        let job = fs::file_name(dir)?.to_string();
        let fail = |message: String| Error::Job {
            job: job.clone(),
            message,
        };

        let sources: Vec<_> = fs::files_with_extension(dir, "c")?
            .into_iter()
            .filter(|p| !p.as_str().ends_with(&format!("{HICIRRF_SUFFIX}.c")))
            .collect();
        let source = match sources.as_slice() {
            [source] => source.clone(),
            [] => return Err(fail("missing .c file".to_string())),
            many => {
                return Err(fail(format!(
                    "expected one .c file, found {}",
                    many.len()
                )));
            }
        };

        let mut passes = fs::files_with_extension(dir, "pass")?;
        if passes.len() > 1 {
            return Err(fail(format!(
                "expected at most one .pass file, found {}",
                passes.len()
            )));
        }

        let user_info = dir.join(USER_INFO_FILE);
        if !user_info.is_file() {
            return Err(fail(format!("missing {USER_INFO_FILE}")));
        }

        Ok(Self {
            source,
            passes: passes.pop(),
            user_info,
        })
    }

    /// Every input file.
    pub fn files(&self) -> Vec<&Utf8Path> {
        let mut files = vec![self.source.as_path()];
        files.extend(self.passes.as_deref());
        files.push(&self.user_info);
        files
    }

    /// The C file the first compile stage writes next to the source.
    pub fn hicirrf_file(&self) -> Result<Utf8PathBuf> {
        let prefix = fs::file_prefix(&self.source)?;
        Ok(self
            .source
            .with_file_name(format!("{prefix}{HICIRRF_SUFFIX}.c")))
    }
}

/// Record how a compile ended in `dir`. A zero `code` writes `SUCCESS`,
/// anything else `FAILED`; both hold the code.
pub fn write_sentinel(dir: &Utf8Path, code: i32) -> Result<Utf8PathBuf> {
    let (name, stale) = if code == 0 {
        (SUCCESS_FILE, FAILED_FILE)
    } else {
        (FAILED_FILE, SUCCESS_FILE)
    };
    let stale = dir.join(stale);
    if stale.exists() {
        std::fs::remove_file(&stale)
            .map_err(|e| Error::fs(format!("removing {stale}"), e))?;
    }
    let path = dir.join(name);
    fs::write(&path, &format!("{code}\n"))?;
    Ok(path)
}

/// The code recorded by [write_sentinel], if any.
pub fn read_sentinel(dir: &Utf8Path) -> Option<i32> {
    [SUCCESS_FILE, FAILED_FILE].iter().find_map(|name| {
        std::fs::read_to_string(dir.join(name))
            .ok()?
            .trim()
            .parse()
            .ok()
    })
}

/// A message to the submitter of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Utf8PathBuf>,
}

impl Notification {
    /// The message for a finished job, or `None` if the user left no address.
    pub fn for_job(
        user: &UserInfo,
        from: &str,
        source: &str,
        success: bool,
        attachments: Vec<Utf8PathBuf>,
    ) -> Option<Self> {
        let to = user.recipient()?;
        let mut body = format!("Dear {}\n", user.full_name());
        if success {
            body.push_str("  Here is your compiled VHDL code.\n\n");
        } else {
            body.push_str(
                "  There were compile errors. The error log is attached.\n\n",
            );
        }
        body.push_str("-ROCCC Team\n");
        Some(Self {
            from: from.to_string(),
            to,
            subject: user.subject(source),
            body,
            attachments,
        })
    }

    /// The message as fed to a mail transport, dated now.
    pub fn render(&self) -> String {
        self.render_with(&chrono::Local::now().to_rfc2822())
    }

    /// The message as a MIME multipart with `date` in its `Date:` header.
    /// Each attachment is a base64 part; files that cannot be read are left
    /// out.
    pub fn render_with(&self, date: &str) -> String {
        let mut out = format!(
            "From: {}\nTo: {}\nDate: {date}\nSubject: {}\n",
            self.from, self.to, self.subject
        );
        out.push_str("MIME-Version: 1.0\n");
        out.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{MIME_BOUNDARY}\"\n\n"
        ));
        out.push_str(&format!("--{MIME_BOUNDARY}\n"));
        out.push_str("Content-Type: text/plain; charset=\"utf-8\"\n");
        out.push_str("Content-Transfer-Encoding: 8bit\n\n");
        out.push_str(&self.body);

        for file in &self.attachments {
            let (Some(name), Ok(bytes)) = (file.file_name(), std::fs::read(file)) else {
                log::warn!("Skipping \"{file}\" (cannot read)");
                continue;
            };
            out.push_str(&format!("\n--{MIME_BOUNDARY}\n"));
            out.push_str(&format!(
                "Content-Type: application/octet-stream; name=\"{name}\"\n"
            ));
            out.push_str("Content-Transfer-Encoding: base64\n");
            out.push_str(&format!(
                "Content-Disposition: attachment; filename=\"{name}\"\n\n"
            ));
            let encoded = base64::encode(bytes);
            // Base64 is ASCII, so byte chunks are whole characters.
            for line in encoded.as_bytes().chunks(MIME_LINE) {
                out.push_str(&String::from_utf8_lossy(line));
                out.push('\n');
            }
        }
        out.push_str(&format!("\n--{MIME_BOUNDARY}--\n"));
        out
    }
}

const MIME_BOUNDARY: &str = "=_roccc_job_boundary_=";

/// Longest base64 line allowed in a mail body.
const MIME_LINE: usize = 76;

/// Delivers job notifications.
pub trait Notifier {
    fn notify(&self, message: &Notification) -> Result<()>;
}

/// Pipes each message to a mail transport command such as `sendmail -t`.
pub struct MailCommand<'a> {
    session: &'a Session,
    command: String,
}

impl<'a> MailCommand<'a> {
    pub fn new<S: Into<String>>(session: &'a Session, command: S) -> Self {
        Self {
            session,
            command: command.into(),
        }
    }

    pub fn invocation(&self, message: &Notification) -> Option<Invocation> {
        let mut words = self.command.split_whitespace();
        let program = words.next()?;
        Some(Invocation::new(program).args(words).input(message.render()))
    }
}

impl Notifier for MailCommand<'_> {
    fn notify(&self, message: &Notification) -> Result<()> {
        match self.invocation(message) {
            Some(invocation) => {
                log::info!("Sending mail to {}", message.to);
                Sequencer::new(self.session, Stage::Housekeeping).run(&invocation)
            }
            None => {
                log::info!("Mail is disabled, not notifying {}", message.to);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    fn touch(path: &Utf8Path) {
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn user_info() {
        let info = UserInfo::parse(
            "job_id: 42\nfirstname: Ada\nbogus line\nemail: ada@example.com\nshoe_size: 9\n",
        );
        assert_eq!(info.job_id.as_deref(), Some("42"));
        assert_eq!(info.full_name(), "Ada User");
        assert_eq!(info.recipient().unwrap(), "Ada User <ada@example.com>");
        assert_eq!(info.subject("fir.c"), "ROCCC Job #42: fir.c");
        assert_eq!(info.archive_name(), "job42.tar.gz");

        let anonymous = UserInfo::parse("");
        assert_eq!(anonymous, UserInfo::default());
        assert!(anonymous.recipient().is_none());
        assert_eq!(anonymous.subject("fir.c"), "ROCCC Job: fir.c");
    }

    #[test]
    fn queue_order() {
        let (_tmp, root) = scratch();
        let queue = JobQueue::new(&root);
        assert!(queue.check().is_err());
        std::fs::create_dir_all(queue.jobs_dir()).unwrap();
        std::fs::create_dir_all(queue.compile_dir()).unwrap();
        queue.check().unwrap();
        assert_eq!(queue.next_job().unwrap(), None);

        for job in ["job2", "job10", "job1"] {
            std::fs::create_dir(queue.jobs_dir().join(job)).unwrap();
        }
        let lock = queue.lock().unwrap().unwrap();
        assert!(queue.lock().unwrap().is_none());
        assert!(queue.lock_holder().is_some());
        assert_eq!(queue.next_job().unwrap(), Some(queue.jobs_dir().join("job1")));
        drop(lock);
        assert!(queue.lock_holder().is_none());
    }

    #[test]
    fn locate_inputs() {
        let (_tmp, dir) = scratch();
        let missing = JobInputs::locate(&dir).unwrap_err();
        assert_eq!(missing.exit_code(), 12);

        touch(&dir.join("fir.c"));
        touch(&dir.join("fir-hicirrf.c"));
        touch(&dir.join("fir.pass"));
        assert!(JobInputs::locate(&dir).is_err());

        touch(&dir.join(USER_INFO_FILE));
        let inputs = JobInputs::locate(&dir).unwrap();
        assert_eq!(inputs.source, dir.join("fir.c"));
        assert_eq!(inputs.passes, Some(dir.join("fir.pass")));
        assert_eq!(inputs.files().len(), 3);
        assert_eq!(inputs.hicirrf_file().unwrap(), dir.join("fir-hicirrf.c"));

        touch(&dir.join("other.c"));
        assert!(JobInputs::locate(&dir).is_err());
    }

    #[test]
    fn sentinels() {
        let (_tmp, dir) = scratch();
        assert_eq!(read_sentinel(&dir), None);
        write_sentinel(&dir, 8).unwrap();
        assert_eq!(read_sentinel(&dir), Some(8));
        write_sentinel(&dir, 0).unwrap();
        assert!(!dir.join(FAILED_FILE).exists());
        assert_eq!(read_sentinel(&dir), Some(0));
    }

    #[test]
    fn failure_mail() {
        let (_tmp, dir) = scratch();
        let log = dir.join(COMPILE_LOG);
        std::fs::write(&log, "fir.c:3: parse error\n").unwrap();
        let user = UserInfo::parse("job_id: 7\nfirstname: Ada\nlastname: L\nemail: a@b\n");
        let note = Notification::for_job(
            &user,
            "roccc@localhost",
            "fir.c",
            false,
            vec![log, dir.join("missing.pass")],
        )
        .unwrap();
        assert_eq!(
            note.render_with("Mon, 19 Oct 2026 10:00:00 +0000"),
            "From: roccc@localhost\n\
             To: Ada L <a@b>\n\
             Date: Mon, 19 Oct 2026 10:00:00 +0000\n\
             Subject: ROCCC Job #7: fir.c\n\
             MIME-Version: 1.0\n\
             Content-Type: multipart/mixed; boundary=\"=_roccc_job_boundary_=\"\n\
             \n\
             --=_roccc_job_boundary_=\n\
             Content-Type: text/plain; charset=\"utf-8\"\n\
             Content-Transfer-Encoding: 8bit\n\
             \n\
             Dear Ada L\n  There were compile errors. The error log is attached.\n\n\
             -ROCCC Team\n\
             \n\
             --=_roccc_job_boundary_=\n\
             Content-Type: application/octet-stream; name=\"COMPILE_LOG.txt\"\n\
             Content-Transfer-Encoding: base64\n\
             Content-Disposition: attachment; filename=\"COMPILE_LOG.txt\"\n\
             \n\
             ZmlyLmM6MzogcGFyc2UgZXJyb3IK\n\
             \n\
             --=_roccc_job_boundary_=--\n"
        );
    }

    #[test]
    fn attachments_are_wrapped() {
        let (_tmp, dir) = scratch();
        let archive = dir.join("job7.tar.gz");
        let bytes: Vec<u8> = (0..=255).collect();
        std::fs::write(&archive, &bytes).unwrap();
        let note = Notification::for_job(
            &UserInfo::parse("email: a@b\n"),
            "me",
            "x.c",
            true,
            vec![archive],
        )
        .unwrap();
        let mail = note.render();
        assert!(mail.contains("\nDate: "), "{mail}");
        assert!(mail.contains("filename=\"job7.tar.gz\""));

        let (_, part) = mail.split_once("filename=\"job7.tar.gz\"\n\n").unwrap();
        let lines: Vec<_> = part.lines().take_while(|l| !l.is_empty()).collect();
        assert_eq!(lines.iter().map(|l| l.len()).collect::<Vec<_>>(), [76, 76, 76, 76, 40]);
        assert_eq!(base64::decode(lines.concat()).unwrap(), bytes);
    }

    #[test]
    fn mail_command() {
        let session = Session::new("process-job", 0);
        let note = Notification::for_job(
            &UserInfo::parse("email: a@b\n"),
            "me",
            "x.c",
            true,
            vec![],
        )
        .unwrap();
        let (_tmp, dir) = scratch();
        let out = dir.join("mail.txt");
        let cat = MailCommand::new(&session, format!("tee {out}"));
        cat.notify(&note).unwrap();
        let sent = std::fs::read_to_string(&out).unwrap();
        assert!(sent.starts_with("From: me\nTo: "), "{sent}");
        assert!(sent.contains(&note.body));

        let disabled = MailCommand::new(&session, "  ");
        assert!(disabled.invocation(&note).is_none());
        disabled.notify(&note).unwrap();
    }
}
