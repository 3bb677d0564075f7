mod common;

use camino::Utf8PathBuf;
use common::{Sandbox, code, stderr, stdout};

const KERNEL: &str = "void fir(int* A, int* B) {\n  L1: for (int i = 0; i < 5; ++i) B[i] = A[i];\n}\n";

const USER: &str = "job_id: 7\nfirstname: Ada\nlastname: Lovelace\nemail: ada@example.com\n";

struct Queue {
    sandbox: Sandbox,
    root: Utf8PathBuf,
    mail: Utf8PathBuf,
}

impl Queue {
    fn new() -> Self {
        let sandbox = Sandbox::new();
        let root = sandbox.root.join("www");
        let mail = sandbox.root.join("mail.txt");
        std::fs::create_dir_all(root.join("jobs")).unwrap();
        std::fs::create_dir_all(root.join("compile")).unwrap();
        Self {
            sandbox,
            root,
            mail,
        }
    }

    fn submit(&self, name: &str) {
        self.sandbox.write(&format!("www/jobs/{name}/fir.c"), KERNEL);
        self.sandbox
            .write(&format!("www/jobs/{name}/fir.pass"), "fully unroll L1\n");
        self.sandbox
            .write(&format!("www/jobs/{name}/ROCCC_USER.txt"), USER);
    }

    fn command(&self) -> std::process::Command {
        let mut cmd = self.sandbox.command_in(&self.sandbox.work);
        cmd.arg("-s")
            .arg(format!("jobs.root={}", self.root))
            .arg("-s")
            .arg(format!("mail.command=tee {}", self.mail));
        cmd
    }

    fn process(&self, fail_tool: Option<&str>) -> std::process::Output {
        let mut cmd = self.command();
        if let Some(tool) = fail_tool {
            cmd.env("FAIL_TOOL", tool);
        }
        cmd.arg("process-job").output().unwrap()
    }

    /// Process a job with extra `-s` settings.
    fn process_with(&self, sets: &[&str]) -> std::process::Output {
        let mut cmd = self.command();
        for set in sets {
            cmd.arg("-s").arg(set);
        }
        cmd.arg("process-job").output().unwrap()
    }
}

#[test]
fn finished_job_is_packaged() {
    let queue = Queue::new();
    queue.submit("job1");
    let out = queue.process(None);
    assert_eq!(code(&out), 0, "{}", stderr(&out));

    let sandbox = &queue.sandbox;
    assert!(!sandbox.exists("www/jobs/job1"));
    assert!(!sandbox.exists("www/jobs/COMPILE_LOCK"));
    assert_eq!(sandbox.read("www/compile/job1/SUCCESS"), "0\n");
    for file in [
        "job7.tar.gz",
        "fir.c",
        "fir.pass",
        "ROCCC_USER.txt",
        "fir.vhd",
        "fir-hicirrf.c",
        "ROCCC_utility_lib.vhd",
    ] {
        assert!(
            sandbox.exists(&format!("www/compile/job1/download/{file}")),
            "{file} missing from the download"
        );
    }
    assert!(!sandbox.exists("www/compile/job1/compile_hicirrf"));
    assert!(!sandbox.exists("www/compile/job1/compile_lowcirrf"));

    let mail = std::fs::read_to_string(&queue.mail).unwrap();
    assert!(mail.contains("To: Ada Lovelace <ada@example.com>"), "{mail}");
    assert!(mail.contains("Subject: ROCCC Job #7: fir.c"));
    assert!(mail.contains("Here is your compiled VHDL code."));
    assert!(mail.contains("Content-Type: multipart/mixed"), "{mail}");
    assert!(mail.contains("Content-Disposition: attachment; filename=\"job7.tar.gz\""));
}

#[test]
fn failed_job_is_filed_away() {
    let queue = Queue::new();
    queue.submit("job1");
    let out = queue.process(Some("do_hdlgen"));
    assert_eq!(code(&out), 12, "{}", stderr(&out));

    let sandbox = &queue.sandbox;
    assert!(!sandbox.exists("www/jobs/job1"));
    assert!(!sandbox.exists("www/jobs/COMPILE_LOCK"));
    assert_eq!(sandbox.read("www/compile/job1/FAILED"), "10\n");
    let log = sandbox.read("www/compile/job1/download/COMPILE_LOG.txt");
    assert!(log.contains("compile: ERROR(10):"), "{log}");

    let mail = std::fs::read_to_string(&queue.mail).unwrap();
    assert!(mail.contains("There were compile errors."), "{mail}");
    assert!(mail.contains("filename=\"COMPILE_LOG.txt\""));
    assert!(mail.contains("filename=\"fir.pass\""));
}

#[test]
fn packaging_failure_files_the_job_away() {
    let queue = Queue::new();
    queue.submit("job1");
    queue.submit("job2");
    let out = queue.process_with(&["tools.tar=false"]);
    assert_eq!(code(&out), 12, "{}", stderr(&out));

    let sandbox = &queue.sandbox;
    assert!(!sandbox.exists("www/jobs/job1"));
    assert!(!sandbox.exists("www/jobs/COMPILE_LOCK"));
    assert_eq!(sandbox.read("www/compile/job1/FAILED"), "12\n");
    assert!(!sandbox.exists("www/compile/job1/SUCCESS"));
    let mail = std::fs::read_to_string(&queue.mail).unwrap();
    assert!(mail.contains("There were compile errors."), "{mail}");

    // The queue moves on to the next job.
    assert_eq!(code(&queue.process(None)), 0);
    assert_eq!(sandbox.read("www/compile/job2/SUCCESS"), "0\n");
}

#[test]
fn jobs_run_in_name_order() {
    let queue = Queue::new();
    queue.submit("job2");
    queue.submit("job1");
    assert_eq!(code(&queue.process(None)), 0);
    assert!(queue.sandbox.exists("www/compile/job1/SUCCESS"));
    assert!(queue.sandbox.exists("www/jobs/job2"));
}

#[test]
fn busy_and_idle_queues() {
    let queue = Queue::new();
    let out = queue.process(None);
    assert_eq!(code(&out), 0);
    assert_eq!(stdout(&out), "No jobs to process\n");

    queue.submit("job1");
    queue.sandbox.write("www/jobs/COMPILE_LOCK", "someone@elsewhere\n");
    let out = queue.process(None);
    assert_eq!(code(&out), 0);
    assert_eq!(stdout(&out), "Compiler is busy\nLock held by someone@elsewhere\n");
    assert!(queue.sandbox.exists("www/jobs/job1/fir.c"));
    assert!(queue.sandbox.exists("www/jobs/COMPILE_LOCK"));
}

#[test]
fn queue_must_exist() {
    let queue = Queue::new();
    std::fs::remove_dir_all(queue.root.join("compile")).unwrap();
    assert_eq!(code(&queue.process(None)), 5);
}

#[test]
fn process_job_rejects_dry_run() {
    let sandbox = Sandbox::new();
    assert_eq!(code(&sandbox.run(&["--dry-run", "process-job"])), 3);
    assert_eq!(code(&sandbox.run(&["--dry-run", "test-dir"])), 3);
}

fn repository(sandbox: &Sandbox) {
    sandbox.write("code-repository/COMPILE_DIR_LIST", "fir\nmm\n");
    sandbox.write("code-repository/fir/fir.c", KERNEL);
    sandbox.write("code-repository/mm/adder.c", KERNEL);
    sandbox.write("code-repository/mm/broken.c", KERNEL);
    sandbox.write("code-repository/mm/u2.pass", "partially unroll L1 2\n");
}

fn scratch_copies(sandbox: &Sandbox) -> Vec<Utf8PathBuf> {
    sandbox
        .root
        .read_dir_utf8()
        .unwrap()
        .map(|entry| entry.unwrap().path().to_owned())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.starts_with("__test_compile_dir_"))
        })
        .collect()
}

#[test]
fn regression_run() {
    let sandbox = Sandbox::new();
    repository(&sandbox);
    let out = sandbox.run(&["test-dir"]);
    assert_eq!(code(&out), 1, "{}", stderr(&out));
    insta::assert_snapshot!(stdout(&out), @r"
    PASS : fir
    PASS : mm/adder-u2
    FAIL : mm/broken-u2
    Total compiled = 3
    Passed # = 2
    Failed # = 1
    ");
    assert!(scratch_copies(&sandbox).is_empty());
    assert!(!sandbox.exists("code-repository/fir/SUCCESS"));
}

#[test]
fn regression_run_keeps_copy() {
    let sandbox = Sandbox::new();
    repository(&sandbox);
    let out = sandbox.run(&["test-dir", "--do-not-remove"]);
    assert_eq!(code(&out), 1, "{}", stderr(&out));
    let copies = scratch_copies(&sandbox);
    assert_eq!(copies.len(), 1);
    let copy = &copies[0];
    assert!(copy.join("fir/SUCCESS").is_file());
    assert!(copy.join("mm/adder-u2/adder.vhd").is_file());
    assert!(copy.join("mm/broken-u2/FAILED").is_file());
}
