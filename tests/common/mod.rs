//! A scratch installation with stand-in tools for driving the `roccc`
//! binary end to end.
#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use std::os::unix::fs::PermissionsExt;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Every stand-in tool fails with status 3 when `FAIL_TOOL` names it.
const PRELUDE: &str = r#"#!/bin/sh
[ "$(basename "$0")" = "$FAIL_TOOL" ] && exit 3
"#;

/// Lowering passes write their last argument.
const PASS: &str = r#"for last; do :; done
touch "$last"
"#;

const GCC2SUIF: &str = r#"touch "${1%.c}.suif"
"#;

/// Keeps the script it was given and writes what the optimizer would.
const SUIFDRIVER: &str = r#"printf '%s\n' "$2" > suifdriver.script
prefix=$(sed -n 's/^load \(.*\)\.suif ;$/\1/p' suifdriver.script | head -n 1)
touch "$prefix-hicirrf.c" roccc.h
"#;

/// Fails on kernels whose name starts with `broken`.
const HDLGEN: &str = r#"for last; do :; done
case "$last" in broken*) exit 1 ;; esac
touch "$last" "${last%-hicirrf.hdl}.vhd"
"#;

const DOT_GRAPH: &str = r#"touch "${1%.df}.dot" "${1%.df}.pdf"
"#;

/// Synthesis tools only say what they were asked to do.
const ECHO: &str = r#"echo "$(basename "$0") $*"
"#;

const LOWERING: &[&str] = &[
    "do_lower",
    "do_s2m",
    "do_il2cfg",
    "do_cfg2ssa",
    "do_ssa2cfg",
    "do_dcessa",
    "do_peep",
    "do_preprocess",
    "do_kernelcfg2df",
    "do_export_bitwidth",
    "do_bitresizing",
    "do_pld",
    "do_pld_gipcore",
];

const SYNTHESIS: &[&str] = &["xst", "ngdbuild", "map", "par", "trce"];

pub struct Sandbox {
    _tmp: TempDir,
    pub root: Utf8PathBuf,
    pub bin: Utf8PathBuf,
    /// `$ROCCC_HOME`.
    pub home: Utf8PathBuf,
    /// Where commands run unless told otherwise.
    pub work: Utf8PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let sandbox = Self {
            bin: root.join("bin"),
            home: root.join("install"),
            work: root.join("work"),
            root,
            _tmp: tmp,
        };
        for dir in [&sandbox.bin, &sandbox.work, &sandbox.root.join("config")] {
            std::fs::create_dir_all(dir).unwrap();
        }
        sandbox.write("install/src/vhdl_library/ROCCC_utility_lib.vhd", "-- utilities\n");

        sandbox.tool("gcc2suif", GCC2SUIF);
        sandbox.tool("suifdriver", SUIFDRIVER);
        for pass in LOWERING {
            sandbox.tool(pass, PASS);
        }
        sandbox.tool("do_hdlgen", HDLGEN);
        sandbox.tool("do_print_dot_graph", DOT_GRAPH);
        for tool in SYNTHESIS {
            sandbox.tool(tool, ECHO);
        }
        sandbox
    }

    fn tool(&self, name: &str, body: &str) {
        let path = self.bin.join(name);
        std::fs::write(&path, format!("{PRELUDE}{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Write `contents` to `path`, relative to the sandbox root.
    pub fn write(&self, path: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.root.join(path)).unwrap()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }

    /// A `roccc` command in `dir` with the scratch installation in its
    /// environment.
    pub fn command_in(&self, dir: &Utf8Path) -> Command {
        let path = format!(
            "{}:{}",
            self.bin,
            std::env::var("PATH").unwrap_or_default()
        );
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_roccc"));
        cmd.current_dir(dir)
            .env("PATH", path)
            .env("HOME", &self.root)
            .env("XDG_CONFIG_HOME", self.root.join("config"))
            .env("ROCCC_HOME", &self.home)
            .env("NCIHOME", self.root.join("nci"))
            .env("MACHSUIFHOME", self.root.join("machsuif"))
            .env("XILINX", self.root.join("xilinx"))
            .env_remove("RASC")
            .env_remove("FAIL_TOOL");
        cmd
    }

    pub fn run_in(&self, dir: &Utf8Path, args: &[&str]) -> Output {
        self.command_in(dir).args(args).output().unwrap()
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.run_in(&self.work, args)
    }
}

pub fn code(out: &Output) -> i32 {
    out.status.code().unwrap()
}

pub fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

pub fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}
