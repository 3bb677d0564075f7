use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt::Display;

/// Environment variables naming toolchain installations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvVar {
    /// The ROCCC installation.
    RocccHome,
    /// The SUIF/NCI toolchain.
    NciHome,
    /// The Machine-SUIF toolchain.
    MachSuifHome,
    /// The Xilinx ISE installation used for synthesis.
    Xilinx,
    /// The SGI RASC design kit.
    Rasc,
}

/// What every compiling subcommand needs.
pub const COMPILER: &[EnvVar] =
    &[EnvVar::RocccHome, EnvVar::NciHome, EnvVar::MachSuifHome];

/// What default synthesis needs.
pub const SYNTHESIS: &[EnvVar] = &[EnvVar::Xilinx];

/// What synthesis for a RASC blade needs.
pub const RASC_SYNTHESIS: &[EnvVar] =
    &[EnvVar::RocccHome, EnvVar::Xilinx, EnvVar::Rasc];

impl EnvVar {
    pub fn name(self) -> &'static str {
        match self {
            EnvVar::RocccHome => "ROCCC_HOME",
            EnvVar::NciHome => "NCIHOME",
            EnvVar::MachSuifHome => "MACHSUIFHOME",
            EnvVar::Xilinx => "XILINX",
            EnvVar::Rasc => "RASC",
        }
    }
}

impl Display for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The values of the toolchain variables a stage was started with.
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    vars: Vec<(EnvVar, Utf8PathBuf)>,
}

impl Toolchain {
    /// Read `vars` from the process environment.
    pub fn require(vars: &[EnvVar]) -> Result<Self> {
        Self::require_with(vars, |name| std::env::var(name).ok())
    }

    /// Read `vars` through `lookup`, reporting every missing one at once.
    /// Empty values count as missing.
    pub fn require_with<F>(vars: &[EnvVar], lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for &var in vars {
            match lookup(var.name()) {
                Some(value) if !value.is_empty() => {
                    log::debug!("{} = {}", var, value);
                    found.push((var, value.into()));
                }
                _ => missing.push(var.name().to_string()),
            }
        }
        if missing.is_empty() {
            Ok(Self { vars: found })
        } else {
            Err(Error::EnvUndefined(missing))
        }
    }

    /// Add the variables in `other` that this one lacks.
    pub fn extend(&mut self, other: Toolchain) {
        for (var, value) in other.vars {
            if self.lookup(var).is_none() {
                self.vars.push((var, value));
            }
        }
    }

    fn lookup(&self, var: EnvVar) -> Option<&Utf8Path> {
        self.vars
            .iter()
            .find(|(v, _)| *v == var)
            .map(|(_, value)| value.as_path())
    }

    pub fn get(&self, var: EnvVar) -> Result<&Utf8Path> {
        self.lookup(var)
            .ok_or_else(|| Error::EnvUndefined(vec![var.name().to_string()]))
    }

    pub fn roccc_home(&self) -> Result<&Utf8Path> {
        self.get(EnvVar::RocccHome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "ROCCC_HOME" => Some("/opt/roccc".into()),
            "NCIHOME" => Some("".into()),
            _ => None,
        }
    }

    #[test]
    fn reports_all_missing() {
        let err = Toolchain::require_with(COMPILER, lookup).unwrap_err();
        match err {
            Error::EnvUndefined(names) => {
                assert_eq!(names, ["NCIHOME", "MACHSUIFHOME"])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn found_values() {
        let tc =
            Toolchain::require_with(&[EnvVar::RocccHome], lookup).unwrap();
        assert_eq!(tc.roccc_home().unwrap(), "/opt/roccc");
        assert!(tc.get(EnvVar::Rasc).is_err());
    }
}
