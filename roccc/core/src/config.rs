use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Names or paths of the external programs.
    pub tools: ToolConfig,

    pub synthesis: SynthesisConfig,

    pub templates: TemplateConfig,

    /// The batch job queue.
    pub jobs: JobConfig,

    /// User notification for queued jobs.
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub gcc2suif: String,
    pub suifdriver: String,
    pub xst: String,
    pub ngdbuild: String,
    pub map: String,
    pub par: String,
    pub trce: String,
    pub make: String,
    pub tar: String,
    pub chown: String,
    /// Renders the data-flow graph of a lowered kernel.
    pub dot_graph: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// The FPGA part passed to `map`.
    pub part: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// A file replacing the built-in optimization pass script.
    pub optimize: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Holds the `jobs` queue and the `compile` area.
    pub root: Utf8PathBuf,

    /// Owner given to finished job directories, if any.
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Mail transport, fed a complete message on stdin. Empty disables mail.
    pub command: String,
    pub from: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            gcc2suif: "gcc2suif".to_string(),
            suifdriver: "suifdriver".to_string(),
            xst: "xst".to_string(),
            ngdbuild: "ngdbuild".to_string(),
            map: "map".to_string(),
            par: "par".to_string(),
            trce: "trce".to_string(),
            make: "make".to_string(),
            tar: "tar".to_string(),
            chown: "chown".to_string(),
            dot_graph: "do_print_dot_graph".to_string(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            part: "xc4vlx200-ff1513-10".to_string(),
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            root: "/home/www-data".into(),
            owner: None,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            command: "sendmail -t".to_string(),
            from: "roccc@localhost".to_string(),
        }
    }
}

impl GlobalConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}

/// Location of the configuration file
pub fn config_path(name: &str) -> Result<Utf8PathBuf> {
    // The configuration is usually at `~/.config/driver_name.toml`.
    let config_base = match env::var("XDG_CONFIG_HOME") {
        Ok(base) if !base.is_empty() => base,
        _ => match env::var("HOME") {
            Ok(home) => home + "/.config",
            Err(_) => return Err(Error::EnvUndefined(vec!["HOME".into()])),
        },
    };
    let config_path =
        Utf8Path::new(&config_base).join(name).with_extension("toml");
    log::info!("Loading config from {}", config_path);
    Ok(config_path)
}

/// The built-in defaults alone.
pub fn default_config() -> Figment {
    Figment::from(Serialized::defaults(GlobalConfig::default()))
}

/// Load configuration data from the standard config file location.
pub fn load_config(name: &str) -> Result<Figment> {
    let config_path = config_path(name)?;

    // Use our defaults, overridden by the TOML config file.
    Ok(default_config().merge(Toml::file(config_path)))
}

/// Apply `key=value` overrides on top of `config`.
pub fn with_overrides<S: AsRef<str>>(
    mut config: Figment,
    sets: &[S],
) -> Result<Figment> {
    for set in sets {
        let (key, value) = set.as_ref().split_once('=').ok_or_else(|| {
            Error::usage("--set arguments must be in key=value form")
        })?;
        let dict = figment::util::nest(key, value.into());
        config = config.merge(Serialized::defaults(dict));
    }
    Ok(config)
}
