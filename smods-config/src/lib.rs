//! Loader for smods configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are added, then `SMODS__`-prefixed
//! environment variables are applied last (`SMODS__SITE__TIMEOUT_SECS=30`
//! overrides `site.timeout_secs`). `${VAR}` placeholders inside string values
//! are expanded after merging. Every section is optional; an empty
//! configuration yields the built-in defaults.
use config::{Config, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use smods_common::observability::{LogConfig, LogFormat};
use smods_common::rules::{RuleBook, RuleBookPatch};
use std::path::{Path, PathBuf};

pub use config::ConfigError;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "SMODS";

pub const DEFAULT_BASE_URL: &str = "https://smods.ru";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_DOWNLOAD_HOSTS: [&str; 2] = ["modsbase.com", "uploadfiles.eu"];

#[derive(Debug, Default, Deserialize)]
pub struct SmodsConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Overrides merged into the default rule book.
    #[serde(default)]
    pub rules: RuleBookPatch,
}

impl SmodsConfig {
    /// Default rule book with the configured overrides applied.
    pub fn rule_book(&self) -> RuleBook {
        RuleBook::default().patched(&self.rules)
    }
}

/// Where the catalogue lives and how to talk to it.
#[derive(Debug, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// File-hosting services the download resolver is allowed to talk to.
    #[serde(default = "default_download_hosts")]
    pub download_hosts: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: None,
            timeout_secs: default_timeout_secs(),
            download_hosts: default_download_hosts(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub stderr: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            stderr: false,
            dir: None,
        }
    }
}

impl LoggingConfig {
    /// Translate into the observability settings for a named binary.
    pub fn to_log_config(&self, app_name: &'static str) -> LogConfig {
        LogConfig {
            app_name,
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.level.clone(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_download_hosts() -> Vec<String> {
    DEFAULT_DOWNLOAD_HOSTS.iter().map(|h| h.to_string()).collect()
}
fn default_log_level() -> String {
    "info".into()
}

/// `<config dir>/smods/smods.yaml`, e.g. `~/.config/smods/smods.yaml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("smods").join("smods.yaml"))
}

/// Expand `${VAR}`, `$VAR` and a leading `~` in every string of the merged tree.
///
/// Expansion is repeated so variables may refer to other variables, up to a
/// fixed depth. A string naming an unset variable is kept as written.
fn expand_placeholders(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') || s.starts_with('~') => *s = expand_str(s),
        Value::Array(items) => items.iter_mut().for_each(expand_placeholders),
        Value::Object(map) => map.values_mut().for_each(expand_placeholders),
        _ => {}
    }
}

fn expand_str(raw: &str) -> String {
    let mut cur = raw.to_string();
    for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
        let Ok(next) = shellexpand::full(&cur) else {
            break;
        };
        if next == cur {
            break;
        }
        cur = next.into_owned();
    }
    cur
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct SmodsConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SmodsConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SmodsConfigLoader {
    /// Start with no file sources; `SMODS__` env overrides are applied on load.
    ///
    /// ```
    /// use smods_config::SmodsConfigLoader;
    ///
    /// let config = SmodsConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.site.base_url, "https://smods.ru");
    /// assert_eq!(config.site.timeout_secs, 15);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`with_file`](Self::with_file) but a missing file is skipped, so
    /// headless deployments can rely purely on environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use smods_common::rules::field;
    /// use smods_config::SmodsConfigLoader;
    ///
    /// let cfg = SmodsConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// site:
    ///   base_url: "https://mirror.example"
    ///   download_hosts: ["modsbase.com"]
    /// rules:
    ///   detail:
    ///     fields:
    ///       name: "h1.entry-title"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.site.base_url, "https://mirror.example");
    /// assert_eq!(cfg.site.download_hosts, vec!["modsbase.com"]);
    /// assert_eq!(cfg.rule_book().detail.fields[field::NAME].css, "h1.entry-title");
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use smods_config::SmodsConfigLoader;
    ///
    /// unsafe { std::env::set_var("SMODS_DOC_UA", "doc-agent/1.0"); }
    ///
    /// let config = SmodsConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// site:
    ///   user_agent: "${SMODS_DOC_UA}"
    /// logging:
    ///   format: json
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.site.user_agent.as_deref(), Some("doc-agent/1.0"));
    /// assert_eq!(config.logging.level, "info");
    ///
    /// unsafe { std::env::remove_var("SMODS_DOC_UA"); }
    /// ```
    pub fn load(self) -> Result<SmodsConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("site.download_hosts"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_placeholders(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
