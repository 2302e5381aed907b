use crate::deck::{derive_id, DEFAULT_CSS};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the user's config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration for building a deck.
///
/// Every key is optional in the file; missing keys take the defaults below.
/// Path values support `${VAR_NAME}` environment variable expansion.
///
/// # Example
///
/// ```toml
/// input_dir = "${HOME}/notes/go/runtime"
/// output_file = "GO_Part3_Anki.apkg"
/// deck_name = "GO Part 3 - Go Runtime"
/// skip_prefixes = ["md2anki", "draft-"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Directory scanned for `*.md` documents
    pub input_dir: PathBuf,

    /// Package to write; relative paths are resolved against the working directory
    pub output_file: PathBuf,

    /// Flat log to write; relative paths are resolved against `input_dir`
    pub log_file: PathBuf,

    /// Display name of the deck
    pub deck_name: String,

    /// Deck id; derived from `deck_name` when absent
    pub deck_id: Option<i64>,

    /// Display name of the card model
    pub model_name: String,

    /// Model id; derived from `model_name` when absent
    pub model_id: Option<i64>,

    /// Stylesheet attached to the card model
    pub css: Option<String>,

    /// Markdown files whose name starts with one of these are not processed
    pub skip_prefixes: Vec<String>,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_file: PathBuf::from("deck.apkg"),
            log_file: PathBuf::from("ANKI.txt"),
            deck_name: "Notes".to_string(),
            deck_id: None,
            model_name: "Basic with Code Formatting".to_string(),
            model_id: None,
            css: None,
            skip_prefixes: vec![env!("CARGO_PKG_NAME").to_string()],
        }
    }
}

impl DeckConfig {
    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, the user's config file is
    /// used when present, and the defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.is_file() => {
                    log::debug!("Using configuration from {}", path.display());
                    Self::from_file(&path)
                }
                _ => {
                    log::debug!("No configuration file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Parses a configuration file, expands environment variables and validates it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: DeckConfig = toml::from_str(content)?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    fn expand_paths(&mut self) {
        for path in [
            &mut self.input_dir,
            &mut self.output_file,
            &mut self.log_file,
        ] {
            let expanded = expand_env_vars(&path.to_string_lossy());
            *path = PathBuf::from(expanded);
        }
    }

    /// Validate the configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.deck_name.trim().is_empty() {
            anyhow::bail!("deck_name cannot be empty");
        }

        if self.model_name.trim().is_empty() {
            anyhow::bail!("model_name cannot be empty");
        }

        for (key, id) in [("deck_id", self.deck_id), ("model_id", self.model_id)] {
            if let Some(id) = id {
                if id <= 0 {
                    anyhow::bail!("{} must be positive, got {}", key, id);
                }
            }
        }

        if self.skip_prefixes.iter().any(|p| p.is_empty()) {
            anyhow::bail!("skip_prefixes cannot contain an empty prefix");
        }

        if self.output_file.as_os_str().is_empty() {
            anyhow::bail!("output_file cannot be empty");
        }

        Ok(())
    }

    /// Deck id from the configuration, or derived from the deck name.
    pub fn deck_id(&self) -> i64 {
        self.deck_id.unwrap_or_else(|| derive_id(&self.deck_name))
    }

    /// Model id from the configuration, or derived from the model name.
    pub fn model_id(&self) -> i64 {
        self.model_id.unwrap_or_else(|| derive_id(&self.model_name))
    }

    pub fn css(&self) -> &str {
        self.css.as_deref().unwrap_or(DEFAULT_CSS)
    }

    /// Location of the flat log, resolved against `input_dir`.
    pub fn log_path(&self) -> PathBuf {
        self.input_dir.join(&self.log_file)
    }
}

/// Path of the user's configuration file, if a config directory is known.
///
/// `XDG_CONFIG_HOME` wins over the platform default on every platform.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(env!("CARGO_PKG_NAME"))
                .join(CONFIG_FILE_NAME),
        );
    }

    ProjectDirs::from("", "", env!("CARGO_PKG_NAME"))
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// `${NAME}` references in the path keys (`input_dir`, `output_file`,
/// `log_file`).
static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").unwrap());

/// Replaces `${NAME}` in a configured path with the variable's value.
///
/// Unset variables and an unterminated `${` are kept verbatim. Substituted
/// values are not scanned again.
fn expand_env_vars(path: &str) -> String {
    ENV_VAR_RE
        .replace_all(path, |caps: &Captures| match env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => {
                log::warn!(
                    "Environment variable '{}' not set, leaving {} unexpanded",
                    &caps[1],
                    &caps[0]
                );
                caps[0].to_string()
            }
        })
        .into_owned()
}
