//! Application configuration for Folio.
//!
//! User config lives at `~/.folio/folio.toml`.
//! CLI flags (and their `FOLIO_*` env vars) override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "folio.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".folio";

// ---------------------------------------------------------------------------
// Config structs (matching folio.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output locations.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Block sizing.
    #[serde(default)]
    pub blocks: BlocksConfig,

    /// Transform port selection.
    #[serde(default)]
    pub transform: TransformConfig,

    /// Front-matter sources.
    #[serde(default)]
    pub front_matter: FrontMatterConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory receiving block artifacts and the final document.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Checkpoint record; relative paths resolve against `output_dir`.
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,

    /// Fixed name the assembler writes before the caller relabels it.
    #[serde(default = "default_final_file")]
    pub final_file: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            checkpoint_file: default_checkpoint_file(),
            final_file: default_final_file(),
        }
    }
}

fn default_output_dir() -> String {
    "OUTPUT".into()
}
fn default_checkpoint_file() -> String {
    "checkpoint.txt".into()
}
fn default_final_file() -> String {
    "final.docx".into()
}

/// `[blocks]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocksConfig {
    /// Average words on one page of the source.
    #[serde(default = "default_words_per_page")]
    pub words_per_page: usize,

    /// Pages worth of words per block.
    #[serde(default = "default_pages_per_block")]
    pub pages_per_block: usize,
}

impl Default for BlocksConfig {
    fn default() -> Self {
        Self {
            words_per_page: default_words_per_page(),
            pages_per_block: default_pages_per_block(),
        }
    }
}

fn default_words_per_page() -> usize {
    300
}
fn default_pages_per_block() -> usize {
    10
}

/// Which transform implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    /// External model process speaking JSON lines.
    #[default]
    Bridge,
    /// Return text unchanged.
    Passthrough,
}

/// `[transform]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub kind: TransformKind,

    /// Bridge executable.
    #[serde(default = "default_bridge_command")]
    pub command: String,

    /// Arguments passed to the bridge executable.
    #[serde(default = "default_bridge_args")]
    pub args: Vec<String>,

    /// Working directory for the bridge process.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Model identifier handed to the bridge (`FOLIO_MODEL`).
    #[serde(default = "default_model")]
    pub model: String,

    /// Longest input, in units, the model accepts in one call.
    #[serde(default = "default_max_unit_length")]
    pub max_unit_length: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            kind: TransformKind::default(),
            command: default_bridge_command(),
            args: default_bridge_args(),
            working_dir: default_working_dir(),
            model: default_model(),
            max_unit_length: default_max_unit_length(),
        }
    }
}

fn default_bridge_command() -> String {
    "python3".into()
}
fn default_bridge_args() -> Vec<String> {
    vec!["bridge/translate.py".into()]
}
fn default_working_dir() -> String {
    ".".into()
}
fn default_model() -> String {
    "Helsinki-NLP/opus-mt-en-es".into()
}
fn default_max_unit_length() -> usize {
    512
}

/// `[front_matter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontMatterConfig {
    /// JSON descriptor with the `titles` list. Mandatory at assembly time.
    #[serde(default = "default_descriptor")]
    pub descriptor: String,

    /// Cover image. Optional at assembly time.
    #[serde(default = "default_cover_image")]
    pub cover_image: String,
}

impl Default for FrontMatterConfig {
    fn default() -> Self {
        Self {
            descriptor: default_descriptor(),
            cover_image: default_cover_image(),
        }
    }
}

fn default_descriptor() -> String {
    "front_matter.json".into()
}
fn default_cover_image() -> String {
    "doc/cover.jpg".into()
}

// ---------------------------------------------------------------------------
// Block config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime block sizing, merged from config file + CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSizing {
    pub words_per_page: usize,
    pub pages_per_block: usize,
}

impl BlockSizing {
    /// Word count at which a block closes.
    pub fn threshold(&self) -> usize {
        self.words_per_page * self.pages_per_block
    }
}

impl From<&AppConfig> for BlockSizing {
    fn from(config: &AppConfig) -> Self {
        Self {
            words_per_page: config.blocks.words_per_page,
            pages_per_block: config.blocks.pages_per_block,
        }
    }
}

/// Resolve the checkpoint path against the output directory.
pub fn checkpoint_path(output_dir: &Path, checkpoint_file: &str) -> PathBuf {
    let path = Path::new(checkpoint_file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        output_dir.join(path)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.folio/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| FolioError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.folio/folio.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FolioError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FolioError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FolioError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FolioError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FolioError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configurations the pipeline cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.blocks.words_per_page == 0 {
        return Err(FolioError::config("words_per_page must be at least 1"));
    }
    if config.blocks.pages_per_block == 0 {
        return Err(FolioError::config("pages_per_block must be at least 1"));
    }
    if config.transform.max_unit_length == 0 {
        return Err(FolioError::config("max_unit_length must be at least 1"));
    }
    if config.transform.kind == TransformKind::Bridge && config.transform.command.trim().is_empty()
    {
        return Err(FolioError::config(
            "transform.command is empty. Set it to the bridge executable or use kind = \"passthrough\"",
        ));
    }
    Ok(())
}
