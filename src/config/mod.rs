use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persisted user settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default directory for MP3 downloads
    pub output_dir: PathBuf,

    /// Root directory for transcripts (`<root>/<creator>/<playlist>/`)
    pub transcripts_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            output_dir: home.join("yt2mp3"),
            transcripts_dir: home.join("yt2mp3-transcripts"),
        }
    }
}

impl Settings {
    /// Display current configuration
    pub fn display(&self) {
        println!("Output directory: {}", self.output_dir.display());
        println!("Transcripts directory: {}", self.transcripts_dir.display());
    }
}

/// Where settings are loaded from and saved to
pub trait ConfigStore {
    fn load(&self) -> Result<Settings>;

    fn save(&self, settings: &Settings) -> Result<()>;
}

/// JSON file backed store, `~/.yt2mp3_config.json` by default
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location in the user's home directory
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(Self::new(home.join(".yt2mp3_config.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            tracing::debug!("No config file at {}, using defaults", self.path.display());
            return Ok(Settings::default());
        }

        let content = fs_err::read_to_string(&self.path).context("Failed to read config file")?;
        let settings: Settings =
            serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(settings).context("Failed to serialize config")?;
        fs_err::write(&self.path, content).context("Failed to write config file")?;
        Ok(())
    }
}

/// In-memory store, handy for tests
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    settings: Mutex<Settings>,
}

impl MemoryConfigStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Settings> {
        let settings = self
            .settings
            .lock()
            .map_err(|_| anyhow::anyhow!("Config store lock poisoned"))?;
        Ok(settings.clone())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let mut current = self
            .settings
            .lock()
            .map_err(|_| anyhow::anyhow!("Config store lock poisoned"))?;
        *current = settings.clone();
        Ok(())
    }
}

/// Point the default output directory somewhere else.
///
/// `~` is expanded, the directory is created and stored as an absolute path.
pub fn set_output_dir(store: &dyn ConfigStore, path: &Path) -> Result<PathBuf> {
    let expanded = expand_home(path);
    fs_err::create_dir_all(&expanded)?;
    let absolute = fs_err::canonicalize(&expanded)?;

    let mut settings = store.load()?;
    settings.output_dir = absolute.clone();
    store.save(&settings)?;

    tracing::info!("Output directory set to {}", absolute.display());
    Ok(absolute)
}

/// Replace a leading `~` with the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
