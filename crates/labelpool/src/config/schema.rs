use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite database file. Defaults to `~/.labelpool/data/labelpool.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Root directory of the object store. Defaults to `~/.labelpool/objects`.
    #[serde(default)]
    pub storage_root: Option<PathBuf>,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            storage_root: None,
            worker: WorkerConfig::default(),
            pool: PoolConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| home_subdir(&["data", "labelpool.db"]))
    }

    pub fn resolved_storage_root(&self) -> PathBuf {
        self.storage_root
            .clone()
            .unwrap_or_else(|| home_subdir(&["objects"]))
    }
}

fn home_subdir(parts: &[&str]) -> PathBuf {
    let mut path = dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".labelpool");
    for part in parts {
        path.push(part);
    }
    path
}

/// An external program invocation. `{input}`, `{output}` and `{dpi}` in
/// `args` are substituted per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn uses_placeholder(&self, placeholder: &str) -> bool {
        self.args.iter().any(|a| a.contains(placeholder))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_text_command")]
    pub text_command: CommandTemplate,
    #[serde(default = "default_render_command")]
    pub render_command: CommandTemplate,
}

fn default_timeout_ms() -> u64 {
    90_000
}

fn default_render_scale() -> f32 {
    4.0
}

fn default_concurrency() -> usize {
    num_cpus::get().clamp(1, 4)
}

fn default_text_command() -> CommandTemplate {
    CommandTemplate::new("pdftotext", &["-enc", "UTF-8", "{input}", "-"])
}

// Anti-aliasing off keeps barcode edges hard; PNG output is lossless.
fn default_render_command() -> CommandTemplate {
    CommandTemplate::new(
        "pdftoppm",
        &[
            "-png",
            "-singlefile",
            "-r",
            "{dpi}",
            "-aa",
            "no",
            "-aaVector",
            "no",
            "{input}",
            "{output}",
        ],
    )
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            render_scale: default_render_scale(),
            concurrency: default_concurrency(),
            text_command: default_text_command(),
            render_command: default_render_command(),
        }
    }
}

impl WorkerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Render resolution in dots per inch (PDF user space is 72 units/inch).
    pub fn render_dpi(&self) -> u32 {
        (self.render_scale * 72.0).round() as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Seconds between background expiry sweeps; 0 disables the sweeper.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// How many available references to list when a claim finds nothing.
    #[serde(default = "default_hint_limit")]
    pub hint_limit: usize,
}

fn default_retention_days() -> u32 {
    90
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_hint_limit() -> usize {
    5
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
            hint_limit: default_hint_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default)]
    pub expose_error_details: bool,
}

fn default_base_path() -> String {
    "/api".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            expose_error_details: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_dpi_from_scale() {
        let mut worker = WorkerConfig::default();
        assert_eq!(worker.render_dpi(), 288);
        worker.render_scale = 1.0;
        assert_eq!(worker.render_dpi(), 72);
        worker.render_scale = 4.2;
        assert_eq!(worker.render_dpi(), 302);
    }

    #[test]
    fn test_default_commands_use_placeholders() {
        let worker = WorkerConfig::default();
        assert!(worker.text_command.uses_placeholder("{input}"));
        assert!(worker.render_command.uses_placeholder("{input}"));
        assert!(worker.render_command.uses_placeholder("{output}"));
        assert!(worker.render_command.uses_placeholder("{dpi}"));
        assert!(!worker.text_command.uses_placeholder("{dpi}"));
    }

    #[test]
    fn test_default_paths_live_under_labelpool_dir() {
        let config = Config::default();
        let db = config.resolved_database_path();
        assert!(db.ends_with("labelpool.db"));
        assert!(db.to_string_lossy().contains(".labelpool"));
        assert!(config.resolved_storage_root().ends_with("objects"));
    }

    #[test]
    fn test_explicit_paths_win() {
        let config = Config {
            database_path: Some(PathBuf::from("/tmp/x.db")),
            storage_root: Some(PathBuf::from("/tmp/objs")),
            ..Config::default()
        };
        assert_eq!(config.resolved_database_path(), PathBuf::from("/tmp/x.db"));
        assert_eq!(config.resolved_storage_root(), PathBuf::from("/tmp/objs"));
    }
}
