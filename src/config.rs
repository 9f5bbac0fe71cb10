use crate::error::{Result, SyncError};
use crate::logging::default_log_level;
use crate::reconcile::{ClosureMatch, SyncSettings};
use crate::remote::todoist::DEFAULT_API_BASE;
use crate::scrape::DEFAULT_APP_URL;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const ENV_API_TOKEN: &str = "TODOIST_API_TOKEN";
pub const ENV_PROJECT_NAME: &str = "TODOIST_PROJECT_NAME";
pub const ENV_INPUT_FILE: &str = "INPUT_FILE";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "meghendra", "todosync")
}

fn default_data_dir() -> PathBuf {
    if let Some(path) = std::env::var_os("TODOSYNC_DATA_DIR") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.data_dir().to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".todosync")
}

pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("TODOSYNC_CONFIG") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.config_dir().join("config.toml");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".todosync-config.toml")
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub todoist: TodoistConfig,
    pub data: DataConfig,
    pub scrape: ScrapeConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TodoistConfig {
    pub api_token: String,
    pub project_name: String,
    pub required_labels: Vec<String>,
    pub api_base: String,
}

impl Default for TodoistConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            project_name: "MSFT-Sync".to_string(),
            required_labels: vec!["Flagged".to_string(), "Assigned".to_string()],
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// Intermediate file written by the scrape step and read by sync.
    pub input_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            input_path: data_dir.join("tasks.txt"),
            log_dir: data_dir.join("logs"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ScrapeConfig {
    pub app_url: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            app_url: DEFAULT_APP_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SyncConfig {
    pub closure_match: ClosureMatch,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = config_path();

        let mut config = if let Ok(content) = fs::read_to_string(&config_path) {
            match toml::from_str::<Config>(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Failed to parse config.toml ({config_path:?}), using defaults: {e}");
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        let changed = config.normalize_paths(&default_data_dir());
        if changed || !config_path.exists() {
            let _ = config.save_to_path(&config_path);
        }

        // Applied after saving so secrets from the environment stay out of the file.
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn save_to_path(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).unwrap_or_default();
        fs::write(path, content)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = non_empty(ENV_API_TOKEN) {
            self.todoist.api_token = token.trim().to_string();
        }
        if let Some(name) = non_empty(ENV_PROJECT_NAME) {
            self.todoist.project_name = name.trim().to_string();
        }
        if let Some(path) = non_empty(ENV_INPUT_FILE) {
            self.data.input_path = PathBuf::from(path.trim());
        }
    }

    fn normalize_paths(&mut self, data_dir: &Path) -> bool {
        let mut changed = false;

        if self.data.input_path.as_os_str().is_empty() {
            self.data.input_path = data_dir.join("tasks.txt");
            changed = true;
        }
        if self.data.input_path.is_relative() {
            self.data.input_path = data_dir.join(&self.data.input_path);
            changed = true;
        }

        if self.data.log_dir.as_os_str().is_empty() {
            self.data.log_dir = data_dir.join("logs");
            changed = true;
        }
        if self.data.log_dir.is_relative() {
            self.data.log_dir = data_dir.join(&self.data.log_dir);
            changed = true;
        }

        changed
    }

    /// Settings handed to the reconciler; fails when the token or project is unset.
    pub fn sync_settings(&self) -> Result<SyncSettings> {
        let token = self.todoist.api_token.trim();
        if token.is_empty() {
            return Err(SyncError::Config(format!(
                "{ENV_API_TOKEN} is not set and [todoist].api_token is empty in {}",
                config_path().display()
            )));
        }
        let project_name = self.todoist.project_name.trim();
        if project_name.is_empty() {
            return Err(SyncError::Config(
                "[todoist].project_name must not be empty".to_string(),
            ));
        }

        let mut required_labels: Vec<String> = Vec::new();
        for label in &self.todoist.required_labels {
            let label = label.trim();
            if !label.is_empty() && !required_labels.iter().any(|l| l == label) {
                required_labels.push(label.to_string());
            }
        }

        Ok(SyncSettings {
            remote_token: token.to_string(),
            project_name: project_name.to_string(),
            required_labels,
            closure_match: self.sync.closure_match,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [todoist]
            project_name = "Work"

            [sync]
            closure_match = "substring"
            "#,
        )
        .unwrap();
        assert_eq!(config.todoist.project_name, "Work");
        assert_eq!(config.todoist.api_base, DEFAULT_API_BASE);
        assert_eq!(config.todoist.required_labels, vec!["Flagged", "Assigned"]);
        assert_eq!(config.sync.closure_match, ClosureMatch::Substring);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_TOKEN, " secret "),
            (ENV_PROJECT_NAME, "Inbox Mirror"),
            (ENV_INPUT_FILE, "/tmp/tasks.txt"),
        ]);
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.todoist.api_token, "secret");
        assert_eq!(config.todoist.project_name, "Inbox Mirror");
        assert_eq!(config.data.input_path, PathBuf::from("/tmp/tasks.txt"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.todoist.project_name = "Keep".to_string();
        config.apply_env(|key| (key == ENV_PROJECT_NAME).then(|| "  ".to_string()));
        assert_eq!(config.todoist.project_name, "Keep");
    }

    #[test]
    fn sync_settings_requires_token() {
        let config = Config::default();
        assert!(matches!(config.sync_settings(), Err(SyncError::Config(_))));
    }

    #[test]
    fn sync_settings_dedupes_labels() {
        let mut config = Config::default();
        config.todoist.api_token = "token".to_string();
        config.todoist.required_labels = vec![
            "Flagged".to_string(),
            " Flagged ".to_string(),
            String::new(),
            "Assigned".to_string(),
        ];
        let settings = config.sync_settings().unwrap();
        assert_eq!(settings.required_labels, vec!["Flagged", "Assigned"]);
        assert_eq!(settings.project_name, "MSFT-Sync");
        assert_eq!(settings.closure_match, ClosureMatch::CleanedTitle);
    }

    #[test]
    fn relative_paths_resolve_under_data_dir() {
        let mut config = Config::default();
        config.data.input_path = PathBuf::from("scraped.txt");
        config.data.log_dir = PathBuf::new();
        let data_dir = Path::new("/var/lib/todosync");
        assert!(config.normalize_paths(data_dir));
        assert_eq!(config.data.input_path, data_dir.join("scraped.txt"));
        assert_eq!(config.data.log_dir, data_dir.join("logs"));
        assert!(!config.normalize_paths(data_dir));
    }

    #[test]
    fn saves_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.todoist.project_name = "Mirror".to_string();
        config.save_to_path(&path).unwrap();
        let loaded: Config = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.todoist.project_name, "Mirror");
    }
}
