use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::SqliteStore;
use crate::error::{NominalError, Result};
use crate::settings::{get_data_dir, load_settings};

const CONFIG_FILE: &str = "config.json";
const DB_FILE: &str = "nominal.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub name: String,
    pub created_at: NaiveDateTime,
    pub last_modified: NaiveDateTime,
    #[serde(default = "default_confidence_threshold")]
    pub default_confidence_threshold: f64,
    #[serde(default = "default_min_rule_confidence")]
    pub min_rule_confidence: f64,
}

fn default_confidence_threshold() -> f64 {
    0.70
}

fn default_min_rule_confidence() -> f64 {
    0.75
}

impl WorkspaceConfig {
    fn new(name: &str) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            name: name.to_string(),
            created_at: now,
            last_modified: now,
            default_confidence_threshold: default_confidence_threshold(),
            min_rule_confidence: default_min_rule_confidence(),
        }
    }
}

/// A named, isolated set of records and rules under `<data_dir>/workspaces`.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub name: String,
    pub path: PathBuf,
}

fn workspaces_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("workspaces")
}

/// Reject names that would escape the workspaces directory.
fn validate_file_name(name: &str) -> Result<&str> {
    let name = name.trim();
    let is_plain = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
    if name.is_empty() || !is_plain || name.starts_with('.') {
        return Err(NominalError::Other(format!("Invalid name: '{name}'")));
    }
    Ok(name)
}

impl Workspace {
    fn locate(data_dir: &Path, name: &str) -> Result<Self> {
        let name = validate_file_name(name)?;
        Ok(Self {
            name: name.to_string(),
            path: workspaces_dir(data_dir).join(name),
        })
    }

    pub fn exists(&self) -> bool {
        self.config_path().exists()
    }

    pub fn create(data_dir: &Path, name: &str) -> Result<Self> {
        let ws = Self::locate(data_dir, name)?;
        if ws.exists() {
            return Err(NominalError::WorkspaceExists(ws.name));
        }
        std::fs::create_dir_all(ws.imports_dir())?;
        std::fs::create_dir_all(ws.exports_dir())?;
        ws.save_config(&WorkspaceConfig::new(&ws.name))?;
        SqliteStore::open(&ws.db_path())?;
        info!("Created workspace '{}' at {}", ws.name, ws.path.display());
        Ok(ws)
    }

    pub fn open(data_dir: &Path, name: &str) -> Result<Self> {
        let ws = Self::locate(data_dir, name)?;
        if !ws.exists() {
            return Err(NominalError::UnknownWorkspace(ws.name));
        }
        Ok(ws)
    }

    fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE)
    }

    pub fn db_path(&self) -> PathBuf {
        self.path.join(DB_FILE)
    }

    pub fn imports_dir(&self) -> PathBuf {
        self.path.join("imports")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.path.join("exports")
    }

    pub fn export_path(&self, filename: &str) -> Result<PathBuf> {
        Ok(self.exports_dir().join(validate_file_name(filename)?))
    }

    pub fn config(&self) -> Result<WorkspaceConfig> {
        let content = std::fs::read_to_string(self.config_path())?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_config(&self, config: &WorkspaceConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), format!("{json}\n"))?;
        Ok(())
    }

    /// Bump `last_modified` after a command writes to the workspace.
    pub fn touch(&self) -> Result<()> {
        let mut config = self.config()?;
        config.last_modified = Utc::now().naive_utc();
        self.save_config(&config)
    }

    pub fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.db_path())
    }
}

pub fn list_workspaces(data_dir: &Path) -> Result<Vec<Workspace>> {
    let dir = workspaces_dir(data_dir);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Ok(ws) = Workspace::open(data_dir, &name) {
            found.push(ws);
        }
    }
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

pub fn delete_workspace(data_dir: &Path, name: &str) -> Result<()> {
    let ws = Workspace::open(data_dir, name)?;
    std::fs::remove_dir_all(&ws.path)?;
    info!("Deleted workspace '{}'", ws.name);
    Ok(())
}

/// The workspace named on the command line, else the active one in settings.
pub fn resolve(explicit: Option<&str>) -> Result<Workspace> {
    let name = match explicit {
        Some(name) => name.to_string(),
        None => load_settings()
            .active_workspace
            .ok_or(NominalError::NoWorkspace)?,
    };
    Workspace::open(&get_data_dir(), &name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_create_lays_out_directories() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::create(dir.path(), "acme").unwrap();
        assert!(ws.exists());
        assert!(ws.db_path().exists());
        assert!(ws.imports_dir().is_dir());
        assert!(ws.exports_dir().is_dir());

        let config = ws.config().unwrap();
        assert_eq!(config.name, "acme");
        assert_eq!(config.default_confidence_threshold, 0.70);
        assert_eq!(config.min_rule_confidence, 0.75);
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        Workspace::create(dir.path(), "acme").unwrap();
        assert!(matches!(
            Workspace::create(dir.path(), "acme"),
            Err(NominalError::WorkspaceExists(_))
        ));
    }

    #[test]
    fn test_open_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Workspace::open(dir.path(), "nope"),
            Err(NominalError::UnknownWorkspace(_))
        ));
    }

    #[test]
    fn test_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Workspace::create(dir.path(), "../escape").is_err());
        assert!(Workspace::create(dir.path(), ".hidden").is_err());
        assert!(Workspace::create(dir.path(), "").is_err());
        let ws = Workspace::create(dir.path(), "acme").unwrap();
        assert!(ws.export_path("../x.csv").is_err());
        assert!(ws.export_path("sage.csv").unwrap().ends_with("exports/sage.csv"));
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        Workspace::create(dir.path(), "zeta").unwrap();
        Workspace::create(dir.path(), "alpha").unwrap();
        std::fs::create_dir_all(dir.path().join("workspaces").join("stray")).unwrap();

        let names: Vec<String> = list_workspaces(dir.path())
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        delete_workspace(dir.path(), "zeta").unwrap();
        assert_eq!(list_workspaces(dir.path()).unwrap().len(), 1);
        assert!(delete_workspace(dir.path(), "zeta").is_err());
    }

    #[test]
    fn test_config_defaults_fill_missing_thresholds() {
        let json = r#"{"name":"a","created_at":"2024-01-01T00:00:00","last_modified":"2024-01-01T00:00:00"}"#;
        let config: WorkspaceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.default_confidence_threshold, 0.70);
        assert_eq!(config.min_rule_confidence, 0.75);
    }

    #[test]
    fn test_touch_and_open_store() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::create(dir.path(), "acme").unwrap();
        let before = ws.config().unwrap().last_modified;
        ws.touch().unwrap();
        assert!(ws.config().unwrap().last_modified >= before);
        let store = ws.open_store().unwrap();
        assert!(store.list_rules(None).unwrap().is_empty());
    }
}
