use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings of an editing session, stored as JSON next to the library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    /// Undo steps kept per history; `null` keeps everything
    pub undo_limit: Option<usize>,
    /// Lazy projects up to this size are decoded on first access, larger ones
    /// on the project worker
    pub lazy_sync_threshold_bytes: usize,
    /// `None` uses one worker per logical CPU
    pub drag_and_drop_workers: Option<usize>,
    pub copy_paste_workers: Option<usize>,
    pub user_log_capacity: usize,
    pub new_scene_name: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            undo_limit: Some(100),
            lazy_sync_threshold_bytes: 1024 * 1024,
            drag_and_drop_workers: None,
            copy_paste_workers: None,
            user_log_capacity: 500,
            new_scene_name: "New scene".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn default_path() -> PathBuf {
        project::app_data_dir().join("editor.json")
    }

    /// Missing file means defaults; a present but broken one is an error
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("writing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EditorConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(cfg, EditorConfig::default());
        assert_eq!(cfg.undo_limit, Some(100));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");
        fs::write(&path, r#"{ "undo_limit": 5, "copy_paste_workers": 2 }"#).unwrap();
        let cfg = EditorConfig::load(&path).unwrap();
        assert_eq!(cfg.undo_limit, Some(5));
        assert_eq!(cfg.copy_paste_workers, Some(2));
        assert_eq!(cfg.new_scene_name, "New scene");

        fs::write(&path, "{ not json").unwrap();
        assert!(EditorConfig::load(&path).is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("editor.json");
        let cfg = EditorConfig {
            lazy_sync_threshold_bytes: 10,
            ..EditorConfig::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(EditorConfig::load(&path).unwrap(), cfg);
    }
}
