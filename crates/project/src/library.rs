use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use scenes::FormatTag;

use crate::{DetachedSubtree, LazyProject, LazySource, ProjectNode, ProjectNodeId, ProjectTree};

/// Read-mostly store of example projects shipped with the application.
/// Entries surface in the tree as lazy, non-editable nodes.
pub struct ProjectLibrary {
    conn: Connection,
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub id: String,
    pub parent_id: Option<String>,
    pub position: i64,
    pub display_name: String,
    pub kind: String,
    pub format: Option<String>,
    pub payload: Option<Vec<u8>>,
}

impl LibraryEntry {
    pub fn is_group(&self) -> bool {
        self.kind == "group"
    }
}

impl ProjectLibrary {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening library at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", &"WAL")?;
        conn.pragma_update(None, "synchronous", &"NORMAL")?;
        conn.pragma_update(None, "foreign_keys", &"ON")?;
        let _ = conn.pragma_update(None, "cache_size", &"-20000");
        apply_migrations(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_group(&self, parent_id: Option<&str>, name: &str) -> Result<String> {
        self.insert_row(parent_id, name, "group", None, None)
    }

    pub fn add_project(
        &self,
        parent_id: Option<&str>,
        name: &str,
        format: FormatTag,
        bytes: &[u8],
    ) -> Result<String> {
        self.insert_row(parent_id, name, "project", Some(format.as_str()), Some(bytes))
    }

    fn insert_row(
        &self,
        parent_id: Option<&str>,
        name: &str,
        kind: &str,
        format: Option<&str>,
        payload: Option<&[u8]>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        let position: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM library_nodes WHERE parent_id IS ?1",
            params![parent_id],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO library_nodes(id, parent_id, position, display_name, kind, format, payload, created_at, updated_at) \
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![id, parent_id, position, name, kind, format, payload, now],
        )?;
        Ok(id)
    }

    pub fn remove_entry(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM library_nodes WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn list_entries(&self) -> Result<Vec<LibraryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, parent_id, position, display_name, kind, format, payload \
             FROM library_nodes ORDER BY position ASC, created_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LibraryEntry {
                id: row.get(0)?,
                parent_id: row.get(1)?,
                position: row.get(2)?,
                display_name: row.get(3)?,
                kind: row.get(4)?,
                format: row.get(5)?,
                payload: row.get(6)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Append a non-editable group named `group_name` to the tree root and
    /// mirror the library below it. Nothing is decoded here.
    pub fn load_into(&self, tree: &mut ProjectTree, group_name: &str) -> Result<ProjectNodeId> {
        let entries = self.list_entries()?;
        let mut by_parent: HashMap<Option<String>, Vec<&LibraryEntry>> = HashMap::new();
        for entry in &entries {
            by_parent
                .entry(entry.parent_id.clone())
                .or_default()
                .push(entry);
        }

        let mut group = ProjectNode::group(group_name);
        group.is_editable = false;
        let group_id = group.id;
        let root = tree.root();
        let index = tree.children(root).len();
        tree.insert_subtree(root, index, DetachedSubtree::single(group))
            .map_err(|e| anyhow!("attaching library group: {e}"))?;

        let mut stack: Vec<(Option<String>, ProjectNodeId)> = vec![(None, group_id)];
        while let Some((parent_key, parent_node)) = stack.pop() {
            let Some(children) = by_parent.get(&parent_key) else {
                continue;
            };
            for (position, entry) in children.iter().enumerate() {
                let mut node = if entry.is_group() {
                    ProjectNode::group(entry.display_name.clone())
                } else {
                    let format = entry
                        .format
                        .as_deref()
                        .and_then(FormatTag::parse)
                        .unwrap_or(FormatTag::Native);
                    let bytes = entry.payload.clone().unwrap_or_default();
                    ProjectNode::project(
                        entry.display_name.clone(),
                        LazyProject::Lazy(LazySource::new(format, bytes)),
                    )
                };
                node.is_editable = false;
                let node_id = node.id;
                tree.insert_subtree(parent_node, position, DetachedSubtree::single(node))
                    .map_err(|e| anyhow!("attaching library entry {}: {e}", entry.display_name))?;
                if entry.is_group() {
                    stack.push((Some(entry.id.clone()), node_id));
                }
            }
        }
        Ok(group_id)
    }
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("../migrations/V0001__library.sql"))?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0001__library"],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LazyStatus;

    #[test]
    fn library_entries_become_lazy_read_only_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let library = ProjectLibrary::open_or_create(&dir.path().join("library.sqlite")).unwrap();
        let zeolites = library.add_group(None, "Zeolites").unwrap();
        library
            .add_project(Some(&zeolites), "MFI", FormatTag::Crystallographic, b"data_MFI")
            .unwrap();
        library
            .add_project(None, "Water", FormatTag::Molecular, b"3\nwater")
            .unwrap();

        let mut tree = ProjectTree::new();
        let group = library.load_into(&mut tree, "Library").unwrap();
        let top = tree.children(group).to_vec();
        assert_eq!(top.len(), 2);
        let zeolite_node = tree.node(top[0]).unwrap();
        assert!(zeolite_node.is_group());
        assert!(!zeolite_node.is_editable);
        let mfi = tree.node(tree.children(top[0])[0]).unwrap();
        assert_eq!(mfi.status(), Some(LazyStatus::Lazy));
        let source = mfi.lazy().and_then(|l| l.source()).unwrap();
        assert_eq!(source.format, FormatTag::Crystallographic);
        assert_eq!(&source.bytes[..], b"data_MFI");
    }

    #[test]
    fn reopening_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.sqlite");
        {
            let library = ProjectLibrary::open_or_create(&path).unwrap();
            library.add_group(None, "A").unwrap();
        }
        let library = ProjectLibrary::open_or_create(&path).unwrap();
        assert_eq!(library.list_entries().unwrap().len(), 1);
    }
}
