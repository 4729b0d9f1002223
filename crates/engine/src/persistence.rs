//! Workflow persistence: local save/load, backups and JSON import/export.
//!
//! Storage is an opaque key → string map behind [`BlobStore`]. The SQLite
//! implementation lives on top of the `db` crate; [`MemoryBlobStore`] backs
//! tests and throwaway sessions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use db::repository::blobs;
use db::{DbError, DbPool};

use crate::error::PersistenceError;
use crate::models::{Edge, Node, Workflow};

/// Key the current workflow is saved under.
pub const STORAGE_KEY: &str = "workflow_data";

/// Format version written into exported files.
pub const EXPORT_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Blob stores
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: String) -> Result<(), PersistenceError>;

    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Returns `false` when nothing was stored under `key`.
    async fn delete(&self, key: &str) -> Result<bool, PersistenceError>;

    /// Keys starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError>;

    /// Size in bytes of the value under `key`, 0 when absent.
    async fn size(&self, key: &str) -> Result<u64, PersistenceError> {
        Ok(self.get(key).await?.map_or(0, |data| data.len() as u64))
    }
}

/// `BlobStore` over the `workflow_blobs` table.
#[derive(Debug, Clone)]
pub struct SqlBlobStore {
    pool: DbPool,
}

impl SqlBlobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl BlobStore for SqlBlobStore {
    async fn put(&self, key: &str, data: String) -> Result<(), PersistenceError> {
        blobs::put_blob(&self.pool, key, &data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(blobs::get_blob(&self.pool, key).await?.map(|row| row.data))
    }

    async fn delete(&self, key: &str) -> Result<bool, PersistenceError> {
        match blobs::delete_blob(&self.pool, key).await {
            Ok(()) => Ok(true),
            Err(DbError::NotFound) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        Ok(blobs::list_keys(&self.pool, prefix).await?)
    }

    async fn size(&self, key: &str) -> Result<u64, PersistenceError> {
        Ok(blobs::blob_size(&self.pool, key).await?)
    }
}

/// In-process `BlobStore`. Counts writes so tests can observe autosave.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn blobs(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.blobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: String) -> Result<(), PersistenceError> {
        self.blobs().insert(key.to_owned(), data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.blobs().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool, PersistenceError> {
        Ok(self.blobs().remove(key).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .blobs()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Stored formats
// ---------------------------------------------------------------------------

/// What gets written under [`STORAGE_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowData {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl WorkflowData {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn into_workflow(self) -> Workflow {
        Workflow::new(self.nodes, self.edges)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Shape of an exported workflow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedWorkflow {
    pub version: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub timestamp: i64,
    pub metadata: ExportMetadata,
}

// ---------------------------------------------------------------------------
// Save / load
// ---------------------------------------------------------------------------

pub async fn save_workflow(
    store: &dyn BlobStore,
    key: &str,
    nodes: &[Node],
    edges: &[Edge],
) -> Result<(), PersistenceError> {
    save_workflow_data(store, key, &WorkflowData::new(nodes.to_vec(), edges.to_vec())).await
}

pub async fn save_workflow_data(
    store: &dyn BlobStore,
    key: &str,
    data: &WorkflowData,
) -> Result<(), PersistenceError> {
    let json = serde_json::to_string(data).map_err(PersistenceError::Serialize)?;
    store.put(key, json).await?;
    debug!(key, nodes = data.nodes.len(), edges = data.edges.len(), "workflow saved");
    Ok(())
}

/// Load the workflow saved under `key`.
///
/// A blob that no longer parses is reported and treated as absent, so a
/// corrupt save never blocks startup.
pub async fn load_workflow(
    store: &dyn BlobStore,
    key: &str,
) -> Result<Option<WorkflowData>, PersistenceError> {
    let Some(json) = store.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str::<WorkflowData>(&json) {
        Ok(data) => Ok(Some(data)),
        Err(err) => {
            warn!(key, "discarding unreadable saved workflow: {err}");
            Ok(None)
        }
    }
}

pub async fn clear_workflow(store: &dyn BlobStore, key: &str) -> Result<bool, PersistenceError> {
    store.delete(key).await
}

pub async fn has_stored_workflow(
    store: &dyn BlobStore,
    key: &str,
) -> Result<bool, PersistenceError> {
    Ok(store.get(key).await?.is_some())
}

pub async fn storage_size(store: &dyn BlobStore, key: &str) -> Result<u64, PersistenceError> {
    store.size(key).await
}

// ---------------------------------------------------------------------------
// Backups
// ---------------------------------------------------------------------------

fn backup_prefix(key: &str) -> String {
    format!("{key}_backup_")
}

/// Save a copy of the graph next to `key`. Without a name the backup key is
/// `{key}_backup_{millis}`. Returns the key written.
pub async fn create_backup(
    store: &dyn BlobStore,
    key: &str,
    nodes: &[Node],
    edges: &[Edge],
    name: Option<&str>,
) -> Result<String, PersistenceError> {
    let backup_key = match name {
        Some(name) => format!("{}{name}", backup_prefix(key)),
        None => format!("{}{}", backup_prefix(key), Utc::now().timestamp_millis()),
    };
    save_workflow(store, &backup_key, nodes, edges).await?;
    info!(backup = %backup_key, "backup created");
    Ok(backup_key)
}

pub async fn list_backups(
    store: &dyn BlobStore,
    key: &str,
) -> Result<Vec<String>, PersistenceError> {
    store.keys_with_prefix(&backup_prefix(key)).await
}

pub async fn restore_backup(
    store: &dyn BlobStore,
    backup_key: &str,
) -> Result<Option<WorkflowData>, PersistenceError> {
    load_workflow(store, backup_key).await
}

pub async fn delete_backup(
    store: &dyn BlobStore,
    backup_key: &str,
) -> Result<bool, PersistenceError> {
    store.delete(backup_key).await
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

/// Pretty-printed export document.
pub fn export_workflow_json(nodes: &[Node], edges: &[Edge]) -> Result<String, PersistenceError> {
    let now = Utc::now();
    let exported = ExportedWorkflow {
        version: EXPORT_VERSION.to_owned(),
        nodes: nodes.to_vec(),
        edges: edges.to_vec(),
        timestamp: now.timestamp_millis(),
        metadata: ExportMetadata {
            exported_at: now,
            node_count: nodes.len(),
            edge_count: edges.len(),
        },
    };
    serde_json::to_string_pretty(&exported).map_err(PersistenceError::Serialize)
}

/// Parse an exported document. Only `nodes` and `edges` are required;
/// version and metadata are informational.
pub fn import_workflow_json(json: &str) -> Result<Workflow, PersistenceError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| PersistenceError::InvalidFormat(e.to_string()))?;

    let nodes = match value.get("nodes") {
        Some(nodes @ Value::Array(_)) => nodes.clone(),
        _ => return Err(PersistenceError::InvalidFormat("missing or invalid nodes".into())),
    };
    let edges = match value.get("edges") {
        Some(edges @ Value::Array(_)) => edges.clone(),
        _ => return Err(PersistenceError::InvalidFormat("missing or invalid edges".into())),
    };

    let nodes: Vec<Node> = serde_json::from_value(nodes)
        .map_err(|e| PersistenceError::InvalidFormat(format!("nodes: {e}")))?;
    let edges: Vec<Edge> = serde_json::from_value(edges)
        .map_err(|e| PersistenceError::InvalidFormat(format!("edges: {e}")))?;

    Ok(Workflow::new(nodes, edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::NodeType;

    fn sample() -> Workflow {
        Workflow::new(
            vec![
                Node::of_type("manual", NodeType::Manual),
                Node::of_type("end", NodeType::End).with_position(0.0, 200.0),
            ],
            vec![Edge::new("e1", "manual", "end")],
        )
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = MemoryBlobStore::new();
        let wf = sample();

        save_workflow(&store, STORAGE_KEY, &wf.nodes, &wf.edges).await.unwrap();

        let loaded = load_workflow(&store, STORAGE_KEY).await.unwrap().unwrap();
        assert_eq!(loaded.nodes, wf.nodes);
        assert_eq!(loaded.edges, wf.edges);
        assert!(loaded.timestamp > 0);
        assert!(has_stored_workflow(&store, STORAGE_KEY).await.unwrap());
        assert!(storage_size(&store, STORAGE_KEY).await.unwrap() > 0);
    }

    #[tokio::test]
    async fn missing_and_corrupt_saves_load_as_none() {
        let store = MemoryBlobStore::new();
        assert!(load_workflow(&store, STORAGE_KEY).await.unwrap().is_none());

        store.put(STORAGE_KEY, "{not json".into()).await.unwrap();
        assert!(load_workflow(&store, STORAGE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_removes_the_save() {
        let store = MemoryBlobStore::new();
        let wf = sample();
        save_workflow(&store, STORAGE_KEY, &wf.nodes, &wf.edges).await.unwrap();

        assert!(clear_workflow(&store, STORAGE_KEY).await.unwrap());
        assert!(!clear_workflow(&store, STORAGE_KEY).await.unwrap());
        assert_eq!(storage_size(&store, STORAGE_KEY).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn backups_are_listed_restored_and_deleted() {
        let store = MemoryBlobStore::new();
        let wf = sample();

        let named = create_backup(
            &store,
            STORAGE_KEY,
            &wf.nodes,
            &wf.edges,
            Some("before-refactor"),
        )
        .await
        .unwrap();
        assert_eq!(named, "workflow_data_backup_before-refactor");
        let stamped = create_backup(&store, STORAGE_KEY, &wf.nodes[..1], &[], None)
            .await
            .unwrap();

        let keys = list_backups(&store, STORAGE_KEY).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&named) && keys.contains(&stamped));

        let restored = restore_backup(&store, &stamped).await.unwrap().unwrap();
        assert_eq!(restored.nodes.len(), 1);
        assert!(restored.edges.is_empty());

        assert!(delete_backup(&store, &named).await.unwrap());
        assert_eq!(list_backups(&store, STORAGE_KEY).await.unwrap(), vec![stamped]);
        // The main save is untouched by backups.
        assert!(!has_stored_workflow(&store, STORAGE_KEY).await.unwrap());
    }

    #[test]
    fn export_carries_version_and_metadata() {
        let wf = sample();
        let json = export_workflow_json(&wf.nodes, &wf.edges).unwrap();
        assert!(json.contains('\n'), "export should be pretty-printed");

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], "1.0.0");
        assert_eq!(value["metadata"]["nodeCount"], 2);
        assert_eq!(value["metadata"]["edgeCount"], 1);
        assert!(value["metadata"]["exportedAt"].is_string());
        assert_eq!(value["edges"][0]["type"], "smoothstep");

        let imported = import_workflow_json(&json).unwrap();
        assert_eq!(imported, wf);
    }

    #[test]
    fn import_accepts_minimal_documents() {
        let json = r#"{
            "nodes": [{"id": "n1", "kind": "trigger", "label": "Manual",
                       "config": {}, "position": {"x": 10, "y": 20}}],
            "edges": []
        }"#;
        let wf = import_workflow_json(json).unwrap();
        assert_eq!(wf.nodes.len(), 1);
        assert_eq!(wf.nodes[0].icon, "");
        assert_eq!(wf.nodes[0].position.x, 10.0);
    }

    #[test]
    fn import_rejects_missing_collections() {
        let err = import_workflow_json(r#"{"edges": []}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid workflow format: missing or invalid nodes");

        let err = import_workflow_json(r#"{"nodes": [], "edges": {}}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid workflow format: missing or invalid edges");

        assert!(matches!(
            import_workflow_json("not json"),
            Err(PersistenceError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn sql_store_round_trip() {
        let pool = db::pool::create_pool("sqlite::memory:", 1).await.unwrap();
        db::pool::run_migrations(&pool).await.unwrap();
        let store = SqlBlobStore::new(pool);
        let wf = sample();

        save_workflow(&store, STORAGE_KEY, &wf.nodes, &wf.edges).await.unwrap();
        let loaded = load_workflow(&store, STORAGE_KEY).await.unwrap().unwrap();
        assert_eq!(loaded.into_workflow(), wf);

        assert!(store.delete(STORAGE_KEY).await.unwrap());
        assert!(!store.delete(STORAGE_KEY).await.unwrap());
    }
}
