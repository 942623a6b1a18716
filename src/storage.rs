//! Persistent record storage trait and built-in backends.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::error::StorageError;

/// Durable key-value record substrate, grouped into named collections.
///
/// Records are opaque JSON values keyed by their id. Entity stores only ever
/// call these three operations.
///
/// # Contract
///
/// - [`add`](RecordStorage::add) must fail with
///   [`StorageError::AlreadyExists`] when the key is present and leave the
///   stored record untouched.
/// - [`put`](RecordStorage::put) inserts or overwrites.
/// - [`get_all`](RecordStorage::get_all) returns records ordered by key. A
///   collection that was never written is empty, not an error.
#[async_trait::async_trait]
pub trait RecordStorage: Send + Sync + std::fmt::Debug {
    /// Insert a new record under `key`.
    async fn add(&self, collection: &str, key: &str, record: Value) -> Result<(), StorageError>;

    /// Insert or overwrite the record under `key`.
    async fn put(&self, collection: &str, key: &str, record: Value) -> Result<(), StorageError>;

    /// Every record in `collection`, ordered by key.
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>, StorageError>;
}

/// Reject names that cannot safely become a single path component.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if bad {
        return Err(StorageError::InvalidKey(key.to_owned()));
    }
    Ok(())
}

/// File-backed storage with one JSON document per record.
///
/// The layout follows this structure:
/// ```text
/// <base_dir>/
///     collections/
///         <collection>/
///             <key>.json
/// ```
///
/// Writes are atomic via a temp-rename pattern so a crash mid-write never
/// leaves a truncated record behind. All filesystem work runs on the blocking
/// thread pool.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// Create a new `FileStorage` rooted at the given base directory.
    ///
    /// # Arguments
    ///
    /// * `base_dir` - Root directory for all collections. It does not need
    ///   to exist yet; collection directories are created on first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the root directory of this storage.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns `<base_dir>/collections/<collection>`.
    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.base_dir.join("collections").join(collection)
    }

    /// Returns `<base_dir>/collections/<collection>/<key>.json`.
    pub fn record_path(&self, collection: &str, key: &str) -> PathBuf {
        self.collection_dir(collection).join(format!("{key}.json"))
    }

    async fn write(
        &self,
        collection: &str,
        key: &str,
        record: Value,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        validate_key(collection)?;
        validate_key(key)?;
        let path = self.record_path(collection, key);
        let collection = collection.to_owned();
        let key = key.to_owned();

        tokio::task::spawn_blocking(move || {
            if !overwrite && path.exists() {
                return Err(StorageError::AlreadyExists { collection, key });
            }
            write_atomic(&path, &record)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

/// Serialize `record` to `<path>.tmp`, then rename over `path`.
fn write_atomic(path: &Path, record: &Value) -> Result<(), StorageError> {
    let dir = path
        .parent()
        .expect("record_path always has a parent directory");
    fs::create_dir_all(dir)?;

    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(record)?;
    fs::write(&tmp_path, &json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read every `*.json` file in `dir`, sorted by key.
///
/// Unparseable files are skipped with a warning rather than failing the
/// whole collection.
fn read_collection(dir: &Path) -> Result<Vec<Value>, StorageError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut paths: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        paths.push((key.to_owned(), path));
    }
    paths.sort_by(|a, b| a.0.cmp(&b.0));

    let mut records = Vec::with_capacity(paths.len());
    for (_, path) in paths {
        let bytes = fs::read(&path)?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => records.push(value),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping corrupt record file"
                );
            }
        }
    }
    Ok(records)
}

#[async_trait::async_trait]
impl RecordStorage for FileStorage {
    async fn add(&self, collection: &str, key: &str, record: Value) -> Result<(), StorageError> {
        self.write(collection, key, record, false).await
    }

    async fn put(&self, collection: &str, key: &str, record: Value) -> Result<(), StorageError> {
        self.write(collection, key, record, true).await
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Value>, StorageError> {
        validate_key(collection)?;
        let dir = self.collection_dir(collection);
        tokio::task::spawn_blocking(move || read_collection(&dir))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

/// In-process storage backed by ordered maps.
///
/// Useful for tests and throwaway sessions. Reads and writes can be made to
/// fail on demand with [`fail_reads`](MemoryStorage::fail_reads) and
/// [`fail_writes`](MemoryStorage::fail_writes).
///
/// # Panics
///
/// Methods panic if the inner mutex is poisoned, which is treated as an
/// invariant violation.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get_all` fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Release);
    }

    /// Make every subsequent `add`/`put` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// The raw stored record, bypassing any entity store cache.
    pub fn raw(&self, collection: &str, key: &str) -> Option<Value> {
        let collections = self.collections.lock().expect("storage mutex poisoned");
        collections.get(collection)?.get(key).cloned()
    }

    /// Number of records currently stored in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        let collections = self.collections.lock().expect("storage mutex poisoned");
        collections.get(collection).map_or(0, BTreeMap::len)
    }

    /// Returns `true` if `collection` holds no records.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(io::Error::other("write rejected by storage").into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStorage for MemoryStorage {
    async fn add(&self, collection: &str, key: &str, record: Value) -> Result<(), StorageError> {
        validate_key(collection)?;
        validate_key(key)?;
        self.check_writable()?;

        let mut collections = self.collections.lock().expect("storage mutex poisoned");
        let records = collections.entry(collection.to_owned()).or_default();
        if records.contains_key(key) {
            return Err(StorageError::AlreadyExists {
                collection: collection.to_owned(),
                key: key.to_owned(),
            });
        }
        records.insert(key.to_owned(), record);
        Ok(())
    }

    async fn put(&self, collection: &str, key: &str, record: Value) -> Result<(), StorageError> {
        validate_key(collection)?;
        validate_key(key)?;
        self.check_writable()?;

        let mut collections = self.collections.lock().expect("storage mutex poisoned");
        collections
            .entry(collection.to_owned())
            .or_default()
            .insert(key.to_owned(), record);
        Ok(())
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Value>, StorageError> {
        validate_key(collection)?;
        if self.fail_reads.load(Ordering::Acquire) {
            return Err(io::Error::other("read rejected by storage").into());
        }

        let collections = self.collections.lock().expect("storage mutex poisoned");
        Ok(collections
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn path_helpers_correct() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let storage = FileStorage::new(tmp.path());

        assert_eq!(storage.base_dir(), tmp.path());
        assert_eq!(
            storage.collection_dir("staff"),
            tmp.path().join("collections/staff")
        );
        assert_eq!(
            storage.record_path("staff", "s1"),
            tmp.path().join("collections/staff/s1.json")
        );
    }

    #[test]
    fn key_validation() {
        assert!(validate_key("abc-123").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
    }

    #[tokio::test]
    async fn file_add_then_get_all() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let storage = FileStorage::new(tmp.path());

        storage
            .add("staff", "s1", json!({"id": "s1", "name": "Jane"}))
            .await
            .expect("add should succeed");

        assert!(storage.record_path("staff", "s1").is_file());
        let records = storage.get_all("staff").await.expect("get_all");
        assert_eq!(records, vec![json!({"id": "s1", "name": "Jane"})]);
    }

    #[tokio::test]
    async fn file_add_duplicate_key_rejected() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let storage = FileStorage::new(tmp.path());

        storage
            .add("staff", "s1", json!({"id": "s1", "name": "Jane"}))
            .await
            .expect("first add should succeed");
        let err = storage
            .add("staff", "s1", json!({"id": "s1", "name": "Other"}))
            .await
            .expect_err("second add should fail");
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        // The original record is untouched.
        let records = storage.get_all("staff").await.expect("get_all");
        assert_eq!(records[0]["name"], "Jane");
    }

    #[tokio::test]
    async fn file_put_overwrites() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let storage = FileStorage::new(tmp.path());

        storage
            .put("vehicles", "v1", json!({"id": "v1", "status": "available"}))
            .await
            .expect("put should succeed");
        storage
            .put("vehicles", "v1", json!({"id": "v1", "status": "maintenance"}))
            .await
            .expect("put should succeed");

        let records = storage.get_all("vehicles").await.expect("get_all");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["status"], "maintenance");
        assert!(
            !tmp.path().join("collections/vehicles/v1.json.tmp").exists(),
            "temp file should be renamed away"
        );
    }

    #[tokio::test]
    async fn file_get_all_sorted_by_key() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let storage = FileStorage::new(tmp.path());

        // Insert in non-sorted order to verify sorting.
        for key in ["charlie", "alpha", "bravo"] {
            storage
                .add("staff", key, json!({ "id": key }))
                .await
                .expect("add should succeed");
        }

        let ids: Vec<String> = storage
            .get_all("staff")
            .await
            .expect("get_all")
            .iter()
            .map(|v| v["id"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(ids, vec!["alpha", "bravo", "charlie"]);
    }

    #[tokio::test]
    async fn file_get_all_empty_for_unknown_collection() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let storage = FileStorage::new(tmp.path());

        let records = storage.get_all("dispatches").await.expect("get_all");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn file_corrupt_record_skipped() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let storage = FileStorage::new(tmp.path());

        storage
            .add("reports", "r1", json!({"id": "r1"}))
            .await
            .expect("add should succeed");
        std::fs::write(storage.record_path("reports", "r2"), b"{not json")
            .expect("write corrupt file");

        let records = storage.get_all("reports").await.expect("get_all");
        assert_eq!(records, vec![json!({"id": "r1"})]);
    }

    #[tokio::test]
    async fn file_rejects_path_traversal_key() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let storage = FileStorage::new(tmp.path());

        let err = storage
            .put("staff", "../escape", json!({}))
            .await
            .expect_err("traversal key should be rejected");
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn memory_add_put_get_all() {
        let storage = MemoryStorage::new();

        storage
            .add("staff", "b", json!({"id": "b"}))
            .await
            .expect("add");
        storage
            .add("staff", "a", json!({"id": "a"}))
            .await
            .expect("add");
        storage
            .put("staff", "b", json!({"id": "b", "status": "off-duty"}))
            .await
            .expect("put");

        let records = storage.get_all("staff").await.expect("get_all");
        assert_eq!(
            records,
            vec![json!({"id": "a"}), json!({"id": "b", "status": "off-duty"})]
        );
        assert_eq!(storage.len("staff"), 2);
        assert!(storage.is_empty("vehicles"));
    }

    #[tokio::test]
    async fn memory_fault_injection() {
        let storage = MemoryStorage::new();

        storage.fail_writes(true);
        let err = storage
            .add("staff", "s1", json!({"id": "s1"}))
            .await
            .expect_err("write should fail");
        assert!(matches!(err, StorageError::Io(_)));
        assert!(storage.is_empty("staff"));

        storage.fail_writes(false);
        storage.fail_reads(true);
        assert!(storage.get_all("staff").await.is_err());

        storage.fail_reads(false);
        assert!(storage.get_all("staff").await.expect("get_all").is_empty());
    }
}
