//! Whole-collection persistence.
//!
//! Every collection is an ordered sequence of records that is loaded and
//! replaced in full. [`CollectionStore`] is the raw, object-safe backend;
//! [`Database`] adds typed records and the per-collection locks that make a
//! load → evaluate → save cycle atomic within the process.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Collection {
    Users,
    Courses,
    Registrations,
}

impl Collection {
    /// In lock acquisition order.
    pub const ALL: [Collection; 3] = [
        Collection::Users,
        Collection::Courses,
        Collection::Registrations,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Courses => "courses",
            Collection::Registrations => "registrations",
        }
    }

    fn index(self) -> usize {
        match self {
            Collection::Users => 0,
            Collection::Courses => 1,
            Collection::Registrations => 2,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub trait CollectionStore: Send + Sync {
    /// Returns `None` if the collection was never initialized or can't be
    /// read as a sequence of records.
    fn load(&self, collection: Collection) -> Option<Vec<Value>>;

    fn save(&self, collection: Collection, records: Vec<Value>) -> Result<(), StoreError>;

    /// Whether the collection was ever stored, readable or not.
    fn contains(&self, collection: Collection) -> bool {
        self.load(collection).is_some()
    }
}

/// Stores every collection as a pretty-printed JSON array in
/// `<root>/<collection>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> JsonFileStore {
        JsonFileStore { root: root.into() }
    }

    pub fn path(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.json", collection.name()))
    }

    fn write(&self, path: &Path, records: &[Value]) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)?;

        // Written next to the target and renamed over it so readers never see
        // a half-written file.
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        let result = (|| -> std::io::Result<()> {
            let mut out = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut out, records)?;
            out.flush()?;
            drop(out);
            fs::rename(&tmp, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

impl CollectionStore for JsonFileStore {
    fn load(&self, collection: Collection) -> Option<Vec<Value>> {
        let path = self.path(collection);
        let file = match File::open(&path) {
            Ok(it) => it,
            Err(_) => {
                tracing::debug!("collection file '{}' not found", path.display());
                return None;
            }
        };

        match serde_json::from_reader::<_, Vec<Value>>(BufReader::new(file)) {
            Ok(records) => Some(records),
            Err(err) => {
                tracing::warn!(
                    "collection file '{}' is malformed, treating as empty: {}",
                    path.display(),
                    err
                );
                None
            }
        }
    }

    fn save(&self, collection: Collection, records: Vec<Value>) -> Result<(), StoreError> {
        self.write(&self.path(collection), &records)
            .map_err(|source| StoreError::Io {
                collection: collection.name(),
                source,
            })
    }

    fn contains(&self, collection: Collection) -> bool {
        self.path(collection).exists()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl CollectionStore for MemoryStore {
    fn load(&self, collection: Collection) -> Option<Vec<Value>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&collection)
            .cloned()
    }

    fn save(&self, collection: Collection, records: Vec<Value>) -> Result<(), StoreError> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection, records);
        Ok(())
    }
}

/// Typed, lockable handle over a [`CollectionStore`]. Cloning shares both the
/// backend and the locks.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn CollectionStore>,
    locks: Arc<[Mutex<()>; 3]>,
}

/// Held for the duration of a load → evaluate → save cycle.
pub struct CollectionLock<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl Database {
    pub fn new(store: impl CollectionStore + 'static) -> Database {
        Database {
            store: Arc::new(store),
            locks: Arc::new([Mutex::new(()), Mutex::new(()), Mutex::new(())]),
        }
    }

    pub fn in_memory() -> Database {
        Database::new(MemoryStore::new())
    }

    /// Locks `collections`, always in [`Collection::ALL`] order regardless of
    /// the order they're passed in.
    pub fn lock(&self, collections: &[Collection]) -> CollectionLock<'_> {
        let guards = Collection::ALL
            .iter()
            .filter(|it| collections.contains(*it))
            .map(|it| {
                self.locks[it.index()]
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
            })
            .collect();

        CollectionLock { _guards: guards }
    }

    pub fn is_initialized(&self, collection: Collection) -> bool {
        self.store.contains(collection)
    }

    /// Loads every record of `collection`. Records that don't match `T` are
    /// skipped; a missing or unreadable collection is empty.
    pub fn load<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        self.store
            .load(collection)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(it) => Some(it),
                Err(err) => {
                    tracing::warn!("Unable to deserialize {} record: {}", collection, err);
                    None
                }
            })
            .collect()
    }

    pub fn save<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<(), StoreError> {
        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| StoreError::Serialize {
                collection: collection.name(),
                source,
            })?;

        self.store.save(collection, values)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Database")
    }
}
