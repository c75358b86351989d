//! Collections database.
//!
//! Two collections, `personas` and `canvas_items`, each stored as one
//! MessagePack file. Saves replace the whole collection, keyed by id: when
//! two records share an id the later one wins. Writes go to a temporary
//! file first and are renamed into place.
//!
//! The process shares one open database through [`acquire`] and
//! [`dispose`]; both are idempotent.

use crate::error::Result;
use muse_core::{CanvasItem, Persona};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const DATABASE_NAME: &str = "MuseCaptionDB";
pub const PERSONAS: &str = "personas";
pub const CANVAS_ITEMS: &str = "canvas_items";

/// Everything the collections hold, as loaded at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredState {
    pub personas: Vec<Persona>,
    pub items: Vec<CanvasItem>,
}

/// Replace-all persistence of the two collections.
pub trait Storage: Send + Sync + 'static {
    fn load(&self) -> Result<StoredState>;
    fn save_personas(&self, personas: &[Persona]) -> Result<()>;
    fn save_items(&self, items: &[CanvasItem]) -> Result<()>;
}

// ─── On-disk database ────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Database {
    dir: PathBuf,
}

impl Database {
    /// Open (creating if needed) a database rooted at `parent/MuseCaptionDB`.
    pub fn open(parent: impl AsRef<Path>) -> Result<Self> {
        let dir = parent.as_ref().join(DATABASE_NAME);
        fs::create_dir_all(&dir)?;
        log::info!("database opened at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.msgpack"))
    }

    fn read_collection<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.collection_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(rmp_serde::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_collection<T: Serialize>(&self, name: &str, records: &[&T]) -> Result<()> {
        let bytes = rmp_serde::to_vec_named(records)?;
        let path = self.collection_path(name);
        let tmp = path.with_extension("msgpack.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        log::debug!("{name}: wrote {} record(s), {} bytes", records.len(), bytes.len());
        Ok(())
    }
}

impl Storage for Database {
    fn load(&self) -> Result<StoredState> {
        Ok(StoredState {
            personas: self.read_collection(PERSONAS)?,
            items: self.read_collection(CANVAS_ITEMS)?,
        })
    }

    fn save_personas(&self, personas: &[Persona]) -> Result<()> {
        let records = keyed_by(personas, |p| p.id.as_str());
        self.write_collection(PERSONAS, &records)
    }

    fn save_items(&self, items: &[CanvasItem]) -> Result<()> {
        let records = keyed_by(items, |item| item.id);
        self.write_collection(CANVAS_ITEMS, &records)
    }
}

/// Collapse records sharing a key: first position, last value.
fn keyed_by<'a, T, K: Eq + Hash>(records: &'a [T], key: impl Fn(&'a T) -> K) -> Vec<&'a T> {
    let mut slots: HashMap<K, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<&T> = Vec::with_capacity(records.len());
    for record in records {
        match slots.get(&key(record)) {
            Some(&slot) => out[slot] = record,
            None => {
                slots.insert(key(record), out.len());
                out.push(record);
            }
        }
    }
    out
}

// ─── Process-wide handle ─────────────────────────────────────────────────

static SHARED: Mutex<Option<Arc<Database>>> = Mutex::new(None);

/// Open the shared database, or return the one already open.
///
/// A second call with a different `parent` still returns the open database.
pub fn acquire(parent: impl AsRef<Path>) -> Result<Arc<Database>> {
    let mut guard = SHARED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(db) = guard.as_ref() {
        if db.dir != parent.as_ref().join(DATABASE_NAME) {
            log::warn!(
                "database already open at {}; ignoring {}",
                db.dir.display(),
                parent.as_ref().display()
            );
        }
        return Ok(Arc::clone(db));
    }
    let db = Arc::new(Database::open(parent)?);
    *guard = Some(Arc::clone(&db));
    Ok(db)
}

/// Release the shared database. Returns `false` if none was open.
pub fn dispose() -> bool {
    let mut guard = SHARED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match guard.take() {
        Some(db) => {
            log::info!("database at {} disposed", db.dir.display());
            true
        }
        None => false,
    }
}

// ─── In-memory storage ───────────────────────────────────────────────────

/// Storage kept in memory; counts saves so callers can assert on them.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<StoredState>,
    saves: Mutex<(usize, usize)>,
}

impl MemoryStorage {
    pub fn new(initial: StoredState) -> Self {
        Self {
            state: Mutex::new(initial),
            saves: Mutex::new((0, 0)),
        }
    }

    pub fn snapshot(&self) -> StoredState {
        lock(&self.state).clone()
    }

    /// `(persona saves, item saves)` so far.
    pub fn save_counts(&self) -> (usize, usize) {
        *lock(&self.saves)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<StoredState> {
        Ok(self.snapshot())
    }

    fn save_personas(&self, personas: &[Persona]) -> Result<()> {
        let records = keyed_by(personas, |p| p.id.as_str());
        lock(&self.state).personas = records.into_iter().cloned().collect();
        lock(&self.saves).0 += 1;
        Ok(())
    }

    fn save_items(&self, items: &[CanvasItem]) -> Result<()> {
        let records = keyed_by(items, |item| item.id);
        lock(&self.state).items = records.into_iter().cloned().collect();
        lock(&self.saves).1 += 1;
        Ok(())
    }
}
