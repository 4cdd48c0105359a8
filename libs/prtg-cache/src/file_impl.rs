//! File-backed entity cache
//!
//! The whole map is kept in memory behind a mutex and rewritten as JSON after
//! every write. [`FileCache::temporary`] creates a uniquely named
//! `prtg.*.cache` file that is removed when the cache is dropped;
//! [`FileCache::open`] uses a caller-owned path that survives the process.

use parking_lot::Mutex;
use prtg_model::Entity;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::{sort_by_id, ContentFilter, EntityCache};

const FILE_PREFIX: &str = "prtg.";
const FILE_SUFFIX: &str = ".cache";

#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Entity>>,
    // Removes the file on drop
    _temp: Option<TempPath>,
}

impl FileCache {
    /// Cache in a fresh temp file under `dir` (system temp dir when `None`)
    pub fn temporary(dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(FILE_PREFIX).suffix(FILE_SUFFIX);
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let temp = file.into_temp_path();
        debug!("Created cache file {}", temp.display());
        Ok(Self {
            path: temp.to_path_buf(),
            entries: Mutex::new(BTreeMap::new()),
            _temp: Some(temp),
        })
    }

    /// Cache persisted at `path`, loading existing contents
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)?,
            Ok(_) => BTreeMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
            _temp: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, Entity>) -> Result<()> {
        let mut writer = BufWriter::new(fs::File::create(&self.path)?);
        serde_json::to_writer(&mut writer, entries)?;
        writer.flush()?;
        Ok(())
    }
}

impl EntityCache for FileCache {
    fn write(&self, entities: &[Entity], force: bool) -> Result<()> {
        let mut entries = self.entries.lock();
        // Memory only takes the update once the file holds it
        let mut updated = entries.clone();
        for entity in entities {
            let Some(id) = entity.id() else {
                warn!("Skipping entity without id: {}", entity);
                continue;
            };
            if force || !updated.contains_key(id) {
                updated.insert(id.to_string(), entity.clone());
            }
        }
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.entries.lock().get(id).cloned())
    }

    fn get_by_kind(&self, filter: ContentFilter) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = self
            .entries
            .lock()
            .values()
            .filter(|entity| filter.matches(entity))
            .cloned()
            .collect();
        sort_by_id(&mut entities);
        Ok(entities)
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
