//! Checkpoint record storage.
//!
//! The record is one line, `"<last_paragraph_index>,<next_block_number>"`.
//! Writes go to a sibling temp file which is fsynced and renamed over the
//! record, so a reader sees either the previous record or the new one.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use folio_shared::{Checkpoint, FolioError, Result};

/// Durable store for the pipeline's resume point.
pub trait CheckpointStore {
    /// Current checkpoint. Absent or malformed records read as [`Checkpoint::START`].
    fn read(&self) -> Checkpoint;

    /// Replace the record as a whole.
    fn write(&mut self, checkpoint: Checkpoint) -> Result<()>;

    /// Forget all progress.
    fn clear(&mut self) -> Result<()>;
}

/// Checkpoint kept in a plain-text file.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkpoint".into());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn read(&self) -> Checkpoint {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no checkpoint, starting fresh");
                return Checkpoint::START;
            }
        };

        match content.parse::<Checkpoint>() {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring checkpoint");
                Checkpoint::START
            }
        }
    }

    fn write(&mut self, checkpoint: Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| FolioError::io(parent, e))?;
        }

        let temp = self.temp_path();
        {
            let mut file = File::create(&temp).map_err(|e| FolioError::io(&temp, e))?;
            file.write_all(checkpoint.to_string().as_bytes())
                .map_err(|e| FolioError::io(&temp, e))?;
            file.sync_all().map_err(|e| FolioError::io(&temp, e))?;
        }

        fs::rename(&temp, &self.path).map_err(|e| FolioError::io(&self.path, e))?;
        sync_parent(&self.path)?;

        debug!(path = %self.path.display(), %checkpoint, "checkpoint written");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "checkpoint cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FolioError::io(&self.path, e)),
        }
    }
}

/// fsync the directory holding `path` so the rename itself is durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    let dir = fs::OpenOptions::new()
        .read(true)
        .open(parent)
        .map_err(|e| FolioError::io(parent, e))?;
    dir.sync_all().map_err(|e| FolioError::io(parent, e))
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "folio-checkpoint-test-{}",
            uuid::Uuid::now_v7()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn cold_start_reads_start() {
        let tmp = temp_dir();
        let store = FileCheckpointStore::new(tmp.join("checkpoint.txt"));
        assert_eq!(store.read(), Checkpoint::START);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn write_then_read() {
        let tmp = temp_dir();
        let path = tmp.join("checkpoint.txt");
        let mut store = FileCheckpointStore::new(&path);

        let cp = Checkpoint {
            last_paragraph_index: 247,
            next_block_number: 3,
        };
        store.write(cp).unwrap();

        assert_eq!(store.read(), cp);
        assert_eq!(fs::read_to_string(&path).unwrap(), "247,3");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn write_replaces_previous_record() {
        let tmp = temp_dir();
        let mut store = FileCheckpointStore::new(tmp.join("checkpoint.txt"));

        store
            .write(Checkpoint {
                last_paragraph_index: 10,
                next_block_number: 2,
            })
            .unwrap();
        store
            .write(Checkpoint {
                last_paragraph_index: 42,
                next_block_number: 3,
            })
            .unwrap();

        assert_eq!(store.read().to_string(), "42,3");

        // No temp files should remain
        for entry in fs::read_dir(&tmp).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_record_reads_as_start() {
        let tmp = temp_dir();
        let path = tmp.join("checkpoint.txt");

        for raw in ["", "garbage", "12", "x,2", "3,0"] {
            fs::write(&path, raw).unwrap();
            let store = FileCheckpointStore::new(&path);
            assert_eq!(store.read(), Checkpoint::START, "record {raw:?}");
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn explicit_start_record_equals_absence() {
        let tmp = temp_dir();
        let path = tmp.join("checkpoint.txt");
        fs::write(&path, "-1,1").unwrap();

        assert_eq!(FileCheckpointStore::new(&path).read(), Checkpoint::START);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn clear_is_idempotent() {
        let tmp = temp_dir();
        let mut store = FileCheckpointStore::new(tmp.join("nested").join("checkpoint.txt"));

        store.clear().unwrap();
        store
            .write(Checkpoint {
                last_paragraph_index: 5,
                next_block_number: 2,
            })
            .unwrap();
        store.clear().unwrap();
        store.clear().unwrap();

        assert_eq!(store.read(), Checkpoint::START);

        let _ = fs::remove_dir_all(&tmp);
    }
}
