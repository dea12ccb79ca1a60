use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable byte offset into the source log, stored as a plain integer in a
/// text file so it survives restarts and can be inspected by hand.
///
/// There is exactly one writer (the ingestion loop). `save` replaces the file
/// atomically so a concurrent `load` never observes a half-written value.
pub struct CursorFile {
    path: PathBuf,
}

impl CursorFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the last saved offset. Missing, unreadable, or corrupt state
    /// yields 0 rather than an error; the worst case is re-reading the log
    /// from the start, which the store's uniqueness constraint absorbs.
    pub fn load(&self) -> u64 {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match contents.trim().parse::<u64>() {
                Ok(offset) => offset,
                Err(_) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        "cursor file is corrupt, restarting from offset 0"
                    );
                    0
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "cursor file unreadable, restarting from offset 0"
                );
                0
            }
        }
    }

    /// Persist the offset via write-to-temp-then-rename.
    pub fn save(&self, offset: u64) -> Result<(), CursorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, format!("{}\n", offset))?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}
