//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Extension of item files.
const ITEM_EXTENSION: &str = "state";

/// Extension of in-progress writes.
const TEMP_EXTENSION: &str = "state.tmp";

/// Longest accepted item name.
const MAX_NAME_LEN: usize = 200;

/// A directory-based storage backend.
///
/// Each item lives in its own file, `<root>/<name>.state`. Data survives
/// process restarts.
///
/// # Durability
///
/// `set_item` writes to a temporary file, calls `File::sync_all()`, then
/// renames it over the previous item, so a crash leaves either the old or
/// the new value, never a torn one.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads. Writers
/// are serialized by an internal lock.
///
/// # Example
///
/// ```no_run
/// use propsync_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("state")).unwrap();
/// backend.set_item("prefs", b"persistent data").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Opens a backend rooted at an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist or is not a directory.
    pub fn open(root: &Path) -> StorageResult<Self> {
        let metadata = fs::metadata(root)?;
        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Opens a backend, creating the root directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open_with_create_dirs(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Self::open(root)
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the file holding `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid item name.
    pub fn item_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{name}.{ITEM_EXTENSION}")))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{TEMP_EXTENSION}"))
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.item_path(name)?;
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }

    fn set_item(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.item_path(name)?;
        let temp = self.temp_path(name);
        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &path)?;
        Ok(())
    }

    fn remove_item(&self, name: &str) -> StorageResult<()> {
        let path = self.item_path(name)?;
        let _guard = self.write_lock.lock();

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Item names map directly to file names, so they are restricted to a
/// portable character set.
fn validate_name(name: &str) -> StorageResult<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.len() > MAX_NAME_LEN {
        Some("name is too long")
    } else if name.starts_with('.') {
        Some("name starts with a dot")
    } else if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
    {
        Some("name contains characters outside [A-Za-z0-9._-]")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
