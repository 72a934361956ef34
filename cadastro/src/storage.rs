//! Where the session credential lives between runs.
//!
//! There is exactly one stored value: the raw credential string. Its presence is the only thing
//! the session looks at to decide whether it is authenticated.

use crate::Result;
use log::debug;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const CREDENTIAL_FILE_NAME: &str = "auth_token";

pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, credential: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Keeps the credential in a single file, readable only by the owner on unix.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileStore { path: path.into() }
    }

    /// Platform data directory, eg `~/.local/share/cadastro/auth_token` on linux.
    pub fn default_path() -> Option<PathBuf> {
        let proj = directories::ProjectDirs::from("br", "cadastro", "cadastro")?;
        Some(proj.data_dir().join(CREDENTIAL_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let credential = contents.trim();
                if credential.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(credential.to_string()))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, credential: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = opts.open(&self.path)?;
        file.write_all(credential.as_bytes())?;
        debug!("stored credential at {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("removed credential file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store. Used when a credential is handed in from the environment, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    credential: Mutex<Option<String>>,
    clears: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: &str) -> Self {
        MemoryStore {
            credential: Mutex::new(Some(credential.to_string())),
            clears: AtomicUsize::new(0),
        }
    }

    /// Number of times `clear` actually removed a credential.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(crate::lock(&self.credential).clone())
    }

    fn save(&self, credential: &str) -> Result<()> {
        *crate::lock(&self.credential) = Some(credential.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if crate::lock(&self.credential).take().is_some() {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, credential: &str) -> Result<()> {
        (**self).save(credential)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

#[test]
fn test_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("nested").join(CREDENTIAL_FILE_NAME));
    assert_eq!(store.load().unwrap(), None);
    // clearing a store that was never written is fine
    store.clear().unwrap();

    store.save("tok123").unwrap();
    assert_eq!(store.load().unwrap(), Some("tok123".to_string()));
    store.save("tok456").unwrap();
    assert_eq!(store.load().unwrap(), Some("tok456".to_string()));

    store.clear().unwrap();
    assert_eq!(store.load().unwrap(), None);
    assert!(!store.path().exists());
}

#[test]
fn test_file_store_blank_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CREDENTIAL_FILE_NAME);
    fs::write(&path, "  \n").unwrap();
    assert_eq!(FileStore::new(path).load().unwrap(), None);
}

#[test]
fn test_memory_store() {
    let store = MemoryStore::with_credential("abc");
    assert_eq!(store.load().unwrap(), Some("abc".to_string()));
    store.clear().unwrap();
    store.clear().unwrap();
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(store.clear_count(), 1);
}
