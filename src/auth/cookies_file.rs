use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::session_store::CookieFormat;
use crate::domain::cookie::CookieJar;
use crate::error::StorageError;

/// Native encoding: a JSON array of cookie objects.
#[derive(Debug, Clone)]
pub struct JsonCookies {
    path: PathBuf,
}

impl JsonCookies {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Overwrite the file with `jar`.
    pub fn save(&self, jar: &CookieJar) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let s = serde_json::to_string_pretty(jar)?;
        fs::write(&self.path, s).map_err(|e| StorageError::io(&self.path, e))?;
        Ok(())
    }
}

impl CookieFormat for JsonCookies {
    fn name(&self) -> &'static str {
        "json"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// A file that exists but does not decode is reported and ignored, so the
    /// caller falls back to a fresh login.
    fn read(&self) -> Result<Option<CookieJar>, StorageError> {
        let s = fs::read_to_string(&self.path).map_err(|e| StorageError::io(&self.path, e))?;
        match serde_json::from_str::<CookieJar>(&s) {
            Ok(jar) => Ok(Some(jar)),
            Err(e) => {
                log::warn!(
                    "ignoring malformed cookie file {}: {e}",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }
}
