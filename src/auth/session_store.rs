use std::path::Path;

use crate::auth::cookies_file::JsonCookies;
use crate::auth::netscape::NetscapeCookies;
use crate::config::Paths;
use crate::domain::cookie::CookieJar;
use crate::error::StorageError;

/// One on-disk cookie encoding.
pub trait CookieFormat {
    fn name(&self) -> &'static str;
    fn path(&self) -> &Path;
    /// Decode the file at `path()`. Only called when the file exists.
    fn read(&self) -> Result<Option<CookieJar>, StorageError>;
}

/// Loads the session bundle from whichever encoding is on disk and always
/// saves back in the native one.
pub struct SessionStore {
    native: JsonCookies,
    foreign: NetscapeCookies,
}

impl SessionStore {
    pub fn new(native: impl AsRef<Path>, foreign: impl AsRef<Path>) -> Self {
        Self {
            native: JsonCookies::new(native.as_ref()),
            foreign: NetscapeCookies::new(foreign.as_ref()),
        }
    }

    pub fn from_paths(paths: &Paths) -> Self {
        Self::new(&paths.cookies_json, &paths.cookies_txt)
    }

    /// The first existing file wins; the native file is probed first. `None`
    /// means there is nothing usable and the caller has to log in.
    pub fn load(&self) -> Result<Option<CookieJar>, StorageError> {
        let formats: [&dyn CookieFormat; 2] = [&self.native, &self.foreign];
        let Some(format) = formats.into_iter().find(|f| f.path().exists()) else {
            log::debug!("no cookie file found");
            return Ok(None);
        };

        log::debug!(
            "loading {} cookies from {}",
            format.name(),
            format.path().display()
        );
        let jar = format.read()?;
        if let Some(jar) = &jar {
            log::debug!("restored {} cookies", jar.len());
        }
        Ok(jar)
    }

    pub fn save(&self, jar: &CookieJar) -> Result<(), StorageError> {
        log::debug!(
            "saving {} cookies to {}",
            jar.len(),
            self.native.path().display()
        );
        self.native.save(jar)
    }
}
