use lettre::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const APP_DIR: &str = "tweet_mailer";
const DEFAULT_MAIL_HOST: &str = "localhost";
const DEFAULT_SMTP_PORT: u16 = 25;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub main: MainSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<TwitterSection>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MainSection {
    pub mail_server: Option<String>,
    pub mailfrom: String,
    pub mailto: Vec<String>,
    pub db_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TwitterSection {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// SMTP endpoint, `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailServer {
    pub host: String,
    pub port: u16,
}

impl MailServer {
    fn parse(raw: Option<&str>) -> Result<Self, ConfigError> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty());
        let Some(raw) = raw else {
            return Ok(Self {
                host: DEFAULT_MAIL_HOST.to_string(),
                port: DEFAULT_SMTP_PORT,
            });
        };

        match raw.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|e| ConfigError::Invalid {
                    key: "main.mail_server",
                    reason: format!("bad port {port:?}: {e}"),
                })?;
                Ok(Self {
                    host: host.to_string(),
                    port,
                })
            }
            None => Ok(Self {
                host: raw.to_string(),
                port: DEFAULT_SMTP_PORT,
            }),
        }
    }
}

impl fmt::Display for MailServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Validated mail settings, immutable for the run.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub server: MailServer,
    pub from: Address,
    pub to: Vec<Address>,
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Config {
    pub fn notification(&self) -> Result<NotificationConfig, ConfigError> {
        let server = MailServer::parse(self.main.mail_server.as_deref())?;

        let from = parse_address("main.mailfrom", &self.main.mailfrom)?;

        if self.main.mailto.is_empty() {
            return Err(ConfigError::Invalid {
                key: "main.mailto",
                reason: "at least one recipient is required".to_string(),
            });
        }
        let to = self
            .main
            .mailto
            .iter()
            .map(|a| parse_address("main.mailto", a))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NotificationConfig { server, from, to })
    }

    /// Login credentials, only when both halves are present.
    pub fn credentials(&self) -> Option<Credentials> {
        let tw = self.twitter.as_ref()?;
        match (&tw.username, &tw.password) {
            (Some(u), Some(p)) if !u.is_empty() => Some(Credentials {
                username: u.clone(),
                password: p.clone(),
            }),
            _ => None,
        }
    }
}

fn parse_address(key: &'static str, raw: &str) -> Result<Address, ConfigError> {
    raw.trim().parse::<Address>().map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("{raw:?}: {e}"),
    })
}

/// On-disk locations used by one run.
#[derive(Debug, Clone)]
pub struct Paths {
    pub config: PathBuf,
    pub ledger: PathBuf,
    pub cookies_json: PathBuf,
    pub cookies_txt: PathBuf,
}

impl Paths {
    /// Cookie files live next to the config file; the ledger defaults to the
    /// user data dir unless `main.db_path` overrides it.
    pub fn resolve(config_path: &Path, cfg: &Config) -> Result<Self, ConfigError> {
        let base = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self {
            config: config_path.to_path_buf(),
            ledger: resolve_db_path(cfg)?,
            cookies_json: base.join("cookies.json"),
            cookies_txt: base.join("cookies.txt"),
        })
    }
}

fn config_dir() -> Result<PathBuf, ConfigError> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::NoDirectory("config"))?
        .join(APP_DIR))
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn default_db_path() -> Result<PathBuf, ConfigError> {
    Ok(dirs::data_dir()
        .ok_or(ConfigError::NoDirectory("data"))?
        .join(APP_DIR)
        .join("seen.db"))
}

pub fn resolve_db_path(cfg: &Config) -> Result<PathBuf, ConfigError> {
    if let Some(p) = &cfg.main.db_path {
        Ok(PathBuf::from(p))
    } else {
        default_db_path()
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        write_template(path)?;
        return Err(ConfigError::TemplateCreated(path.to_path_buf()));
    }
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(path, &s)
}

pub fn parse_config(path: &Path, s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = toml::from_str(s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    // Surface bad addresses and ports before any network or storage I/O.
    cfg.notification()?;
    Ok(cfg)
}

fn write_template(path: &Path) -> Result<(), ConfigError> {
    let sample = Config {
        main: MainSection {
            mail_server: Some(DEFAULT_MAIL_HOST.to_string()),
            mailfrom: "tweet_mailer@example.com".to_string(),
            mailto: vec!["you@example.com".to_string()],
            db_path: None,
        },
        twitter: Some(TwitterSection {
            username: Some("your_handle".to_string()),
            password: Some("your_password".to_string()),
        }),
    };
    let io_err = |source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tom = toml::to_string_pretty(&sample).map_err(|e| ConfigError::Invalid {
        key: "template",
        reason: e.to_string(),
    })?;
    fs::write(path, tom).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Config, ConfigError> {
        parse_config(Path::new("config.toml"), s)
    }

    #[test]
    fn test_mail_server_defaults_to_localhost() {
        let cfg = parse(
            r#"
            [main]
            mailfrom = "bot@example.com"
            mailto = ["a@example.com"]
            "#,
        )
        .unwrap();
        let n = cfg.notification().unwrap();
        assert_eq!(n.server.host, "localhost");
        assert_eq!(n.server.port, 25);
        assert_eq!(n.server.to_string(), "localhost:25");
    }

    #[test]
    fn test_mail_server_with_port() {
        let cfg = parse(
            r#"
            [main]
            mail_server = "smtp.internal:2525"
            mailfrom = "bot@example.com"
            mailto = ["a@example.com", "b@example.com"]
            "#,
        )
        .unwrap();
        let n = cfg.notification().unwrap();
        assert_eq!(
            n.server,
            MailServer {
                host: "smtp.internal".into(),
                port: 2525
            }
        );
        assert_eq!(n.to.len(), 2);
        assert_eq!(n.to[1].to_string(), "b@example.com");
    }

    #[test]
    fn test_missing_mailfrom_is_parse_error() {
        let err = parse(
            r#"
            [main]
            mailto = ["a@example.com"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_mailto_must_be_list_of_strings() {
        let err = parse(
            r#"
            [main]
            mailfrom = "bot@example.com"
            mailto = "a@example.com"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_empty_mailto_rejected() {
        let err = parse(
            r#"
            [main]
            mailfrom = "bot@example.com"
            mailto = []
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "main.mailto", .. }));
    }

    #[test]
    fn test_bad_address_rejected() {
        let err = parse(
            r#"
            [main]
            mailfrom = "not an address"
            mailto = ["a@example.com"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "main.mailfrom", .. }));
    }

    #[test]
    fn test_credentials_need_both_fields() {
        let cfg = parse(
            r#"
            [main]
            mailfrom = "bot@example.com"
            mailto = ["a@example.com"]

            [twitter]
            username = "someone"
            "#,
        )
        .unwrap();
        assert!(cfg.credentials().is_none());

        let cfg = parse(
            r#"
            [main]
            mailfrom = "bot@example.com"
            mailto = ["a@example.com"]

            [twitter]
            username = "someone"
            password = "hunter2"
            "#,
        )
        .unwrap();
        let creds = cfg.credentials().unwrap();
        assert_eq!(creds.username, "someone");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_missing_file_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TemplateCreated(_)));
        assert!(path.exists());

        // The template itself must be a loadable config.
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.main.mailto, vec!["you@example.com".to_string()]);
    }

    #[test]
    fn test_paths_place_cookies_next_to_config() {
        let cfg = parse(
            r#"
            [main]
            mailfrom = "bot@example.com"
            mailto = ["a@example.com"]
            db_path = "/var/lib/tm/seen.db"
            "#,
        )
        .unwrap();
        let paths = Paths::resolve(Path::new("/etc/tm/config.toml"), &cfg).unwrap();
        assert_eq!(paths.ledger, PathBuf::from("/var/lib/tm/seen.db"));
        assert_eq!(paths.cookies_json, PathBuf::from("/etc/tm/cookies.json"));
        assert_eq!(paths.cookies_txt, PathBuf::from("/etc/tm/cookies.txt"));
    }
}
