use std::env;
use std::path::{Path, PathBuf};

use crate::error::AppServicesError;

pub const DEFAULT_DB_URL: &str = "sqlite://course.sqlite3";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Where course structure and progress live.
#[derive(Clone, PartialEq, Eq)]
pub enum Backend {
    Sqlite {
        url: String,
        max_connections: u32,
    },
    Rest {
        base_url: String,
        token: Option<String>,
    },
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Sqlite {
                url,
                max_connections,
            } => f
                .debug_struct("Sqlite")
                .field("url", url)
                .field("max_connections", max_connections)
                .finish(),
            Backend::Rest { base_url, token } => f
                .debug_struct("Rest")
                .field("base_url", base_url)
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Service configuration, usually read from the environment.
///
/// | variable                    | meaning                                        |
/// |-----------------------------|------------------------------------------------|
/// | `COURSE_API_BASE_URL`       | use the REST backend at this URL               |
/// | `COURSE_API_TOKEN`          | bearer token for the REST backend              |
/// | `COURSE_DB_URL`             | `SQLite` URL or path (default `course.sqlite3`) |
/// | `COURSE_DB_MAX_CONNECTIONS` | `SQLite` pool size (default 5)                 |
///
/// A non-empty `COURSE_API_BASE_URL` wins over `COURSE_DB_URL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicesConfig {
    pub backend: Backend,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite {
                url: DEFAULT_DB_URL.to_owned(),
                max_connections: DEFAULT_MAX_CONNECTIONS,
            },
        }
    }
}

impl ServicesConfig {
    /// # Errors
    ///
    /// Returns `AppServicesError::Config` for malformed values.
    pub fn from_env() -> Result<Self, AppServicesError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Config` for malformed values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppServicesError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = non_empty("COURSE_API_BASE_URL") {
            let base_url = base_url.trim().to_owned();
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(AppServicesError::Config(format!(
                    "COURSE_API_BASE_URL must be an http(s) URL, got {base_url}"
                )));
            }
            return Ok(Self {
                backend: Backend::Rest {
                    base_url,
                    token: non_empty("COURSE_API_TOKEN"),
                },
            });
        }

        let url = non_empty("COURSE_DB_URL")
            .map_or_else(|| DEFAULT_DB_URL.to_owned(), normalize_sqlite_url);
        let max_connections = match non_empty("COURSE_DB_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                AppServicesError::Config(format!(
                    "COURSE_DB_MAX_CONNECTIONS must be a positive integer, got {raw}"
                ))
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            backend: Backend::Sqlite {
                url,
                max_connections,
            },
        })
    }

    /// In-memory `SQLite` database shared across pool connections.
    #[must_use]
    pub fn shared_memory(name: &str) -> Self {
        Self {
            backend: Backend::Sqlite {
                url: format!("sqlite:file:{name}?mode=memory&cache=shared"),
                max_connections: DEFAULT_MAX_CONNECTIONS,
            },
        }
    }
}

/// Turns a bare path or `sqlite:` path into an absolute `sqlite://` URL.
#[must_use]
pub fn normalize_sqlite_url(raw: String) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:"
        || trimmed.starts_with("sqlite://")
        || trimmed.starts_with("sqlite:file:")
    {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Adds `mode=rwc` to file URLs that do not pick a mode, so the database file is
/// created on first start.
pub(crate) fn with_create_mode(url: &str) -> String {
    if url == "sqlite::memory:" || url.contains("mode=") {
        return url.to_owned();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}mode=rwc")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_local_sqlite() {
        let config = ServicesConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServicesConfig::default());
    }

    #[test]
    fn api_base_url_selects_rest_backend() {
        let config = ServicesConfig::from_lookup(lookup(&[
            ("COURSE_API_BASE_URL", " https://api.example.com/v1 "),
            ("COURSE_API_TOKEN", "abc"),
            ("COURSE_DB_URL", "sqlite://ignored.sqlite3"),
        ]))
        .unwrap();
        assert_eq!(
            config.backend,
            Backend::Rest {
                base_url: "https://api.example.com/v1".into(),
                token: Some("abc".into()),
            }
        );
        assert!(!format!("{config:?}").contains("abc"));
    }

    #[test]
    fn blank_api_url_falls_back_to_sqlite() {
        let config = ServicesConfig::from_lookup(lookup(&[
            ("COURSE_API_BASE_URL", "  "),
            ("COURSE_DB_URL", "sqlite:///tmp/course.db"),
            ("COURSE_DB_MAX_CONNECTIONS", "2"),
        ]))
        .unwrap();
        assert_eq!(
            config.backend,
            Backend::Sqlite {
                url: "sqlite:///tmp/course.db".into(),
                max_connections: 2,
            }
        );
    }

    #[test]
    fn rejects_malformed_values() {
        let err = ServicesConfig::from_lookup(lookup(&[("COURSE_API_BASE_URL", "ftp://x")]))
            .unwrap_err();
        assert!(matches!(err, AppServicesError::Config(_)));

        let err = ServicesConfig::from_lookup(lookup(&[("COURSE_DB_MAX_CONNECTIONS", "0")]))
            .unwrap_err();
        assert!(matches!(err, AppServicesError::Config(_)));
    }

    #[test]
    fn normalizes_sqlite_urls() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:/var/lib/course.db".into()),
            "sqlite:///var/lib/course.db"
        );
        assert_eq!(normalize_sqlite_url("/srv/c.db".into()), "sqlite:///srv/c.db");
        let relative = normalize_sqlite_url("course.db".into());
        assert!(relative.starts_with("sqlite:///"));
        assert!(relative.ends_with("/course.db"));
    }

    #[test]
    fn create_mode_is_added_once() {
        assert_eq!(with_create_mode("sqlite:///a.db"), "sqlite:///a.db?mode=rwc");
        assert_eq!(
            with_create_mode("sqlite:///a.db?cache=shared"),
            "sqlite:///a.db?cache=shared&mode=rwc"
        );
        let memory = "sqlite:file:x?mode=memory&cache=shared";
        assert_eq!(with_create_mode(memory), memory);
    }
}
