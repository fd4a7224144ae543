use dotenv::dotenv;
use rocket::figment::providers::Env;
use rocket::figment::Figment;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::db::{ErrorKind, Result};
use crate::pagination::DEFAULT_PAGE_SIZE;

/// Application settings read from the same figment as Rocket's own
/// configuration (`Rocket.toml`, `ROCKET_*`), plus a plain `DATABASE_URL`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub media_root: PathBuf,
    /// Seconds the global feed is served from the page cache. 0 disables it.
    pub cache_ttl: u64,
    /// Upper bound on the number of pages the cache holds at once.
    pub cache_max_entries: usize,
    pub page_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "yatube.sqlite3".to_owned(),
            media_root: PathBuf::from("media"),
            cache_ttl: 20,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Settings {
    pub fn from_figment(figment: &Figment) -> Result<Settings> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| ErrorKind::Config(e.to_string()))?;
        if settings.page_size == 0 {
            return Err(ErrorKind::Config("page_size must be at least 1".to_owned()).into());
        }
        Ok(settings)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }
}

/// Rocket's default figment with `.env` loaded and `DATABASE_URL` honoured.
pub fn figment() -> Figment {
    dotenv().ok();
    rocket::Config::figment().merge(Env::raw().only(&["database_url"]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let figment = Figment::from(("cache_ttl", 0));
        let settings = Settings::from_figment(&figment).unwrap();
        assert_eq!(settings.cache_ttl, 0);
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.cache_max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(settings.database_url, "yatube.sqlite3");
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let figment = Figment::from(("page_size", 0));
        assert!(Settings::from_figment(&figment).is_err());
    }
}
