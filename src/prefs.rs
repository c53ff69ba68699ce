use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::mushaf;

const KEY_LAST_PAGE: &str = "noor-last-page";
const KEY_READING_MODE: &str = "noor-reading-mode";
const KEY_DARK_MODE: &str = "noor-dark-mode";

/// The persisted preference triple. Every field re-defaults independently
/// when its stored value is absent or unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub last_page: u16,
    pub reading_mode: bool,
    pub dark_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            last_page: 1,
            reading_mode: false,
            dark_mode: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("preference store still in use")]
    StillInUse,
}

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("prefs: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("prefs: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("prefs: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("prefs: set WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("prefs: set busy timeout")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS preferences (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
)",
            [],
        )
        .context("prefs: create table")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| StoreError::StillInUse)?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("prefs: close connection")
    }

    /// Reads the three keys independently; a key that is missing or does
    /// not parse takes its documented default.
    pub fn load(&self) -> Result<Preferences> {
        let conn = self.conn.lock();
        let defaults = Preferences::default();
        Ok(Preferences {
            last_page: read_key(&conn, KEY_LAST_PAGE)?
                .and_then(|value| value.parse::<i64>().ok())
                .filter(|page| mushaf::is_valid_page(*page))
                .map(|page| page as u16)
                .unwrap_or(defaults.last_page),
            reading_mode: read_key(&conn, KEY_READING_MODE)?
                .map(|value| value == "true")
                .unwrap_or(defaults.reading_mode),
            dark_mode: read_key(&conn, KEY_DARK_MODE)?
                .map(|value| value == "true")
                .unwrap_or(defaults.dark_mode),
        })
    }

    /// Writes all three keys. The writes are independent; there is no
    /// cross-key transaction, and a crash between them is acceptable
    /// because every key re-defaults safely on the next load.
    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        let conn = self.conn.lock();
        write_key(&conn, KEY_LAST_PAGE, &prefs.last_page.to_string())?;
        write_key(&conn, KEY_READING_MODE, bool_value(prefs.reading_mode))?;
        write_key(&conn, KEY_DARK_MODE, bool_value(prefs.dark_mode))?;
        Ok(())
    }
}

fn bool_value(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}

fn read_key(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM preferences WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("prefs: read {}", key))
}

fn write_key(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO preferences (key, value) VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .with_context(|| format!("prefs: write {}", key))?;
    Ok(())
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("noor-tui").join("state.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &tempfile::TempDir) -> Store {
        Store::open(Options {
            path: Some(dir.path().join("state.db")),
        })
        .unwrap()
    }

    #[test]
    fn round_trips_the_preference_triple() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        let prefs = Preferences {
            last_page: 42,
            reading_mode: true,
            dark_mode: false,
        };
        store.save(&prefs).unwrap();
        assert_eq!(store.load().unwrap(), prefs);
        store.close().unwrap();
    }

    #[test]
    fn loads_defaults_from_an_empty_store() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        assert_eq!(
            store.load().unwrap(),
            Preferences {
                last_page: 1,
                reading_mode: false,
                dark_mode: false,
            }
        );
    }

    #[test]
    fn unreadable_values_default_independently() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        {
            let conn = store.conn.lock();
            write_key(&conn, KEY_LAST_PAGE, "not-a-number").unwrap();
            write_key(&conn, KEY_READING_MODE, "TRUE").unwrap();
            write_key(&conn, KEY_DARK_MODE, "true").unwrap();
        }
        let prefs = store.load().unwrap();
        assert_eq!(prefs.last_page, 1);
        assert!(!prefs.reading_mode, "only the exact token counts as true");
        assert!(prefs.dark_mode);
    }

    #[test]
    fn out_of_bounds_pages_default_to_one() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        {
            let conn = store.conn.lock();
            write_key(&conn, KEY_LAST_PAGE, "9999").unwrap();
        }
        assert_eq!(store.load().unwrap().last_page, 1);
    }

    #[test]
    fn saves_overwrite_previous_values() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store
            .save(&Preferences {
                last_page: 10,
                reading_mode: true,
                dark_mode: true,
            })
            .unwrap();
        store
            .save(&Preferences {
                last_page: 11,
                reading_mode: false,
                dark_mode: true,
            })
            .unwrap();
        let prefs = store.load().unwrap();
        assert_eq!(prefs.last_page, 11);
        assert!(!prefs.reading_mode);
        assert!(prefs.dark_mode);
    }
}
