use std::path::Path;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, types::Type};

use crate::{
    config::Database,
    storage::{error::StoreError, schema},
};

pub type MicrosSinceUnix = i64;

fn open_in_memory() -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open_in_memory()
}

fn open_from_file(path: &Path) -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open(path)
}

/// opens a connection described by the config and makes sure the schema exists
pub fn open(config: &Database) -> Result<rusqlite::Connection, StoreError> {
    let db = if config.in_memory {
        open_in_memory()?
    } else {
        let path = config
            .path
            .as_ref()
            .ok_or_else(|| StoreError::Internal(anyhow!("database path is not configured")))?;
        open_from_file(path)?
    };
    schema::init(&db)?;
    Ok(db)
}

/// converts time to number of microseconds since unix epoch
pub fn datetime_to_micros(time: DateTime<Utc>) -> MicrosSinceUnix {
    time.timestamp_micros()
}

/// converts number of microseconds since unix epoch to utc date time
pub fn micros_to_datetime(since_unix: MicrosSinceUnix) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(since_unix)
        .ok_or(anyhow!("failed to convert {since_unix} µs timestamp to datetime"))
}

/// reads a microsecond timestamp column
pub(crate) fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: MicrosSinceUnix = row.get(idx)?;
    micros_to_datetime(micros)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, e.into()))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::{
        config::Database,
        storage::{
            db::{datetime_to_micros, micros_to_datetime, open},
            schema,
        },
    };

    #[test]
    fn open_in_memory_db_initializes_schema() {
        let db = open(&Database::in_memory()).unwrap();

        let mut stmt = db
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();

        for table in schema::ALL_TABLES {
            assert!(tables.contains(&table.to_string()));
        }
    }

    #[test]
    fn open_on_disk_twice_keeps_data() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Database {
            in_memory: false,
            path: Some(dir.path().join("radio.db")),
        };

        {
            let db = open(&config)?;
            db.execute("INSERT INTO artist (artist_name) VALUES ('Blur')", [])?;
        }

        let db = open(&config)?;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM artist", [], |row| row.get(0))?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[test]
    fn timestamps_keep_microseconds() -> anyhow::Result<()> {
        let time = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let micros = datetime_to_micros(time);
        assert_eq!(micros % 1_000_000, 123_456);
        assert_eq!(micros_to_datetime(micros)?, time);
        Ok(())
    }
}
