use rusqlite::Connection;

#[cfg(test)]
pub(crate) const ALL_TABLES: &[&str] = &["artist", "album", "track", "station", "playlist_entry"];

// play_time holds microseconds since the unix epoch, UTC.
// Foreign keys cascade id updates but never deletes: history goes away
// only through an explicit purge.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS artist (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    artist_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS album (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    album_name TEXT NOT NULL,
    artist_id INTEGER NOT NULL REFERENCES artist(id) ON UPDATE CASCADE,
    UNIQUE (album_name, artist_id)
);

CREATE TABLE IF NOT EXISTS track (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    track_name TEXT NOT NULL,
    youtube_link TEXT NOT NULL DEFAULT '',
    filesystem_link TEXT NOT NULL DEFAULT '',
    album_id INTEGER NOT NULL REFERENCES album(id) ON UPDATE CASCADE,
    artist_id INTEGER NOT NULL REFERENCES artist(id) ON UPDATE CASCADE,
    UNIQUE (track_name, album_id, artist_id)
);

CREATE INDEX IF NOT EXISTS track_youtube_link ON track (youtube_link);

CREATE TABLE IF NOT EXISTS station (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    station_name TEXT NOT NULL UNIQUE,
    web_address TEXT NOT NULL DEFAULT '',
    ignore_artists TEXT NOT NULL DEFAULT '[]',
    ignore_titles TEXT NOT NULL DEFAULT '[]',
    playlist_handle TEXT NOT NULL DEFAULT '',
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS playlist_entry (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    track_id INTEGER NOT NULL REFERENCES track(id) ON UPDATE CASCADE,
    station_id INTEGER NOT NULL REFERENCES station(id) ON UPDATE CASCADE,
    play_time INTEGER NOT NULL,
    UNIQUE (track_id, station_id, play_time)
);

CREATE INDEX IF NOT EXISTS playlist_entry_station_time
    ON playlist_entry (station_id, play_time DESC);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)
}
