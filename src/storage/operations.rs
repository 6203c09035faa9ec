use chrono::{DateTime, Utc};
use parking_lot::ReentrantMutex;
use rusqlite::{Connection, OptionalExtension, ffi, params};
use serde::Serialize;

use crate::{
    config,
    domain::{
        track::{LatestTracks, NowPlaying, TrackInfo, TrackSnapshot},
        video::canonical_link,
    },
    storage::{
        db::{self, datetime_to_micros, time_column},
        error::{Lookup, StoreError},
    },
};

/// When a mutating operation should become durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// commit right away, together with anything deferred before
    Now,
    /// leave it in the open batch until [`Store::checkpoint`] or the next `Now`
    Defer,
}

/// Ids touched by recording one play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedPlay {
    pub artist_id: i64,
    pub album_id: i64,
    pub track_id: i64,
    pub entry_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub removed_entries: usize,
    pub removed_album: bool,
    pub removed_artist: bool,
}

/// Main structure that implements all storage logic.
///
/// Every public operation runs under one reentrant lock, so
/// multi-statement sequences like get-or-create never interleave.
pub struct Store {
    conn: ReentrantMutex<Connection>,
}

impl Store {
    /// when called, opens a data base connection
    pub fn open(db_config: &config::Database) -> Result<Self, StoreError> {
        let conn = db::open(db_config)?;
        Ok(Self::from_existing_conn(conn))
    }

    pub fn from_existing_conn(conn: Connection) -> Self {
        Self {
            conn: ReentrantMutex::new(conn),
        }
    }

    /// commits anything left over and closes the connection
    pub fn close(self) -> Result<(), StoreError> {
        self.checkpoint()?;
        let conn = self.conn.into_inner();
        conn.close().map_err(|(_, e)| StoreError::Database(e))
    }

    /// Runs a read under the store lock
    pub(crate) fn read<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        op(&conn)
    }

    /// Runs a write under the store lock.
    ///
    /// The operation is atomic: on error everything it did is rolled back,
    /// while earlier deferred writes stay in the batch.
    pub(crate) fn write<T>(
        &self,
        commit: Commit,
        op: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        if commit == Commit::Defer && conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        conn.execute_batch("SAVEPOINT store_op")?;

        match op(&conn) {
            Ok(value) => {
                conn.execute_batch("RELEASE store_op")?;
                if commit == Commit::Now && !conn.is_autocommit() {
                    conn.execute_batch("COMMIT")?;
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK TO store_op; RELEASE store_op")
                {
                    log::warn!("failed to roll back store operation: {rollback}");
                }
                Err(err)
            }
        }
    }

    /// Makes every deferred write durable.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    pub fn get_or_create_artist(&self, name: &str, commit: Commit) -> Result<i64, StoreError> {
        self.write(commit, |conn| artist_id(conn, name))
    }

    pub fn get_or_create_album(
        &self,
        artist_id: i64,
        name: &str,
        commit: Commit,
    ) -> Result<i64, StoreError> {
        self.write(commit, |conn| album_id(conn, artist_id, name))
    }

    /// Creates a track, or updates the links of an existing one.
    ///
    /// Identity is (name, album, artist); links are plain metadata.
    pub fn upsert_track(
        &self,
        name: &str,
        album_id: i64,
        artist_id: i64,
        yt_link: &str,
        fs_link: &str,
        commit: Commit,
    ) -> Result<i64, StoreError> {
        let yt_link = canonical_link(yt_link)?;
        self.write(commit, |conn| {
            upsert_track(conn, name, album_id, artist_id, &yt_link, fs_link)
        })
    }

    /// Records one play of a track at a station.
    ///
    /// Fails with [`StoreError::DuplicateEntry`] when the exact
    /// (track, station, play_time) triple is already stored.
    pub fn add_playlist_entry(
        &self,
        station_id: i64,
        track_id: i64,
        play_time: DateTime<Utc>,
        commit: Commit,
    ) -> Result<i64, StoreError> {
        self.write(commit, |conn| {
            add_playlist_entry(conn, station_id, track_id, play_time)
        })
    }

    /// Artist, album, track and playlist entry in one atomic step
    pub fn record_play(
        &self,
        station_id: i64,
        song: &NowPlaying,
        yt_link: &str,
        play_time: DateTime<Utc>,
        commit: Commit,
    ) -> Result<RecordedPlay, StoreError> {
        let yt_link = canonical_link(yt_link)?;
        self.write(commit, |conn| {
            let artist_id = artist_id(conn, &song.artist)?;
            let album_id = album_id(conn, artist_id, &song.album)?;
            // keep a local file link if someone set one before
            let fs_link: String = conn
                .query_row(
                    "SELECT filesystem_link FROM track
                     WHERE track_name = ?1 AND album_id = ?2 AND artist_id = ?3",
                    params![song.title, album_id, artist_id],
                    |row| row.get(0),
                )
                .optional()?
                .unwrap_or_default();
            let track_id =
                upsert_track(conn, &song.title, album_id, artist_id, &yt_link, &fs_link)?;
            let entry_id = add_playlist_entry(conn, station_id, track_id, play_time)?;
            Ok(RecordedPlay {
                artist_id,
                album_id,
                track_id,
                entry_id,
            })
        })
    }

    /// Latest plays of a station, newest first.
    ///
    /// `n == 1` yields [`LatestTracks::Single`] and fails with `NotFound` on an
    /// empty history; any other `n` yields a possibly short list. An unknown
    /// station is `NotFound(Lookup::StationId)` for every `n`.
    pub fn latest_tracks(&self, station_id: i64, n: usize) -> Result<LatestTracks, StoreError> {
        self.read(|conn| {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM station WHERE id = ?1",
                    params![station_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !exists {
                return Err(StoreError::NotFound(Lookup::StationId(station_id)));
            }

            let mut tracks = latest_tracks(conn, station_id, n)?;
            if n == 1 {
                tracks
                    .pop()
                    .map(LatestTracks::Single)
                    .ok_or(StoreError::NotFound(Lookup::LatestTrack(station_id)))
            } else {
                Ok(LatestTracks::Many(tracks))
            }
        })
    }

    /// Exact lookup of a stored video link, to avoid searching again.
    pub fn find_track_link(
        &self,
        artist: &str,
        album: &str,
        title: &str,
    ) -> Result<String, StoreError> {
        self.find_track(artist, album, title).map(|track| track.youtube_link)
    }

    pub fn find_track(
        &self,
        artist: &str,
        album: &str,
        title: &str,
    ) -> Result<TrackInfo, StoreError> {
        self.read(|conn| {
            conn.query_row(
                &format!(
                    "{TRACK_INFO_SELECT}
                     WHERE t.track_name = ?1 AND al.album_name = ?2 AND ar.artist_name = ?3
                     LIMIT 1"
                ),
                params![title, album, artist],
                track_info_row,
            )
            .optional()?
            .ok_or_else(|| {
                StoreError::NotFound(Lookup::TrackIdentity {
                    artist: artist.to_string(),
                    album: album.to_string(),
                    title: title.to_string(),
                })
            })
        })
    }

    pub fn track_info(&self, track_id: i64) -> Result<TrackInfo, StoreError> {
        self.read(|conn| track_info(conn, track_id))
    }

    /// all tracks pointing at the same video
    pub fn find_tracks_by_link(&self, link: &str) -> Result<Vec<TrackInfo>, StoreError> {
        let link = canonical_link(link)?;
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{TRACK_INFO_SELECT} WHERE t.youtube_link = ?1 ORDER BY t.id"
            ))?;
            let tracks = stmt
                .query_map(params![link], track_info_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tracks)
        })
    }

    /// Substring search over the catalogue. Empty parts match everything.
    pub fn search_tracks(
        &self,
        artist: &str,
        album: &str,
        title: &str,
        link_prefix: &str,
    ) -> Result<Vec<TrackInfo>, StoreError> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{TRACK_INFO_SELECT}
                 WHERE t.track_name LIKE ?1 ESCAPE '\\'
                   AND al.album_name LIKE ?2 ESCAPE '\\'
                   AND ar.artist_name LIKE ?3 ESCAPE '\\'
                   AND t.youtube_link LIKE ?4 ESCAPE '\\'
                 ORDER BY ar.artist_name, al.album_name, t.track_name"
            ))?;
            let tracks = stmt
                .query_map(
                    params![
                        format!("%{}%", escape_like(title)),
                        format!("%{}%", escape_like(album)),
                        format!("%{}%", escape_like(artist)),
                        format!("{}%", escape_like(link_prefix)),
                    ],
                    track_info_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tracks)
        })
    }

    pub fn update_track_link(
        &self,
        track_id: i64,
        new_link: &str,
        commit: Commit,
    ) -> Result<(), StoreError> {
        let link = canonical_link(new_link)?;
        self.write(commit, |conn| {
            let updated = conn.execute(
                "UPDATE track SET youtube_link = ?1 WHERE id = ?2",
                params![link, track_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(Lookup::Track(track_id)));
            }
            Ok(())
        })
    }

    /// Removes a track with all of its plays, then its album and artist
    /// if nothing else refers to them.
    pub fn purge_track_family(
        &self,
        track_id: i64,
        commit: Commit,
    ) -> Result<PurgeReport, StoreError> {
        self.write(commit, |conn| purge_track_family(conn, track_id))
    }
}

const TRACK_INFO_SELECT: &str = "SELECT t.id, t.track_name, ar.artist_name, al.album_name,
        t.artist_id, t.album_id, t.youtube_link, t.filesystem_link
    FROM track t
    JOIN artist ar ON t.artist_id = ar.id
    JOIN album al ON t.album_id = al.id";

fn track_info_row(row: &rusqlite::Row) -> rusqlite::Result<TrackInfo> {
    Ok(TrackInfo {
        track_id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        album: row.get(3)?,
        artist_id: row.get(4)?,
        album_id: row.get(5)?,
        youtube_link: row.get(6)?,
        filesystem_link: row.get(7)?,
    })
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// Insert-if-absent first, then read back: two writers with the same name
// converge on one row.
fn artist_id(conn: &Connection, name: &str) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO artist (artist_name) VALUES (?1)",
        params![name],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM artist WHERE artist_name = ?1",
        params![name],
        |row| row.get(0),
    )?)
}

fn album_id(conn: &Connection, artist_id: i64, name: &str) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO album (album_name, artist_id) VALUES (?1, ?2)",
        params![name, artist_id],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM album WHERE album_name = ?1 AND artist_id = ?2",
        params![name, artist_id],
        |row| row.get(0),
    )?)
}

fn upsert_track(
    conn: &Connection,
    name: &str,
    album_id: i64,
    artist_id: i64,
    yt_link: &str,
    fs_link: &str,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO track (track_name, youtube_link, filesystem_link, album_id, artist_id)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (track_name, album_id, artist_id) DO UPDATE SET
             youtube_link = excluded.youtube_link,
             filesystem_link = excluded.filesystem_link",
        params![name, yt_link, fs_link, album_id, artist_id],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM track WHERE track_name = ?1 AND album_id = ?2 AND artist_id = ?3",
        params![name, album_id, artist_id],
        |row| row.get(0),
    )?)
}

fn add_playlist_entry(
    conn: &Connection,
    station_id: i64,
    track_id: i64,
    play_time: DateTime<Utc>,
) -> Result<i64, StoreError> {
    let inserted = conn.execute(
        "INSERT INTO playlist_entry (track_id, station_id, play_time) VALUES (?1, ?2, ?3)",
        params![track_id, station_id, datetime_to_micros(play_time)],
    );
    match inserted {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(StoreError::DuplicateEntry {
                track_id,
                station_id,
                play_time,
            })
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn latest_tracks(
    conn: &Connection,
    station_id: i64,
    n: usize,
) -> Result<Vec<TrackSnapshot>, StoreError> {
    let limit = i64::try_from(n).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(
        "SELECT t.id, t.track_name, ar.artist_name, al.album_name,
                t.youtube_link, t.filesystem_link, p.play_time
         FROM playlist_entry p
         JOIN track t ON p.track_id = t.id
         JOIN artist ar ON t.artist_id = ar.id
         JOIN album al ON t.album_id = al.id
         WHERE p.station_id = ?1
         ORDER BY p.play_time DESC, p.id DESC
         LIMIT ?2",
    )?;
    let tracks = stmt
        .query_map(params![station_id, limit], |row| {
            Ok(TrackSnapshot {
                track_id: row.get(0)?,
                title: row.get(1)?,
                artist: row.get(2)?,
                album: row.get(3)?,
                youtube_link: row.get(4)?,
                filesystem_link: row.get(5)?,
                play_time: time_column(row, 6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tracks)
}

pub(crate) fn track_info(conn: &Connection, track_id: i64) -> Result<TrackInfo, StoreError> {
    conn.query_row(
        &format!("{TRACK_INFO_SELECT} WHERE t.id = ?1"),
        params![track_id],
        track_info_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound(Lookup::Track(track_id)))
}

pub(crate) fn purge_track_family(
    conn: &Connection,
    track_id: i64,
) -> Result<PurgeReport, StoreError> {
    let track = track_info(conn, track_id)?;

    let removed_entries = conn.execute(
        "DELETE FROM playlist_entry WHERE track_id = ?1",
        params![track_id],
    )?;
    conn.execute("DELETE FROM track WHERE id = ?1", params![track_id])?;

    let removed_album = conn.execute(
        "DELETE FROM album WHERE id = ?1
         AND NOT EXISTS (SELECT 1 FROM track WHERE album_id = ?1)",
        params![track.album_id],
    )? > 0;

    let removed_artist = conn.execute(
        "DELETE FROM artist WHERE id = ?1
         AND NOT EXISTS (SELECT 1 FROM track WHERE artist_id = ?1)
         AND NOT EXISTS (SELECT 1 FROM album WHERE artist_id = ?1)",
        params![track.artist_id],
    )? > 0;

    Ok(PurgeReport {
        removed_entries,
        removed_album,
        removed_artist,
    })
}
