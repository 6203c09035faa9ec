//! Station registry: station metadata keyed by name

use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    domain::station::{IgnoreList, NewStation, Station, StationSnapshot},
    storage::{
        error::{Lookup, StoreError},
        operations::{Commit, Store, latest_tracks},
    },
};

const STATION_SELECT: &str = "SELECT id, station_name, web_address, ignore_artists,
        ignore_titles, playlist_handle, active
    FROM station";

/// station row before the ignore lists are decoded
struct StationRow {
    id: i64,
    name: String,
    web_address: String,
    ignore_artists: String,
    ignore_titles: String,
    playlist_handle: String,
    active: bool,
}

impl StationRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            web_address: row.get(2)?,
            ignore_artists: row.get(3)?,
            ignore_titles: row.get(4)?,
            playlist_handle: row.get(5)?,
            active: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Station, StoreError> {
        Ok(Station {
            id: self.id,
            name: self.name,
            web_address: self.web_address,
            ignore_artists: IgnoreList::from_json(&self.ignore_artists)?,
            ignore_titles: IgnoreList::from_json(&self.ignore_titles)?,
            playlist_handle: self.playlist_handle,
            active: self.active,
        })
    }
}

impl Store {
    /// Creates a station. Creating a name that already exists returns the
    /// existing id and leaves the stored station untouched.
    pub fn create_station(&self, station: &NewStation, commit: Commit) -> Result<i64, StoreError> {
        let ignore_artists = station
            .ignore_artists
            .iter()
            .cloned()
            .collect::<IgnoreList>()
            .to_json()?;
        let ignore_titles = station
            .ignore_titles
            .iter()
            .cloned()
            .collect::<IgnoreList>()
            .to_json()?;

        self.write(commit, |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO station
                    (station_name, web_address, ignore_artists, ignore_titles, playlist_handle, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1)",
                params![
                    station.name,
                    station.web_address,
                    ignore_artists,
                    ignore_titles,
                    station.playlist_handle
                ],
            )?;
            station_id(conn, &station.name)
        })
    }

    /// Lists stations with their last recorded song, optionally only the
    /// one with the given name.
    pub fn list_stations(
        &self,
        filter_name: Option<&str>,
    ) -> Result<Vec<StationSnapshot>, StoreError> {
        self.read(|conn| {
            snapshots(conn, filter_name)?
                .into_iter()
                .map(|(_, snapshot)| snapshot)
                .collect()
        })
    }

    /// Every station by name, each decoded on its own: a malformed row
    /// only fails its own entry.
    pub fn station_snapshots(
        &self,
    ) -> Result<Vec<(String, Result<StationSnapshot, StoreError>)>, StoreError> {
        self.read(|conn| snapshots(conn, None))
    }

    pub fn station(&self, name: &str) -> Result<StationSnapshot, StoreError> {
        self.list_stations(Some(name))?
            .pop()
            .ok_or_else(|| StoreError::NotFound(Lookup::Station(name.to_string())))
    }

    pub fn station_id(&self, name: &str) -> Result<i64, StoreError> {
        self.read(|conn| station_id(conn, name))
    }

    pub fn station_by_playlist_handle(&self, handle: &str) -> Result<Station, StoreError> {
        self.read(|conn| {
            conn.query_row(
                &format!("{STATION_SELECT} WHERE playlist_handle = ?1 LIMIT 1"),
                params![handle],
                StationRow::from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(Lookup::PlaylistHandle(handle.to_string())))?
            .decode()
        })
    }

    pub fn set_station_active(
        &self,
        name: &str,
        active: bool,
        commit: Commit,
    ) -> Result<(), StoreError> {
        self.write(commit, |conn| {
            let updated = conn.execute(
                "UPDATE station SET active = ?1 WHERE station_name = ?2",
                params![active, name],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(Lookup::Station(name.to_string())));
            }
            Ok(())
        })
    }

    /// The (artist, title) most recently recorded for the station
    pub fn last_played(&self, station_id: i64) -> Result<Option<(String, String)>, StoreError> {
        self.read(|conn| last_played(conn, station_id))
    }

    /// Appends to a station's ignore lists. Returns whether anything changed.
    pub fn add_ignores(
        &self,
        station_id: i64,
        artist: Option<&str>,
        title: Option<&str>,
        commit: Commit,
    ) -> Result<bool, StoreError> {
        self.write(commit, |conn| add_ignores(conn, station_id, artist, title))
    }
}

fn snapshots(
    conn: &Connection,
    filter_name: Option<&str>,
) -> Result<Vec<(String, Result<StationSnapshot, StoreError>)>, StoreError> {
    let rows = {
        let mut stmt = conn.prepare(&format!(
            "{STATION_SELECT} WHERE ?1 IS NULL OR station_name = ?1 ORDER BY id"
        ))?;
        stmt.query_map(params![filter_name], StationRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            let name = row.name.clone();
            (name, snapshot(conn, row))
        })
        .collect())
}

fn snapshot(conn: &Connection, row: StationRow) -> Result<StationSnapshot, StoreError> {
    let station = row.decode()?;
    let (last_artist, last_title) = last_played(conn, station.id)?.unwrap_or_default();
    Ok(StationSnapshot {
        station,
        last_artist,
        last_title,
    })
}

pub(crate) fn station_id(conn: &Connection, name: &str) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT id FROM station WHERE station_name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(Lookup::Station(name.to_string())))
}

fn last_played(conn: &Connection, station_id: i64) -> Result<Option<(String, String)>, StoreError> {
    Ok(latest_tracks(conn, station_id, 1)?
        .pop()
        .map(|track| (track.artist, track.title)))
}

pub(crate) fn add_ignores(
    conn: &Connection,
    station_id: i64,
    artist: Option<&str>,
    title: Option<&str>,
) -> Result<bool, StoreError> {
    let row = conn
        .query_row(
            &format!("{STATION_SELECT} WHERE id = ?1"),
            params![station_id],
            StationRow::from_row,
        )
        .optional()?
        .ok_or(StoreError::NotFound(Lookup::StationId(station_id)))?;
    let mut station = row.decode()?;

    let mut changed = false;
    if let Some(artist) = artist {
        changed |= station.ignore_artists.insert(artist);
    }
    if let Some(title) = title {
        changed |= station.ignore_titles.insert(title);
    }

    if changed {
        conn.execute(
            "UPDATE station SET ignore_artists = ?1, ignore_titles = ?2 WHERE id = ?3",
            params![
                station.ignore_artists.to_json()?,
                station.ignore_titles.to_json()?,
                station_id
            ],
        )?;
    }
    Ok(changed)
}
