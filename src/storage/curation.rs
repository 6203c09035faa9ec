//! Curation workflows run by a person, not by the polling loop

use rusqlite::params;
use serde::Serialize;

use crate::storage::{
    error::StoreError,
    operations::{Commit, PurgeReport, Store, purge_track_family, track_info},
    stations::add_ignores,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BanReport {
    /// stations whose ignore lists gained an entry
    pub stations_updated: usize,
    pub purge: PurgeReport,
}

impl Store {
    /// Bans a track whose video turned out to be wrong.
    ///
    /// Every station that ever played it learns to ignore its artist and
    /// title, then the track family is purged.
    pub fn ban_track(&self, track_id: i64, commit: Commit) -> Result<BanReport, StoreError> {
        self.write(commit, |conn| {
            let track = track_info(conn, track_id)?;

            let station_ids = {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT station_id FROM playlist_entry WHERE track_id = ?1",
                )?;
                stmt.query_map(params![track_id], |row| row.get::<_, i64>(0))?
                    .collect::<Result<Vec<_>, _>>()?
            };

            let mut stations_updated = 0;
            for station_id in station_ids {
                if add_ignores(conn, station_id, Some(&track.artist), Some(&track.title))? {
                    stations_updated += 1;
                }
            }

            let purge = purge_track_family(conn, track_id)?;
            log::info!(
                "banned '{}' by '{}': {} plays removed, {} stations updated",
                track.title,
                track.artist,
                purge.removed_entries,
                stations_updated
            );

            Ok(BanReport {
                stations_updated,
                purge,
            })
        })
    }
}
