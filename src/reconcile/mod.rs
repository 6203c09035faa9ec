//! Per-station reconciliation: decide whether what a station plays now is a
//! new play, record it, and mirror it to the station's external playlist.

pub mod scheduler;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    domain::{station::StationSnapshot, track::NowPlaying, video::VideoId},
    gateway::{GatewayError, PlaylistGateway, VideoSearch},
    reconcile::scheduler::Shutdown,
    scraper::{ScrapeError, Scraper},
    storage::{
        error::StoreError,
        operations::{Commit, RecordedPlay, Store},
    },
};

/// entries dropped from a full external playlist before retrying
pub const DEFAULT_TRIM_COUNT: usize = 100;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Inactive,
    Blank,
    IgnoredArtist,
    IgnoredTitle,
    Unchanged,
}

/// How mirroring a recorded play to the external playlist went
#[derive(Debug)]
pub enum Mirror {
    Appended,
    /// the playlist was full, old entries were trimmed and the append retried
    AppendedAfterTrim { trimmed: usize },
    /// the station has no external playlist
    NoPlaylist,
    Failed(GatewayError),
}

/// Terminal state of one station in one cycle
#[derive(Debug)]
pub enum Outcome {
    Skipped(SkipReason),
    /// no video found, nothing written
    Unresolved,
    Recorded {
        play: RecordedPlay,
        video: VideoId,
        mirror: Mirror,
    },
    /// nothing written
    Failed(CycleError),
}

impl Outcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Outcome::Recorded { .. })
    }
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub outcomes: Vec<(String, Outcome)>,
}

impl CycleReport {
    pub fn recorded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_recorded()).count()
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc>>;

pub struct Engine<'a> {
    store: &'a Store,
    scraper: &'a dyn Scraper,
    search: &'a dyn VideoSearch,
    playlist: &'a dyn PlaylistGateway,
    trim_count: usize,
    clock: Clock,
}

impl<'a> Engine<'a> {
    pub fn new(
        store: &'a Store,
        scraper: &'a dyn Scraper,
        search: &'a dyn VideoSearch,
        playlist: &'a dyn PlaylistGateway,
    ) -> Self {
        Self {
            store,
            scraper,
            search,
            playlist,
            trim_count: DEFAULT_TRIM_COUNT,
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_trim_count(mut self, trim_count: usize) -> Self {
        self.trim_count = trim_count;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Reconciles every station once, in order.
    ///
    /// A station's failure, including a malformed stored row, never stops
    /// the others. Only failing to read the station list is an error. Stops before the next station once
    /// `shutdown` is triggered.
    pub fn run_cycle(&self, shutdown: &Shutdown) -> Result<CycleReport, StoreError> {
        let stations = self.store.station_snapshots()?;
        let mut report = CycleReport::default();

        for (name, snapshot) in stations {
            if shutdown.is_triggered() {
                log::info!("shutdown requested, stopping cycle early");
                break;
            }
            let outcome = match snapshot {
                Ok(snapshot) => self.reconcile_station(&snapshot),
                Err(e) => Outcome::Failed(e.into()),
            };
            log_outcome(&name, &outcome);
            report.outcomes.push((name, outcome));
        }

        Ok(report)
    }

    pub fn reconcile_station(&self, snapshot: &StationSnapshot) -> Outcome {
        let station = &snapshot.station;
        if !station.active {
            return Outcome::Skipped(SkipReason::Inactive);
        }

        let song = match self.scraper.snapshot(station) {
            Ok(song) => song,
            Err(e) => return Outcome::Failed(e.into()),
        };
        log::debug!(
            "{}: now '{}' by '{}', last '{}' by '{}'",
            station.name,
            song.title,
            song.artist,
            snapshot.last_title,
            snapshot.last_artist
        );

        if let Some(reason) = skip_reason(snapshot, &song) {
            return Outcome::Skipped(reason);
        }

        let video = match self.resolve_video(&song) {
            Ok(Some(video)) => video,
            Ok(None) => return Outcome::Unresolved,
            Err(e) => return Outcome::Failed(e),
        };

        let play = match self.store.record_play(
            station.id,
            &song,
            &video.to_link(),
            (self.clock)(),
            Commit::Now,
        ) {
            Ok(play) => play,
            Err(e) => return Outcome::Failed(e.into()),
        };

        // local history is kept whatever happens to the mirror
        let mirror = self.mirror(&video, &station.playlist_handle);
        Outcome::Recorded { play, video, mirror }
    }

    /// Video for the song: the stored one if it is still up, else a fresh search.
    fn resolve_video(&self, song: &NowPlaying) -> Result<Option<VideoId>, CycleError> {
        match self.store.find_track_link(&song.artist, &song.album, &song.title) {
            Ok(link) => match VideoId::parse(&link) {
                Ok(video) => {
                    if self.search.video_exists(&video)? {
                        return Ok(Some(video));
                    }
                    log::info!("video {video} was taken down, searching again");
                }
                Err(_) => log::debug!("stored link '{link}' is unusable, searching again"),
            },
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let query = format!("{} {}", song.artist, song.title);
        Ok(self.search.search_best_match(&query)?)
    }

    fn mirror(&self, video: &VideoId, playlist: &str) -> Mirror {
        if playlist.is_empty() {
            return Mirror::NoPlaylist;
        }

        match self.playlist.append(video, playlist) {
            Ok(()) => Mirror::Appended,
            Err(GatewayError::CapacityExceeded) => {
                log::info!("playlist {playlist} is full, removing {} old videos", self.trim_count);
                let trimmed = match self.playlist.trim_oldest(playlist, self.trim_count) {
                    Ok(trimmed) => trimmed,
                    Err(e) => return Mirror::Failed(e),
                };
                match self.playlist.append(video, playlist) {
                    Ok(()) => Mirror::AppendedAfterTrim { trimmed },
                    Err(e) => Mirror::Failed(e),
                }
            }
            Err(e) => Mirror::Failed(e),
        }
    }
}

fn skip_reason(snapshot: &StationSnapshot, song: &NowPlaying) -> Option<SkipReason> {
    let station = &snapshot.station;
    if song.is_blank() {
        Some(SkipReason::Blank)
    } else if station.ignore_artists.contains(&song.artist) {
        Some(SkipReason::IgnoredArtist)
    } else if station.ignore_titles.contains(&song.title) {
        Some(SkipReason::IgnoredTitle)
    } else if song.artist == snapshot.last_artist && song.title == snapshot.last_title {
        Some(SkipReason::Unchanged)
    } else {
        None
    }
}

fn log_outcome(station: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Skipped(reason) => log::info!("{station}: skipped ({reason:?})"),
        Outcome::Unresolved => log::info!("{station}: no video found, nothing recorded"),
        Outcome::Recorded { play, video, mirror } => {
            log::info!("{station}: recorded play #{} with video {video}", play.entry_id);
            if let Mirror::Failed(e) = mirror {
                log::warn!("{station}: could not add {video} to the external playlist: {e}");
            }
        }
        Outcome::Failed(e) => log::warn!("{station}: cycle failed: {e}"),
    }
}

#[cfg(test)]
pub(crate) mod fakes;
