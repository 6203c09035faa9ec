//! In-process stand-ins for the scraper and the video service

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet, VecDeque},
};

use crate::{
    domain::{station::Station, track::NowPlaying, video::VideoId},
    gateway::{GatewayError, PlaylistGateway, VideoSearch},
    scraper::{ScrapeError, Scraper},
};

#[derive(Default)]
pub struct FakeScraper {
    songs: RefCell<HashMap<String, NowPlaying>>,
    failing: RefCell<HashSet<String>>,
    calls: Cell<usize>,
}

impl FakeScraper {
    pub fn set(&self, station: &str, song: NowPlaying) {
        self.songs.borrow_mut().insert(station.to_string(), song);
    }

    pub fn fail(&self, station: &str) {
        self.failing.borrow_mut().insert(station.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Scraper for FakeScraper {
    fn snapshot(&self, station: &Station) -> Result<NowPlaying, ScrapeError> {
        self.calls.set(self.calls.get() + 1);
        if self.failing.borrow().contains(&station.name) {
            return Err(ScrapeError::Unavailable(format!("{} is down", station.name)));
        }
        Ok(self
            .songs
            .borrow()
            .get(&station.name)
            .cloned()
            .unwrap_or_default())
    }
}

/// Records every call; answers come from what the test set up
#[derive(Default)]
pub struct FakeGateway {
    search_results: RefCell<HashMap<String, VideoId>>,
    searches: RefCell<Vec<String>>,
    search_error: Cell<bool>,
    live_videos: RefCell<HashSet<String>>,
    existence_checks: RefCell<Vec<String>>,
    append_script: RefCell<VecDeque<Result<(), GatewayError>>>,
    appends: RefCell<Vec<(String, String)>>,
    trims: RefCell<Vec<(String, usize)>>,
}

impl FakeGateway {
    pub fn add_search_result(&self, query: &str, video: &str) {
        self.search_results
            .borrow_mut()
            .insert(query.to_string(), VideoId::parse(video).unwrap());
    }

    /// every search fails with a quota error
    pub fn exhaust_quota(&self) {
        self.search_error.set(true);
    }

    pub fn add_live_video(&self, video: &str) {
        self.live_videos.borrow_mut().insert(video.to_string());
    }

    /// queues the result of the next append; unscripted appends succeed
    pub fn script_append(&self, result: Result<(), GatewayError>) {
        self.append_script.borrow_mut().push_back(result);
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.borrow().clone()
    }

    pub fn existence_checks(&self) -> Vec<String> {
        self.existence_checks.borrow().clone()
    }

    /// (video, playlist) pairs, including failed attempts
    pub fn appends(&self) -> Vec<(String, String)> {
        self.appends.borrow().clone()
    }

    pub fn trims(&self) -> Vec<(String, usize)> {
        self.trims.borrow().clone()
    }
}

impl VideoSearch for FakeGateway {
    fn search_best_match(&self, query: &str) -> Result<Option<VideoId>, GatewayError> {
        self.searches.borrow_mut().push(query.to_string());
        if self.search_error.get() {
            return Err(GatewayError::QuotaExceeded);
        }
        Ok(self.search_results.borrow().get(query).cloned())
    }

    fn video_exists(&self, video: &VideoId) -> Result<bool, GatewayError> {
        self.existence_checks
            .borrow_mut()
            .push(video.as_str().to_string());
        Ok(self.live_videos.borrow().contains(video.as_str()))
    }
}

impl PlaylistGateway for FakeGateway {
    fn append(&self, video: &VideoId, playlist: &str) -> Result<(), GatewayError> {
        self.appends
            .borrow_mut()
            .push((video.as_str().to_string(), playlist.to_string()));
        self.append_script.borrow_mut().pop_front().unwrap_or(Ok(()))
    }

    fn trim_oldest(&self, playlist: &str, count: usize) -> Result<usize, GatewayError> {
        self.trims.borrow_mut().push((playlist.to_string(), count));
        Ok(count)
    }
}
