//! Boundary to the external video platform.
//!
//! The reconciliation engine only talks to these traits; the YouTube
//! client is one implementation, test fakes are others.

pub mod youtube;

use thiserror::Error;

use crate::domain::video::VideoId;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("video service quota exceeded")]
    QuotaExceeded,

    #[error("playlist is full")]
    CapacityExceeded,

    #[error("video service unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected response from video service: {0}")]
    Parse(String),
}

/// Finding videos
pub trait VideoSearch {
    /// best matching video for a free text query, `None` when nothing matches
    fn search_best_match(&self, query: &str) -> Result<Option<VideoId>, GatewayError>;

    /// whether the video still exists (was not taken down)
    fn video_exists(&self, video: &VideoId) -> Result<bool, GatewayError>;
}

/// Mutating a capacity bounded external playlist
pub trait PlaylistGateway {
    fn append(&self, video: &VideoId, playlist: &str) -> Result<(), GatewayError>;

    /// Removes up to `count` of the oldest entries, returns how many were removed.
    fn trim_oldest(&self, playlist: &str, count: usize) -> Result<usize, GatewayError>;
}
