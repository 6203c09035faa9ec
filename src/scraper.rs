//! Finding out what a station is playing right now.
//!
//! Each station may need its own scraping logic; the engine only sees the
//! [`Scraper`] trait. [`IcecastScraper`] covers stations that expose an
//! Icecast `status-json.xsl` endpoint.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{station::Station, track::NowPlaying};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("station page unavailable: {0}")]
    Unavailable(String),

    #[error("could not read now playing info: {0}")]
    Parse(String),
}

pub trait Scraper {
    /// Current song of the station. Blank fields are not an error.
    fn snapshot(&self, station: &Station) -> Result<NowPlaying, ScrapeError>;
}

pub struct IcecastScraper {
    http: Client,
}

impl IcecastScraper {
    pub fn new() -> Result<Self, ScrapeError> {
        let http = Client::builder()
            .user_agent(concat!("radiodeck/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| ScrapeError::Unavailable(e.to_string()))?;
        Ok(Self { http })
    }
}

impl Scraper for IcecastScraper {
    fn snapshot(&self, station: &Station) -> Result<NowPlaying, ScrapeError> {
        let response = self
            .http
            .get(&station.web_address)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ScrapeError::Unavailable(e.to_string()))?;
        let status: Value = response
            .json()
            .map_err(|e| ScrapeError::Parse(e.to_string()))?;
        parse_icecast_status(&status)
    }
}

/// Reads the first mount of an Icecast status document.
///
/// Uses the `artist` field when the server provides it, otherwise splits
/// `title` on the first " - ".
pub fn parse_icecast_status(status: &Value) -> Result<NowPlaying, ScrapeError> {
    let source = &status["icestats"]["source"];
    let source = match source {
        Value::Array(mounts) => mounts
            .first()
            .ok_or_else(|| ScrapeError::Parse("no mounts in status".into()))?,
        Value::Object(_) => source,
        // server up, nothing streaming
        Value::Null if status["icestats"].is_object() => return Ok(NowPlaying::default()),
        _ => return Err(ScrapeError::Parse("missing icestats".into())),
    };

    let text = |key: &str| source[key].as_str().unwrap_or_default().trim().to_string();
    let title = text("title");
    let artist = text("artist");

    if !artist.is_empty() {
        return Ok(NowPlaying::new(artist, title, text("album")));
    }

    Ok(match title.split_once(" - ") {
        Some((artist, title)) => NowPlaying::new(artist.trim(), title.trim(), ""),
        None => NowPlaying::new("", title, ""),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn splits_combined_title() {
        let status = json!({
            "icestats": {"source": {"title": "Artist A - Song B", "listeners": 3}}
        });

        let now = parse_icecast_status(&status).unwrap();

        assert_eq!(now, NowPlaying::new("Artist A", "Song B", ""));
    }

    #[test]
    fn prefers_separate_artist_field() {
        let status = json!({"icestats": {"source": [
            {"artist": "Sonic Youth", "title": "Teen Age Riot - Live", "album": "Daydream Nation"},
            {"title": "Other - Mount"}
        ]}});

        let now = parse_icecast_status(&status).unwrap();

        assert_eq!(now, NowPlaying::new("Sonic Youth", "Teen Age Riot - Live", "Daydream Nation"));
    }

    #[test]
    fn title_without_separator_is_blank_artist() {
        let status = json!({"icestats": {"source": {"title": "Station jingle"}}});

        let now = parse_icecast_status(&status).unwrap();

        assert!(now.is_blank());
    }

    #[test]
    fn idle_server_is_blank_not_error() {
        let status = json!({"icestats": {"admin": "icemaster@localhost"}});

        assert!(parse_icecast_status(&status).unwrap().is_blank());
    }

    #[test]
    fn non_icecast_document_is_error() {
        assert!(parse_icecast_status(&json!({"now": "playing"})).is_err());
    }
}
