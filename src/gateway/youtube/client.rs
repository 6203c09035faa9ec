//! YouTube HTTP client
//!
//! Read calls authenticate with the API key, playlist writes need an
//! OAuth access token. Obtaining and refreshing that token is left to
//! whoever writes the config.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;

use super::dto;
use crate::{
    config::YoutubeConfig,
    domain::video::VideoId,
    gateway::{GatewayError, PlaylistGateway, VideoSearch},
};

const USER_AGENT: &str = concat!("radiodeck/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// largest page the playlistItems endpoint hands out
const PAGE_SIZE: &str = "50";

const VIDEO_KIND: &str = "youtube#video";

const FULL_PLAYLIST_REASON: &str = "playlistContainsMaximumNumberOfVideos";
const FULL_PLAYLIST_MESSAGE: &str = "Playlist contains maximum number of items";
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded"];

pub struct YoutubeClient {
    http: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    max_results: u32,
}

impl YoutubeClient {
    pub fn new(config: &YoutubeConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
            max_results: config.search_max_results,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let request = self
            .http
            .get(self.url(path))
            .query(query)
            .query(&[("key", self.api_key.as_str())]);
        parse_json(request.send())
    }

    fn access_token(&self) -> Result<&str, GatewayError> {
        self.access_token
            .as_deref()
            .ok_or_else(|| GatewayError::Unavailable("playlist writes need an access token".into()))
    }

    /// ids of all items in the playlist, in playlist order
    fn playlist_item_ids(&self, playlist: &str) -> Result<Vec<String>, GatewayError> {
        let token = self.access_token()?;
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.url("playlistItems"))
                .bearer_auth(token)
                .query(&[
                    ("part", "id"),
                    ("playlistId", playlist),
                    ("maxResults", PAGE_SIZE),
                ]);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let page: dto::PlaylistItemListResponse = parse_json(request.send())?;
            ids.extend(page.items.into_iter().map(|item| item.id));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }
}

impl VideoSearch for YoutubeClient {
    fn search_best_match(&self, query: &str) -> Result<Option<VideoId>, GatewayError> {
        let max_results = self.max_results.to_string();
        let response: dto::SearchResponse = self.get(
            "search",
            &[
                ("part", "id"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("order", "relevance"),
            ],
        )?;
        Ok(best_video(response))
    }

    fn video_exists(&self, video: &VideoId) -> Result<bool, GatewayError> {
        // part=id costs nothing against the quota
        let response: dto::VideoListResponse =
            self.get("videos", &[("part", "id"), ("id", video.as_str())])?;
        Ok(response.page_info.total_results > 0)
    }
}

impl PlaylistGateway for YoutubeClient {
    fn append(&self, video: &VideoId, playlist: &str) -> Result<(), GatewayError> {
        let body = dto::PlaylistItemInsert {
            snippet: dto::PlaylistItemSnippet {
                playlist_id: playlist.to_string(),
                resource_id: dto::ResourceId {
                    kind: VIDEO_KIND.to_string(),
                    video_id: Some(video.as_str().to_string()),
                },
                position: 0,
            },
        };

        let sent = self
            .http
            .post(self.url("playlistItems"))
            .bearer_auth(self.access_token()?)
            .query(&[("part", "snippet")])
            .json(&body)
            .send();
        check_status(sent)
    }

    fn trim_oldest(&self, playlist: &str, count: usize) -> Result<usize, GatewayError> {
        // new videos go in at position 0, so the oldest sit at the end
        let mut ids = self.playlist_item_ids(playlist)?;
        ids.reverse();
        ids.truncate(count);

        let token = self.access_token()?;
        for id in &ids {
            let sent = self
                .http
                .delete(self.url("playlistItems"))
                .bearer_auth(token)
                .query(&[("id", id.as_str())])
                .send();
            check_status(sent)?;
        }

        log::info!("removed {} old videos from playlist {playlist}", ids.len());
        Ok(ids.len())
    }
}

fn best_video(response: dto::SearchResponse) -> Option<VideoId> {
    response
        .items
        .into_iter()
        .filter(|item| item.id.kind == VIDEO_KIND)
        .filter_map(|item| item.id.video_id)
        .find_map(|id| VideoId::parse(&id).ok())
}

fn parse_json<T: DeserializeOwned>(sent: reqwest::Result<Response>) -> Result<T, GatewayError> {
    let response = successful(sent)?;
    response
        .json::<T>()
        .map_err(|e| GatewayError::Parse(e.to_string()))
}

fn check_status(sent: reqwest::Result<Response>) -> Result<(), GatewayError> {
    successful(sent).map(|_| ())
}

fn successful(sent: reqwest::Result<Response>) -> Result<Response, GatewayError> {
    let response = sent.map_err(|e| GatewayError::Unavailable(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(classify_error(status.as_u16(), &body))
}

/// Maps an error response onto the gateway error taxonomy
fn classify_error(status: u16, body: &str) -> GatewayError {
    let Ok(parsed) = serde_json::from_str::<dto::ErrorResponse>(body) else {
        if status == 429 {
            return GatewayError::QuotaExceeded;
        }
        return GatewayError::Unavailable(format!("HTTP {status}"));
    };
    let error = parsed.error;

    let full = error.message.contains(FULL_PLAYLIST_MESSAGE)
        || error.errors.iter().any(|detail| {
            detail.reason == FULL_PLAYLIST_REASON || detail.message.contains(FULL_PLAYLIST_MESSAGE)
        });
    if full {
        return GatewayError::CapacityExceeded;
    }

    let quota = status == 429
        || error
            .errors
            .iter()
            .any(|detail| QUOTA_REASONS.contains(&detail.reason.as_str()));
    if quota {
        return GatewayError::QuotaExceeded;
    }

    GatewayError::Unavailable(format!("HTTP {}: {}", error.code, error.message))
}
