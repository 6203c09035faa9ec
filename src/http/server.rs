use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    config::HttpConfig,
    domain::track::TrackSnapshot,
    http::error::ApiError,
    storage::operations::{Commit, Store},
};

/// how many tracks the player view and `latest` show by default
const DEFAULT_LATEST: usize = 5;

pub struct HttpServer {
    store: Arc<Store>,
    pub config: HttpConfig,
}

impl HttpServer {
    pub fn new(store: Arc<Store>, config: HttpConfig) -> Self {
        Self { store, config }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let result = rouille::router!(request,
            (GET) (/stations) => {
                self.list_stations()
            },
            (GET) (/stations/{name: String}/latest) => {
                self.latest(&name, request)
            },
            (GET) (/player/{handle: String}) => {
                self.player(&handle)
            },
            (GET) (/tracks/find) => {
                self.find_track(request)
            },
            (GET) (/tracks/search) => {
                self.search_tracks(request)
            },
            (GET) (/tracks/by-video/{video: String}) => {
                self.tracks_by_video(&video)
            },
            (GET) (/tracks/{id: i64}) => {
                self.track(id)
            },
            (POST) (/tracks/{id: i64}/link) => {
                self.relink(id, request)
            },
            (DELETE) (/tracks/{id: i64}) => {
                self.purge(id)
            },
            (POST) (/tracks/{id: i64}/ban) => {
                self.ban(id)
            },
            _ => Ok(Response::empty_404())
        );

        let response = result.unwrap_or_else(ApiError::into_response);
        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn list_stations(&self) -> Result<Response, ApiError> {
        let stations = self.store.list_stations(None)?;
        Ok(Response::json(&stations))
    }

    fn latest(&self, name: &str, request: &Request) -> Result<Response, ApiError> {
        let n = match request.get_param("n") {
            Some(n) => n
                .parse::<usize>()
                .map_err(|_| ApiError::BadRequest(format!("invalid track count '{n}'")))?,
            None => DEFAULT_LATEST,
        };
        let station_id = self.store.station_id(name)?;
        let tracks = self.store.latest_tracks(station_id, n)?;
        Ok(Response::json(&tracks))
    }

    /// what the public player page of a playlist shows
    fn player(&self, handle: &str) -> Result<Response, ApiError> {
        let station = self.store.station_by_playlist_handle(handle)?;
        let tracks = self
            .store
            .latest_tracks(station.id, DEFAULT_LATEST)?
            .into_vec();
        Ok(Response::json(&PlayerResponse {
            station: station.name,
            playlist_handle: station.playlist_handle,
            tracks,
        }))
    }

    fn find_track(&self, request: &Request) -> Result<Response, ApiError> {
        let param = |key: &str| {
            request
                .get_param(key)
                .ok_or_else(|| ApiError::BadRequest(format!("missing query parameter '{key}'")))
        };
        let (artist, album, title) = (param("artist")?, param("album")?, param("title")?);
        let track = self.store.find_track(&artist, &album, &title)?;
        Ok(Response::json(&track))
    }

    fn search_tracks(&self, request: &Request) -> Result<Response, ApiError> {
        let param = |key: &str| request.get_param(key).unwrap_or_default();
        let tracks = self.store.search_tracks(
            &param("artist"),
            &param("album"),
            &param("title"),
            &param("video"),
        )?;
        Ok(Response::json(&tracks))
    }

    fn tracks_by_video(&self, video: &str) -> Result<Response, ApiError> {
        let tracks = self.store.find_tracks_by_link(video)?;
        Ok(Response::json(&tracks))
    }

    fn track(&self, id: i64) -> Result<Response, ApiError> {
        let track = self.store.track_info(id)?;
        Ok(Response::json(&track))
    }

    fn relink(&self, id: i64, request: &Request) -> Result<Response, ApiError> {
        let link = Self::link_from_body(request)?;
        self.store.update_track_link(id, &link, Commit::Now)?;
        let track = self.store.track_info(id)?;
        Ok(Response::json(&track))
    }

    /// `link` field of either a JSON or a form body
    fn link_from_body(request: &Request) -> Result<String, ApiError> {
        let is_json = request
            .header("Content-Type")
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let body: LinkRequest = rouille::input::json_input(request)
                .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
            Ok(body.link)
        } else {
            let form = rouille::post_input!(request, { link: String })
                .map_err(|e| ApiError::BadRequest(format!("missing form field 'link': {e}")))?;
            Ok(form.link)
        }
    }

    fn purge(&self, id: i64) -> Result<Response, ApiError> {
        let report = self.store.purge_track_family(id, Commit::Now)?;
        Ok(Response::json(&report))
    }

    fn ban(&self, id: i64) -> Result<Response, ApiError> {
        let report = self.store.ban_track(id, Commit::Now)?;
        Ok(Response::json(&report))
    }
}

#[derive(Serialize)]
struct PlayerResponse {
    station: String,
    playlist_handle: String,
    tracks: Vec<TrackSnapshot>,
}

#[derive(Deserialize)]
struct LinkRequest {
    link: String,
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::track::NowPlaying,
        storage::operations::tests::{add_station, at, setup_store},
    };

    use rouille::Request;
    use serde_json::Value;
    use std::io::Read;

    pub fn parse_text_response(response: rouille::Response) -> String {
        let mut buf = String::new();
        let mut reader = response.data.into_reader_and_size().0;
        reader.read_to_string(&mut buf).unwrap();
        buf
    }

    fn create_server(store: Store) -> HttpServer {
        HttpServer::new(
            Arc::new(store),
            HttpConfig {
                bind_addr: "0.0.0.0".to_string(),
                port: 8080,
            },
        )
    }

    /// KROQ played three songs, KEXP has no history
    fn create_server_with_history() -> (HttpServer, i64) {
        let store = setup_store();
        let kroq = add_station(&store, "KROQ");
        add_station(&store, "KEXP");

        let songs = [
            ("Portishead", "Roads", "Dummy", "vid1"),
            ("Massive Attack", "Teardrop", "Mezzanine", "vid2"),
            ("Tricky", "Overcome", "Maxinquaye", "vid2"),
        ];
        let mut first_track = 0;
        for (i, (artist, title, album, video)) in songs.into_iter().enumerate() {
            let play = store
                .record_play(
                    kroq,
                    &NowPlaying::new(artist, title, album),
                    video,
                    at(i as i64 * 60),
                    Commit::Now,
                )
                .unwrap();
            if i == 0 {
                first_track = play.track_id;
            }
        }

        (create_server(store), first_track)
    }

    fn get(server: &HttpServer, url: &str) -> Response {
        server.handle_request(&Request::fake_http("GET", url, vec![], vec![]))
    }

    #[test]
    fn test_list_stations() -> anyhow::Result<()> {
        let (server, _) = create_server_with_history();

        let response = get(&server, "/stations");
        assert_eq!(response.status_code, 200);

        let body: Value = parse_json_response(response)?;
        let stations = body.as_array().unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0]["name"], "KROQ");
        assert_eq!(stations[0]["last_title"], "Overcome");
        assert_eq!(stations[1]["last_title"], "");

        Ok(())
    }

    #[test]
    fn test_latest_newest_first() -> anyhow::Result<()> {
        let (server, _) = create_server_with_history();

        let response = get(&server, "/stations/KROQ/latest?n=2");
        assert_eq!(response.status_code, 200);

        let body: Value = parse_json_response(response)?;
        let titles = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Overcome", "Teardrop"]);

        Ok(())
    }

    #[test]
    fn test_latest_single_is_an_object() -> anyhow::Result<()> {
        let (server, _) = create_server_with_history();

        let body: Value = parse_json_response(get(&server, "/stations/KROQ/latest?n=1"))?;

        assert_eq!(body["title"], "Overcome");
        assert_eq!(body["youtube_link"], "https://youtu.be/vid2");
        Ok(())
    }

    #[test]
    fn test_latest_errors() {
        let (server, _) = create_server_with_history();

        assert_eq!(get(&server, "/stations/KEXP/latest?n=1").status_code, 404);
        assert_eq!(get(&server, "/stations/KEXP/latest").status_code, 200);
        assert_eq!(get(&server, "/stations/Nowhere/latest").status_code, 404);
        assert_eq!(get(&server, "/stations/KROQ/latest?n=lots").status_code, 400);
    }

    #[test]
    fn test_player_view() -> anyhow::Result<()> {
        let (server, _) = create_server_with_history();

        let response = get(&server, "/player/PL-KROQ");
        assert_eq!(response.status_code, 200);

        let body: Value = parse_json_response(response)?;
        assert_eq!(body["station"], "KROQ");
        assert_eq!(body["tracks"].as_array().unwrap().len(), 3);

        assert_eq!(get(&server, "/player/PL-unknown").status_code, 404);
        Ok(())
    }

    #[test]
    fn test_find_track() -> anyhow::Result<()> {
        let (server, first_track) = create_server_with_history();

        let response = get(
            &server,
            "/tracks/find?artist=Portishead&album=Dummy&title=Roads",
        );
        assert_eq!(response.status_code, 200);
        let body: Value = parse_json_response(response)?;
        assert_eq!(body["track_id"], first_track);

        let response = get(&server, "/tracks/find?artist=Portishead&title=Roads");
        assert_eq!(response.status_code, 400);
        assert!(parse_text_response(response).contains("album"));

        let response = get(&server, "/tracks/find?artist=portishead&album=Dummy&title=Roads");
        assert_eq!(response.status_code, 404);

        Ok(())
    }

    #[test]
    fn test_search_and_by_video() -> anyhow::Result<()> {
        let (server, _) = create_server_with_history();

        let body: Value = parse_json_response(get(&server, "/tracks/search?artist=Attack"))?;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let body: Value = parse_json_response(get(&server, "/tracks/search"))?;
        assert_eq!(body.as_array().unwrap().len(), 3);

        let body: Value = parse_json_response(get(&server, "/tracks/by-video/vid2"))?;
        let artists = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["artist"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(artists, vec!["Massive Attack", "Tricky"]);

        Ok(())
    }

    #[test]
    fn test_get_track() -> anyhow::Result<()> {
        let (server, first_track) = create_server_with_history();

        let response = get(&server, &format!("/tracks/{first_track}"));
        assert_eq!(response.status_code, 200);
        let body: Value = parse_json_response(response)?;
        assert_eq!(body["title"], "Roads");

        assert_eq!(get(&server, "/tracks/9999").status_code, 404);
        assert_eq!(get(&server, "/tracks/not-a-number").status_code, 404);
        Ok(())
    }

    #[test]
    fn test_relink_with_form_body() -> anyhow::Result<()> {
        let (server, first_track) = create_server_with_history();

        let request = Request::fake_http(
            "POST",
            format!("/tracks/{first_track}/link"),
            vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            b"link=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dnew1".to_vec(),
        );
        let response = server.handle_request(&request);
        assert_eq!(response.status_code, 200);

        let body: Value = parse_json_response(response)?;
        assert_eq!(body["youtube_link"], "https://youtu.be/new1");
        Ok(())
    }

    #[test]
    fn test_relink_with_json_body() -> anyhow::Result<()> {
        let (server, first_track) = create_server_with_history();

        let request = Request::fake_http(
            "POST",
            format!("/tracks/{first_track}/link"),
            vec![("Content-Type".to_string(), "application/json".to_string())],
            br#"{"link": "new2"}"#.to_vec(),
        );
        let response = server.handle_request(&request);
        assert_eq!(response.status_code, 200);

        let body: Value = parse_json_response(response)?;
        assert_eq!(body["youtube_link"], "https://youtu.be/new2");
        Ok(())
    }

    #[test]
    fn test_relink_errors() {
        let (server, first_track) = create_server_with_history();
        let json = vec![("Content-Type".to_string(), "application/json".to_string())];

        let bad_link = Request::fake_http(
            "POST",
            format!("/tracks/{first_track}/link"),
            json.clone(),
            br#"{"link": "https://example.com/not-a-video"}"#.to_vec(),
        );
        assert_eq!(server.handle_request(&bad_link).status_code, 400);

        let no_link = Request::fake_http(
            "POST",
            format!("/tracks/{first_track}/link"),
            json.clone(),
            b"{}".to_vec(),
        );
        assert_eq!(server.handle_request(&no_link).status_code, 400);

        let missing = Request::fake_http(
            "POST",
            "/tracks/9999/link",
            json,
            br#"{"link": "abc"}"#.to_vec(),
        );
        assert_eq!(server.handle_request(&missing).status_code, 404);
    }

    #[test]
    fn test_purge_track() -> anyhow::Result<()> {
        let (server, first_track) = create_server_with_history();

        let request =
            Request::fake_http("DELETE", format!("/tracks/{first_track}"), vec![], vec![]);
        let response = server.handle_request(&request);
        assert_eq!(response.status_code, 200);

        let body: Value = parse_json_response(response)?;
        assert_eq!(body["removed_entries"], 1);
        assert_eq!(body["removed_album"], true);
        assert_eq!(body["removed_artist"], true);

        assert_eq!(get(&server, &format!("/tracks/{first_track}")).status_code, 404);
        Ok(())
    }

    #[test]
    fn test_ban_track() -> anyhow::Result<()> {
        let (server, first_track) = create_server_with_history();

        let request =
            Request::fake_http("POST", format!("/tracks/{first_track}/ban"), vec![], vec![]);
        let response = server.handle_request(&request);
        assert_eq!(response.status_code, 200);

        let body: Value = parse_json_response(response)?;
        assert_eq!(body["stations_updated"], 1);

        let stations: Value = parse_json_response(get(&server, "/stations"))?;
        assert_eq!(stations[0]["ignore_artists"], serde_json::json!(["Portishead"]));
        assert_eq!(stations[0]["ignore_titles"], serde_json::json!(["Roads"]));
        Ok(())
    }

    #[test]
    fn test_unknown_route() {
        let (server, _) = create_server_with_history();

        assert_eq!(get(&server, "/nothing/here").status_code, 404);
    }
}
