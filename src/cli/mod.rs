use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};

use crate::{
    config::Config,
    domain::station::NewStation,
    gateway::youtube::YoutubeClient,
    reconcile::{
        Engine, Mirror, Outcome,
        scheduler::{Scheduler, Shutdown},
    },
    scraper::IcecastScraper,
    storage::operations::{Commit, Store},
};

#[derive(Parser)]
#[command(name = "radiodeck")]
#[command(version)]
#[command(about = "Records what radio stations play and mirrors it to video playlists")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "radiodeck.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema
    Init,
    /// Poll all stations until Ctrl-C
    Poll,
    /// Run a single cycle over all stations
    Once,
    /// Run the admin http server
    Serve,
    /// Manage stations
    Station {
        #[command(subcommand)]
        action: StationCommand,
    },
    /// Show the latest plays of a station
    Latest {
        station: String,
        #[arg(short, default_value_t = 5)]
        n: usize,
    },
    /// Look up a track by exact artist, album and title
    Find {
        artist: String,
        album: String,
        title: String,
    },
    /// Point a track at another video
    Relink { track_id: i64, link: String },
    /// Delete a track with its plays, and its album and artist if orphaned
    Purge { track_id: i64 },
    /// Ignore a track's artist and title on every station that played it, then purge it
    Ban { track_id: i64 },
}

#[derive(Subcommand)]
pub enum StationCommand {
    Add {
        name: String,
        web_address: String,
        /// external playlist the station's plays are mirrored to
        #[arg(short, long, default_value = "")]
        playlist: String,
        #[arg(long = "ignore-artist")]
        ignore_artists: Vec<String>,
        #[arg(long = "ignore-title")]
        ignore_titles: Vec<String>,
    },
    List,
    Activate { name: String },
    Deactivate { name: String },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = Config::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;

    match cli.command {
        Commands::Init => {
            let store = open_store(&cfg)?;
            let stations = store.list_stations(None)?;
            store.close()?;
            println!("Database ready with {} stations", stations.len());
        }

        Commands::Poll => {
            let store = open_store(&cfg)?;
            let youtube = YoutubeClient::new(cfg.youtube(true)?)?;
            let scraper = IcecastScraper::new()?;

            let shutdown = Shutdown::new();
            forward_ctrl_c(shutdown.clone())?;

            let engine = Engine::new(&store, &scraper, &youtube, &youtube)
                .with_trim_count(cfg.poll.trim_count);
            let scheduler =
                Scheduler::new(engine, cfg.poll.min_sleep_secs..=cfg.poll.max_sleep_secs);
            println!("Polling stations, press Ctrl-C to stop");
            let cycles = scheduler.run(&shutdown);
            drop(scheduler);

            store.close()?;
            println!("Stopped after {cycles} cycles");
        }

        Commands::Once => {
            let store = open_store(&cfg)?;
            let youtube = YoutubeClient::new(cfg.youtube(true)?)?;
            let scraper = IcecastScraper::new()?;

            let engine = Engine::new(&store, &scraper, &youtube, &youtube)
                .with_trim_count(cfg.poll.trim_count);
            let report = engine.run_cycle(&Shutdown::new())?;
            drop(engine);

            for (station, outcome) in &report.outcomes {
                println!("{station}: {}", describe(outcome));
            }
            println!(
                "{} of {} stations recorded a new play",
                report.recorded(),
                report.outcomes.len()
            );
            store.close()?;
        }

        Commands::Serve => {
            println!("Starting HTTP server...");

            let store = open_store(&cfg)?;
            let http_server =
                crate::http::server::HttpServer::new(Arc::new(store), cfg.http.clone());

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }

        Commands::Station { action } => {
            let store = open_store(&cfg)?;
            run_station_command(&store, action)?;
            store.close()?;
        }

        Commands::Latest { station, n } => {
            let store = open_store(&cfg)?;
            let station_id = store.station_id(&station)?;
            let tracks = store.latest_tracks(station_id, n)?.into_vec();

            if tracks.is_empty() {
                println!("{station} has no recorded plays");
            }
            for track in tracks {
                println!(
                    "{}  {} - {} [{}]  {}",
                    track.play_time.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"),
                    track.artist,
                    track.title,
                    track.album,
                    track.youtube_link
                );
            }
        }

        Commands::Find {
            artist,
            album,
            title,
        } => {
            let store = open_store(&cfg)?;
            let track = store.find_track(&artist, &album, &title)?;
            println!("Track: {}", track.track_id);
            println!("  {} - {} [{}]", track.artist, track.title, track.album);
            println!("  video: {}", or_none(&track.youtube_link));
            println!("  file:  {}", or_none(&track.filesystem_link));
        }

        Commands::Relink { track_id, link } => {
            let store = open_store(&cfg)?;
            store.update_track_link(track_id, &link, Commit::Now)?;
            let track = store.track_info(track_id)?;
            store.close()?;
            println!("Track {track_id} now points at {}", track.youtube_link);
        }

        Commands::Purge { track_id } => {
            let store = open_store(&cfg)?;
            let report = store.purge_track_family(track_id, Commit::Now)?;
            store.close()?;
            println!(
                "Removed track {track_id} with {} plays (album removed: {}, artist removed: {})",
                report.removed_entries, report.removed_album, report.removed_artist
            );
        }

        Commands::Ban { track_id } => {
            let store = open_store(&cfg)?;
            let report = store.ban_track(track_id, Commit::Now)?;
            store.close()?;
            println!(
                "Banned track {track_id}: {} stations now ignore it, {} plays removed",
                report.stations_updated, report.purge.removed_entries
            );
        }
    }

    Ok(())
}

/// Opens the store and creates the stations listed in the config.
fn open_store(cfg: &Config) -> anyhow::Result<Store> {
    let store = Store::open(&cfg.database).context("failed to open database")?;
    seed_stations(&store, &cfg.stations)?;
    Ok(store)
}

fn seed_stations(store: &Store, stations: &[NewStation]) -> anyhow::Result<()> {
    for station in stations {
        store
            .create_station(station, Commit::Defer)
            .with_context(|| format!("failed to create station '{}'", station.name))?;
    }
    store.checkpoint()?;
    if !stations.is_empty() {
        log::debug!("{} stations from config are present", stations.len());
    }
    Ok(())
}

fn run_station_command(store: &Store, action: StationCommand) -> anyhow::Result<()> {
    match action {
        StationCommand::Add {
            name,
            web_address,
            playlist,
            ignore_artists,
            ignore_titles,
        } => {
            let station = NewStation {
                name,
                web_address,
                ignore_artists,
                ignore_titles,
                playlist_handle: playlist,
            };
            let id = store.create_station(&station, Commit::Now)?;
            println!("Station '{}' has id {id}", station.name);
        }

        StationCommand::List => {
            for snapshot in store.list_stations(None)? {
                let station = &snapshot.station;
                println!(
                    "{} {}{}",
                    station.id,
                    station.name,
                    if station.active { "" } else { " (inactive)" }
                );
                println!("  page:     {}", station.web_address);
                println!("  playlist: {}", or_none(&station.playlist_handle));
                if !snapshot.last_title.is_empty() {
                    println!("  last:     {} - {}", snapshot.last_artist, snapshot.last_title);
                }
                if !station.ignore_artists.is_empty() || !station.ignore_titles.is_empty() {
                    println!(
                        "  ignoring {} artists and {} titles",
                        station.ignore_artists.len(),
                        station.ignore_titles.len()
                    );
                }
            }
        }

        StationCommand::Activate { name } => {
            store.set_station_active(&name, true, Commit::Now)?;
            println!("Station '{name}' is active");
        }

        StationCommand::Deactivate { name } => {
            store.set_station_active(&name, false, Commit::Now)?;
            println!("Station '{name}' is inactive");
        }
    }
    Ok(())
}

/// Triggers `shutdown` on Ctrl-C, from a thread with its own small runtime.
fn forward_ctrl_c(shutdown: Shutdown) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;

    std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        log::info!("Ctrl-C received, stopping after the current station");
                        shutdown.trigger();
                    }
                    Err(e) => log::error!("cannot listen for Ctrl-C: {e}"),
                }
            })
        })
        .context("failed to spawn signal thread")?;
    Ok(())
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Skipped(reason) => format!("skipped ({reason:?})"),
        Outcome::Unresolved => "no matching video".to_string(),
        Outcome::Recorded { play, video, mirror } => {
            let mirrored = match mirror {
                Mirror::Appended => "added to playlist".to_string(),
                Mirror::AppendedAfterTrim { trimmed } => {
                    format!("added to playlist after removing {trimmed} old videos")
                }
                Mirror::NoPlaylist => "no playlist".to_string(),
                Mirror::Failed(e) => format!("playlist update failed: {e}"),
            };
            format!("recorded track {} as {video}, {mirrored}", play.track_id)
        }
        Outcome::Failed(e) => format!("failed: {e}"),
    }
}

fn or_none(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}
