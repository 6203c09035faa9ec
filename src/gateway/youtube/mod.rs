//! YouTube Data API v3 implementation of the gateway traits

mod client;
mod dto;

pub use client::YoutubeClient;
