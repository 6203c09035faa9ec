use std::fmt::Display;

use thiserror::Error;

const SHORT_PREFIX: &str = "https://youtu.be/";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a video id or link")]
pub struct InvalidVideo(pub String);

/// Identifier of a video on the external video platform.
///
/// One can parse it from a bare id or any of the usual link shapes,
/// and turn it back into the short link stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    pub fn parse(input: &str) -> Result<Self, InvalidVideo> {
        let input = input.trim();
        let mut id = input;
        for marker in ["://youtu.be/", "youtube.com/watch?v="] {
            if let Some(pos) = id.find(marker) {
                id = &id[pos + marker.len()..];
            }
        }
        // strip trailing requests and playlist junk
        if let Some(end) = id.find(['?', '&', '#']) {
            id = &id[..end];
        }

        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(id.to_string()))
        } else {
            Err(InvalidVideo(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// short link, the form kept in the track table
    pub fn to_link(&self) -> String {
        format!("{SHORT_PREFIX}{}", self.0)
    }
}

impl Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns any accepted link shape into the short link. Empty stays empty.
pub fn canonical_link(link: &str) -> Result<String, InvalidVideo> {
    if link.trim().is_empty() {
        return Ok(String::new());
    }
    VideoId::parse(link).map(|id| id.to_link())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_id() {
        assert_eq!(VideoId::parse("dQw4w9WgXcQ").unwrap().as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_short_and_long_links() {
        let short = VideoId::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let long = VideoId::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(short, long);
    }

    #[test]
    fn strips_query_and_playlist_parameters() {
        let id = VideoId::parse("https://www.youtube.com/watch?v=abc123&list=PL42").unwrap();
        assert_eq!(id.as_str(), "abc123");

        let id = VideoId::parse("http://youtu.be/abc123?t=42").unwrap();
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn rejects_garbage() {
        assert!(VideoId::parse("").is_err());
        assert!(VideoId::parse("not a video").is_err());
        assert!(VideoId::parse("https://youtu.be/").is_err());
    }

    #[test]
    fn canonical_link_uses_short_form() {
        assert_eq!(
            canonical_link("https://www.youtube.com/watch?v=abc123").unwrap(),
            "https://youtu.be/abc123"
        );
        assert_eq!(canonical_link("").unwrap(), "");
    }
}
