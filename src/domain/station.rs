use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Set of artist names or song titles a station should never record.
///
/// Persisted as a JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreList(BTreeSet<String>);

impl IgnoreList {
    pub fn contains(&self, value: &str) -> bool {
        self.0.contains(value)
    }

    /// returns true if the value was not already present
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        self.0.insert(value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text)
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A configured radio station
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub web_address: String,
    pub ignore_artists: IgnoreList,
    pub ignore_titles: IgnoreList,
    pub playlist_handle: String,
    pub active: bool,
}

/// Station with the last recorded song embedded.
///
/// `last_artist` and `last_title` are empty when nothing was recorded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationSnapshot {
    #[serde(flatten)]
    pub station: Station,
    pub last_artist: String,
    pub last_title: String,
}

/// Input for creating a station
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewStation {
    pub name: String,
    pub web_address: String,
    #[serde(default)]
    pub ignore_artists: Vec<String>,
    #[serde(default)]
    pub ignore_titles: Vec<String>,
    #[serde(default, alias = "playlist")]
    pub playlist_handle: String,
}

#[cfg(test)]
mod tests {
    use super::IgnoreList;

    #[test]
    fn ignore_list_json_round_trip_keeps_awkward_strings() {
        let list: IgnoreList = ["AC/DC", "Guns N' Roses", "\"quoted\"", "]); drop"]
            .into_iter()
            .collect();

        let text = list.to_json().unwrap();
        let back = IgnoreList::from_json(&text).unwrap();

        assert_eq!(back, list);
        assert!(back.contains("Guns N' Roses"));
    }

    #[test]
    fn empty_text_is_empty_list() {
        assert!(IgnoreList::from_json("").unwrap().is_empty());
        assert!(IgnoreList::from_json("[]").unwrap().is_empty());
    }

    #[test]
    fn non_list_text_is_rejected() {
        assert!(IgnoreList::from_json("['a', 'b']").is_err());
        assert!(IgnoreList::from_json("__import__('os')").is_err());
    }

    #[test]
    fn insert_has_set_semantics() {
        let mut list = IgnoreList::default();
        assert!(list.insert("News"));
        assert!(!list.insert("News"));
        assert_eq!(list.len(), 1);
    }
}
