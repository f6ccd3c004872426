use serde::{Deserialize, Serialize};

/// A track as one upstream catalog knows it, before resolution.
///
/// `id` is provider-specific and opaque to everything but the owning
/// adapter; composite ids (e.g. `"songmid,mediaid"`) are the adapter's
/// business. Identity is `(api_name, id)`; the remaining fields are
/// display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub api_name: String,
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl Track {
    /// Same catalog entry, regardless of display metadata.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.api_name == other.api_name && self.id == other.id
    }
}

/// A resolved, directly streamable rendition of a track.
///
/// Short-lived: upstream stream urls expire, so this is re-resolved every
/// time the track becomes now-playing and never cached across plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayableMedia {
    pub track: Track,
    pub url: String,
    pub length_millis: u64,
}

/// A playlist reference on an upstream catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

/// An account on an upstream catalog, as returned by user search and
/// consumed by the bind flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicServiceUser {
    pub identifier: String,
    pub name: String,
}
