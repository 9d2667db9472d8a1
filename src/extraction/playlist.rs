//! Track listing extraction from episode descriptions.
//!
//! Descriptions mix narrative prose with a listing written one track per
//! line as `ARTIST - Title`. The only thing telling the two apart is the
//! `" - "` separator, so every line carrying it is treated as a track.

use serde::{Deserialize, Serialize};

use super::entities;

const TRACK_SEPARATOR: &str = " - ";

/// An artist/title pair recovered from free text, not yet matched to any catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub artist: String,
    pub title: String,
}

impl TrackDescriptor {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }
}

impl std::fmt::Display for TrackDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Per-feed knobs for the extractor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Only accept track lines that follow a `Playlist:` header line.
    pub require_listing_anchor: bool,
}

/// Extracts the ordered track listing from a raw (HTML) episode description.
///
/// Pure and infallible: empty, markup-only or track-free input yields an
/// empty list.
pub fn extract(raw_content: &str) -> Vec<TrackDescriptor> {
    extract_with(raw_content, ExtractOptions::default())
}

/// Same as [`extract`], with explicit options.
pub fn extract_with(raw_content: &str, options: ExtractOptions) -> Vec<TrackDescriptor> {
    if raw_content.trim().is_empty() {
        return Vec::new();
    }

    let text = entities::normalize(raw_content);
    let mut anchored = !options.require_listing_anchor;
    let mut tracks = Vec::new();

    for line in text.lines() {
        if !anchored {
            anchored = is_listing_anchor(line);
            continue;
        }
        if let Some(track) = parse_track_line(line) {
            tracks.push(track);
        }
    }

    tracks
}

/// Splits a single line on the first `" - "`.
///
/// Anything after the first separator belongs to the title, including
/// further separators. Returns `None` when either side is blank.
pub fn parse_track_line(line: &str) -> Option<TrackDescriptor> {
    let line = line.replace('\u{a0}', " ");
    let (artist, title) = line.split_once(TRACK_SEPARATOR)?;

    let artist = artist.trim();
    let title = title.trim();
    if artist.is_empty() || title.is_empty() {
        return None;
    }

    Some(TrackDescriptor {
        artist: capitalize_words(artist),
        title: title.to_string(),
    })
}

/// Lowercases the text, then uppercases the first character of every run of
/// letters or digits.
///
/// `"AC/DC"` becomes `"Ac/Dc"`, `"C.P.V."` stays `"C.P.V."`.
pub fn capitalize_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }

    out
}

fn is_listing_anchor(line: &str) -> bool {
    let folded = line.trim().to_lowercase();
    folded.starts_with("playlist") && folded.ends_with(':')
}
