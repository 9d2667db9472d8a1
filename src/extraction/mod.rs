//! Track listing extraction.
//!
//! - [`entities`]: HTML entity decoding and markup stripping
//! - [`playlist`]: line-oriented `ARTIST - Title` scanning

pub mod entities;
pub mod playlist;

pub use playlist::{extract, extract_with, ExtractOptions, TrackDescriptor};
