#![forbid(unsafe_code)]

//! Library for downloading YouTube mixes as tagged audio files.
//!
//! A mix's watch page lists its tracklist in the structured description
//! metadata; these modules parse that page, resolve each track's best audio
//! stream through yt-dlp, write title/artist/album tags and report what
//! happened as JSON. The binaries wire the pieces together.

pub mod config;
pub mod document;
pub mod download;
pub mod fetch;
pub mod mix;
pub mod run;
pub mod stream;
pub mod tags;
