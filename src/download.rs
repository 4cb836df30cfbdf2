//! Saving resolved audio streams under the configured save root.

use crate::stream::{StreamLookup, StreamResolver};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Downloads the best audio-only stream of single videos, tolerating content
/// that cannot be streamed.
pub struct Downloader<'a> {
    resolver: &'a dyn StreamResolver,
    save_root: PathBuf,
}

impl<'a> Downloader<'a> {
    pub fn new(resolver: &'a dyn StreamResolver, save_root: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            save_root: save_root.into(),
        }
    }

    /// Downloads the audio of `url` into `<save root>/<output>/`, named by
    /// `filename` (a stem, without extension) or the stream's own default.
    ///
    /// Unavailable content and content without an audio-only format print a
    /// notice and produce `Ok(None)` so a batch can go on; anything else
    /// that fails is a real error.
    pub fn download(
        &self,
        url: &str,
        filename: Option<&str>,
        output: &str,
    ) -> Result<Option<PathBuf>> {
        let stream = match self.resolver.best_audio(url)? {
            StreamLookup::Audio(stream) => stream,
            StreamLookup::Unavailable => {
                println!("{url} is unavailable, skipping");
                return Ok(None);
            }
            StreamLookup::NoAudio => {
                println!("{url} has no audio-only stream, skipping");
                return Ok(None);
            }
        };

        let dir = if output.is_empty() {
            self.save_root.clone()
        } else {
            self.save_root.join(sanitize_component(output))
        };
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let stem = match filename {
            Some(name) => sanitize_component(name),
            None => sanitize_component(default_stem(stream.default_filename())),
        };
        println!("Downloading {stem}");
        let path = stream.save_to(&dir, &stem)?;
        Ok(Some(path))
    }
}

/// Strips the extension off a backend-chosen default filename.
fn default_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Normalizes a derived file or directory name: path separators and other
/// hostile characters become underscores; empty names and the dot
/// components `.` and `..` collapse to a bare underscore.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_owned(),
        _ => cleaned,
    }
}
