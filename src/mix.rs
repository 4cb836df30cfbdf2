//! Track extraction from a mix watch page and the song-title join that turns
//! scraped rows plus structured metadata into a download-ready tracklist.

use crate::document::nested;
use crate::fetch::PageFetcher;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One track scraped from the page's metadata rows: display title, video id,
/// canonical watch url. Identity is positional; duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    pub title: String,
    pub id: String,
    pub url: String,
}

/// Merged per-track unit: one structured metadata group joined with the
/// scraped row sharing its song title, annotated by the orchestrator with the
/// download outcome before the report is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    #[serde(rename = "Song")]
    pub song: String,
    #[serde(rename = "Artist", skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Remaining metadata fields (album, licensing, writers, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub url: String,
    pub id: String,
    /// Tag payload used for the download, filled in by the orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    pub filepath: Option<String>,
    pub error: bool,
}

/// Ordered tracklist of one mix plus the mix's display title.
#[derive(Debug, Clone)]
pub struct Tracklist {
    pub title: String,
    pub tracks: Vec<TrackRecord>,
}

/// Rows of the watch page's secondary-info metadata container, or `None` when
/// the page does not carry one.
pub(crate) fn metadata_rows(doc: &Value) -> Option<&Vec<Value>> {
    let contents = nested(
        doc,
        &[
            "contents",
            "twoColumnWatchNextResults",
            "results",
            "results",
            "contents",
        ],
    )?
    .as_array()?;
    let info = contents
        .iter()
        .find(|entry| entry.get("videoSecondaryInfoRenderer").is_some())?;
    nested(
        info,
        &[
            "videoSecondaryInfoRenderer",
            "metadataRowContainer",
            "metadataRowContainerRenderer",
            "rows",
        ],
    )?
    .as_array()
}

/// Resolves the ordered track list embedded in a watch page document.
///
/// The fixed navigation to the metadata rows has no fallback locator, so a
/// page without them is an error that aborts the run. Individual malformed
/// rows are dropped without diagnostics, preserving row order.
pub fn mix_track_refs(doc: &Value) -> Result<Vec<TrackRef>> {
    let rows = metadata_rows(doc).context("watch page has no secondary info metadata rows")?;
    Ok(rows.iter().filter_map(extract_track_ref).collect())
}

/// Pulls the (title, id, url) triple out of one metadata row.
///
/// Every lookup must land for the row to count: rows describing anything but
/// a linked track (plain-text rows, partial navigation endpoints) yield
/// `None` rather than a partial record.
pub fn extract_track_ref(row: &Value) -> Option<TrackRef> {
    let run = nested(row, &["metadataRowRenderer", "contents"])?
        .get(0)?
        .get("runs")?
        .get(0)?;
    let title = run.get("text")?.as_str()?;
    let id = nested(run, &["navigationEndpoint", "watchEndpoint", "videoId"])?.as_str()?;
    let url = nested(
        run,
        &[
            "navigationEndpoint",
            "commandMetadata",
            "webCommandMetadata",
            "url",
        ],
    )?
    .as_str()?;
    Some(TrackRef {
        title: title.to_owned(),
        id: id.to_owned(),
        url: url.to_owned(),
    })
}

/// Builds the merged tracklist for the mix at `url`.
///
/// The page is fetched once; scraped rows and structured metadata are read
/// independently and joined on exact, case-sensitive equality between a
/// group's `Song` field and a row's title. Groups without a matching row and
/// rows without a matching group are dropped silently. Output order follows
/// the metadata groups, not the page rows.
pub fn build_tracklist(fetcher: &dyn PageFetcher, url: &str) -> Result<Tracklist> {
    let page = fetcher.fetch(url)?;
    let refs = mix_track_refs(&page.initial_data)?;

    let mut tracks = Vec::new();
    for entry in &page.metadata {
        let song = match entry.get("Song").and_then(Value::as_str) {
            Some(song) => song,
            None => continue,
        };
        // First match wins, so two rows sharing a title join to the same ref.
        if let Some(track) = refs.iter().find(|track| track.title == song) {
            tracks.push(merge_track(entry, song, track));
        }
    }

    Ok(Tracklist {
        title: page.title,
        tracks,
    })
}

fn merge_track(entry: &Map<String, Value>, song: &str, track: &TrackRef) -> TrackRecord {
    let mut extra = entry.clone();
    extra.remove("Song");
    let artist = extra
        .get("Artist")
        .and_then(Value::as_str)
        .map(str::to_owned);
    if artist.is_some() {
        extra.remove("Artist");
    }
    TrackRecord {
        song: song.to_owned(),
        artist,
        extra,
        url: track.url.clone(),
        id: track.id.clone(),
        metadata: None,
        filepath: None,
        error: false,
    }
}
