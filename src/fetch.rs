//! Watch-page retrieval: the HTTP fetch, the `ytInitialData` carve-out, and
//! the structured metadata groups derived from it.

use crate::document::nested;
use crate::mix::metadata_rows;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Spellings the initial-state assignment shows up under in page source.
const INITIAL_DATA_MARKERS: [&str; 2] = ["var ytInitialData =", "window[\"ytInitialData\"] ="];

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Everything later stages need from one fetched watch page.
#[derive(Debug, Clone)]
pub struct MixPage {
    /// The page's embedded initial-state document, untouched.
    pub initial_data: Value,
    /// Per-track metadata groups of `Song`/`Artist`/... string pairs.
    pub metadata: Vec<Map<String, Value>>,
    /// Display title of the page's primary video.
    pub title: String,
}

/// Retrieval seam for watch pages, so everything downstream of the HTTP
/// fetch can be driven from canned documents.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<MixPage>;
}

/// Fetches watch pages over plain blocking HTTP.
pub struct HttpPageFetcher;

impl PageFetcher for HttpPageFetcher {
    fn fetch(&self, url: &str) -> Result<MixPage> {
        let html = ureq::get(url)
            .set("User-Agent", USER_AGENT)
            .call()
            .with_context(|| format!("fetching {url}"))?
            .into_string()
            .context("reading watch page body")?;
        MixPage::from_html(&html)
    }
}

impl MixPage {
    /// Builds the page view straight from watch-page HTML.
    pub fn from_html(html: &str) -> Result<Self> {
        let initial_data = extract_initial_data(html)?;
        let title = page_title(&initial_data)?;
        let metadata = structured_metadata(&initial_data);
        Ok(Self {
            initial_data,
            metadata,
            title,
        })
    }
}

/// Carves the embedded initial-state JSON out of watch-page HTML.
///
/// Parses exactly one balanced JSON value after the assignment marker; the
/// trailing `;` and the rest of the script are ignored.
pub fn extract_initial_data(html: &str) -> Result<Value> {
    for marker in INITIAL_DATA_MARKERS {
        if let Some(at) = html.find(marker) {
            let json = html[at + marker.len()..].trim_start();
            let mut de = serde_json::Deserializer::from_str(json);
            return Value::deserialize(&mut de)
                .with_context(|| format!("parsing initial data after {marker:?}"));
        }
    }
    bail!("no initial data found in page");
}

/// Display title from the primary info renderer. Pages without one cannot be
/// named on disk, so a missing title is an error rather than a fallback.
fn page_title(doc: &Value) -> Result<String> {
    let contents = nested(
        doc,
        &[
            "contents",
            "twoColumnWatchNextResults",
            "results",
            "results",
            "contents",
        ],
    )
    .and_then(Value::as_array)
    .context("watch page has no primary content list")?;
    contents
        .iter()
        .find_map(|entry| {
            nested(entry, &["videoPrimaryInfoRenderer", "title", "runs"])?
                .get(0)?
                .get("text")?
                .as_str()
        })
        .map(str::to_owned)
        .context("watch page has no video title")
}

/// Splits the page's metadata rows into per-track groups.
///
/// A usable row carries a `simpleText` title and a first content that is
/// either plain text or a run; anything else is skipped. A row titled `Song`
/// opens a new group, which matches how the rows are laid out on music mixes
/// (song first, then artist, album, licensing). Pages without the row
/// container yield no groups.
pub fn structured_metadata(doc: &Value) -> Vec<Map<String, Value>> {
    let rows = match metadata_rows(doc) {
        Some(rows) => rows,
        None => return Vec::new(),
    };

    let mut groups = Vec::new();
    let mut current = Map::new();
    for row in rows {
        let renderer = match row.get("metadataRowRenderer") {
            Some(renderer) => renderer,
            None => continue,
        };
        let title = match nested(renderer, &["title", "simpleText"]).and_then(Value::as_str) {
            Some(title) => title,
            None => continue,
        };
        let value = match row_value(renderer) {
            Some(value) => value,
            None => continue,
        };
        if title == "Song" && !current.is_empty() {
            groups.push(std::mem::take(&mut current));
        }
        current.insert(title.to_owned(), Value::String(value.to_owned()));
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

fn row_value(renderer: &Value) -> Option<&str> {
    let content = renderer.get("contents")?.get(0)?;
    if let Some(text) = content.get("simpleText").and_then(Value::as_str) {
        return Some(text);
    }
    content.get("runs")?.get(0)?.get("text")?.as_str()
}
