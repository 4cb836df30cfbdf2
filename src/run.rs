//! The batch drive: build the tracklist, download and tag each track in
//! order, and persist the JSON report.

use crate::config::Settings;
use crate::download::{Downloader, sanitize_component};
use crate::fetch::PageFetcher;
use crate::mix::{TrackRecord, build_tracklist};
use crate::stream::StreamResolver;
use crate::tags::{TagStore, write_tags};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const REPORT_FILE: &str = "download_report.json";

/// Downloads every track of the mix at `mix_url` and writes the report to
/// `<save root>/<mix title>/download_report.json`, returning the report path.
///
/// An unavailable track marks its record and the loop goes on; resolution
/// and I/O failures abort the whole run with no report.
pub fn run_mix(
    mix_url: &str,
    fetcher: &dyn PageFetcher,
    resolver: &dyn StreamResolver,
    store: &dyn TagStore,
    settings: &Settings,
) -> Result<PathBuf> {
    let tracklist = build_tracklist(fetcher, mix_url)?;
    let title = tracklist.title;
    let mut records = tracklist.tracks;
    let total = records.len();
    println!("Found {} tracks in \"{}\"", total, title);
    println!();

    let downloader = Downloader::new(resolver, settings.save_root.clone());
    for (index, record) in records.iter_mut().enumerate() {
        println!("[{}/{}] {}", index + 1, total, record.song);

        let video_url = format!("{}{}", settings.watch_url_prefix, record.id);
        let filename = match &record.artist {
            Some(artist) => format!("{} -- {}", artist, record.song),
            None => record.song.clone(),
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("title".to_owned(), record.song.clone());
        if let Some(artist) = &record.artist {
            metadata.insert("artist".to_owned(), artist.clone());
        }
        metadata.insert("album".to_owned(), title.clone());

        let filepath = downloader.download(&video_url, Some(&filename), &title)?;
        if let Some(path) = &filepath {
            write_tags(store, path, &metadata)?;
        }

        record.metadata = Some(metadata);
        record.filepath = filepath.map(|path| path.display().to_string());
        record.error = record.filepath.is_none();
    }

    let report = write_report(&settings.save_root, &title, &records)?;
    println!();
    println!("Report written to {}", report.display());
    Ok(report)
}

/// Downloads one video's audio straight under the save root and tags it with
/// the caller's values. No tracklist, no report.
pub fn run_single(
    url: &str,
    metadata: &BTreeMap<String, String>,
    resolver: &dyn StreamResolver,
    store: &dyn TagStore,
    settings: &Settings,
) -> Result<()> {
    let downloader = Downloader::new(resolver, settings.save_root.clone());
    match downloader.download(url, None, "")? {
        Some(path) => {
            write_tags(store, &path, metadata)?;
            println!("Saved {}", path.display());
        }
        None => println!("No file produced for {url}"),
    }
    Ok(())
}

/// Serializes the finished records as pretty JSON next to the downloads. The
/// directory is created even when every download failed, so the report
/// always lands.
pub fn write_report(save_root: &Path, mix_title: &str, records: &[TrackRecord]) -> Result<PathBuf> {
    let dir = save_root.join(sanitize_component(mix_title));
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(records).context("serializing download report")?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MixPage;
    use crate::stream::{AudioStream, StreamLookup};
    use crate::tags::{TagAtom, TagContainer};
    use serde_json::{Map, Value, json};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn track_row(title: &str, id: &str, url: &str) -> Value {
        json!({
            "metadataRowRenderer": {
                "title": {"simpleText": "Song"},
                "contents": [{
                    "runs": [{
                        "text": title,
                        "navigationEndpoint": {
                            "watchEndpoint": {"videoId": id},
                            "commandMetadata": {"webCommandMetadata": {"url": url}}
                        }
                    }]
                }]
            }
        })
    }

    fn watch_page(rows: Vec<Value>) -> Value {
        json!({
            "contents": {
                "twoColumnWatchNextResults": {
                    "results": {
                        "results": {
                            "contents": [{
                                "videoSecondaryInfoRenderer": {
                                    "metadataRowContainer": {
                                        "metadataRowContainerRenderer": {"rows": rows}
                                    }
                                }
                            }]
                        }
                    }
                }
            }
        })
    }

    fn metadata_entry(pairs: &[(&str, &str)]) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, value) in pairs {
            map.insert((*key).to_owned(), Value::String((*value).to_owned()));
        }
        map
    }

    struct FixedPage {
        page: MixPage,
    }

    impl PageFetcher for FixedPage {
        fn fetch(&self, _url: &str) -> Result<MixPage> {
            Ok(self.page.clone())
        }
    }

    fn two_track_fetcher() -> FixedPage {
        FixedPage {
            page: MixPage {
                initial_data: watch_page(vec![
                    track_row("A", "id1", "u1"),
                    track_row("B", "id2", "u2"),
                ]),
                metadata: vec![
                    metadata_entry(&[("Song", "A"), ("Artist", "X")]),
                    metadata_entry(&[("Song", "B"), ("Artist", "Y")]),
                ],
                title: "Test Mix".to_owned(),
            },
        }
    }

    struct FakeStream;

    impl AudioStream for FakeStream {
        fn default_filename(&self) -> &str {
            "stub.m4a"
        }

        fn save_to(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
            let path = dir.join(format!("{stem}.m4a"));
            fs::write(&path, b"audio")?;
            Ok(path)
        }
    }

    struct ScriptedResolver {
        unavailable: Vec<String>,
    }

    impl StreamResolver for ScriptedResolver {
        fn best_audio(&self, url: &str) -> Result<StreamLookup> {
            if self.unavailable.iter().any(|id| url.ends_with(id.as_str())) {
                return Ok(StreamLookup::Unavailable);
            }
            Ok(StreamLookup::Audio(Box::new(FakeStream)))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        written: Rc<RefCell<Vec<(PathBuf, BTreeMap<String, String>)>>>,
    }

    struct RecordingContainer {
        path: PathBuf,
        atoms: BTreeMap<String, String>,
        written: Rc<RefCell<Vec<(PathBuf, BTreeMap<String, String>)>>>,
    }

    impl TagStore for RecordingStore {
        fn open(&self, path: &Path) -> Result<Box<dyn TagContainer>> {
            Ok(Box::new(RecordingContainer {
                path: path.to_path_buf(),
                atoms: BTreeMap::new(),
                written: Rc::clone(&self.written),
            }))
        }
    }

    impl TagContainer for RecordingContainer {
        fn set(&mut self, atom: TagAtom, value: &str) {
            self.atoms.insert(atom.fourcc().to_owned(), value.to_owned());
        }

        fn get(&self, atom: TagAtom) -> Option<String> {
            self.atoms.get(atom.fourcc()).cloned()
        }

        fn save(&mut self) -> Result<()> {
            self.written
                .borrow_mut()
                .push((self.path.clone(), self.atoms.clone()));
            Ok(())
        }
    }

    fn settings_for(root: &Path) -> Settings {
        Settings {
            save_root: root.to_path_buf(),
            watch_url_prefix: "https://www.youtube.com/watch?v=".to_owned(),
        }
    }

    #[test]
    fn run_mix_records_success_and_failure_in_order() -> Result<()> {
        let root = tempdir()?;
        let settings = settings_for(root.path());
        let fetcher = two_track_fetcher();
        let resolver = ScriptedResolver {
            unavailable: vec!["id2".to_owned()],
        };
        let store = RecordingStore::default();

        let report = run_mix("mix-url", &fetcher, &resolver, &store, &settings)?;
        assert_eq!(
            report,
            root.path().join("Test Mix").join("download_report.json")
        );

        let records: Vec<TrackRecord> = serde_json::from_str(&fs::read_to_string(&report)?)?;
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].song, "A");
        assert!(!records[0].error);
        let filepath = records[0].filepath.clone().unwrap();
        assert!(Path::new(&filepath).exists());
        assert_eq!(
            records[0].metadata.as_ref().unwrap().get("album"),
            Some(&"Test Mix".to_owned())
        );

        assert_eq!(records[1].song, "B");
        assert!(records[1].error);
        assert!(records[1].filepath.is_none());
        assert_eq!(
            records[1].metadata.as_ref().unwrap().get("artist"),
            Some(&"Y".to_owned())
        );

        let written = store.written.borrow();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, Path::new(&filepath));
        assert_eq!(written[0].1.get("©nam"), Some(&"A".to_owned()));
        assert_eq!(written[0].1.get("©ART"), Some(&"X".to_owned()));
        assert_eq!(written[0].1.get("©alb"), Some(&"Test Mix".to_owned()));
        Ok(())
    }

    #[test]
    fn report_lands_even_when_every_download_fails() -> Result<()> {
        let root = tempdir()?;
        let settings = settings_for(root.path());
        let fetcher = two_track_fetcher();
        let resolver = ScriptedResolver {
            unavailable: vec!["id1".to_owned(), "id2".to_owned()],
        };
        let store = RecordingStore::default();

        let report = run_mix("mix-url", &fetcher, &resolver, &store, &settings)?;
        assert!(report.exists());

        let records: Vec<TrackRecord> = serde_json::from_str(&fs::read_to_string(&report)?)?;
        assert!(records.iter().all(|record| record.error));
        assert!(store.written.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn run_single_tags_only_the_provided_keys() -> Result<()> {
        let root = tempdir()?;
        let settings = settings_for(root.path());
        let resolver = ScriptedResolver {
            unavailable: Vec::new(),
        };
        let store = RecordingStore::default();

        let mut metadata = BTreeMap::new();
        metadata.insert("title".to_owned(), "T".to_owned());
        run_single(
            "https://www.youtube.com/watch?v=solo",
            &metadata,
            &resolver,
            &store,
            &settings,
        )?;

        let written = store.written.borrow();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, root.path().join("stub.m4a"));
        assert_eq!(written[0].1.get("©nam"), Some(&"T".to_owned()));
        assert_eq!(written[0].1.get("©ART"), None);
        Ok(())
    }

    #[test]
    fn report_directory_is_sanitized() -> Result<()> {
        let root = tempdir()?;
        let report = write_report(root.path(), "Mix/With: Slash", &[])?;
        assert_eq!(
            report,
            root.path()
                .join("Mix_With_ Slash")
                .join("download_report.json")
        );
        assert_eq!(fs::read_to_string(&report)?, "[]");

        let dotted = write_report(root.path(), "..", &[])?;
        assert_eq!(dotted, root.path().join("_").join("download_report.json"));
        Ok(())
    }
}
