//! iTunes-style tag atoms and the container seam used to write them.

use anyhow::{Context, Result, bail};
use lofty::{Accessor, AudioFile, Tag, TagType, TaggedFile, TaggedFileExt, read_from_path};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The three atoms this tool writes, with the MP4 ilst codes they map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAtom {
    Title,
    Artist,
    Album,
}

impl TagAtom {
    pub fn fourcc(self) -> &'static str {
        match self {
            TagAtom::Title => "©nam",
            TagAtom::Artist => "©ART",
            TagAtom::Album => "©alb",
        }
    }
}

/// Maps a metadata key to its atom. A key outside the table is a caller
/// contract violation, not data to be skipped.
fn atom_for_key(key: &str) -> Result<TagAtom> {
    match key {
        "title" => Ok(TagAtom::Title),
        "artist" => Ok(TagAtom::Artist),
        "album" => Ok(TagAtom::Album),
        other => bail!("no tag atom for metadata key {other:?}"),
    }
}

/// One opened audio container.
pub trait TagContainer {
    fn set(&mut self, atom: TagAtom, value: &str);
    fn get(&self, atom: TagAtom) -> Option<String>;
    fn save(&mut self) -> Result<()>;
}

/// Opens containers on disk; the production implementation is [`LoftyStore`].
pub trait TagStore {
    fn open(&self, path: &Path) -> Result<Box<dyn TagContainer>>;
}

/// Writes `metadata` into the audio container at `path` and persists it.
///
/// An empty map still opens and saves the container; an unknown key aborts
/// before anything is persisted.
pub fn write_tags(
    store: &dyn TagStore,
    path: &Path,
    metadata: &BTreeMap<String, String>,
) -> Result<()> {
    let mut container = store
        .open(path)
        .with_context(|| format!("opening tags of {}", path.display()))?;
    for (key, value) in metadata {
        container.set(atom_for_key(key)?, value);
    }
    container
        .save()
        .with_context(|| format!("saving tags of {}", path.display()))
}

/// Tag store backed by lofty, using the container's primary tag type and
/// creating the tag when the file has none yet.
pub struct LoftyStore;

impl TagStore for LoftyStore {
    fn open(&self, path: &Path) -> Result<Box<dyn TagContainer>> {
        let file = read_from_path(path)
            .with_context(|| format!("reading audio container {}", path.display()))?;
        let mut tag_type = file.primary_tag_type();
        if file.tag(tag_type).is_none() {
            if let Some(tag) = file.first_tag() {
                tag_type = tag.tag_type();
            } else if let Some(default) = default_tag_type(path) {
                tag_type = default;
            }
        }
        let tag = match file.tag(tag_type) {
            Some(tag) => tag.clone(),
            None => Tag::new(tag_type),
        };
        Ok(Box::new(LoftyContainer {
            path: path.to_path_buf(),
            file,
            tag,
        }))
    }
}

struct LoftyContainer {
    path: PathBuf,
    file: TaggedFile,
    tag: Tag,
}

impl TagContainer for LoftyContainer {
    fn set(&mut self, atom: TagAtom, value: &str) {
        match atom {
            TagAtom::Title => self.tag.set_title(value.to_owned()),
            TagAtom::Artist => self.tag.set_artist(value.to_owned()),
            TagAtom::Album => self.tag.set_album(value.to_owned()),
        }
    }

    fn get(&self, atom: TagAtom) -> Option<String> {
        let value = match atom {
            TagAtom::Title => self.tag.title(),
            TagAtom::Artist => self.tag.artist(),
            TagAtom::Album => self.tag.album(),
        };
        value.map(|value| value.into_owned())
    }

    fn save(&mut self) -> Result<()> {
        self.file.insert_tag(self.tag.clone());
        self.file
            .save_to_path(&self.path)
            .with_context(|| format!("writing tags to {}", self.path.display()))
    }
}

/// Fresh downloads carry no tag block, so fall back to the type the file's
/// extension calls for.
fn default_tag_type(path: &Path) -> Option<TagType> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let tag_type = match ext.as_str() {
        "m4a" | "m4b" | "mp4" | "aac" => TagType::Mp4Ilst,
        "flac" | "ogg" | "oga" | "opus" => TagType::VorbisComments,
        _ => TagType::Id3v2,
    };
    Some(tag_type)
}
