//! Audio stream resolution through yt-dlp.
//!
//! Two subprocess calls per track: a probe that names the stream without
//! downloading (and surfaces unavailability), then the actual download with a
//! fixed output template.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Preferred audio-only selection, m4a first so tags land in an MP4 ilst.
const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio";

/// stderr fragments yt-dlp prints for content that cannot be streamed.
const UNAVAILABLE_MARKERS: [&str; 3] = [
    "Video unavailable",
    "Private video",
    "This video is not available",
];

/// Outcome of probing a page for its best audio-only stream.
pub enum StreamLookup {
    Audio(Box<dyn AudioStream>),
    Unavailable,
    NoAudio,
}

/// A resolved audio-only stream ready to be saved.
pub trait AudioStream {
    /// Filename (with extension) the backend would pick on its own.
    fn default_filename(&self) -> &str;
    /// Saves the audio into `dir` under `stem` plus the container extension.
    fn save_to(&self, dir: &Path, stem: &str) -> Result<PathBuf>;
}

/// Resolution seam between the downloader and the streaming backend.
pub trait StreamResolver {
    fn best_audio(&self, url: &str) -> Result<StreamLookup>;
}

/// Resolves and downloads streams by shelling out to yt-dlp. The program
/// path is injectable so tests can point it at a stub.
pub struct YtDlpResolver {
    program: PathBuf,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `yt-dlp --version` to fail loudly before the first track when
    /// the program is missing.
    pub fn ensure_available(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => bail!(
                "{} is installed but returned a failure status",
                self.program.display()
            ),
            Err(err) => bail!(
                "{} is not installed or not in PATH: {}",
                self.program.display(),
                err
            ),
        }
    }
}

impl StreamResolver for YtDlpResolver {
    fn best_audio(&self, url: &str) -> Result<StreamLookup> {
        let output = Command::new(&self.program)
            .arg("-f")
            .arg(AUDIO_FORMAT)
            .arg("--print")
            .arg("filename")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg(url)
            .output()
            .with_context(|| format!("probing streams for {url}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if UNAVAILABLE_MARKERS
                .iter()
                .any(|marker| stderr.contains(marker))
            {
                return Ok(StreamLookup::Unavailable);
            }
            if stderr.contains("Requested format is not available") {
                return Ok(StreamLookup::NoAudio);
            }
            bail!(
                "stream probe failed for {url} (status {}): {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8(output.stdout).context("parsing probe output as UTF-8")?;
        let default_filename = match stdout.lines().find(|line| !line.trim().is_empty()) {
            Some(line) => line.trim().to_owned(),
            None => bail!("stream probe for {url} printed no filename"),
        };

        Ok(StreamLookup::Audio(Box::new(YtDlpStream {
            program: self.program.clone(),
            url: url.to_owned(),
            default_filename,
        })))
    }
}

struct YtDlpStream {
    program: PathBuf,
    url: String,
    default_filename: String,
}

impl AudioStream for YtDlpStream {
    fn default_filename(&self) -> &str {
        &self.default_filename
    }

    fn save_to(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        let template = output_template(dir, stem);
        let output = Command::new(&self.program)
            .arg("-f")
            .arg(AUDIO_FORMAT)
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-o")
            .arg(&template)
            .arg(&self.url)
            .output()
            .with_context(|| format!("downloading {}", self.url))?;

        if !output.status.success() {
            bail!(
                "download failed for {} (status {}): {}",
                self.url,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout =
            String::from_utf8(output.stdout).context("parsing download output as UTF-8")?;
        let path = match stdout.lines().find(|line| !line.trim().is_empty()) {
            Some(line) => PathBuf::from(line.trim()),
            None => bail!("download of {} printed no file path", self.url),
        };
        if !path.exists() {
            bail!(
                "download of {} reported {} but the file is missing",
                self.url,
                path.display()
            );
        }
        Ok(path)
    }
}

/// Builds the `-o` value for a download. yt-dlp parses it as an output
/// template, so any literal `%` in the directory or stem is doubled before
/// the `%(ext)s` placeholder goes on the end.
fn output_template(dir: &Path, stem: &str) -> PathBuf {
    let prefix = dir.join(stem);
    let escaped = prefix.to_string_lossy().replace('%', "%%");
    PathBuf::from(format!("{escaped}.%(ext)s"))
}
