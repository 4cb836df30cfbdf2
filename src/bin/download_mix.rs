#![forbid(unsafe_code)]

//! Command-line downloader that turns a YouTube mix into a folder of tagged
//! audio files plus a JSON report of what happened to each track.
//!
//! The binary only wires the library together: settings come from the env
//! file, the tracklist from the mix's watch page, streams from yt-dlp and
//! tags from lofty.

use anyhow::{Result, bail};
use clap::{ArgGroup, Parser};
use mixtape_tools::config::{DEFAULT_CONFIG_PATH, read_settings};
use mixtape_tools::fetch::HttpPageFetcher;
use mixtape_tools::run::{run_mix, run_single};
use mixtape_tools::stream::YtDlpResolver;
use mixtape_tools::tags::LoftyStore;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Download a YouTube mix as tagged audio files.")]
#[command(group(
    ArgGroup::new("mode")
        .args(["mix", "url"])
        .multiple(false)
))]
struct Cli {
    #[arg(
        short = 'm',
        long = "mix",
        value_name = "URL",
        help = "Watch url of the mix to download"
    )]
    mix: Option<String>,
    #[arg(
        short = 'u',
        long = "url",
        value_name = "URL",
        help = "Download a single video's audio instead of a mix"
    )]
    url: Option<String>,
    #[arg(
        long = "title",
        value_name = "TEXT",
        requires = "url",
        help = "Title tag for --url downloads"
    )]
    title: Option<String>,
    #[arg(
        long = "artist",
        value_name = "TEXT",
        requires = "url",
        help = "Artist tag for --url downloads"
    )]
    artist: Option<String>,
    #[arg(
        long = "album",
        value_name = "TEXT",
        requires = "url",
        help = "Album tag for --url downloads"
    )]
    album: Option<String>,
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the config file")]
    config: PathBuf,
    #[arg(
        long = "save-dir",
        value_name = "PATH",
        help = "Override the configured save directory"
    )]
    save_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = read_settings(&cli.config)?;
    if let Some(save_dir) = cli.save_dir {
        settings.save_root = save_dir;
    }

    let resolver = YtDlpResolver::new();
    resolver.ensure_available()?;
    let store = LoftyStore;

    if let Some(url) = cli.url {
        let mut metadata = BTreeMap::new();
        if let Some(title) = cli.title {
            metadata.insert("title".to_string(), title);
        }
        if let Some(artist) = cli.artist {
            metadata.insert("artist".to_string(), artist);
        }
        if let Some(album) = cli.album {
            metadata.insert("album".to_string(), album);
        }
        return run_single(&url, &metadata, &resolver, &store, &settings);
    }

    let mix_url = match cli.mix {
        Some(url) => url,
        None => prompt_mix_url()?,
    };

    println!("===================================");
    println!("YouTube Mix Downloader");
    println!("===================================");
    println!("Mix: {}", mix_url);
    println!("Save directory: {}", settings.save_root.display());
    println!();

    let fetcher = HttpPageFetcher;
    run_mix(&mix_url, &fetcher, &resolver, &store, &settings)?;

    println!();
    println!("===================================");
    println!("Download complete!");
    println!("===================================");

    Ok(())
}

fn prompt_mix_url() -> Result<String> {
    loop {
        print!("Enter the mix watch url: ");
        io::stdout().flush().ok();
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            bail!("Failed to read url input");
        }
        let trimmed = input.trim();
        if trimmed.is_empty() {
            eprintln!("Url cannot be empty");
            continue;
        }
        return Ok(trimmed.to_string());
    }
}
