//! Collaborators the planner calls into: media classification, metadata
//! parsing and destination naming.
//!
//! The planner only depends on the three traits. The implementations here
//! work from the file name alone; tag readers plug in through the same traits.

use crate::model::{MediaType, Metadata};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why metadata could not be extracted for a file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no usable title in {}", .0.display())]
    NoTitle(PathBuf),
    #[error("file name is not valid UTF-8: {}", .0.display())]
    NonUtf8(PathBuf),
}

pub trait Detector {
    fn detect(&self, path: &Path) -> MediaType;
}

pub trait MetadataParser {
    fn parse(&self, path: &Path, media_type: MediaType) -> Result<Metadata, ParseError>;
}

pub trait Naming {
    /// Full destination path, or `None` when no path can be built.
    fn build_full_path(
        &self,
        dest_root: &Path,
        media_type: MediaType,
        metadata: &Metadata,
        ext: &str,
    ) -> Option<PathBuf>;
}

const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "m4v", "wmv", "webm", "ts"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "opus", "wav", "aac"];

/// Classifies by extension; video with an `SxxEyy` marker is a TV episode.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionDetector;

impl Detector for ExtensionDetector {
    fn detect(&self, path: &Path) -> MediaType {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return MediaType::Unknown;
        };
        let ext = ext.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if find_episode_marker(stem).is_some() {
                MediaType::TvShow
            } else {
                MediaType::Movie
            }
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaType::Music
        } else {
            MediaType::Unknown
        }
    }
}

/// Parses title, year, season/episode and artist out of the file stem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilenameParser;

impl MetadataParser for FilenameParser {
    fn parse(&self, path: &Path, media_type: MediaType) -> Result<Metadata, ParseError> {
        let stem = path
            .file_stem()
            .ok_or_else(|| ParseError::NoTitle(path.to_path_buf()))?
            .to_str()
            .ok_or_else(|| ParseError::NonUtf8(path.to_path_buf()))?;

        let mut metadata = Metadata::default();
        let title_end = match media_type {
            MediaType::TvShow => match find_episode_marker(stem) {
                Some((at, season, episode)) => {
                    metadata.season = Some(season);
                    metadata.episode = Some(episode);
                    at
                }
                None => stem.len(),
            },
            MediaType::Music => {
                if let Some((artist, title)) = stem.split_once(" - ") {
                    metadata.artist = Some(clean_words(artist)).filter(|a| !a.is_empty());
                    metadata.title = clean_words(title);
                    return finish(path, metadata);
                }
                stem.len()
            }
            _ => match find_year(stem) {
                Some((at, year)) => {
                    metadata.year = Some(year);
                    at
                }
                None => stem.len(),
            },
        };
        metadata.title = clean_words(&stem[..title_end]);
        finish(path, metadata)
    }
}

fn finish(path: &Path, metadata: Metadata) -> Result<Metadata, ParseError> {
    if metadata.title.is_empty() {
        return Err(ParseError::NoTitle(path.to_path_buf()));
    }
    Ok(metadata)
}

/// Movie/TV/music directory layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNaming;

impl Naming for DefaultNaming {
    fn build_full_path(
        &self,
        dest_root: &Path,
        media_type: MediaType,
        metadata: &Metadata,
        ext: &str,
    ) -> Option<PathBuf> {
        let title = sanitize(&metadata.title);
        if title.is_empty() {
            return None;
        }
        let file = |name: &str| {
            if ext.is_empty() {
                name.to_string()
            } else {
                format!("{name}.{ext}")
            }
        };
        match media_type {
            MediaType::Movie => {
                let folder = match metadata.year {
                    Some(year) => format!("{title} ({year})"),
                    None => title,
                };
                Some(dest_root.join(&folder).join(file(&folder)))
            }
            MediaType::TvShow => {
                let season = metadata.season?;
                let episode = metadata.episode?;
                Some(
                    dest_root
                        .join(&title)
                        .join(format!("Season {season:02}"))
                        .join(file(&format!("{title} - S{season:02}E{episode:02}"))),
                )
            }
            MediaType::Music => {
                let artist = sanitize(metadata.artist.as_deref()?);
                if artist.is_empty() {
                    return None;
                }
                Some(dest_root.join(artist).join(file(&title)))
            }
            MediaType::Unknown => None,
        }
    }
}

/// Byte offset, season and episode of the first `SxxEyy` marker.
fn find_episode_marker(stem: &str) -> Option<(usize, u32, u32)> {
    let bytes = stem.as_bytes();
    for start in 0..bytes.len() {
        if !bytes[start].eq_ignore_ascii_case(&b's') {
            continue;
        }
        if start > 0 && bytes[start - 1].is_ascii_alphanumeric() {
            continue;
        }
        let season_len = digit_run(&bytes[start + 1..]);
        if season_len == 0 || season_len > 2 {
            continue;
        }
        let e_at = start + 1 + season_len;
        if e_at >= bytes.len() || !bytes[e_at].eq_ignore_ascii_case(&b'e') {
            continue;
        }
        let episode_len = digit_run(&bytes[e_at + 1..]);
        if episode_len == 0 || episode_len > 3 {
            continue;
        }
        let season = stem[start + 1..e_at].parse().ok()?;
        let episode = stem[e_at + 1..e_at + 1 + episode_len].parse().ok()?;
        return Some((start, season, episode));
    }
    None
}

/// Byte offset and value of the last standalone four-digit year in 1900..=2099.
fn find_year(stem: &str) -> Option<(usize, u16)> {
    let bytes = stem.as_bytes();
    let mut found = None;
    for start in 0..bytes.len().saturating_sub(3) {
        if digit_run(&bytes[start..]) != 4 {
            continue;
        }
        if start > 0 && bytes[start - 1].is_ascii_digit() {
            continue;
        }
        let year: u16 = match stem[start..start + 4].parse() {
            Ok(year) => year,
            Err(_) => continue,
        };
        // A leading year is the title ("2012"), not a release year.
        if (1900..=2099).contains(&year) && start > 0 {
            let at = if bytes[start - 1] == b'(' { start - 1 } else { start };
            found = Some((at, year));
        }
    }
    found
}

fn digit_run(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Turn `The.Movie_Name-` into `The Movie Name`.
fn clean_words(raw: &str) -> String {
    raw.split(|c: char| c == '.' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '-' || c == '(' || c == '[' || c.is_whitespace())
        .to_string()
}

/// Strip characters that are not portable in file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect::<String>()
        .trim()
        .trim_matches('.')
        .to_string()
}
