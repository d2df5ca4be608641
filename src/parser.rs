use crate::error::DownloaderError;
use log::debug;
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize)]
struct Level {
    level_name: String,
    #[serde(default)]
    child: Vec<Level>,
}

/// Reads the course metadata and returns the lesson names in file order.
///
/// Top-level entries are chapters; only their children name videos.
pub async fn parse_metadata(path: &Path) -> Result<Vec<String>, DownloaderError> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| DownloaderError::MetadataError(format!("{}: {}", path.display(), e)))?;
    let chapters: Vec<Level> = serde_json::from_str(&contents)
        .map_err(|e| DownloaderError::MetadataError(format!("{}: {}", path.display(), e)))?;

    let mut names = Vec::new();
    for chapter in chapters {
        debug!(
            "Chapter {} has {} lessons",
            chapter.level_name,
            chapter.child.len()
        );
        names.extend(chapter.child.into_iter().map(|lesson| lesson.level_name));
    }
    Ok(names)
}

pub async fn read_url_list(path: &Path) -> Result<Vec<String>, DownloaderError> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Err(DownloaderError::MissingUrlList(path.display().to_string()));
    }
    let contents = fs::read_to_string(path).await?;
    let urls: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if urls.is_empty() {
        return Err(DownloaderError::NoUrls(path.display().to_string()));
    }
    Ok(urls)
}

const EXTENSION: &str = ".mp4";
const NAME_MAX: usize = 255;

/// Cuts `name` to at most `max` bytes without splitting a character.
fn truncate_on_char_boundary(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// File name for the 1-based `index`-th video.
pub fn output_file_name(index: usize, names: &[String]) -> String {
    let sanitized = names.get(index.wrapping_sub(1)).map(|name| {
        let name = sanitize_filename::sanitize_with_options(
            name,
            sanitize_filename::Options {
                truncate: false,
                windows: true,
                replacement: "_",
            },
        );
        truncate_on_char_boundary(&name, NAME_MAX - EXTENSION.len()).to_string()
    });
    match sanitized {
        Some(name) if !name.trim().is_empty() => format!("{}{}", name, EXTENSION),
        _ => format!("video_{:03}.mp4", index),
    }
}
