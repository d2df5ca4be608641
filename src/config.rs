use crate::error::DownloaderError;
use crate::tool::Tool;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_pause() -> u64 {
    2
}

fn default_poll_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// File with one m3u8 URL per line.
    #[serde(rename = "class_url")]
    pub url_list: PathBuf,
    pub output_dir: PathBuf,
    /// Course metadata JSON used to name the output files.
    #[serde(rename = "class_name")]
    pub metadata_file: PathBuf,
    /// Stall timeout in seconds.
    pub timeout: u64,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default)]
    pub ffmpeg_args: Vec<String>,
    /// Seconds to wait between two items.
    #[serde(default = "default_pause")]
    pub pause: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, DownloaderError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DownloaderError::ConfigError(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| DownloaderError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn pause_between(&self) -> Duration {
        Duration::from_secs(self.pause)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn tool(&self) -> Tool {
        Tool::new(&self.ffmpeg).with_base_args(&self.ffmpeg_args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "class_url": "urls.txt",
                "output_dir": "videos",
                "class_name": "course.json",
                "timeout": 60
            }"#,
        )
        .unwrap();
        assert_eq!(config.url_list, PathBuf::from("urls.txt"));
        assert_eq!(config.metadata_file, PathBuf::from("course.json"));
        assert_eq!(config.stall_timeout(), Duration::from_secs(60));
        assert_eq!(config.ffmpeg, PathBuf::from("ffmpeg"));
        assert!(config.ffmpeg_args.is_empty());
        assert_eq!(config.pause_between(), Duration::from_secs(2));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.tool().program(), Path::new("ffmpeg"));
    }

    #[test]
    fn load_reports_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "class_url": "urls.txt" }}"#).unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, DownloaderError::ConfigError(_)));
        assert!(err.to_string().contains("output_dir"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/config.json"));
    }
}
