use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloaderError {
    #[error("Failed to load config file: {0}")]
    ConfigError(String),

    #[error("Failed to parse metadata file: {0}")]
    MetadataError(String),

    #[error("URL list not found: {0}")]
    MissingUrlList(String),

    #[error("No valid m3u8 URLs in {0}")]
    NoUrls(String),

    #[error("Process error: {0}")]
    ProcessError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}
