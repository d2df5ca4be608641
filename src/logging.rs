use crate::error::DownloaderError;
use env_logger::{Builder, Env, Target};
use log::Level;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const LOG_FILE: &str = "download.log";

/// Routes the `log` facade to `<output_dir>/download.log`.
///
/// Called once by `main` before the first transfer. `RUST_LOG` still overrides the level.
pub fn init(output_dir: &Path) -> Result<PathBuf, DownloaderError> {
    let path = output_dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        })
        .init();

    Ok(path)
}

pub fn flush() {
    log::logger().flush();
}

/// Where the transfer monitor reports its events.
pub trait TransferLog: Send + Sync {
    fn record(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.record(Level::Error, message);
    }
}

/// Forwards to the process-wide `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TransferLog for LogSink {
    fn record(&self, level: Level, message: &str) {
        log::log!(level, "{}", message);
    }
}
