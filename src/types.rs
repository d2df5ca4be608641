use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// One item of the batch, handed to the transfer monitor exactly once.
#[derive(Debug, Clone)]
pub struct MediaTask {
    pub source_locator: String,
    pub destination_path: PathBuf,
    pub sequence_index: usize,
    pub total_count: usize,
}

impl MediaTask {
    pub fn file_name(&self) -> &str {
        self.destination_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
    }
}

/// Why the total duration of an item could not be determined.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeFailure {
    /// The tool could not be started at all.
    Spawn(String),
    /// The tool ran but printed no `Duration:` line.
    NoDuration,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::Spawn(e) => write!(f, "probe could not be started: {}", e),
            ProbeFailure::NoDuration => write!(f, "no duration in probe output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DurationEstimate {
    Known(f64),
    Unknown(ProbeFailure),
}

impl DurationEstimate {
    /// Percentage complete for `elapsed` seconds, or `None` when there is no usable total.
    pub fn percentage(&self, elapsed: f64) -> Option<f64> {
        match self {
            DurationEstimate::Known(total) if *total > 0.0 => Some(elapsed / total * 100.0),
            _ => None,
        }
    }

    /// Value fed to the stall detector: percentage when known, raw elapsed seconds otherwise.
    pub fn liveness_signal(&self, elapsed: f64) -> f64 {
        self.percentage(elapsed).unwrap_or(elapsed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressSample {
    pub elapsed_seconds: f64,
    pub observed_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Completed,
    Failed { diagnostic: String },
    StalledSkipped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DownloadStatus {
    Success,
    Failed,
    Stalled,
    Exists,
}

impl From<&TransferOutcome> for DownloadStatus {
    fn from(outcome: &TransferOutcome) -> Self {
        match outcome {
            TransferOutcome::Completed => DownloadStatus::Success,
            TransferOutcome::Failed { .. } => DownloadStatus::Failed,
            TransferOutcome::StalledSkipped => DownloadStatus::Stalled,
        }
    }
}

#[derive(Debug)]
pub struct DownloadReport {
    pub task: MediaTask,
    pub status: DownloadStatus,
    pub duration: Duration,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct DownloadSummary {
    pub total_downloads: usize,
    pub successful_downloads: usize,
    pub failed_downloads: usize,
    pub stalled_downloads: usize,
    pub existing_files: usize,
    pub total_duration: Duration,
    pub reports: Vec<DownloadReport>,
}

impl DownloadSummary {
    pub fn from_reports(reports: Vec<DownloadReport>, total_duration: Duration) -> Self {
        let count = |status| reports.iter().filter(|r| r.status == status).count();
        Self {
            total_downloads: reports.len(),
            successful_downloads: count(DownloadStatus::Success),
            failed_downloads: count(DownloadStatus::Failed),
            stalled_downloads: count(DownloadStatus::Stalled),
            existing_files: count(DownloadStatus::Exists),
            total_duration,
            reports,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed_downloads + self.stalled_downloads > 0
    }
}
