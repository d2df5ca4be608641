use crate::error::DownloaderError;
use crate::monitor::TransferMonitor;
use crate::parser;
use crate::types::{DownloadReport, DownloadStatus, DownloadSummary, MediaTask, TransferOutcome};
use colored::*;
use log::{error, info};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::time::sleep;

pub const STATS_FILE: &str = "download_stats.csv";

/// Runs the batch one item at a time.
pub struct Downloader {
    monitor: TransferMonitor,
    timeout: Duration,
    pause: Duration,
}

impl Downloader {
    pub fn new(monitor: TransferMonitor, timeout: Duration, pause: Duration) -> Self {
        Self {
            monitor,
            timeout,
            pause,
        }
    }

    pub async fn download_all(
        &self,
        urls: Vec<String>,
        names: &[String],
        output_dir: &Path,
    ) -> Result<DownloadSummary, DownloaderError> {
        fs::create_dir_all(output_dir).await?;
        let tasks = self.create_download_tasks(urls, names, output_dir);
        println!("Total videos: {}", tasks.len());

        let start_time = Instant::now();
        let mut reports = Vec::with_capacity(tasks.len());
        let mut transferred_last = false;

        for task in tasks {
            if transferred_last && !self.pause.is_zero() {
                sleep(self.pause).await;
            }
            let report = self.download_file(task).await;
            transferred_last = report.status != DownloadStatus::Exists;
            reports.push(report);
        }

        let summary = DownloadSummary::from_reports(reports, start_time.elapsed());
        if let Err(e) = self.write_stats_csv(&summary, output_dir) {
            error!("Failed to write stats CSV: {}", e);
        }

        Ok(summary)
    }

    async fn download_file(&self, task: MediaTask) -> DownloadReport {
        if fs::try_exists(&task.destination_path).await.unwrap_or(false) {
            info!("Skipping: {} already exists", task.destination_path.display());
            println!(
                "{}",
                format!("Skipping: {} already exists", task.destination_path.display()).yellow()
            );
            return DownloadReport {
                task,
                status: DownloadStatus::Exists,
                duration: Duration::ZERO,
                error: None,
            };
        }

        println!(
            "Downloading video {}/{}: {}",
            task.sequence_index,
            task.total_count,
            task.file_name()
        );
        let start_time = Instant::now();
        let outcome = self.monitor.run(&task, self.timeout).await;
        let duration = start_time.elapsed();

        match &outcome {
            TransferOutcome::Completed => println!(
                "{} {}",
                "✓ Download complete:".green(),
                task.destination_path.display()
            ),
            TransferOutcome::Failed { diagnostic } => println!(
                "{} {}\n  Error: {}",
                "✗ Download failed:".red(),
                task.destination_path.display(),
                diagnostic
            ),
            TransferOutcome::StalledSkipped => println!(
                "{} {}",
                "Download stalled, skipped:".yellow(),
                task.source_locator
            ),
        }
        if outcome != TransferOutcome::Completed {
            println!("Skipping video {}: {}", task.sequence_index, task.source_locator);
        }

        let status = DownloadStatus::from(&outcome);
        let error = match outcome {
            TransferOutcome::Completed => None,
            TransferOutcome::Failed { diagnostic } => Some(diagnostic),
            TransferOutcome::StalledSkipped => {
                Some(format!("no progress for more than {:?}", self.timeout))
            }
        };

        DownloadReport {
            task,
            status,
            duration,
            error,
        }
    }

    fn create_download_tasks(
        &self,
        urls: Vec<String>,
        names: &[String],
        output_dir: &Path,
    ) -> Vec<MediaTask> {
        let total_count = urls.len();
        let tasks: Vec<MediaTask> = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| MediaTask {
                destination_path: output_dir.join(parser::output_file_name(i + 1, names)),
                source_locator: url,
                sequence_index: i + 1,
                total_count,
            })
            .collect();

        info!("Created {} download tasks", tasks.len());
        for task in &tasks {
            info!(
                "Download task: {} -> {}",
                task.source_locator,
                task.destination_path.display()
            );
        }
        tasks
    }

    fn write_stats_csv(
        &self,
        summary: &DownloadSummary,
        output_dir: &Path,
    ) -> Result<(), DownloaderError> {
        let stats_path = output_dir.join(STATS_FILE);
        let mut wtr = csv::WriterBuilder::new().from_path(stats_path)?;

        wtr.write_record([
            "Index",
            "Filename",
            "Status",
            "Duration (s)",
            "URL",
            "Error",
        ])?;

        for report in &summary.reports {
            wtr.write_record(&[
                report.task.sequence_index.to_string(),
                report.task.file_name().to_string(),
                format!("{:?}", report.status),
                format!("{:.2}", report.duration.as_secs_f64()),
                report.task.source_locator.clone(),
                report.error.clone().unwrap_or_default(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::logging::testing::MemoryLog;
    use crate::tool::Tool;
    use std::sync::Arc;

    fn downloader(transfer: &str) -> Downloader {
        let script = format!(
            "case \"$*\" in\n  *-progress*) {}\n  ;;\n  *) exit 1\n  ;;\nesac",
            transfer
        );
        let tool = Tool::new("sh").with_base_args(["-c".to_string(), script, "ffmpeg".to_string()]);
        let monitor = TransferMonitor::new(tool, Arc::new(MemoryLog::default()))
            .with_poll_interval(Duration::from_millis(50))
            .with_progress(false);
        Downloader::new(monitor, Duration::from_secs(30), Duration::ZERO)
    }

    #[tokio::test]
    async fn existing_files_are_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Intro.mp4"), b"done").unwrap();

        let downloader = downloader(r"printf 'out_time=00:00:01.000000\n'; exit 0");
        let urls = vec![
            "http://host/1.m3u8".to_string(),
            "http://host/2.m3u8".to_string(),
        ];
        let names = vec!["Intro".to_string()];
        let summary = downloader
            .download_all(urls, &names, dir.path())
            .await
            .unwrap();

        assert_eq!(summary.total_downloads, 2);
        assert_eq!(summary.existing_files, 1);
        assert_eq!(summary.successful_downloads, 1);
        assert_eq!(summary.reports[0].status, DownloadStatus::Exists);
        assert_eq!(summary.reports[1].task.file_name(), "video_002.mp4");
        assert!(!summary.has_failures());
        assert_eq!(std::fs::read(dir.path().join("Intro.mp4")).unwrap(), b"done");
    }

    #[tokio::test]
    async fn failures_are_recorded_in_stats() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = downloader("echo 'Invalid data found when processing input' >&2; exit 1");
        let summary = downloader
            .download_all(vec!["http://host/1.m3u8".to_string()], &[], dir.path())
            .await
            .unwrap();

        assert_eq!(summary.failed_downloads, 1);
        assert!(summary.has_failures());

        let mut reader = csv::Reader::from_path(dir.path().join(STATS_FILE)).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "video_001.mp4");
        assert_eq!(&rows[0][2], "Failed");
        assert!(rows[0][5].contains("Invalid data found"));
    }
}
