use crate::error::DownloaderError;
use crate::logging::TransferLog;
use crate::prober::DurationProber;
use crate::progress;
use crate::stall::{Liveness, StallDetector};
use crate::tool::Tool;
use crate::types::{DurationEstimate, MediaTask, TransferOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::MissedTickBehavior;

const DIAGNOSTIC_TAIL_LINES: usize = 20;
const DRAIN_GRACE: Duration = Duration::from_secs(2);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A spawned converter process.
pub struct WorkerProcess {
    child: Child,
}

impl WorkerProcess {
    pub fn spawn(mut cmd: Command) -> Result<Self, DownloaderError> {
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        let child = cmd
            .spawn()
            .map_err(|e| DownloaderError::ProcessError(format!("failed to start {}: {}", program, e)))?;
        Ok(Self { child })
    }

    fn take_streams(&mut self) -> Result<(ChildStdout, ChildStderr), DownloaderError> {
        let stdout = self.child.stdout.take().ok_or_else(|| {
            DownloaderError::ProcessError("progress stream was not captured".to_string())
        })?;
        let stderr = self.child.stderr.take().ok_or_else(|| {
            DownloaderError::ProcessError("diagnostic stream was not captured".to_string())
        })?;
        Ok((stdout, stderr))
    }

    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    pub fn has_exited(&mut self) -> std::io::Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    /// Kills the process and reaps it. A process that already exited is left alone.
    pub async fn terminate(&mut self) -> std::io::Result<()> {
        if self.has_exited()? {
            return Ok(());
        }
        match self.child.start_kill() {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::InvalidInput => return Ok(()),
            Err(e) => return Err(e),
        }
        self.child.wait().await.map(|_| ())
    }
}

/// Newline-delimited reader that never fails on encoding.
///
/// Invalid UTF-8 is replaced rather than reported. The pending bytes live in `buf`, so a read
/// interrupted by `select!` resumes where it stopped.
struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LossyLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(&['\n', '\r'][..])
            .to_string();
        self.buf.clear();
        Ok(Some(line))
    }
}

/// Last few lines of the converter's stderr, kept for failure reports.
#[derive(Debug)]
struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticTail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, line: &str) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn render(&self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        Some(self.lines.iter().cloned().collect::<Vec<_>>().join("\n"))
    }
}

enum Event {
    Progress(Option<String>),
    Diagnostic(Option<String>),
    Exited(ExitStatus),
    Tick,
}

/// Supervises one converter run from probe to exit.
pub struct TransferMonitor {
    tool: Tool,
    prober: DurationProber,
    log: Arc<dyn TransferLog>,
    poll_interval: Duration,
    show_progress: bool,
}

impl TransferMonitor {
    pub fn new(tool: Tool, log: Arc<dyn TransferLog>) -> Self {
        Self {
            prober: DurationProber::new(tool.clone()),
            tool,
            log,
            poll_interval: DEFAULT_POLL_INTERVAL,
            show_progress: true,
        }
    }

    /// How often the stall window is re-checked while no progress lines arrive.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Runs the transfer and always returns an outcome; internal errors become `Failed`.
    pub async fn run(&self, task: &MediaTask, timeout: Duration) -> TransferOutcome {
        match self.supervise(task, timeout).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let diagnostic = e.to_string();
                self.log.error(&format!(
                    "Error while downloading {}: {}",
                    task.source_locator, diagnostic
                ));
                TransferOutcome::Failed { diagnostic }
            }
        }
    }

    async fn supervise(
        &self,
        task: &MediaTask,
        timeout: Duration,
    ) -> Result<TransferOutcome, DownloaderError> {
        let estimate = self.prober.probe(&task.source_locator).await;
        if let DurationEstimate::Unknown(reason) = &estimate {
            self.log.warn(&format!(
                "Could not get duration of {} ({}), falling back to a count-based indicator",
                task.source_locator, reason
            ));
        }

        self.log.info(&format!(
            "Starting download: {} -> {}",
            task.source_locator,
            task.destination_path.display()
        ));
        let pb = self.create_progress_bar(task, &estimate);

        let mut worker =
            WorkerProcess::spawn(self.tool.transfer_command(&task.source_locator, &task.destination_path))?;
        let (stdout, stderr) = worker.take_streams()?;
        let mut progress_lines = LossyLines::new(BufReader::new(stdout));
        let mut diagnostic_lines = LossyLines::new(BufReader::new(stderr));
        let mut progress_open = true;
        let mut diagnostics_open = true;

        let mut tail = DiagnosticTail::new(DIAGNOSTIC_TAIL_LINES);
        let mut detector = StallDetector::new();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let status = loop {
            let event = tokio::select! {
                line = progress_lines.next_line(), if progress_open => Event::Progress(line?),
                line = diagnostic_lines.next_line(), if diagnostics_open => Event::Diagnostic(line?),
                status = worker.wait() => Event::Exited(status?),
                _ = ticker.tick() => Event::Tick,
            };

            let liveness = match event {
                Event::Progress(Some(line)) => match progress::parse_line(&line, Instant::now()) {
                    Some(sample) => {
                        update_progress_bar(&pb, &estimate, sample.elapsed_seconds);
                        detector.observe(
                            estimate.liveness_signal(sample.elapsed_seconds),
                            sample.observed_at,
                            timeout,
                        )
                    }
                    None => Liveness::Alive,
                },
                Event::Progress(None) => {
                    progress_open = false;
                    Liveness::Alive
                }
                Event::Diagnostic(Some(line)) => {
                    self.forward_diagnostic(&line, &mut tail);
                    Liveness::Alive
                }
                Event::Diagnostic(None) => {
                    diagnostics_open = false;
                    Liveness::Alive
                }
                Event::Tick => detector.check(Instant::now(), timeout),
                Event::Exited(status) => break status,
            };

            if liveness.is_stalled() {
                if let Err(e) = worker.terminate().await {
                    self.log
                        .error(&format!("Failed to stop stalled process for {}: {}", task.source_locator, e));
                }
                pb.finish_and_clear();
                let last_value = detector.state().map(|s| s.last_value).unwrap_or_default();
                self.log.warn(&format!(
                    "Download stalled at {:.2} for more than {:?}, skipping video: {}",
                    last_value, timeout, task.source_locator
                ));
                return Ok(TransferOutcome::StalledSkipped);
            }
        };

        let drain = async {
            if progress_open {
                while let Some(line) = progress_lines.next_line().await? {
                    if let Some(sample) = progress::parse_line(&line, Instant::now()) {
                        update_progress_bar(&pb, &estimate, sample.elapsed_seconds);
                    }
                }
            }
            if diagnostics_open {
                while let Some(line) = diagnostic_lines.next_line().await? {
                    self.forward_diagnostic(&line, &mut tail);
                }
            }
            Ok::<(), std::io::Error>(())
        };
        match tokio::time::timeout(DRAIN_GRACE, drain).await {
            Ok(result) => result?,
            Err(_) => self.log.warn(&format!(
                "Output of {} still open after exit, not waiting for it",
                task.source_locator
            )),
        }

        pb.finish_and_clear();
        if status.success() {
            self.log.info(&format!(
                "Download succeeded: {}",
                task.destination_path.display()
            ));
            return Ok(TransferOutcome::Completed);
        }

        let diagnostic = tail.render().unwrap_or_else(|| {
            format!("{} ended with {}", self.tool.program().display(), status)
        });
        self.log.error(&format!(
            "Download failed: {} ({})\nError: {}",
            task.destination_path.display(),
            status,
            diagnostic
        ));
        Ok(TransferOutcome::Failed { diagnostic })
    }

    fn forward_diagnostic(&self, line: &str, tail: &mut DiagnosticTail) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.log.info(line);
        tail.push(line);
    }

    fn create_progress_bar(&self, task: &MediaTask, estimate: &DurationEstimate) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = match estimate {
            DurationEstimate::Known(_) => {
                let pb = ProgressBar::new(100);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{msg} [{bar:10.cyan/blue}] {pos:>3}%")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb
            }
            DurationEstimate::Unknown(_) => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg} [{elapsed_precise}] {pos} updates")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            }
        };
        pb.set_message(format!("[{}/{}] {}", task.sequence_index, task.total_count, task.file_name()));
        pb
    }
}

fn update_progress_bar(pb: &ProgressBar, estimate: &DurationEstimate, elapsed: f64) {
    match estimate.percentage(elapsed) {
        Some(percentage) => pb.set_position(percentage.clamp(0.0, 100.0) as u64),
        None => pb.inc(1),
    }
}
