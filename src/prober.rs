use crate::progress;
use crate::tool::Tool;
use crate::types::{DurationEstimate, ProbeFailure};

pub struct DurationProber {
    tool: Tool,
}

impl DurationProber {
    pub fn new(tool: Tool) -> Self {
        Self { tool }
    }

    /// Asks the tool for the item's total length.
    ///
    /// The inspection run exits non-zero because no output file is given, so the exit status is
    /// ignored and only its stderr is searched. Failures come back as `Unknown`, never as errors.
    pub async fn probe(&self, source_locator: &str) -> DurationEstimate {
        let output = match self.tool.probe_command(source_locator).output().await {
            Ok(output) => output,
            Err(e) => {
                return DurationEstimate::Unknown(ProbeFailure::Spawn(format!(
                    "{}: {}",
                    self.tool.program().display(),
                    e
                )))
            }
        };

        let diagnostics = String::from_utf8_lossy(&output.stderr);
        match progress::parse_duration(&diagnostics) {
            Some(total) => DurationEstimate::Known(total),
            None => DurationEstimate::Unknown(ProbeFailure::NoDuration),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn stub(script: &str) -> DurationProber {
        DurationProber::new(Tool::new("sh").with_base_args(["-c", script, "ffmpeg"]))
    }

    #[tokio::test]
    async fn known_duration() {
        let prober = stub("echo '  Duration: 00:01:30.50, start: 0.000000' >&2; exit 1");
        assert_eq!(
            prober.probe("http://host/a.m3u8").await,
            DurationEstimate::Known(90.5)
        );
    }

    #[tokio::test]
    async fn missing_duration_is_unknown() {
        let prober = stub("echo 'http://host/a.m3u8: Connection refused' >&2; exit 1");
        assert_eq!(
            prober.probe("http://host/a.m3u8").await,
            DurationEstimate::Unknown(ProbeFailure::NoDuration)
        );
    }

    #[tokio::test]
    async fn missing_executable_is_unknown() {
        let prober = DurationProber::new(Tool::new("/nonexistent/bin/ffmpeg"));
        match prober.probe("http://host/a.m3u8").await {
            DurationEstimate::Unknown(ProbeFailure::Spawn(msg)) => {
                assert!(msg.contains("/nonexistent/bin/ffmpeg"))
            }
            other => panic!("unexpected estimate: {:?}", other),
        }
    }
}
