use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// How to invoke the external converter (`ffmpeg` unless configured otherwise).
#[derive(Debug, Clone)]
pub struct Tool {
    program: PathBuf,
    base_args: Vec<OsString>,
}

impl Tool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    /// Arguments placed before every invocation's own arguments.
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.base_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Inspection run: no output file, the stream summary goes to stderr.
    pub fn probe_command(&self, source: &str) -> Command {
        let mut cmd = self.command();
        cmd.args(["-hide_banner", "-i", source])
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }

    /// Remux without re-encoding, machine-readable progress on stdout, overwrite the destination.
    ///
    /// `-nostats` keeps the `\r`-refreshed status line off stderr; `-progress` replaces it.
    pub fn transfer_command(&self, source: &str, destination: &Path) -> Command {
        let mut cmd = self.command();
        cmd.arg("-nostats")
            .args(["-i", source, "-c", "copy", "-bsf:a", "aac_adtstoasc"])
            .args(["-progress", "pipe:1", "-y"])
            .arg(destination)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Default for Tool {
    fn default() -> Self {
        Tool::new("ffmpeg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_arguments_follow_base_args() {
        let tool = Tool::new("ffmpeg").with_base_args(["-loglevel", "info"]);
        let cmd = tool.transfer_command("http://host/a.m3u8", Path::new("out/a.mp4"));
        let args: Vec<_> = cmd.as_std().get_args().collect();
        assert_eq!(args[..2], ["-loglevel", "info"]);
        assert!(args.contains(&"-y".as_ref()));
        assert_eq!(args[2], "-nostats");
        assert_eq!(args.last().unwrap(), &"out/a.mp4");
        let pos = args.iter().position(|a| *a == "-progress").unwrap();
        assert_eq!(args[pos + 1], "pipe:1");
    }

    #[test]
    fn probe_reads_the_locator() {
        let cmd = Tool::default().probe_command("http://host/a.m3u8");
        assert_eq!(cmd.as_std().get_program(), "ffmpeg");
        let args: Vec<_> = cmd.as_std().get_args().collect();
        assert_eq!(args, ["-hide_banner", "-i", "http://host/a.m3u8"]);
    }
}
