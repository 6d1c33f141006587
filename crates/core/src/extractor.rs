//! The external download/transcode capability.
//!
//! The orchestrator treats the extractor as a black box: given a source and
//! a desired format it eventually writes one file under the job's output
//! template (choosing the extension itself) and exits zero, or fails.

use std::path::PathBuf;

use tokio::process::Command;

use crate::job::JobToken;
use crate::request::ConversionRequest;

/// Builds the child process for one conversion.
///
/// Implementations only describe the command; stdio, `kill_on_drop` and the
/// timeout are owned by the orchestrator.
pub trait AudioExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn command(&self, request: &ConversionRequest, job: &JobToken) -> Command;
}

/// Default program name, resolved through `PATH`.
pub const DEFAULT_YTDLP_PROGRAM: &str = "yt-dlp";

/// `yt-dlp -x --audio-format <fmt> --audio-quality <q> -o <template> <url>`.
///
/// Arguments are passed as argv, never through a shell.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: PathBuf,
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_YTDLP_PROGRAM)
    }
}

impl YtDlpExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl AudioExtractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    fn command(&self, request: &ConversionRequest, job: &JobToken) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-x")
            .args(["--audio-format", request.desired_format()])
            .args(["--audio-quality", request.desired_quality()])
            .arg("-o")
            .arg(job.output_template())
            // Everything after `--` is a positional URL, never an option.
            .arg("--")
            .arg(request.source_reference());
        cmd
    }
}
