//! Process orchestrator.
//!
//! Launches the extractor for one job and races three independent tasks
//! against each other:
//!
//! - the **supervisory timer**, which settles `TimedOut` and asks for the
//!   child to be killed;
//! - the **exit watcher**, which owns the child, reaps it, classifies the exit
//!   and runs artifact resolution after a clean exit;
//! - the **caller**, whose disappearance (dropped future) also kills the child.
//!
//! None of them talks to the caller directly. They all offer their outcome to
//! the per-request [`OutcomeSlot`], whose guard lets exactly one through.
//! Files of a job are purged unless a `Completed` outcome actually reached
//! the caller, in which case delivery owns the artifact.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::excerpt::{excerpt, tail_excerpt, DETAILS_MAX_CHARS};
use crate::extractor::AudioExtractor;
use crate::guard::{OutcomeSlot, OutcomeSource, Settlement};
use crate::job::JobToken;
use crate::outcome::TerminalOutcome;
use crate::request::ConversionRequest;
use crate::resolver::ArtifactResolver;
use crate::workdir::WorkDir;

/// Wall-clock budget for one extractor run.
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Maximum stderr retained for the failure excerpt (64 KiB).
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Stdout markers the extractor uses for progress lines.
const PROGRESS_MARKERS: &[&str] = &["[download]", "[ExtractAudio]"];

/// Side-channel lines are cut to this many characters in the log.
const LOG_LINE_MAX_CHARS: usize = 200;

/// How long to wait for stderr to close after the child is reaped.
/// Grandchildren (the transcoder) can keep the pipe open after a kill.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[cfg(unix)]
const SIGTERM: i32 = 15;

/// How the exit watcher stopped waiting on the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    /// The child exited on its own.
    Natural,
    /// The supervisory timer won and asked for a kill.
    Timeout,
    /// The caller dropped the request.
    CallerGone,
}

/// Runs conversions against one work dir with one extractor.
///
/// Held in application state behind an `Arc`; each [`run`](Self::run) call
/// owns its own job token, timers and guard.
pub struct Orchestrator {
    work_dir: WorkDir,
    extractor: Arc<dyn AudioExtractor>,
    resolver: Arc<dyn ArtifactResolver>,
    process_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        work_dir: WorkDir,
        extractor: Arc<dyn AudioExtractor>,
        resolver: Arc<dyn ArtifactResolver>,
        process_timeout: Duration,
    ) -> Self {
        Self {
            work_dir,
            extractor,
            resolver,
            process_timeout,
        }
    }

    pub fn work_dir(&self) -> &WorkDir {
        &self.work_dir
    }

    pub fn process_timeout(&self) -> Duration {
        self.process_timeout
    }

    /// Convert one request and return its single terminal outcome.
    ///
    /// Dropping the returned future before it resolves kills the child and
    /// purges the job's files.
    pub async fn run(&self, request: &ConversionRequest) -> TerminalOutcome {
        let job = JobToken::issue(self.work_dir.path());
        let span = tracing::info_span!("conversion", job_id = job.id());
        self.run_job(request, job).instrument(span).await
    }

    async fn run_job(&self, request: &ConversionRequest, job: JobToken) -> TerminalOutcome {
        let (slot, outcome_rx) = OutcomeSlot::new(job.id());

        let caller_gone = CancellationToken::new();
        let caller_guard = caller_gone.clone().drop_guard();

        match self.launch(request, &job).await {
            Ok(child) => self.supervise(child, job, Arc::clone(&slot), caller_gone),
            Err(reason) => {
                slot.settle(
                    OutcomeSource::Spawn,
                    TerminalOutcome::ProcessLaunchFailed(reason),
                );
            }
        }

        let outcome = outcome_rx.await.unwrap_or_else(|_| {
            TerminalOutcome::ProcessLaunchFailed(
                "Conversion tasks ended without an outcome".to_string(),
            )
        });

        // The outcome is in hand; leaving now is not a disconnect.
        caller_guard.disarm();
        outcome
    }

    async fn launch(&self, request: &ConversionRequest, job: &JobToken) -> Result<Child, String> {
        self.work_dir
            .prepare()
            .await
            .map_err(|e| format!("Work dir unavailable: {e}"))?;

        let mut cmd = self.extractor.command(request, job);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(
            extractor = self.extractor.name(),
            source = request.source_reference(),
            format = request.desired_format(),
            output = %job.output_template().display(),
            "Downloading and converting"
        );

        cmd.spawn().map_err(|e| {
            tracing::error!(error = %e, extractor = self.extractor.name(), "Process error");
            e.to_string()
        })
    }

    /// Spawn the side-channel readers, the timer and the exit watcher.
    fn supervise(
        &self,
        mut child: Child,
        job: JobToken,
        slot: Arc<OutcomeSlot>,
        caller_gone: CancellationToken,
    ) {
        let span = tracing::Span::current();
        let kill = CancellationToken::new();
        let exited = CancellationToken::new();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(log_stdout(stdout).instrument(span.clone()));
        }
        let stderr = tokio::spawn(collect_stderr(child.stderr.take()).instrument(span.clone()));

        tokio::spawn(
            run_timer(
                self.process_timeout,
                Arc::clone(&slot),
                kill.clone(),
                exited.clone(),
            )
            .instrument(span.clone()),
        );

        let watcher = ExitWatcher {
            job,
            slot,
            resolver: Arc::clone(&self.resolver),
            work_dir: self.work_dir.clone(),
            process_timeout: self.process_timeout,
        };
        tokio::spawn(
            watcher
                .run(child, stderr, kill, exited, caller_gone)
                .instrument(span),
        );
    }
}

/// Supervisory timer. Cleared as soon as the child has been reaped.
async fn run_timer(
    timeout: Duration,
    slot: Arc<OutcomeSlot>,
    kill: CancellationToken,
    exited: CancellationToken,
) {
    tokio::select! {
        _ = exited.cancelled() => {
            tracing::debug!("Supervisory timer cleared");
        }
        _ = tokio::time::sleep(timeout) => {
            let outcome = TerminalOutcome::TimedOut { after: timeout };
            if slot.settle(OutcomeSource::Timer, outcome).won_guard() {
                tracing::error!(
                    timeout_secs = timeout.as_secs(),
                    "Timeout: process took too long"
                );
                kill.cancel();
            }
        }
    }
}

struct ExitWatcher {
    job: JobToken,
    slot: Arc<OutcomeSlot>,
    resolver: Arc<dyn ArtifactResolver>,
    work_dir: WorkDir,
    process_timeout: Duration,
}

impl ExitWatcher {
    async fn run(
        self,
        mut child: Child,
        stderr: JoinHandle<String>,
        kill: CancellationToken,
        exited: CancellationToken,
        caller_gone: CancellationToken,
    ) {
        let (status, termination) = tokio::select! {
            biased;
            status = child.wait() => (status, Termination::Natural),
            _ = kill.cancelled() => (terminate(&mut child).await, Termination::Timeout),
            _ = caller_gone.cancelled() => (terminate(&mut child).await, Termination::CallerGone),
        };
        exited.cancel();

        let stderr = match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, stderr).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => {
                tracing::debug!("Extractor stderr still open after exit, not waiting");
                String::new()
            }
        };

        let (source, outcome) = match termination {
            Termination::CallerGone => {
                tracing::info!("Caller went away, extractor terminated");
                (OutcomeSource::Cancel, TerminalOutcome::Cancelled)
            }
            Termination::Natural | Termination::Timeout => {
                (OutcomeSource::Exit, self.classify(status, termination, &stderr).await)
            }
        };

        let delivered = outcome.is_success();
        let settlement = self.slot.settle(source, outcome);

        if !(delivered && settlement == Settlement::Accepted) {
            let purged = self.work_dir.purge_prefix(&self.job.artifact_prefix()).await;
            if purged > 0 {
                tracing::info!(purged, "Removed undelivered job files");
            }
        }
    }

    async fn classify(
        &self,
        status: io::Result<ExitStatus>,
        termination: Termination,
        stderr: &str,
    ) -> TerminalOutcome {
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(error = %e, "Lost track of extractor process");
                return TerminalOutcome::ProcessExitedNonZero {
                    exit_code: None,
                    stderr_excerpt: excerpt(&e.to_string(), DETAILS_MAX_CHARS),
                };
            }
        };

        if termination == Termination::Timeout || terminated_by_sigterm(&status) {
            return TerminalOutcome::TimedOut {
                after: self.process_timeout,
            };
        }

        if !status.success() {
            let stderr_excerpt = tail_excerpt(stderr, DETAILS_MAX_CHARS);
            tracing::error!(
                exit_code = ?status.code(),
                stderr = %stderr_excerpt,
                "Extractor failed"
            );
            return TerminalOutcome::ProcessExitedNonZero {
                exit_code: status.code(),
                stderr_excerpt,
            };
        }

        tracing::info!("Conversion completed");

        if self.slot.is_settled() {
            // Already answered (timer fired during exit); resolving is wasted work.
            return TerminalOutcome::ArtifactMissing;
        }
        self.resolver.resolve(&self.job).await
    }
}

/// Send the one and only kill to the child, then reap it.
async fn terminate(child: &mut Child) -> io::Result<ExitStatus> {
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "Failed to signal extractor");
    }
    child.wait().await
}

#[cfg(unix)]
fn terminated_by_sigterm(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(SIGTERM)
}

#[cfg(not(unix))]
fn terminated_by_sigterm(_status: &ExitStatus) -> bool {
    false
}

/// Split a side-channel stream into lines. The extractor redraws progress
/// with `\r`; only the last redraw of a line is kept.
fn last_redraw(segment: &[u8]) -> String {
    let text = String::from_utf8_lossy(segment);
    text.rsplit('\r')
        .find(|part| !part.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}

async fn log_stdout<R: AsyncRead + Unpin>(stream: R) {
    let mut segments = BufReader::new(stream).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(segment)) => {
                let line = last_redraw(&segment);
                if line.is_empty() {
                    continue;
                }
                let line = excerpt(&line, LOG_LINE_MAX_CHARS);
                if PROGRESS_MARKERS.iter().any(|m| line.contains(m)) {
                    tracing::info!(%line, "Progress");
                } else {
                    tracing::debug!(%line, "Extractor stdout");
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Extractor stdout closed");
                break;
            }
        }
    }
}

/// Log stderr and keep its tail for the failure excerpt.
///
/// Lines mentioning "error" are still informational here: only the exit code
/// decides whether the run failed.
async fn collect_stderr<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let Some(stream) = stream else {
        return String::new();
    };

    let mut tail = String::new();
    let mut segments = BufReader::new(stream).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(segment)) => {
                let line = last_redraw(&segment);
                if line.is_empty() {
                    continue;
                }
                let mentions_error = line.to_lowercase().contains("error");
                tracing::info!(
                    line = %excerpt(&line, LOG_LINE_MAX_CHARS),
                    mentions_error,
                    "Info"
                );
                tail.push_str(&line);
                tail.push('\n');
                trim_front(&mut tail, MAX_STDERR_BYTES);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Extractor stderr closed");
                break;
            }
        }
    }
    tail
}

/// Drop bytes from the front of `buf` until it fits in `max_bytes`.
fn trim_front(buf: &mut String, max_bytes: usize) {
    if buf.len() <= max_bytes {
        return;
    }
    let mut cut = buf.len() - max_bytes;
    while !buf.is_char_boundary(cut) {
        cut += 1;
    }
    buf.drain(..cut);
}

#[cfg(test)]
mod helper_tests {
    use super::*;

    #[test]
    fn last_redraw_keeps_final_progress_update() {
        assert_eq!(
            last_redraw(b"[download]  10%\r[download]  55%\r[download] 100%\r"),
            "[download] 100%"
        );
        assert_eq!(last_redraw(b"plain line"), "plain line");
        assert_eq!(last_redraw(b"\r\r"), "");
    }

    #[test]
    fn trim_front_respects_char_boundaries() {
        let mut buf = "ééé".to_string();
        trim_front(&mut buf, 3);
        assert_eq!(buf, "é");

        let mut small = "abc".to_string();
        trim_front(&mut small, 10);
        assert_eq!(small, "abc");
    }
}
