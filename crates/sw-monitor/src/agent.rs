//! Worker tasks shared by every monitor transport
//!
//! A running agent is observed by three independent tasks: a protocol reader
//! on its standard output, a diagnostic reader on its standard error, and a
//! transport-specific exit waiter. They talk to the orchestrator only through
//! the latest-wins status slot, the single-slot error queue and the `done`
//! token.

use std::collections::VecDeque;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;

use sw_core::error::{SessionError, StartError};
use sw_core::streams::{error_slot, status_channel, ErrorSender, SessionStreams, StatusSender};
use sw_protocol::{Frame, FrameCodec, FrameType, PROTOCOL_VERSION};

/// Diagnostic lines kept for start failure reports
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Longest diagnostic line kept
const DIAGNOSTIC_LINE_LIMIT: usize = 4096;

/// How long to wait for the exit code once the agent's output has ended
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// First frame seen on the protocol stream
#[derive(Debug)]
enum Handshake {
    Version(String),
    Unexpected(FrameType),
}

/// Results the start path waits on; dropped once the handshake is decided
pub(crate) struct StartSignals {
    handshake: oneshot::Receiver<Handshake>,
    diagnostics: oneshot::Receiver<String>,
    exit: oneshot::Receiver<Option<u32>>,
}

/// Handed to the transport's exit waiter
pub(crate) struct ExitNotifier {
    exit_tx: oneshot::Sender<Option<u32>>,
    done: CancellationToken,
}

impl ExitNotifier {
    /// Record the exit code and signal end of session
    pub(crate) fn exited(self, code: Option<u32>) {
        tracing::debug!("Monitor agent exited with code {:?}", code);
        let _ = self.exit_tx.send(code);
        self.done.cancel();
    }
}

/// Everything produced by wiring the readers to a freshly launched agent
pub(crate) struct AgentWorkers {
    pub streams: SessionStreams,
    pub signals: StartSignals,
    pub exit: ExitNotifier,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Spawn the protocol and diagnostic readers for a launched agent
pub(crate) fn spawn_readers<O, E>(stdout: O, stderr: E, label: &str) -> AgentWorkers
where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
{
    let (status_tx, status_rx) = status_channel();
    let (error_tx, error_rx) = error_slot();
    let done = CancellationToken::new();

    let (handshake_tx, handshake_rx) = oneshot::channel();
    let (diag_tx, diag_rx) = oneshot::channel();
    let (exit_tx, exit_rx) = oneshot::channel();

    let tasks = vec![
        tokio::spawn(read_protocol(stdout, handshake_tx, status_tx, error_tx)),
        tokio::spawn(read_diagnostics(stderr, label.to_string(), diag_tx)),
    ];

    AgentWorkers {
        streams: SessionStreams {
            status: status_rx,
            errors: error_rx,
            done: done.clone(),
        },
        signals: StartSignals {
            handshake: handshake_rx,
            diagnostics: diag_rx,
            exit: exit_rx,
        },
        exit: ExitNotifier { exit_tx, done },
        tasks,
    }
}

async fn read_protocol<R>(
    reader: R,
    handshake_tx: oneshot::Sender<Handshake>,
    status: StatusSender,
    errors: ErrorSender,
) where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, FrameCodec::new());
    let mut handshake_tx = Some(handshake_tx);

    while let Some(next) = frames.next().await {
        let frame = match next {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Protocol stream failed: {}", e);
                errors.report(SessionError::Stream(e.to_string()));
                break;
            }
        };

        if let Some(tx) = handshake_tx.take() {
            let first = match frame {
                Frame::Version { version } => Handshake::Version(version),
                other => Handshake::Unexpected(other.frame_type()),
            };
            let _ = tx.send(first);
            continue;
        }

        match frame {
            Frame::Status { data } => {
                tracing::trace!("Status batch with {} sessions", data.len());
                status.push(data);
            }
            Frame::Error { message } => {
                tracing::warn!("Monitor agent reported: {}", message);
                errors.report(SessionError::Remote(message));
            }
            Frame::Version { version } => {
                tracing::debug!("Ignoring repeated version frame ({})", version);
            }
        }
    }

    tracing::debug!(
        "Protocol stream ended ({} malformed lines dropped)",
        frames.decoder().dropped()
    );
}

async fn read_diagnostics<R>(reader: R, label: String, tail_tx: oneshot::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(DIAGNOSTIC_LINE_LIMIT));
    let mut tail: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);

    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                tracing::debug!("[{}] {}", label, line);
                if tail.len() == DIAGNOSTIC_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) => {
                tracing::debug!("[{}] diagnostic stream: {}", label, e);
                // Oversized lines are discarded by the codec; keep reading
                if matches!(e, tokio_util::codec::LinesCodecError::Io(_)) {
                    break;
                }
            }
        }
    }

    let _ = tail_tx.send(Vec::from(tail).join("\n"));
}

/// Wait for the agent's first frame and check its version.
///
/// A version frame with exactly [`PROTOCOL_VERSION`] succeeds. Any other
/// first frame, or silence for `timeout`, is a version problem. Output ending
/// without any frame is reported as an early exit with the exit code and the
/// tail of the diagnostic stream.
pub(crate) async fn await_handshake(
    signals: StartSignals,
    timeout: Duration,
) -> Result<(), StartError> {
    let StartSignals {
        handshake,
        diagnostics,
        exit,
    } = signals;

    match tokio::time::timeout(timeout, handshake).await {
        Err(_) => {
            tracing::warn!("No version frame within {:?}", timeout);
            Err(StartError::HandshakeTimeout(timeout))
        }
        Ok(Ok(Handshake::Version(version))) if version == PROTOCOL_VERSION => {
            tracing::debug!("Handshake complete (protocol {})", version);
            Ok(())
        }
        Ok(Ok(Handshake::Version(version))) => Err(StartError::VersionMismatch {
            expected: PROTOCOL_VERSION.to_string(),
            found: Some(version),
        }),
        Ok(Ok(Handshake::Unexpected(kind))) => {
            tracing::warn!("First frame was '{}', expected 'version'", kind);
            Err(StartError::VersionMismatch {
                expected: PROTOCOL_VERSION.to_string(),
                found: None,
            })
        }
        Ok(Err(_)) => {
            let code = tokio::time::timeout(EXIT_GRACE, exit)
                .await
                .ok()
                .and_then(|r| r.ok())
                .flatten();
            let detail = tokio::time::timeout(EXIT_GRACE, diagnostics)
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or_default();
            Err(StartError::EarlyExit { code, detail })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn version_line(version: &str) -> String {
        format!("{{\"type\":\"version\",\"version\":\"{}\"}}\n", version)
    }

    #[tokio::test]
    async fn test_handshake_accepts_exact_version() {
        let (mut out, out_rx) = tokio::io::duplex(1024);
        let (_err, err_rx) = tokio::io::duplex(1024);
        let workers = spawn_readers(out_rx, err_rx, "test");

        out.write_all(version_line(PROTOCOL_VERSION).as_bytes())
            .await
            .unwrap();

        await_handshake(workers.signals, Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_handshake_rejects_other_version() {
        let (mut out, out_rx) = tokio::io::duplex(1024);
        let (_err, err_rx) = tokio::io::duplex(1024);
        let workers = spawn_readers(out_rx, err_rx, "test");

        out.write_all(version_line("0.0.1").as_bytes()).await.unwrap();

        let err = await_handshake(workers.signals, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StartError::VersionMismatch { found: Some(ref v), .. } if v == "0.0.1"
        ));
    }

    #[tokio::test]
    async fn test_handshake_rejects_status_first() {
        let (mut out, out_rx) = tokio::io::duplex(1024);
        let (_err, err_rx) = tokio::io::duplex(1024);
        let workers = spawn_readers(out_rx, err_rx, "test");

        out.write_all(b"{\"type\":\"status\",\"data\":[]}\n")
            .await
            .unwrap();

        let err = await_handshake(workers.signals, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_version_problem());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_times_out_on_silence() {
        let (_out, out_rx) = tokio::io::duplex(1024);
        let (_err, err_rx) = tokio::io::duplex(1024);
        let workers = spawn_readers(out_rx, err_rx, "test");

        let err = await_handshake(workers.signals, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, StartError::HandshakeTimeout(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_early_exit_carries_code_and_diagnostics() {
        let (out, out_rx) = tokio::io::duplex(1024);
        let (mut err, err_rx) = tokio::io::duplex(1024);
        let workers = spawn_readers(out_rx, err_rx, "test");

        err.write_all(b"bash: /home/u/.sesswatch/monitor.sh: No such file or directory\n")
            .await
            .unwrap();
        drop(err);
        drop(out);
        workers.exit.exited(Some(127));

        let result = await_handshake(workers.signals, Duration::from_secs(1)).await;
        match result {
            Err(StartError::EarlyExit { code, detail }) => {
                assert_eq!(code, Some(127));
                assert!(detail.contains("No such file or directory"));
            }
            other => panic!("Expected early exit, got {:?}", other),
        }
        assert!(workers.streams.done.is_cancelled());
    }

    #[tokio::test]
    async fn test_frames_after_handshake_reach_streams() {
        let (mut out, out_rx) = tokio::io::duplex(4096);
        let (_err, err_rx) = tokio::io::duplex(1024);
        let AgentWorkers {
            mut streams,
            signals,
            ..
        } = spawn_readers(out_rx, err_rx, "test");

        out.write_all(version_line(PROTOCOL_VERSION).as_bytes())
            .await
            .unwrap();
        await_handshake(signals, Duration::from_secs(1)).await.unwrap();

        out.write_all(
            b"not json\n{\"type\":\"status\",\"data\":[{\"project\":\"/w\",\"project_name\":\"w\",\"session_id\":\"a\",\"status\":\"idle\",\"updated_at\":9}]}\n",
        )
        .await
        .unwrap();
        let batch = streams.status.recv().await.unwrap();
        assert_eq!(batch[0].project_display_name, "w");
        assert!(streams.errors.try_recv().is_err());

        out.write_all(b"{\"type\":\"error\",\"message\":\"watch limit reached\"}\n")
            .await
            .unwrap();
        let err = streams.errors.recv().await.unwrap();
        assert_eq!(err, SessionError::Remote("watch limit reached".to_string()));
        assert!(!streams.done.is_cancelled());
    }
}
