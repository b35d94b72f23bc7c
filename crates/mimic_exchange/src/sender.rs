//! # Command Sender
//!
//! Encodes control commands and hands them to a dedicated writer thread
//! that owns the outbound transport.
//!
//! ```text
//!   any thread ──send──▶ [bounded queue] ──▶ mimic-sender ──▶ Outbound
//!                 (never blocks)              (may block on the socket)
//! ```
//!
//! A full queue refuses the command instead of waiting, the way a push
//! socket behaves at its high-water mark. `close` stops accepting
//! commands, lets the writer flush what is queued and waits a bounded
//! time for it to release the transport.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use mimic_protocol::{encode_command, CommandKind};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ExchangeError, ExchangeResult, ShutdownError};
use crate::stats::{bump, ExchangeStats};
use crate::transport::Outbound;

/// Writer thread and its exit signal.
struct Writer {
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

/// Sends commands over the outbound transport.
pub struct CommandSender {
    queue: Mutex<Option<Sender<Vec<u8>>>>,
    writer: Mutex<Option<Writer>>,
    stats: Arc<ExchangeStats>,
    capacity: usize,
    close_timeout: Duration,
}

fn write_loop(
    mut outbound: Box<dyn Outbound>,
    frames: &Receiver<Vec<u8>>,
    stats: &ExchangeStats,
    exited: &Sender<()>,
) {
    // Ends once every queue handle is gone and the backlog is written
    for frame in frames {
        match outbound.send(&frame) {
            Ok(()) => bump(&stats.commands_sent),
            Err(e) => {
                bump(&stats.send_errors);
                warn!(error = %e, len = frame.len(), "command write failed");
            }
        }
    }
    drop(outbound);
    info!("outbound writer stopped");
    let _ = exited.send(());
}

impl CommandSender {
    /// Starts the writer thread over `outbound`.
    ///
    /// # Errors
    ///
    /// Thread spawn failures.
    pub fn spawn(
        outbound: Box<dyn Outbound>,
        stats: Arc<ExchangeStats>,
        capacity: usize,
        close_timeout: Duration,
    ) -> std::io::Result<Self> {
        let (queue_tx, queue_rx) = bounded(capacity);
        let (exit_tx, exit_rx) = bounded(1);

        let writer_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("mimic-sender".into())
            .spawn(move || write_loop(outbound, &queue_rx, &writer_stats, &exit_tx))?;

        Ok(Self {
            queue: Mutex::new(Some(queue_tx)),
            writer: Mutex::new(Some(Writer {
                handle,
                exited: exit_rx,
            })),
            stats,
            capacity,
            close_timeout,
        })
    }

    /// Queues `kind` with an opaque payload. Never blocks.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::Encode`] for oversized payloads,
    /// [`ExchangeError::QueueFull`] if the writer is behind,
    /// [`ExchangeError::NotRunning`] after [`CommandSender::close`].
    pub fn send(&self, kind: CommandKind, payload: &[u8]) -> ExchangeResult<()> {
        let frame = encode_command(kind, payload)?;

        let queue = self.queue.lock();
        let Some(queue) = queue.as_ref() else {
            return Err(ExchangeError::NotRunning);
        };
        match queue.try_send(frame) {
            Ok(()) => {
                debug!(%kind, payload_len = payload.len(), "command queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                bump(&self.stats.commands_dropped);
                warn!(%kind, capacity = self.capacity, "send queue full, dropping command");
                Err(ExchangeError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => Err(ExchangeError::NotRunning),
        }
    }

    /// Whether [`CommandSender::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.queue.lock().is_none()
    }

    /// Refuses further commands and waits for the writer to flush the
    /// queue and close the transport.
    ///
    /// Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// [`ShutdownError::WriterTimeout`] if the writer is still busy after
    /// the close timeout, [`ShutdownError::WriterPanicked`] if it panicked.
    pub fn close(&self) -> Result<(), ShutdownError> {
        drop(self.queue.lock().take());

        let Some(writer) = self.writer.lock().take() else {
            return Ok(());
        };
        match writer.exited.recv_timeout(self.close_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout = ?self.close_timeout, "outbound writer did not exit in time");
                return Err(ShutdownError::WriterTimeout(self.close_timeout));
            }
        }
        writer
            .handle
            .join()
            .map_err(|_| ShutdownError::WriterPanicked)
    }

    /// Sends `kind` with an empty payload.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn send_empty(&self, kind: CommandKind) -> ExchangeResult<()> {
        self.send(kind, &[])
    }

    /// Asks the spotters for a single frame.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn grab_frame(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::GrabFrame)
    }

    /// Runs camera pose estimation.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn estimate_pose(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::EstimatePose)
    }

    /// Switches debug frames to grayscale.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn send_grayscale(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::SendGrayscale)
    }

    /// Switches debug frames to binarized.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn send_binarized(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::SendBinarized)
    }

    /// Stops debug frames.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn no_frames(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::NoFrames)
    }

    /// Has the tracker dump its rays to disk.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn save_rays_to_file(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::SaveRaysToFile)
    }

    /// Has the spotters dump their frames to disk.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn save_frames_to_file(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::SaveFramesToFile)
    }

    /// Matches tracked points against the model.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn match_model(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::MatchModel)
    }

    /// Sets the spotters' binarization threshold.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn set_binarization_threshold(&self, threshold: u8) -> ExchangeResult<()> {
        self.send(CommandKind::BinarizationThreshold, &[threshold])
    }

    /// Shuts the tracking system down.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn stop_system(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::StopSystem)
    }

    /// Turns on the tracker's debug stream.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn start_debugging(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::StartDebugging)
    }

    /// Turns off the tracker's debug stream.
    ///
    /// # Errors
    ///
    /// Same as [`CommandSender::send`].
    pub fn stop_debugging(&self) -> ExchangeResult<()> {
        self.send_empty(CommandKind::StopDebugging)
    }
}

impl std::fmt::Debug for CommandSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSender")
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{memory_pair, MemoryInbound};
    use mimic_protocol::{decode_command, peek_header, CommandHeader, MessageHeader};
    use std::io;
    use std::time::Instant;

    const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

    fn recv(rx: &MemoryInbound) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(frame) = rx.try_recv() {
                return frame;
            }
            assert!(Instant::now() < deadline, "no frame arrived");
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Outbound whose writes wait until released.
    struct Gate {
        open: Receiver<()>,
    }

    impl Outbound for Gate {
        fn send(&mut self, _message: &[u8]) -> io::Result<()> {
            let _ = self.open.recv();
            Ok(())
        }
    }

    #[test]
    fn test_threshold_frame() {
        let (tx, rx) = memory_pair();
        let stats = Arc::new(ExchangeStats::default());
        let sender =
            CommandSender::spawn(Box::new(tx), Arc::clone(&stats), 8, CLOSE_TIMEOUT).unwrap();

        sender.set_binarization_threshold(42).unwrap();

        let frame = recv(&rx);
        let header = peek_header(&frame).unwrap();
        assert_eq!(header.payload_size as usize, CommandHeader::SIZE + 1);
        assert_eq!(frame.len(), MessageHeader::SIZE + CommandHeader::SIZE + 1);
        assert_eq!(
            decode_command(&frame).unwrap(),
            (CommandKind::BinarizationThreshold, vec![42])
        );

        sender.close().unwrap();
        assert_eq!(stats.snapshot().commands_sent, 1);
    }

    #[test]
    fn test_concurrent_senders_never_interleave() {
        let (tx, rx) = memory_pair();
        let sender = Arc::new(
            CommandSender::spawn(
                Box::new(tx),
                Arc::new(ExchangeStats::default()),
                256,
                CLOSE_TIMEOUT,
            )
            .unwrap(),
        );

        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let sender = Arc::clone(&sender);
                thread::spawn(move || {
                    for _ in 0..50 {
                        sender.send(CommandKind::SaveRaysToFile, &[t; 16]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        sender.close().unwrap();

        let mut count = 0;
        while let Some(frame) = rx.try_recv() {
            let (kind, payload) = decode_command(&frame).unwrap();
            assert_eq!(kind, CommandKind::SaveRaysToFile);
            assert!(payload.iter().all(|b| *b == payload[0]));
            count += 1;
        }
        assert_eq!(count, 200);
    }

    #[test]
    fn test_write_failure_counted() {
        let (tx, rx) = memory_pair();
        drop(rx);
        let stats = Arc::new(ExchangeStats::default());
        let sender =
            CommandSender::spawn(Box::new(tx), Arc::clone(&stats), 8, CLOSE_TIMEOUT).unwrap();

        // Queued fine; the write fails on the writer thread
        sender.stop_system().unwrap();
        sender.close().unwrap();
        assert_eq!(stats.snapshot().send_errors, 1);
        assert_eq!(stats.snapshot().commands_sent, 0);
    }

    #[test]
    fn test_blocked_writer_never_blocks_callers() {
        let (release, open) = crossbeam_channel::unbounded();
        let stats = Arc::new(ExchangeStats::default());
        let sender = CommandSender::spawn(
            Box::new(Gate { open }),
            Arc::clone(&stats),
            2,
            CLOSE_TIMEOUT,
        )
        .unwrap();

        let started = Instant::now();
        let mut refused = 0;
        for _ in 0..10 {
            if let Err(e) = sender.grab_frame() {
                assert!(matches!(e, ExchangeError::QueueFull { capacity: 2 }));
                refused += 1;
            }
        }
        assert!(started.elapsed() < Duration::from_millis(200));
        // One frame held by the writer, two queued
        assert!(refused >= 7, "{refused} refused");
        assert_eq!(stats.snapshot().commands_dropped, refused);

        drop(release);
        sender.close().unwrap();
    }

    #[test]
    fn test_close_refuses_later_sends() {
        let (tx, rx) = memory_pair();
        let sender = Arc::new(
            CommandSender::spawn(
                Box::new(tx),
                Arc::new(ExchangeStats::default()),
                8,
                CLOSE_TIMEOUT,
            )
            .unwrap(),
        );
        let held = Arc::clone(&sender);

        sender.start_debugging().unwrap();
        sender.close().unwrap();
        sender.close().unwrap();
        assert!(held.is_closed());

        assert!(matches!(held.stop_system(), Err(ExchangeError::NotRunning)));
        // Queued before close, flushed; nothing after
        assert_eq!(
            decode_command(&rx.try_recv().unwrap()).unwrap().0,
            CommandKind::StartDebugging
        );
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_close_times_out_on_stuck_writer() {
        let (release, open) = crossbeam_channel::unbounded();
        let sender = CommandSender::spawn(
            Box::new(Gate { open }),
            Arc::new(ExchangeStats::default()),
            4,
            Duration::from_millis(50),
        )
        .unwrap();
        sender.grab_frame().unwrap();

        assert_eq!(
            sender.close(),
            Err(ShutdownError::WriterTimeout(Duration::from_millis(50)))
        );
        drop(release);
    }
}
