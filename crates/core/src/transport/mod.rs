//! Best-effort delivery of control frames to the lighting controller.
//!
//! The audio thread only ever calls [`FrameSender::send`], which moves a
//! `Copy` frame into a bounded queue without waiting. A dedicated worker
//! thread owns the sink, serialises frames to the wire format and absorbs
//! every failure. Frames that cannot be queued are dropped and counted.

use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::{config::TransportConfig, ControlFrame, LightSyncError, Result};

/// Destination for control frames. Implementations may block; they are only
/// driven from the transport worker thread.
pub trait FrameSink: Send {
    fn send(&mut self, frame: &ControlFrame) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes one text record per frame to any [`Write`] implementation.
#[derive(Debug)]
pub struct LineSink<W> {
    writer: W,
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> FrameSink for LineSink<W> {
    fn send(&mut self, frame: &ControlFrame) -> Result<()> {
        frame
            .write_line(&mut self.writer)
            .map_err(|err| LightSyncError::Transport(err.to_string()))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|err| LightSyncError::Transport(err.to_string()))
    }
}

/// Opens the configured serial port. Returns `Ok(None)` when no port is
/// configured.
///
/// Microcontroller boards commonly reset when the port opens, so the call
/// waits `settle_ms` before handing the port out.
pub fn open_serial(config: &TransportConfig) -> Result<Option<Box<dyn FrameSink>>> {
    let Some(path) = config.port.as_deref() else {
        return Ok(None);
    };

    let port = serialport::new(path, config.baud_rate)
        .timeout(Duration::from_millis(config.write_timeout_ms))
        .open()?;
    tracing::info!(port = path, baud = config.baud_rate, "serial link open");

    if config.settle_ms > 0 {
        thread::sleep(Duration::from_millis(config.settle_ms));
    }

    let sink: Box<dyn FrameSink> = Box::new(LineSink::new(port));
    Ok(Some(sink))
}

/// Delivery counters shared between the sender and the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Frames written to the sink.
    pub sent: u64,
    /// Frames the sink rejected.
    pub failed: u64,
    /// Frames dropped before reaching the worker (queue full or closed).
    pub dropped: u64,
    /// Frames discarded because no sink was available.
    pub discarded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    discarded: AtomicU64,
    queue_full_reported: AtomicBool,
    disconnect_reported: AtomicBool,
}

impl Counters {
    fn snapshot(&self) -> TransportStats {
        TransportStats {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Non-blocking producer half, safe to call from the audio callback.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: Sender<ControlFrame>,
    counters: Arc<Counters>,
}

impl FrameSender {
    /// Queues `frame` for delivery. Never blocks; returns `false` when the
    /// frame was dropped.
    pub fn send(&self, frame: ControlFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                if !self.counters.queue_full_reported.swap(true, Ordering::Relaxed) {
                    tracing::warn!("transport queue full; dropping frames");
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                if !self.counters.disconnect_reported.swap(true, Ordering::Relaxed) {
                    tracing::warn!("transport worker is gone; dropping frames");
                }
                false
            }
        }
    }
}

/// Owns the transport worker thread.
///
/// Shutdown closes the queue, lets the worker drain whatever is still
/// queued, flushes the sink and joins the thread. Outstanding
/// [`FrameSender`] clones must be dropped first or the worker keeps waiting
/// for frames.
#[derive(Debug)]
pub struct TransportWorker {
    tx: Option<Sender<ControlFrame>>,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<()>>,
}

impl TransportWorker {
    /// Starts the worker. `connect` runs on the worker thread, so a slow or
    /// failing open never delays the caller. A failed connect is logged once
    /// and the worker keeps draining frames without a sink.
    pub fn spawn<F>(queue_depth: usize, connect: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Option<Box<dyn FrameSink>>> + Send + 'static,
    {
        let (tx, rx) = bounded(queue_depth.max(1));
        let counters = Arc::new(Counters::default());

        let worker = thread::Builder::new()
            .name("lightsync-transport".to_string())
            .spawn({
                let counters = counters.clone();
                move || run_worker(rx, connect, &counters)
            })?;

        Ok(Self {
            tx: Some(tx),
            counters,
            worker: Some(worker),
        })
    }

    /// Starts a worker writing to the configured serial port.
    pub fn serial(config: &TransportConfig) -> Result<Self> {
        let config = config.clone();
        Self::spawn(config.queue_depth, move || open_serial(&config))
    }

    /// New producer handle for the audio thread.
    pub fn sender(&self) -> Option<FrameSender> {
        self.tx.as_ref().map(|tx| FrameSender {
            tx: tx.clone(),
            counters: self.counters.clone(),
        })
    }

    pub fn stats(&self) -> TransportStats {
        self.counters.snapshot()
    }

    /// Drains queued frames, releases the sink and joins the worker.
    /// Idempotent.
    pub fn shutdown(&mut self) -> TransportStats {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("transport worker panicked");
            }
            let stats = self.counters.snapshot();
            tracing::info!(
                sent = stats.sent,
                failed = stats.failed,
                dropped = stats.dropped,
                discarded = stats.discarded,
                "transport closed"
            );
        }
        self.counters.snapshot()
    }
}

impl Drop for TransportWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<F>(rx: Receiver<ControlFrame>, connect: F, counters: &Counters)
where
    F: FnOnce() -> Result<Option<Box<dyn FrameSink>>>,
{
    let mut sink = match connect() {
        Ok(Some(sink)) => Some(sink),
        Ok(None) => {
            tracing::info!("no lighting controller configured; frames will be discarded");
            None
        }
        Err(err) => {
            tracing::warn!(%err, "could not connect to lighting controller; continuing without it");
            None
        }
    };

    let mut write_fault = false;
    for frame in rx.iter() {
        let Some(active) = sink.as_mut() else {
            counters.discarded.fetch_add(1, Ordering::Relaxed);
            continue;
        };

        match active.send(&frame) {
            Ok(()) => {
                counters.queue_full_reported.store(false, Ordering::Relaxed);
                counters.sent.fetch_add(1, Ordering::Relaxed);
                if write_fault {
                    tracing::info!("lighting controller link recovered");
                    write_fault = false;
                }
            }
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                if !write_fault {
                    tracing::warn!(%err, "failed to write control frame");
                    write_fault = true;
                }
            }
        }
    }

    if let Some(mut sink) = sink {
        if let Err(err) = sink.flush() {
            tracing::warn!(%err, "failed to flush lighting controller link");
        }
    }
}
