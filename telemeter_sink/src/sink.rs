use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use telemeter_core::{Collector, EvaluatedMeasurement};
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SinkConfig;
use crate::error::{Result, SinkError};
use crate::line_protocol::{self, now_nanos};
use crate::transport::{Transport, UdpTransport};

/// Buffered line-protocol sink for a Telegraf socket listener.
///
/// Lines accumulate until `buffer_size` is reached, then go out as a single
/// datagram. With a non-zero flush interval a background task also sends
/// whatever is buffered on every tick. Send failures are logged and the
/// batch is dropped.
pub struct TelegrafSink {
    inner: Arc<SinkInner>,
    flusher: Mutex<Option<CancellationToken>>,
}

struct SinkInner {
    buffer: Mutex<Vec<String>>,
    buffer_size: usize,
    prefix: Option<String>,
    transport: Arc<dyn Transport>,
}

impl SinkInner {
    fn take_batch(&self) -> Vec<String> {
        std::mem::take(&mut *self.buffer.lock())
    }

    fn transmit(&self, batch: Vec<String>) {
        if batch.is_empty() {
            return;
        }

        let payload = batch.concat();
        match self.transport.send(payload.as_bytes()) {
            Ok(()) => debug!(
                destination = %self.transport.destination(),
                lines = batch.len(),
                bytes = payload.len(),
                "Batch sent"
            ),
            Err(e) => error!(
                destination = %self.transport.destination(),
                lines = batch.len(),
                error = %e,
                payload = %payload,
                "Failed to send batch, dropping it"
            ),
        }
    }
}

impl TelegrafSink {
    /// Builds a sink sending over UDP to `config.uri`.
    pub fn configure(config: SinkConfig) -> Result<Self> {
        let transport = UdpTransport::bind(config.destination())?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: SinkConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let inner = Arc::new(SinkInner {
            buffer: Mutex::new(Vec::with_capacity(config.effective_buffer_size())),
            buffer_size: config.effective_buffer_size(),
            prefix: config.prefix.clone().filter(|prefix| !prefix.is_empty()),
            transport,
        });

        let flusher = if config.flush_enabled() {
            Some(spawn_flusher(Arc::clone(&inner), config.flush_interval)?)
        } else {
            None
        };

        info!(
            destination = %inner.transport.destination(),
            buffer_size = inner.buffer_size,
            flush_interval = ?config.flush_interval,
            "Telegraf sink configured"
        );

        Ok(Self {
            inner,
            flusher: Mutex::new(flusher),
        })
    }

    /// Serializes and buffers one measurement, sending the batch once the
    /// buffer is full. Measurements that cannot be encoded are dropped.
    pub fn send(&self, measurement: &EvaluatedMeasurement) {
        let line = match line_protocol::to_line(
            measurement,
            self.inner.prefix.as_deref(),
            now_nanos(),
        ) {
            Ok(line) => line,
            Err(e) => {
                warn!(measurement = %measurement.measurement, error = %e, "Dropping measurement");
                return;
            }
        };

        let batch = {
            let mut buffer = self.inner.buffer.lock();
            buffer.push(line);
            if buffer.len() < self.inner.buffer_size {
                return;
            }
            std::mem::take(&mut *buffer)
        };

        self.inner.transmit(batch);
    }

    /// Sends whatever is buffered right now.
    pub fn flush(&self) {
        let batch = self.inner.take_batch();
        self.inner.transmit(batch);
    }

    pub fn buffered(&self) -> usize {
        self.inner.buffer.lock().len()
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    pub fn destination(&self) -> String {
        self.inner.transport.destination()
    }

    /// Stops the flush timer. Buffered lines are not sent.
    pub fn dispose(&self) {
        if let Some(token) = self.flusher.lock().take() {
            token.cancel();
            debug!("Telegraf sink disposed");
        }
    }
}

fn spawn_flusher(inner: Arc<SinkInner>, period: Duration) -> Result<CancellationToken> {
    let runtime = Handle::try_current().map_err(|_| SinkError::NoRuntime)?;
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let first_tick = Instant::now() + period;

    runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Flush timer cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let batch = inner.take_batch();
                    if batch.is_empty() {
                        continue;
                    }
                    // Sending may block on the socket or a lookup, keep it off the worker.
                    let sender = Arc::clone(&inner);
                    let sending = tokio::task::spawn_blocking(move || sender.transmit(batch));
                    if let Err(e) = sending.await {
                        error!(error = %e, "Flush task failed");
                    }
                }
            }
        }
    });

    Ok(cancel)
}

impl Collector for TelegrafSink {
    fn collect(&self, measurement: &EvaluatedMeasurement) -> anyhow::Result<()> {
        self.send(measurement);
        Ok(())
    }
}

impl Drop for TelegrafSink {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for TelegrafSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegrafSink")
            .field("destination", &self.destination())
            .field("buffer_size", &self.inner.buffer_size)
            .field("buffered", &self.buffered())
            .finish()
    }
}
