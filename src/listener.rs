// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Inbound Listener
//!
//! Background task that owns the transport's receive loop and feeds every
//! inbound message to the [`MessageRelay`].
//!
//! ## Supervision
//!
//! When [`Transport::listen`] fails the listener is restarted after a delay
//! that starts at 1 s and doubles up to 60 s. A clean return resets the
//! delay. Messages already handed over by a failed attempt are still
//! processed before the restart.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown; a
//! pending `listen` call is dropped as soon as the token is cancelled.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::relay::MessageRelay;
use crate::transport::{InboundMessage, Transport};

/// Delay before the first restart.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound of the restart delay.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Inbound messages buffered between the transport and the relay.
const CHANNEL_CAPACITY: usize = 64;

/// Lifecycle of the listener task.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    Starting,
    Running,
    Restarting,
    Stopped,
}

impl ListenerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Restarting,
            _ => Self::Stopped,
        }
    }
}

/// Shared view of the listener's state, read by the health endpoints.
#[derive(Debug, Clone)]
pub struct ListenerStatus {
    state: Arc<AtomicU8>,
    restarts: Arc<AtomicU64>,
}

impl Default for ListenerStatus {
    fn default() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ListenerState::Starting as u8)),
            restarts: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl ListenerStatus {
    pub fn state(&self) -> ListenerState {
        ListenerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Number of restarts after a failure.
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::SeqCst)
    }

    fn set(&self, state: ListenerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Exponential restart delay.
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; doubles the following one.
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Supervised receive loop of the messaging transport.
pub struct InboundListener {
    transport: Arc<dyn Transport>,
    relay: Arc<MessageRelay>,
    backoff: Backoff,
    status: ListenerStatus,
}

impl InboundListener {
    pub fn new(transport: Arc<dyn Transport>, relay: Arc<MessageRelay>) -> Self {
        Self {
            transport,
            relay,
            backoff: Backoff::new(INITIAL_BACKOFF, MAX_BACKOFF),
            status: ListenerStatus::default(),
        }
    }

    pub fn status(&self) -> ListenerStatus {
        self.status.clone()
    }

    /// Spawn the listener as a background task.
    pub fn spawn(self) -> ListenerHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(shutdown.clone()));
        ListenerHandle { shutdown, task }
    }

    /// Run the listener until the cancellation token is triggered.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Inbound listener starting");

        loop {
            self.status.set(ListenerState::Running);
            let result = match self.listen_once(&shutdown).await {
                Some(result) => result,
                None => break,
            };

            let delay = match result {
                Ok(()) => {
                    self.backoff.reset();
                    info!("Inbound listener returned, restarting");
                    self.backoff.initial
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    let attempt = self.status.restarts.fetch_add(1, Ordering::SeqCst) + 1;
                    warn!(
                        error = %e,
                        attempt,
                        delay_secs = delay.as_secs(),
                        "Inbound listener failed, restarting"
                    );
                    delay
                }
            };

            self.status.set(ListenerState::Restarting);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = shutdown.cancelled() => break,
            }
        }

        self.status.set(ListenerState::Stopped);
        info!("Inbound listener shutting down");
    }

    /// Drive one `listen` call, relaying messages as they arrive.
    ///
    /// Returns `None` when cancelled.
    async fn listen_once(
        &self,
        shutdown: &CancellationToken,
    ) -> Option<Result<(), crate::transport::TransportError>> {
        let (sink, mut inbound) = mpsc::channel::<InboundMessage>(CHANNEL_CAPACITY);
        let listen = self.transport.listen(sink);
        tokio::pin!(listen);

        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => return None,
                Some(message) = inbound.recv() => self.relay.handle_inbound(message),
                result = &mut listen => break result,
            }
        };

        while let Ok(message) = inbound.try_recv() {
            self.relay.handle_inbound(message);
        }

        Some(result)
    }
}

/// Handle of a spawned [`InboundListener`].
pub struct ListenerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Cancel the listener and wait for it to stop.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Inbound listener task ended abnormally");
        }
    }
}
