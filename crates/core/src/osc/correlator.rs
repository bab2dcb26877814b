//! Request/response correlation over a transport that has no request ids.
//!
//! A query and its reply are paired only by the reply's address, so at most
//! one query may be waiting on a given response address at a time. Each
//! response address gets its own async lock; holders register a one-shot
//! handler, send, and wait for the first matching inbound message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Mutex as SlotLock, OwnedMutexGuard};
use tokio::time::{sleep, timeout, timeout_at, Instant};

use super::dispatcher::Dispatcher;
use super::transport::{OscArg, Transport};
use crate::error::{QueryError, TransportError};

/// Fixed waits applied to every query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryTimeouts {
    /// Ceiling on waiting for a response address to become free.
    pub busy_ceiling: Duration,
    /// Poll interval used while a handler registered outside the correlator
    /// still occupies the response address.
    pub busy_poll_interval: Duration,
    /// How long to wait for the reply once the query is sent.
    pub reply: Duration,
}

impl Default for QueryTimeouts {
    fn default() -> Self {
        Self {
            busy_ceiling: Duration::from_secs(5),
            busy_poll_interval: Duration::from_millis(10),
            reply: Duration::from_secs(2),
        }
    }
}

/// The inbound message that answered a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Concrete address the console replied on. Differs from the response
    /// pattern when the pattern contains wildcards.
    pub address: String,
    pub args: Vec<OscArg>,
}

pub struct Correlator {
    transport: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    slots: Mutex<HashMap<String, Arc<SlotLock<()>>>>,
    timeouts: QueryTimeouts,
}

impl Correlator {
    pub fn new(
        transport: Arc<dyn Transport>,
        dispatcher: Arc<Dispatcher>,
        timeouts: QueryTimeouts,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            slots: Mutex::new(HashMap::new()),
            timeouts,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn timeouts(&self) -> QueryTimeouts {
        self.timeouts
    }

    /// Send `args` to `query_address` and wait for the message matching
    /// `response_address`.
    ///
    /// The handler for `response_address` is removed on every exit path,
    /// including when the returned future is dropped mid-wait.
    pub async fn query(
        &self,
        query_address: &str,
        response_address: &str,
        args: Vec<OscArg>,
    ) -> Result<Reply, QueryError> {
        let deadline = Instant::now() + self.timeouts.busy_ceiling;

        let _slot = match self.acquire_slot(response_address, deadline).await {
            Some(slot) => slot,
            None => {
                log::warn!("Response address {} stayed busy", response_address);
                return Err(QueryError::BusyTimeout(response_address.to_string()));
            }
        };

        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        self.dispatcher.register_handler(
            response_address,
            Box::new(move |address, args| {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(Reply {
                        address: address.to_string(),
                        args: args.to_vec(),
                    });
                }
            }),
        );
        let _registration = Registration {
            dispatcher: &self.dispatcher,
            pattern: response_address,
        };

        log::debug!("Query {} awaiting {}", query_address, response_address);
        self.transport.send(query_address, args).await?;

        tokio::select! {
            biased;
            reply = timeout(self.timeouts.reply, rx) => match reply {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(_)) => Err(QueryError::Cancelled(response_address.to_string())),
                Err(_) => Err(QueryError::Timeout(response_address.to_string())),
            },
            _ = self.transport.disconnected() => {
                log::warn!("Connection lost while awaiting {}", response_address);
                Err(QueryError::Transport(TransportError::Closed))
            }
        }
    }

    /// Wait for exclusive use of `pattern`, or `None` past `deadline`.
    async fn acquire_slot<'a>(
        &'a self,
        pattern: &'a str,
        deadline: Instant,
    ) -> Option<SlotGuard<'a>> {
        let lock = Arc::clone(
            self.slots
                .lock()
                .entry(pattern.to_string())
                .or_insert_with(|| Arc::new(SlotLock::new(()))),
        );

        let guard = match timeout_at(deadline, lock.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                self.release_slot(pattern);
                return None;
            }
        };

        let slot = SlotGuard {
            correlator: self,
            pattern,
            guard: Some(guard),
        };

        // Handlers registered outside the correlator hold the address too.
        while self.dispatcher.has_handler(pattern) {
            if Instant::now() >= deadline {
                return None;
            }
            sleep(self.timeouts.busy_poll_interval).await;
        }

        Some(slot)
    }

    /// Forget the lock for `pattern` once nobody holds or waits on it.
    fn release_slot(&self, pattern: &str) {
        let mut slots = self.slots.lock();
        if slots
            .get(pattern)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            slots.remove(pattern);
        }
    }

    #[cfg(test)]
    fn tracked_slots(&self) -> usize {
        self.slots.lock().len()
    }
}

struct SlotGuard<'a> {
    correlator: &'a Correlator,
    pattern: &'a str,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.correlator.release_slot(self.pattern);
    }
}

struct Registration<'a> {
    dispatcher: &'a Dispatcher,
    pattern: &'a str,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.dispatcher.unregister_handler(self.pattern);
    }
}
