use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::{ConnectionError, TransportError};
use crate::osc::{AddressPrompt, Correlator, Transport};
use crate::sync::qlab;

/// Which remote console a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleKind {
    /// Audio/video cue engine. Needs a workspace handshake.
    Qlab,
    /// Lighting console.
    Eos,
}

impl ConsoleKind {
    pub fn requires_handshake(&self) -> bool {
        matches!(self, ConsoleKind::Qlab)
    }
}

impl fmt::Display for ConsoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleKind::Qlab => write!(f, "QLab"),
            ConsoleKind::Eos => write!(f, "Eos"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Handshaking,
    Ready,
}

/// Brings one console transport up and keeps its receive loop running.
///
/// A failed attempt is never retried on its own: the operator is asked for
/// a new address, and only a fresh address starts another attempt.
pub struct ConnectionManager {
    console: ConsoleKind,
    transport: Arc<dyn Transport>,
    prompt: Arc<dyn AddressPrompt>,
    settle_interval: Duration,
    state: ConnectionState,
    run_task: Option<JoinHandle<Result<(), TransportError>>>,
    workspace_id: Option<String>,
}

impl ConnectionManager {
    pub fn new(
        console: ConsoleKind,
        transport: Arc<dyn Transport>,
        prompt: Arc<dyn AddressPrompt>,
        settle_interval: Duration,
    ) -> Self {
        Self {
            console,
            transport,
            prompt,
            settle_interval,
            state: ConnectionState::Disconnected,
            run_task: None,
            workspace_id: None,
        }
    }

    pub fn console(&self) -> ConsoleKind {
        self.console
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Workspace selected by the handshake, cue engine sessions only.
    pub fn workspace_id(&self) -> Option<&str> {
        self.workspace_id.as_deref()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Start the transport and wait for it to settle. On failure the
    /// operator is prompted; a new address retries, `None` gives up.
    ///
    /// Retries are unbounded but each one waits on the prompt. Dropping the
    /// returned future cancels the whole sequence: the receive loop is
    /// aborted and the session is back to `Disconnected`.
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Disconnected {
            return Err(ConnectionError::AlreadyConnected);
        }

        let console = self.console;
        let settle_interval = self.settle_interval;
        let transport = Arc::clone(&self.transport);
        let prompt = Arc::clone(&self.prompt);
        let mut pending = PendingConnect {
            state: &mut self.state,
            run_task: &mut self.run_task,
            done: false,
        };

        loop {
            let address = transport.server_address();
            *pending.state = ConnectionState::Connecting;
            log::info!("Connecting to {} at {}", console, address);

            match pending.attempt(&transport, settle_interval).await {
                Ok(()) => {
                    pending.finish();
                    log::info!("{} connected at {}", console, address);
                    return Ok(());
                }
                Err(e) => {
                    *pending.state = ConnectionState::Disconnected;
                    log::error!("{} connection to {} failed: {}", console, address, e);
                }
            }

            match prompt.prompt_for_new_address(&address).await {
                Some(new_address) => {
                    log::info!("Retrying {} at {}", console, new_address);
                    transport.set_server_address(new_address);
                }
                None => {
                    log::warn!("{} left unreachable, no new address given", console);
                    return Err(ConnectionError::Abandoned(address.to_string()));
                }
            }
        }
    }

    /// Complete the console-specific connect sequence. For the cue engine
    /// this discovers a workspace and connects to it; the lighting console
    /// needs nothing beyond a live transport.
    pub async fn handshake(
        &mut self,
        correlator: &Correlator,
        passcode: Option<&str>,
    ) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Connected => {}
            ConnectionState::Handshaking | ConnectionState::Ready => {
                return Err(ConnectionError::AlreadyConnected)
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                return Err(ConnectionError::NotConnected(
                    self.transport.server_address().to_string(),
                ))
            }
        }

        if !self.console.requires_handshake() {
            self.state = ConnectionState::Ready;
            return Ok(());
        }

        self.state = ConnectionState::Handshaking;
        let result = async {
            let workspace_id = qlab::discover_workspace(correlator).await?;
            qlab::connect_workspace(correlator, &workspace_id, passcode).await?;
            Ok::<_, ConnectionError>(workspace_id)
        }
        .await;

        match result {
            Ok(workspace_id) => {
                log::info!("{} workspace {} connected", self.console, workspace_id);
                self.workspace_id = Some(workspace_id);
                self.state = ConnectionState::Ready;
                Ok(())
            }
            Err(e) => {
                log::error!("{} handshake failed: {}", self.console, e);
                self.state = ConnectionState::Connected;
                Err(e)
            }
        }
    }

    /// Cancel the receive loop and forget the session.
    pub fn disconnect(&mut self) {
        abort_run_task(&mut self.run_task);
        self.workspace_id = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        abort_run_task(&mut self.run_task);
    }
}

type RunTask = Option<JoinHandle<Result<(), TransportError>>>;

fn abort_run_task(run_task: &mut RunTask) {
    if let Some(task) = run_task.take() {
        task.abort();
    }
}

/// Connection attempt in progress. Unless it finishes, dropping it aborts
/// the receive loop and resets the state to `Disconnected`.
struct PendingConnect<'a> {
    state: &'a mut ConnectionState,
    run_task: &'a mut RunTask,
    done: bool,
}

impl PendingConnect<'_> {
    async fn attempt(
        &mut self,
        transport: &Arc<dyn Transport>,
        settle_interval: Duration,
    ) -> Result<(), ConnectionError> {
        abort_run_task(self.run_task);

        let runner = Arc::clone(transport);
        let task = self
            .run_task
            .insert(tokio::spawn(async move { runner.run().await }));

        sleep(settle_interval).await;

        if task.is_finished() {
            // The receive loop already ended, so surface why.
            let Some(task) = self.run_task.take() else {
                return Err(TransportError::Closed.into());
            };
            return Err(match task.await {
                Ok(Err(e)) => e.into(),
                Ok(Ok(())) | Err(_) => TransportError::Closed.into(),
            });
        }

        if !transport.is_connected() {
            abort_run_task(self.run_task);
            return Err(ConnectionError::NotConnected(
                transport.server_address().to_string(),
            ));
        }

        Ok(())
    }

    fn finish(&mut self) {
        *self.state = ConnectionState::Connected;
        self.done = true;
    }
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if !self.done {
            abort_run_task(self.run_task);
            *self.state = ConnectionState::Disconnected;
        }
    }
}
