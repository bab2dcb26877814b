use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Settings;
use crate::connection::{ConnectionManager, ConnectionState, ConsoleKind};
use crate::cue::{EosRegistry, QlabRegistry};
use crate::error::{ConnectionError, SyncError};
use crate::osc::{AddressPrompt, Correlator, Dispatcher, Transport};
use crate::sync::{sync_eos, sync_qlab};

/// One console: its connection lifecycle plus the correlator queries go through.
pub struct ConsoleSession {
    manager: ConnectionManager,
    correlator: Correlator,
}

impl ConsoleSession {
    pub fn new(
        console: ConsoleKind,
        transport: Arc<dyn Transport>,
        dispatcher: Arc<Dispatcher>,
        prompt: Arc<dyn AddressPrompt>,
        settings: &Settings,
    ) -> Self {
        let correlator = Correlator::new(Arc::clone(&transport), dispatcher, settings.timeouts());
        Self {
            manager: ConnectionManager::new(
                console,
                transport,
                prompt,
                settings.settle_interval(),
            ),
            correlator,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn is_ready(&self) -> bool {
        self.manager.is_ready()
    }

    /// Take the session as far as `Ready`, resuming from wherever a previous
    /// attempt stopped.
    async fn bring_up(&mut self, passcode: Option<&str>) -> Result<(), SyncError> {
        if self.manager.state() == ConnectionState::Disconnected {
            self.manager.connect().await?;
        }
        if self.manager.state() == ConnectionState::Connected {
            self.manager.handshake(&self.correlator, passcode).await?;
        }
        Ok(())
    }
}

/// Per-console outcome of a start or resync. `Ok` carries the number of
/// cues published for that console.
#[derive(Debug)]
pub struct SyncReport {
    pub qlab: Result<usize, SyncError>,
    pub eos: Result<usize, SyncError>,
}

impl SyncReport {
    pub fn is_ok(&self) -> bool {
        self.qlab.is_ok() && self.eos.is_ok()
    }
}

/// Mirrors the cues of a cue engine and a lighting console.
///
/// The consoles are independent: each is brought up, synchronized and
/// published on its own, so one unreachable console never holds back the
/// other. Registries are rebuilt wholesale by each pass and swapped in
/// under a write lock, so readers never see a half-built tree.
pub struct ShowSync {
    settings: Settings,
    qlab: ConsoleSession,
    eos: ConsoleSession,
    qlab_cues: Arc<RwLock<QlabRegistry>>,
    eos_cues: Arc<RwLock<EosRegistry>>,
}

impl ShowSync {
    /// Build both sessions. The transports are pointed at the addresses in
    /// `settings` before anything connects.
    pub fn new(
        settings: Settings,
        qlab: (Arc<dyn Transport>, Arc<Dispatcher>),
        eos: (Arc<dyn Transport>, Arc<Dispatcher>),
        prompt: Arc<dyn AddressPrompt>,
    ) -> Self {
        qlab.0.set_server_address(settings.qlab_address.clone());
        eos.0.set_server_address(settings.eos_address.clone());

        Self {
            qlab: ConsoleSession::new(
                ConsoleKind::Qlab,
                qlab.0,
                qlab.1,
                Arc::clone(&prompt),
                &settings,
            ),
            eos: ConsoleSession::new(ConsoleKind::Eos, eos.0, eos.1, prompt, &settings),
            settings,
            qlab_cues: Arc::new(RwLock::new(QlabRegistry::new())),
            eos_cues: Arc::new(RwLock::new(EosRegistry::new())),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn qlab(&self) -> &ConsoleSession {
        &self.qlab
    }

    pub fn eos(&self) -> &ConsoleSession {
        &self.eos
    }

    /// Shared handle to the cue engine registry.
    pub fn qlab_cues(&self) -> Arc<RwLock<QlabRegistry>> {
        Arc::clone(&self.qlab_cues)
    }

    /// Shared handle to the lighting console registry.
    pub fn eos_cues(&self) -> Arc<RwLock<EosRegistry>> {
        Arc::clone(&self.eos_cues)
    }

    /// True when both consoles are ready.
    pub fn is_ready(&self) -> bool {
        self.qlab.is_ready() && self.eos.is_ready()
    }

    /// Connect each console, complete the cue engine handshake, then run its
    /// first sync pass. Calling again retries only the consoles that are
    /// not ready yet and resyncs the ones that are.
    pub async fn start(&mut self) -> SyncReport {
        let fps = self.settings.timecode_fps;
        let passcode = self.settings.qlab_passcode.as_deref();
        let (qlab, eos) = (&mut self.qlab, &mut self.eos);
        let (qlab_cues, eos_cues) = (&self.qlab_cues, &self.eos_cues);

        let (qlab, eos) = tokio::join!(
            async move {
                qlab.bring_up(passcode).await?;
                qlab_pass(qlab, qlab_cues, fps).await
            },
            async move {
                eos.bring_up(None).await?;
                eos_pass(eos, eos_cues, fps).await
            }
        );

        report(qlab, eos)
    }

    /// Rebuild the registry of every ready console. A console that is not
    /// ready reports `SyncError::NotReady` and keeps its previous registry.
    pub async fn resync(&self) -> SyncReport {
        let fps = self.settings.timecode_fps;
        log::info!("Starting sync pass at {} fps", fps);

        let (qlab, eos) = tokio::join!(
            qlab_pass(&self.qlab, &self.qlab_cues, fps),
            eos_pass(&self.eos, &self.eos_cues, fps)
        );

        report(qlab, eos)
    }

    /// Stop both receive loops. The registries keep their last contents.
    pub fn shutdown(&mut self) {
        self.qlab.manager.disconnect();
        self.eos.manager.disconnect();
        log::info!("Console sessions closed");
    }
}

async fn qlab_pass(
    session: &ConsoleSession,
    cues: &RwLock<QlabRegistry>,
    fps: u32,
) -> Result<usize, SyncError> {
    if !session.is_ready() {
        return Err(SyncError::NotReady);
    }
    let workspace_id = session
        .manager
        .workspace_id()
        .ok_or_else(|| ConnectionError::Handshake("no workspace selected".to_string()))?;

    let registry = sync_qlab(&session.correlator, workspace_id, fps).await?;
    let count = registry.len();
    *cues.write() = registry;
    Ok(count)
}

async fn eos_pass(
    session: &ConsoleSession,
    cues: &RwLock<EosRegistry>,
    fps: u32,
) -> Result<usize, SyncError> {
    if !session.is_ready() {
        return Err(SyncError::NotReady);
    }

    let registry = sync_eos(&session.correlator, fps).await?;
    let count = registry.cue_count();
    *cues.write() = registry;
    Ok(count)
}

fn report(qlab: Result<usize, SyncError>, eos: Result<usize, SyncError>) -> SyncReport {
    if let Err(e) = &qlab {
        log::error!("{} sync failed: {}", ConsoleKind::Qlab, e);
    }
    if let Err(e) = &eos {
        log::error!("{} sync failed: {}", ConsoleKind::Eos, e);
    }
    SyncReport { qlab, eos }
}
