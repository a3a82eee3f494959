//! Single-context session actor.
//!
//! Host callbacks arrive on whatever thread the document host picks; the
//! cache and store are not built for that. The actor is the marshalling
//! point: a bounded mpsc feeds one tokio task that owns the controller, so
//! every entry point — including the debounce timer — runs on the same
//! cooperative context. The timer is armed here from the deadline the
//! controller hands back; a new navigation event simply re-arms it, which
//! is the implicit cancellation the debounce window relies on.

use crate::models::{HostEvent, Stroke};
use crate::session::controller::PresentationSessionController;
use crate::storage::{AnnotationStore, BundleContents, SnapshotRenderer};
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Instant;
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Commands consumed by the session actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// A notification from the external document host.
    Host(HostEvent),
    /// The overlay replaced the active slide's stroke set.
    CommitStrokes(Vec<Stroke>),
    /// Export the active deck as a bundle archive.
    ExportBundle {
        /// Where to write the archive.
        out_path: PathBuf,
        /// Resolves with the written path or the failure.
        reply: oneshot::Sender<Result<PathBuf>>,
    },
    /// Import a bundle archive into the active session.
    ImportBundle {
        /// The archive to read.
        archive_path: PathBuf,
        /// Resolves with the recovered contents or the refusal.
        reply: oneshot::Sender<Result<BundleContents>>,
    },
}

/// Handle to a running session actor.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SessionHandle {
    /// Marshals one host notification onto the session context.
    ///
    /// # Errors
    ///
    /// Fails if the actor has already terminated.
    pub async fn host_event(&self, event: HostEvent) -> Result<()> {
        self.send(SessionCommand::Host(event)).await
    }

    /// Marshals a stroke-set replacement onto the session context.
    ///
    /// # Errors
    ///
    /// Fails if the actor has already terminated.
    pub async fn commit_strokes(&self, strokes: Vec<Stroke>) -> Result<()> {
        self.send(SessionCommand::CommitStrokes(strokes)).await
    }

    /// Exports the active deck as a bundle archive.
    ///
    /// # Errors
    ///
    /// Propagates the controller's export failure, or fails if the actor
    /// has already terminated.
    pub async fn export_bundle(&self, out_path: impl Into<PathBuf>) -> Result<PathBuf> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::ExportBundle {
            out_path: out_path.into(),
            reply,
        })
        .await?;
        response
            .await
            .map_err(|_| Error::op("export_bundle", "session actor terminated"))?
    }

    /// Imports a bundle archive into the active session.
    ///
    /// # Errors
    ///
    /// Propagates the controller's refusal or read failure, or fails if the
    /// actor has already terminated.
    pub async fn import_bundle(&self, archive_path: impl Into<PathBuf>) -> Result<BundleContents> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::ImportBundle {
            archive_path: archive_path.into(),
            reply,
        })
        .await?;
        response
            .await
            .map_err(|_| Error::op("import_bundle", "session actor terminated"))?
    }

    /// Stops the actor, closing any open document first.
    ///
    /// # Errors
    ///
    /// Fails if the actor task panicked.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.join
            .await
            .map_err(|e| Error::op("session_shutdown", e))
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::op("send_session_command", "session actor terminated"))
    }
}

/// Spawns the session actor and returns its handle.
///
/// `capacity` bounds the command queue; host notification bursts beyond it
/// apply backpressure to the sender rather than growing without limit.
pub fn spawn_session<S>(
    mut controller: PresentationSessionController<S>,
    renderer: impl SnapshotRenderer + 'static,
    capacity: usize,
) -> SessionHandle
where
    S: AnnotationStore + 'static,
{
    let (commands, mut rx) = mpsc::channel::<SessionCommand>(capacity);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join = tokio::spawn(async move {
        let mut deadline: Option<Instant> = None;

        loop {
            // Sleep only while a debounce is pending; an expired deadline
            // resolves immediately.
            let wait = deadline.map(|d| d.saturating_duration_since(Instant::now()));

            select! {
                _ = &mut shutdown_rx => {
                    info!("session actor shutting down");
                    controller.handle_event(HostEvent::DocumentClose, Instant::now());
                    break;
                }
                () = tokio::time::sleep(wait.unwrap_or_default()), if wait.is_some() => {
                    deadline = controller.handle_deadline(Instant::now());
                }
                command = rx.recv() => match command {
                    Some(SessionCommand::Host(event)) => {
                        deadline = controller.handle_event(event, Instant::now());
                    }
                    Some(SessionCommand::CommitStrokes(strokes)) => {
                        controller.commit_strokes(strokes);
                    }
                    Some(SessionCommand::ExportBundle { out_path, reply }) => {
                        let result = controller.bundle_export(&renderer, &out_path);
                        let _ = reply.send(result);
                    }
                    Some(SessionCommand::ImportBundle { archive_path, reply }) => {
                        let result = controller.bundle_import(&archive_path);
                        let _ = reply.send(result);
                    }
                    None => {
                        debug!("command channel closed, session actor stopping");
                        controller.handle_event(HostEvent::DocumentClose, Instant::now());
                        break;
                    }
                },
            }
        }
    });

    SessionHandle {
        commands,
        shutdown: Some(shutdown_tx),
        join,
    }
}
