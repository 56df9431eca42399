//! Document world with a single writer thread.
//!
//! The document is owned by a dedicated worker thread, the only context
//! allowed to mutate it. Other contexts either queue read queries or raise
//! an [`ExternalEvent`], which runs a registered handler once on the worker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::document::Element;
use crate::host::{ElementId, ModelDocument};

/// Errors talking to the document worker.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("Failed to spawn document worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Document worker has stopped")]
    Stopped,

    #[error("Unexpected response from document worker")]
    UnexpectedResponse,
}

/// Work that runs on the document worker when its event is raised.
pub trait ExternalEventHandler: Send {
    /// Called on the worker thread with exclusive access to the document.
    fn execute(&mut self, doc: &mut dyn ModelDocument);

    /// Name used in logs.
    fn name(&self) -> String;
}

/// Result of raising an external event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseOutcome {
    /// A run was scheduled
    Accepted,
    /// A run was already scheduled and has not started; this raise is folded into it
    Pending,
    /// The worker is gone; nothing will run
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EventId(u64);

enum DocCommand {
    RegisterHandler {
        event: EventId,
        handler: Box<dyn ExternalEventHandler>,
        pending: Arc<AtomicBool>,
    },
    UnregisterHandler(EventId),
    Raise(EventId),
    GetElement {
        id: ElementId,
        response: oneshot::Sender<DocResponse>,
    },
    FindByName {
        name: String,
        response: oneshot::Sender<DocResponse>,
    },
    ElementCount {
        response: oneshot::Sender<DocResponse>,
    },
    Shutdown,
}

enum DocResponse {
    Element(Option<Element>),
    ElementList(Vec<ElementId>),
    Count(usize),
}

/// One-shot wake primitive bound to a registered handler.
///
/// Dropping the event unregisters its handler.
pub struct ExternalEvent {
    event: EventId,
    name: String,
    cmd_tx: mpsc::Sender<DocCommand>,
    pending: Arc<AtomicBool>,
}

impl ExternalEvent {
    /// Schedule one run of the handler on the document worker.
    ///
    /// Never blocks. Raises that arrive before the scheduled run starts are
    /// coalesced into it.
    pub fn raise(&self) -> RaiseOutcome {
        if self.pending.swap(true, Ordering::AcqRel) {
            return RaiseOutcome::Pending;
        }
        match self.cmd_tx.send(DocCommand::Raise(self.event)) {
            Ok(()) => RaiseOutcome::Accepted,
            Err(_) => {
                self.pending.store(false, Ordering::Release);
                RaiseOutcome::Disposed
            }
        }
    }

    /// Whether a run is scheduled and has not started yet.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ExternalEvent {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(DocCommand::UnregisterHandler(self.event));
    }
}

impl std::fmt::Debug for ExternalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalEvent")
            .field("name", &self.name)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Handle for sending commands to the document worker.
#[derive(Clone)]
pub struct DocHandle {
    cmd_tx: mpsc::Sender<DocCommand>,
    next_event: Arc<AtomicU64>,
}

impl DocHandle {
    /// Install a handler on the worker and return the event that wakes it.
    pub fn register_handler(
        &self,
        handler: Box<dyn ExternalEventHandler>,
    ) -> Result<ExternalEvent, WorldError> {
        let event = EventId(self.next_event.fetch_add(1, Ordering::Relaxed));
        let name = handler.name();
        let pending = Arc::new(AtomicBool::new(false));

        self.cmd_tx
            .send(DocCommand::RegisterHandler {
                event,
                handler,
                pending: pending.clone(),
            })
            .map_err(|_| WorldError::Stopped)?;

        Ok(ExternalEvent {
            event,
            name,
            cmd_tx: self.cmd_tx.clone(),
            pending,
        })
    }

    /// Get a copy of an element.
    pub async fn element(&self, id: ElementId) -> Result<Option<Element>, WorldError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(DocCommand::GetElement { id, response: tx })
            .map_err(|_| WorldError::Stopped)?;

        match rx.await {
            Ok(DocResponse::Element(element)) => Ok(element),
            Ok(_) => Err(WorldError::UnexpectedResponse),
            Err(_) => Err(WorldError::Stopped),
        }
    }

    /// Find elements by name.
    pub async fn find_by_name(&self, name: &str) -> Result<Vec<ElementId>, WorldError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(DocCommand::FindByName {
                name: name.to_string(),
                response: tx,
            })
            .map_err(|_| WorldError::Stopped)?;

        match rx.await {
            Ok(DocResponse::ElementList(ids)) => Ok(ids),
            Ok(_) => Err(WorldError::UnexpectedResponse),
            Err(_) => Err(WorldError::Stopped),
        }
    }

    /// Count elements in the document.
    pub async fn element_count(&self) -> Result<usize, WorldError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(DocCommand::ElementCount { response: tx })
            .map_err(|_| WorldError::Stopped)?;

        match rx.await {
            Ok(DocResponse::Count(count)) => Ok(count),
            Ok(_) => Err(WorldError::UnexpectedResponse),
            Err(_) => Err(WorldError::Stopped),
        }
    }

    /// Shutdown the document worker.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(DocCommand::Shutdown);
    }
}

impl std::fmt::Debug for DocHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocHandle").finish_non_exhaustive()
    }
}

/// The document world.
///
/// Spawns a worker thread that owns the document.
pub struct DocumentWorld {
    handle: DocHandle,
    worker_handle: Option<JoinHandle<()>>,
}

impl DocumentWorld {
    /// Spawn the worker, building the document on the worker thread.
    pub fn spawn<F>(factory: F) -> Result<Self, WorldError>
    where
        F: FnOnce() -> Box<dyn ModelDocument> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<DocCommand>();

        let worker_handle = thread::Builder::new()
            .name("doc-worker".to_string())
            .spawn(move || {
                let mut worker = DocWorker::new(factory());
                worker.run(cmd_rx);
            })?;

        Ok(Self {
            handle: DocHandle {
                cmd_tx,
                next_event: Arc::new(AtomicU64::new(1)),
            },
            worker_handle: Some(worker_handle),
        })
    }

    /// Spawn the worker around an existing document.
    pub fn with_document<D>(doc: D) -> Result<Self, WorldError>
    where
        D: ModelDocument + Send + 'static,
    {
        Self::spawn(move || Box::new(doc) as Box<dyn ModelDocument>)
    }

    /// Get a handle for sending commands to the worker.
    pub fn handle(&self) -> DocHandle {
        self.handle.clone()
    }

    /// Shutdown the world and wait for the worker to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.handle.shutdown();
        if let Some(handle) = self.worker_handle.take() {
            if handle.join().is_err() {
                warn!("Document worker panicked");
            }
        }
    }
}

impl Drop for DocumentWorld {
    fn drop(&mut self) {
        self.stop();
    }
}

struct RegisteredHandler {
    handler: Box<dyn ExternalEventHandler>,
    pending: Arc<AtomicBool>,
}

/// Worker thread that owns the document and processes commands.
struct DocWorker {
    document: Box<dyn ModelDocument>,
    handlers: HashMap<EventId, RegisteredHandler>,
}

impl DocWorker {
    fn new(document: Box<dyn ModelDocument>) -> Self {
        info!("Document worker initialized");
        Self {
            document,
            handlers: HashMap::new(),
        }
    }

    fn run(&mut self, cmd_rx: mpsc::Receiver<DocCommand>) {
        info!("Document worker started");

        loop {
            match cmd_rx.recv() {
                Ok(DocCommand::Shutdown) => {
                    info!("Document worker shutting down");
                    break;
                }
                Ok(cmd) => self.handle_command(cmd),
                Err(_) => {
                    info!("Document command channel closed");
                    break;
                }
            }
        }

        info!("Document worker stopped");
    }

    fn handle_command(&mut self, cmd: DocCommand) {
        match cmd {
            DocCommand::RegisterHandler {
                event,
                handler,
                pending,
            } => {
                debug!("Registered handler {:?}: {}", event, handler.name());
                self.handlers
                    .insert(event, RegisteredHandler { handler, pending });
            }

            DocCommand::UnregisterHandler(event) => {
                if let Some(entry) = self.handlers.remove(&event) {
                    debug!("Unregistered handler {:?}: {}", event, entry.handler.name());
                }
            }

            DocCommand::Raise(event) => match self.handlers.get_mut(&event) {
                Some(entry) => {
                    // Cleared before running so raises during execution schedule another run
                    entry.pending.store(false, Ordering::Release);
                    debug!("Running handler {}", entry.handler.name());
                    entry.handler.execute(self.document.as_mut());
                }
                None => debug!("Raise for unregistered event {:?}", event),
            },

            DocCommand::GetElement { id, response } => {
                let _ = response.send(DocResponse::Element(self.document.element(id)));
            }

            DocCommand::FindByName { name, response } => {
                let _ = response.send(DocResponse::ElementList(self.document.find_by_name(&name)));
            }

            DocCommand::ElementCount { response } => {
                let _ = response.send(DocResponse::Count(self.document.element_count()));
            }

            DocCommand::Shutdown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::host::Category;
    use std::sync::atomic::AtomicUsize;

    struct CountingHandler {
        runs: Arc<AtomicUsize>,
    }

    impl ExternalEventHandler for CountingHandler {
        fn execute(&mut self, doc: &mut dyn ModelDocument) {
            let txn = doc.begin_transaction("Count").unwrap();
            let id = doc.create_element(Category::GenericModel).unwrap();
            doc.set_name(id, "counted").unwrap();
            doc.commit(txn).unwrap();
            self.runs.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> String {
            "Counting Handler".to_string()
        }
    }

    /// Blocks the worker until released.
    struct GateHandler {
        release: mpsc::Receiver<()>,
    }

    impl ExternalEventHandler for GateHandler {
        fn execute(&mut self, _doc: &mut dyn ModelDocument) {
            let _ = self.release.recv();
        }

        fn name(&self) -> String {
            "Gate".to_string()
        }
    }

    #[tokio::test]
    async fn test_raise_runs_handler_on_worker() {
        let world = DocumentWorld::with_document(Document::new()).unwrap();
        let handle = world.handle();
        let runs = Arc::new(AtomicUsize::new(0));

        let event = handle
            .register_handler(Box::new(CountingHandler { runs: runs.clone() }))
            .unwrap();
        assert_eq!(event.raise(), RaiseOutcome::Accepted);

        // Queries are served after the raise, in order
        assert_eq!(handle.element_count().await.unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!event.is_pending());

        let ids = handle.find_by_name("counted").await.unwrap();
        assert_eq!(ids.len(), 1);
        let element = handle.element(ids[0]).await.unwrap().unwrap();
        assert_eq!(element.category, Category::GenericModel);

        world.shutdown();
    }

    #[tokio::test]
    async fn test_raises_coalesce_until_run_starts() {
        let world = DocumentWorld::with_document(Document::new()).unwrap();
        let handle = world.handle();
        let runs = Arc::new(AtomicUsize::new(0));

        let (release_tx, release_rx) = mpsc::channel();
        let gate = handle
            .register_handler(Box::new(GateHandler { release: release_rx }))
            .unwrap();
        let counter = handle
            .register_handler(Box::new(CountingHandler { runs: runs.clone() }))
            .unwrap();

        gate.raise();
        assert_eq!(counter.raise(), RaiseOutcome::Accepted);
        assert_eq!(counter.raise(), RaiseOutcome::Pending);
        assert_eq!(counter.raise(), RaiseOutcome::Pending);
        release_tx.send(()).unwrap();

        assert_eq!(handle.element_count().await.unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // A fresh raise after the run schedules another one
        assert_eq!(counter.raise(), RaiseOutcome::Accepted);
        assert_eq!(handle.element_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_raise_after_shutdown_is_disposed() {
        let world = DocumentWorld::with_document(Document::new()).unwrap();
        let handle = world.handle();
        let event = handle
            .register_handler(Box::new(CountingHandler {
                runs: Arc::new(AtomicUsize::new(0)),
            }))
            .unwrap();

        world.shutdown();

        assert_eq!(event.raise(), RaiseOutcome::Disposed);
        assert!(matches!(
            handle.element_count().await,
            Err(WorldError::Stopped)
        ));
    }

    #[tokio::test]
    async fn test_dropped_event_unregisters_handler() {
        let world = DocumentWorld::with_document(Document::new()).unwrap();
        let handle = world.handle();
        let runs = Arc::new(AtomicUsize::new(0));

        let event = handle
            .register_handler(Box::new(CountingHandler { runs: runs.clone() }))
            .unwrap();
        drop(event);

        assert_eq!(handle.element_count().await.unwrap(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
