//! Engine orchestration layer
//!
//! [`LogEngine`] binds one file at a time and runs load, search and export as
//! cancellable background tasks, one at a time. Results flow back through the
//! caller's [`EventSink`]; read accessors delegate to the bound
//! [`LineStore`] and the current annotation generation.

pub mod protocol;

use crate::config::EngineConfig;
use crate::error::{LogsiftError, Result};
use crate::export::ExportEngine;
use crate::file_handler::{validate_export_target, LineStore, LongestLine};
use crate::search::{
    AnnotationTable, LineMatcher, SearchCriteria, SearchEngine, SearchId, SearchRegistry,
    SearchRun,
};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use protocol::{EngineEvent, EventSink, RequestId};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

/// Log engine - owns the bound file and coordinates the background operations
///
/// Cloning is cheap and every clone drives the same engine.
#[derive(Clone)]
pub struct LogEngine {
    shared: Arc<Shared>,
}

struct Shared {
    config: EngineConfig,
    sink: Arc<dyn EventSink>,
    store: RwLock<Option<Arc<LineStore>>>,
    /// Current annotation generation, replaced wholesale by each search
    annotations: RwLock<Arc<AnnotationTable>>,
    registry: Mutex<SearchRegistry>,
    /// Set while a load, search or export is running
    busy: AtomicBool,
    next_request_id: AtomicU64,
    search_engine: SearchEngine,
    export_engine: ExportEngine,
}

/// Holds the single-operation slot; releasing it is tied to drop so a
/// panicking worker cannot wedge the engine
struct OperationGuard {
    shared: Arc<Shared>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.shared.busy.store(false, Ordering::Release);
    }
}

impl Shared {
    fn unbind(&self) {
        let mut bound = self.store.write();
        *bound = None;
        let mut annotations = self.annotations.write();
        *annotations = Arc::new(AnnotationTable::empty(annotations.next_generation()));
        self.registry.lock().reset();
    }

    fn bind(&self, store: LineStore) {
        let line_count = store.line_count();
        let mut bound = self.store.write();
        *bound = Some(Arc::new(store));
        let mut annotations = self.annotations.write();
        *annotations = Arc::new(AnnotationTable::new(
            line_count,
            annotations.next_generation(),
        ));
    }

    fn publish(&self, table: AnnotationTable) {
        *self.annotations.write() = Arc::new(table);
    }
}

impl LogEngine {
    /// Create an unbound engine with default settings
    ///
    /// Operations run on Tokio's blocking pool, so they must be started from
    /// within a Tokio runtime.
    pub fn new(sink: impl EventSink) -> Self {
        Self::with_config(EngineConfig::default(), sink)
    }

    pub fn with_config(config: EngineConfig, sink: impl EventSink) -> Self {
        let config = config.normalized();
        let search_engine = SearchEngine::new(config.cancel_check_interval);
        let export_engine =
            ExportEngine::new(config.write_buffer_size, config.cancel_check_interval);

        Self {
            shared: Arc::new(Shared {
                config,
                sink: Arc::new(sink),
                store: RwLock::new(None),
                annotations: RwLock::new(Arc::new(AnnotationTable::empty(0))),
                registry: Mutex::new(SearchRegistry::new()),
                busy: AtomicBool::new(false),
                next_request_id: AtomicU64::new(1),
                search_engine,
                export_engine,
            }),
        }
    }

    /// Engine wired to an unbounded channel, the usual setup for async callers
    pub fn with_channel(config: EngineConfig) -> (Self, UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_config(config, tx), rx)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    // ---- background operations -------------------------------------------------

    /// Unbind the current file and index `path` in the background
    ///
    /// Emits `LoadProgress` events then `LoadComplete`, or `Error` if the file
    /// cannot be read, in which case the engine stays unbound.
    pub fn load(&self, path: impl Into<PathBuf>, token: CancellationToken) -> Result<RequestId> {
        let guard = self.begin()?;
        let request_id = self.next_request_id();
        let path = path.into();

        self.shared.unbind();
        info!("loading {} (request {})", path.display(), request_id);

        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let sink = Arc::clone(&shared.sink);
            let result = LineStore::load(&path, &token, &shared.config, |percent| {
                sink.deliver(EngineEvent::LoadProgress {
                    request_id,
                    percent,
                })
            });

            let event = match result {
                Ok(outcome) => {
                    let line_count = outcome.store.line_count();
                    shared.bind(outcome.store);
                    info!(
                        "loaded {} lines from {} in {:?}{}",
                        line_count,
                        path.display(),
                        started.elapsed(),
                        if outcome.cancelled { " (cancelled)" } else { "" }
                    );
                    EngineEvent::LoadComplete {
                        request_id,
                        duration: started.elapsed(),
                        cancelled: outcome.cancelled,
                        line_count,
                    }
                }
                Err(error) => {
                    warn!("load of {} failed: {}", path.display(), error);
                    shared.unbind();
                    EngineEvent::Error { request_id, error }
                }
            };

            drop(guard);
            shared.sink.deliver(event);
        });

        Ok(request_id)
    }

    /// Run one registered search term over the bound file
    ///
    /// # Errors
    /// * `OperationInProgress`, `NotLoaded`
    /// * `InvalidArgument` if `criteria` has no registry id
    /// * `InvalidPattern` if the pattern does not compile; no task is started
    pub fn search(
        &self,
        criteria: &SearchCriteria,
        cumulative: bool,
        token: CancellationToken,
        context_span: usize,
    ) -> Result<RequestId> {
        let guard = self.begin()?;
        let store = self.bound_store()?;
        let matcher = compile_registered(criteria)?;
        let request_id = self.next_request_id();

        debug!(
            "search {} for '{}' ({:?}, cumulative: {}, request {})",
            criteria.id(),
            criteria.pattern(),
            criteria.search_type(),
            cumulative,
            request_id
        );

        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let prior = Arc::clone(&*shared.annotations.read());
            let result = shared.search_engine.search(
                &store,
                &prior,
                &matcher,
                cumulative,
                &token,
                context_span,
            );
            drop(prior);

            let event = shared.finish_search(request_id, result);
            drop(guard);
            shared.sink.deliver(event);
        });

        Ok(request_id)
    }

    /// Run several registered terms in one pass, replacing all prior annotations
    pub fn search_multi(
        &self,
        criteria: &[SearchCriteria],
        token: CancellationToken,
        context_span: usize,
    ) -> Result<RequestId> {
        let guard = self.begin()?;
        let store = self.bound_store()?;
        if criteria.is_empty() {
            return Err(LogsiftError::invalid_argument("No search terms given"));
        }
        let matchers = criteria
            .iter()
            .map(compile_registered)
            .collect::<Result<Vec<_>>>()?;
        let request_id = self.next_request_id();

        debug!(
            "multi search over {} terms (request {})",
            matchers.len(),
            request_id
        );

        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let prior = Arc::clone(&*shared.annotations.read());
            let result =
                shared
                    .search_engine
                    .search_multi(&store, &prior, &matchers, &token, context_span);
            drop(prior);

            let event = shared.finish_search(request_id, result);
            drop(guard);
            shared.sink.deliver(event);
        });

        Ok(request_id)
    }

    /// Write every line of the bound file to `path`
    pub fn export_all(
        &self,
        path: impl Into<PathBuf>,
        token: CancellationToken,
    ) -> Result<RequestId> {
        self.spawn_export(path.into(), None, token)
    }

    /// Write the given lines, in the given order, to `path`
    pub fn export_subset(
        &self,
        lines: Vec<u64>,
        path: impl Into<PathBuf>,
        token: CancellationToken,
    ) -> Result<RequestId> {
        self.spawn_export(path.into(), Some(lines), token)
    }

    fn spawn_export(
        &self,
        path: PathBuf,
        lines: Option<Vec<u64>>,
        token: CancellationToken,
    ) -> Result<RequestId> {
        let guard = self.begin()?;
        let store = self.bound_store()?;
        validate_export_target(store.path(), &path)?;
        let request_id = self.next_request_id();

        info!(
            "exporting {} lines to {} (request {})",
            lines.as_ref().map_or(store.line_count(), |l| l.len() as u64),
            path.display(),
            request_id
        );

        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let outcome = match &lines {
                Some(lines) => shared
                    .export_engine
                    .export_subset(&store, lines, &path, &token),
                None => shared.export_engine.export_all(&store, &path, &token),
            };

            drop(guard);
            shared.sink.deliver(EngineEvent::ExportComplete {
                request_id,
                duration: outcome.duration,
                success: outcome.success,
                cancelled: outcome.cancelled,
                lines_written: outcome.lines_written,
                error: outcome.error,
            });
        });

        Ok(request_id)
    }

    /// Unbind the current file, discarding its annotations and search terms
    pub fn close(&self) -> Result<()> {
        let _guard = self.begin()?;
        self.shared.unbind();
        Ok(())
    }

    // ---- read accessors --------------------------------------------------------

    pub fn is_loaded(&self) -> bool {
        self.shared.store.read().is_some()
    }

    /// Whether a background operation is running
    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    /// Path of the bound file
    pub fn path(&self) -> Option<PathBuf> {
        self.shared
            .store
            .read()
            .as_ref()
            .map(|store| store.path().to_path_buf())
    }

    /// Lines in the bound file, 0 when unbound
    pub fn line_count(&self) -> u64 {
        self.shared
            .store
            .read()
            .as_ref()
            .map_or(0, |store| store.line_count())
    }

    pub fn longest_line(&self) -> Option<LongestLine> {
        self.shared
            .store
            .read()
            .as_ref()
            .and_then(|store| store.longest_line())
    }

    /// Text of one line, read from disk
    pub fn get_line(&self, line_number: u64) -> Result<String> {
        self.bound_store()?.get_line(line_number)
    }

    /// Shared handle to the bound store, for callers doing many reads
    pub fn store(&self) -> Option<Arc<LineStore>> {
        self.shared.store.read().clone()
    }

    /// The current annotation generation: every line record in order
    pub fn annotations(&self) -> Arc<AnnotationTable> {
        Arc::clone(&*self.shared.annotations.read())
    }

    // ---- search registry -------------------------------------------------------

    /// Register a term; [`SearchId::REJECTED`] for duplicates
    pub fn add_search(&self, criteria: SearchCriteria, cumulative: bool) -> SearchId {
        self.shared.registry.lock().add(criteria, cumulative)
    }

    /// Forget every registered term (done before a multi-term batch)
    pub fn reset_searches(&self) {
        self.shared.registry.lock().reset();
    }

    /// Registered terms in insertion order
    pub fn searches(&self) -> Vec<SearchCriteria> {
        self.shared.registry.lock().items().cloned().collect()
    }

    pub fn search_criteria(&self, id: SearchId) -> Option<SearchCriteria> {
        self.shared.registry.lock().get(id).cloned()
    }

    pub fn set_search_enabled(&self, id: SearchId, enabled: bool) -> bool {
        self.shared.registry.lock().set_enabled(id, enabled)
    }

    /// Ids the display layer should treat as active
    pub fn enabled_search_ids(&self) -> Vec<SearchId> {
        self.shared.registry.lock().enabled_ids()
    }

    // ---- helpers ---------------------------------------------------------------

    fn begin(&self) -> Result<OperationGuard> {
        self.shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LogsiftError::OperationInProgress)?;
        Ok(OperationGuard {
            shared: Arc::clone(&self.shared),
        })
    }

    fn bound_store(&self) -> Result<Arc<LineStore>> {
        self.shared
            .store
            .read()
            .clone()
            .ok_or(LogsiftError::NotLoaded)
    }

    fn next_request_id(&self) -> RequestId {
        self.shared.next_request_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Shared {
    fn finish_search(
        &self,
        request_id: RequestId,
        result: Result<SearchRun>,
    ) -> EngineEvent {
        match result {
            Ok(run) => {
                let summary = run.summary;
                self.publish(run.table);
                info!(
                    "search matched {} lines ({} terms) in {:?}{}",
                    summary.matches,
                    summary.num_terms,
                    summary.duration,
                    if summary.cancelled { " (cancelled)" } else { "" }
                );
                EngineEvent::SearchComplete {
                    request_id,
                    duration: summary.duration,
                    matches: summary.matches,
                    num_terms: summary.num_terms,
                    cancelled: summary.cancelled,
                }
            }
            Err(error) => {
                warn!("search failed: {}", error);
                EngineEvent::Error { request_id, error }
            }
        }
    }
}

fn compile_registered(criteria: &SearchCriteria) -> Result<LineMatcher> {
    if criteria.id().is_rejected() {
        return Err(LogsiftError::invalid_argument(format!(
            "Search term '{}' has not been registered",
            criteria.pattern()
        )));
    }
    criteria.compile()
}

impl std::fmt::Debug for LogEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEngine")
            .field("path", &self.path())
            .field("line_count", &self.line_count())
            .field("busy", &self.is_busy())
            .finish()
    }
}
