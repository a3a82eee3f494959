//! Presentation session state machine.
//!
//! Owns the connection lifecycle, slide-show begin/end, and the routing of
//! debounced navigation into cache loads and saves. Host notifications are
//! expected to arrive one at a time on a single context (see
//! [`crate::session::actor`]); within one event, processing is synchronous
//! and runs to completion.

use crate::cache::SlideAnnotationCache;
use crate::config::SlidemarkConfig;
use crate::debounce::{DebounceDecision, NavigationDebouncer};
use crate::models::{
    ConnectionState, DocumentIdentity, HostEvent, NavigationEvent, PresentationSession,
    SlideAnnotation, Stroke,
};
use crate::storage::{AnnotationStore, BundleContents, SnapshotRenderer, bundle_all, unbundle_all};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Output seam toward the overlay UI.
///
/// The controller reports; it never renders. Implementations receive the
/// active slide's strokes after every successful switch, connection status
/// flips, and resume offers read from position memory.
pub trait RenderSurface: Send {
    /// Presents the strokes of the newly active slide.
    fn present(&mut self, slide_index: i32, strokes: &[Stroke]);

    /// Reports that the host connection came up or went down.
    fn connection_changed(&mut self, _connected: bool) {}

    /// Offers resuming at the last page shown in a previous session.
    ///
    /// Commanding the host to actually navigate there is the UI's business.
    fn offer_resume(&mut self, _last_page: i32) {}
}

/// State machine owning connection lifecycle and navigation routing.
pub struct PresentationSessionController<S: AnnotationStore> {
    config: SlidemarkConfig,
    store: Arc<S>,
    cache: SlideAnnotationCache<S>,
    debouncer: NavigationDebouncer,
    surface: Box<dyn RenderSurface>,
    state: ConnectionState,
    session: Option<PresentationSession>,
}

impl<S: AnnotationStore> PresentationSessionController<S> {
    /// Creates a controller over a store and a render surface.
    pub fn new(config: SlidemarkConfig, store: S, surface: impl RenderSurface + 'static) -> Self {
        let store = Arc::new(store);
        let cache = SlideAnnotationCache::new(Arc::clone(&store));
        let debouncer = NavigationDebouncer::new(config.quiet_window);
        Self {
            config,
            store,
            cache,
            debouncer,
            surface: Box::new(surface),
            state: ConnectionState::Disconnected,
            session: None,
        }
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// True while the host connection is up.
    #[must_use]
    pub const fn connection_status(&self) -> bool {
        !matches!(self.state, ConnectionState::Disconnected)
    }

    /// The active session, while a document is open.
    #[must_use]
    pub const fn session(&self) -> Option<&PresentationSession> {
        self.session.as_ref()
    }

    /// Strokes of the active slide.
    #[must_use]
    pub fn current_strokes(&self) -> &[Stroke] {
        self.cache.active_strokes()
    }

    /// Routes one host notification through the state machine.
    ///
    /// Returns the live debounce deadline, if a navigation is pending; the
    /// caller owns the timer and calls [`Self::handle_deadline`] when it
    /// elapses.
    pub fn handle_event(&mut self, event: HostEvent, now: Instant) -> Option<Instant> {
        match event {
            HostEvent::ConnectionChanged { connected } => self.on_connection_changed(connected),
            HostEvent::DocumentOpen {
                display_name,
                slide_count,
                content_path,
            } => self.on_document_open(&display_name, slide_count, content_path),
            HostEvent::DocumentClose => self.on_document_close(),
            HostEvent::SlideShowBegin { slide_index } => self.on_slide_show_begin(slide_index),
            HostEvent::SlideShowEnd { slide_index } => self.on_slide_show_end(slide_index),
            HostEvent::SlideChanged {
                slide_index,
                total_slides,
            } => self.on_slide_changed(slide_index, total_slides, now),
        }
        self.debouncer.deadline()
    }

    /// Applies a fired debounce deadline.
    ///
    /// Returns the next deadline, if the debouncer re-armed in the meantime.
    pub fn handle_deadline(&mut self, now: Instant) -> Option<Instant> {
        if let Some(event) = self.debouncer.fire(now) {
            self.apply_navigation(event);
        }
        self.debouncer.deadline()
    }

    /// Degrades to disconnected after a failed host call.
    ///
    /// Host-unavailable conditions are expected during normal
    /// document-close races; the cache is left safe and empty rather than
    /// risking annotations bleeding into an unrelated future document.
    pub fn on_host_failure(&mut self, error: &Error) {
        debug!(error = %error, "host unreachable, degrading to disconnected");
        self.disconnect();
    }

    /// Exports every annotated slide of the active session as a bundle.
    ///
    /// # Errors
    ///
    /// Fails when no document is open or when staging/archiving fails;
    /// export is user-initiated and reports its failures.
    pub fn bundle_export(
        &mut self,
        renderer: &dyn SnapshotRenderer,
        out_path: &Path,
    ) -> Result<PathBuf> {
        let Some(session) = self.session.as_ref() else {
            return Err(Error::InvalidInput(
                "no document open, nothing to export".to_string(),
            ));
        };
        let identity = session.identity.clone();
        let source_path = session.source_path.clone();

        // Disk and memory agree after a flush; the bundle then only needs
        // the union of persisted and cached slides.
        self.cache.flush_dirty();
        let slides = self.collect_deck(&identity)?;

        bundle_all(
            &identity,
            source_path.as_deref(),
            &slides,
            self.config.mode,
            renderer,
            out_path,
        )
    }

    /// Imports a bundle into the active session.
    ///
    /// The manifest must name the active document and the session's mode;
    /// anything else is refused before a single slide is touched, leaving
    /// memory and disk untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BundleInvalid`] or [`Error::IdentityMismatch`] on
    /// refusal, or the underlying failure when the archive is unreadable.
    pub fn bundle_import(&mut self, archive_path: &Path) -> Result<BundleContents> {
        let Some(session) = self.session.as_ref() else {
            return Err(Error::InvalidInput(
                "no document open, nothing to import into".to_string(),
            ));
        };
        let identity = session.identity.clone();

        let contents = unbundle_all(archive_path)?;
        contents.manifest.validate_for(&identity, self.config.mode)?;

        for slide in &contents.slides {
            self.cache
                .commit_strokes(slide.slide_index, slide.strokes.clone());
        }

        // Refresh the overlay if the active slide was part of the bundle.
        if let Some(active) = self.cache.active_slide()
            && contents.slides.iter().any(|s| s.slide_index == active)
        {
            self.surface.present(active, self.cache.active_strokes());
        }

        info!(slides = contents.slides.len(), "bundle applied to session");
        Ok(contents)
    }

    fn on_connection_changed(&mut self, connected: bool) {
        if connected {
            if matches!(self.state, ConnectionState::Disconnected) {
                info!("host connected");
                self.state = ConnectionState::Connected;
                self.surface.connection_changed(true);
            }
        } else {
            // The live document reference can no longer be trusted.
            info!("host disconnected, clearing cached annotations");
            self.disconnect();
        }
    }

    fn on_document_open(&mut self, display_name: &str, slide_count: i32, content_path: PathBuf) {
        if self.session.is_some() {
            // A new open implies the previous session is gone; force its close.
            warn!("document opened over a live session, forcing previous close");
            self.on_document_close();
        }
        if matches!(self.state, ConnectionState::Disconnected) {
            // An open notification proves the host is reachable.
            self.state = ConnectionState::Connected;
            self.surface.connection_changed(true);
        }

        let identity = DocumentIdentity::compute(display_name, slide_count, &content_path);
        info!(document = %identity, "document opened");

        self.cache.initialize_for_document(identity.clone());
        self.debouncer.reset();

        let source_path = if content_path.as_os_str().is_empty() {
            None
        } else {
            Some(content_path)
        };
        self.session = Some(PresentationSession::new(identity.clone(), slide_count, source_path));

        if self.config.resume_last_page {
            match self.store.load_position(&identity) {
                Ok(Some(memory)) => {
                    debug!(page = memory.last_page, "offering resume to last page");
                    self.surface.offer_resume(memory.last_page);
                }
                Ok(None) => {}
                Err(Error::IdentityMismatch { expected, found }) => {
                    // Stale record from another document; never applied.
                    warn!(%expected, %found, "refusing stale position memory");
                }
                Err(e) => warn!(error = %e, "position memory unreadable"),
            }
        }
    }

    fn on_document_close(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("document close with no live session");
            return;
        };
        info!(document = %session.identity, "document closed");

        self.cache.begin_transition();
        if session.current_slide > 0
            && let Err(e) = self
                .store
                .save_position(&session.identity, session.current_slide)
        {
            warn!(error = %e, "position memory save failed");
        }
        let _ = self.cache.end_transition();

        // Annotations must not leak into the next document's session.
        self.cache.clear_all();
        self.debouncer.reset();
        self.state = ConnectionState::Disconnected;
        self.surface.connection_changed(false);
    }

    fn on_slide_show_begin(&mut self, slide_index: i32) {
        if self.session.is_none() {
            warn!(slide = slide_index, "slide show began with no open document");
            return;
        }
        if !matches!(self.state, ConnectionState::Connected) {
            debug!(state = %self.state, "unexpected slide show begin");
        }
        info!(slide = slide_index, "slide show began");
        self.state = ConnectionState::InSlideShow;

        let strokes_len = {
            let strokes = self.cache.switch_to(slide_index);
            self.surface.present(slide_index, strokes);
            strokes.len()
        };
        debug!(slide = slide_index, strokes = strokes_len, "initial slide presented");

        if let Some(session) = self.session.as_mut() {
            session.current_slide = slide_index;
        }
    }

    fn on_slide_changed(&mut self, slide_index: i32, total_slides: i32, now: Instant) {
        if !matches!(self.state, ConnectionState::InSlideShow) {
            debug!(
                slide = slide_index,
                state = %self.state,
                "slide change outside a slide show ignored"
            );
            return;
        }

        let event = NavigationEvent::new(slide_index, total_slides, now);
        match self.debouncer.observe(event) {
            DebounceDecision::ApplyNow(event) => self.apply_navigation(event),
            DebounceDecision::Deferred(_) => {
                debug!(slide = slide_index, "navigation deferred by debounce");
            }
        }
    }

    fn on_slide_show_end(&mut self, slide_index: i32) {
        if !matches!(self.state, ConnectionState::InSlideShow) {
            debug!(slide = slide_index, "slide show end outside a show");
        }
        info!(slide = slide_index, "slide show ended");

        // End-of-show is not subject to coalescing.
        if let Some(discarded) = self.debouncer.take_pending() {
            debug!(
                slide = discarded.slide_index,
                "pending navigation discarded at show end"
            );
        }

        self.cache.begin_transition();
        let _ = self.cache.end_transition();

        self.cache.flush_dirty();
        self.cache.force_save(slide_index);

        if let Some(session) = self.session.as_mut() {
            session.current_slide = slide_index;
            if let Err(e) = self.store.save_position(&session.identity, slide_index) {
                warn!(error = %e, "position memory save failed");
            }
        }

        // Defensive: a stuck lock must not block the next show.
        self.cache.reset_lock_state();
        self.state = ConnectionState::Connected;
    }

    fn apply_navigation(&mut self, event: NavigationEvent) {
        if !matches!(self.state, ConnectionState::InSlideShow) {
            debug!(
                slide = event.slide_index,
                "debounced navigation arrived after show end, dropped"
            );
            return;
        }

        let slide_index = event.slide_index;
        {
            let strokes = self.cache.switch_to(slide_index);
            self.surface.present(slide_index, strokes);
        }

        if let Some(session) = self.session.as_mut() {
            session.current_slide = slide_index;
            if event.total_slides > 0 {
                session.total_slides = event.total_slides;
            }
        }
    }

    /// Replaces the stroke set of the active slide.
    ///
    /// Called by the overlay after each completed stroke or erase.
    pub fn commit_strokes(&mut self, strokes: Vec<Stroke>) {
        let Some(active) = self.cache.active_slide() else {
            warn!("stroke commit with no active slide dropped");
            return;
        };
        self.cache.commit_strokes(active, strokes);
    }

    fn disconnect(&mut self) {
        self.session = None;
        self.cache.clear_all();
        self.debouncer.reset();
        if !matches!(self.state, ConnectionState::Disconnected) {
            self.state = ConnectionState::Disconnected;
            self.surface.connection_changed(false);
        }
    }

    /// Collects the full annotated deck: persisted slides overlaid with
    /// anything cached this session.
    fn collect_deck(&self, identity: &DocumentIdentity) -> Result<Vec<SlideAnnotation>> {
        let mut deck = BTreeMap::new();
        for index in self.store.list_slides(identity)? {
            if let Some(annotation) = self.store.load_slide(identity, index)? {
                deck.insert(index, annotation);
            }
        }
        for annotation in self.cache.annotations() {
            deck.insert(annotation.slide_index, annotation.clone());
        }
        Ok(deck.into_values().collect())
    }
}
