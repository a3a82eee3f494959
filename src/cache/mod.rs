//! In-memory per-slide annotation cache.
//!
//! The cache owns every [`SlideAnnotation`] of the currently connected
//! document. Slides are lazily loaded from the store on first touch and
//! written through on eviction (switch away) and at session boundaries.
//! Single-slide disk failures are absorbed here: the in-memory annotation
//! stays authoritative and the next switch retries the save.

use crate::models::{DocumentIdentity, SlideAnnotation, Stroke};
use crate::storage::AnnotationStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Strokes returned when no slide is active.
const NO_STROKES: &[Stroke] = &[];

/// In-memory map from slide index to annotation data for one document.
///
/// Owned by the single active session controller; not designed for
/// concurrent access from multiple contexts.
pub struct SlideAnnotationCache<S: AnnotationStore> {
    store: Arc<S>,
    identity: Option<DocumentIdentity>,
    /// Re-entrancy guard; while positive, slide transitions are queued
    /// instead of applied.
    lock_depth: u32,
    active_slide: Option<i32>,
    /// Latest transition requested while locked.
    deferred_slide: Option<i32>,
    /// Sparse: only slides touched this session are present.
    slides: HashMap<i32, SlideAnnotation>,
}

impl<S: AnnotationStore> SlideAnnotationCache<S> {
    /// Creates an empty cache backed by the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            identity: None,
            lock_depth: 0,
            active_slide: None,
            deferred_slide: None,
            slides: HashMap::new(),
        }
    }

    /// Binds the cache to a freshly opened document.
    ///
    /// Clears the map, resets the lock depth, and records the identity.
    /// Must be called exactly once per connected document before any load
    /// or save.
    pub fn initialize_for_document(&mut self, identity: DocumentIdentity) {
        debug!(document = %identity, "cache initialized for document");
        self.slides.clear();
        self.lock_depth = 0;
        self.active_slide = None;
        self.deferred_slide = None;
        self.identity = Some(identity);
    }

    /// Identity of the bound document, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&DocumentIdentity> {
        self.identity.as_ref()
    }

    /// Index of the active slide, if a switch has happened.
    #[must_use]
    pub const fn active_slide(&self) -> Option<i32> {
        self.active_slide
    }

    /// True when a save for the slide may touch the store right now.
    ///
    /// False while the lock depth is positive, so a switch triggered during
    /// a lock-sensitive transition never writes to the wrong slide.
    #[must_use]
    pub fn can_write(&self, _slide_index: i32) -> bool {
        self.lock_depth == 0 && self.identity.is_some()
    }

    /// Enters a lock-sensitive transition.
    pub fn begin_transition(&mut self) {
        self.lock_depth += 1;
        trace!(depth = self.lock_depth, "cache transition lock acquired");
    }

    /// Leaves a lock-sensitive transition.
    ///
    /// When the depth returns to zero, hands back the latest slide
    /// transition that was queued while locked, for the caller to apply.
    pub fn end_transition(&mut self) -> Option<i32> {
        self.lock_depth = self.lock_depth.saturating_sub(1);
        trace!(depth = self.lock_depth, "cache transition lock released");
        if self.lock_depth == 0 {
            self.deferred_slide.take()
        } else {
            None
        }
    }

    /// Forces the lock depth back to zero.
    ///
    /// Called when the controller detects it may be in an inconsistent
    /// state, e.g. after an abnormal session end, so a later switch is not
    /// permanently blocked.
    pub fn reset_lock_state(&mut self) {
        if self.lock_depth != 0 {
            warn!(depth = self.lock_depth, "cache lock state forcibly reset");
        }
        self.lock_depth = 0;
        self.deferred_slide = None;
    }

    /// Makes `slide_index` the active slide and returns its strokes.
    ///
    /// The one operation that crosses the cache/store boundary
    /// transactionally: the outgoing slide's dirty annotation is written
    /// through *before* the incoming slide is loaded, so a crash mid-switch
    /// cannot lose the outgoing edits. Store failures are logged and
    /// absorbed; the cache remains authoritative and the next switch
    /// retries.
    ///
    /// Switching to the already-active slide is a no-op that never touches
    /// the store. A non-positive index indicates an upstream notification
    /// glitch and is ignored. While the lock depth is positive the request
    /// is queued instead of applied.
    pub fn switch_to(&mut self, slide_index: i32) -> &[Stroke] {
        if slide_index <= 0 {
            warn!(slide = slide_index, "ignoring non-positive slide index");
            return self.active_strokes();
        }

        if self.identity.is_none() {
            warn!(slide = slide_index, "switch requested with no document bound");
            return NO_STROKES;
        }

        if self.lock_depth > 0 {
            debug!(
                slide = slide_index,
                depth = self.lock_depth,
                "cache locked, queueing slide transition"
            );
            self.deferred_slide = Some(slide_index);
            return self.active_strokes();
        }

        if self.active_slide == Some(slide_index) {
            trace!(slide = slide_index, "same-slide switch, no store access");
            return self.active_strokes();
        }

        // Outgoing save happens-before incoming load, always.
        self.save_outgoing();
        self.load_incoming(slide_index);
        self.active_slide = Some(slide_index);
        self.active_strokes()
    }

    /// Replaces the stroke set of a slide and marks it dirty.
    ///
    /// The UI pushes the full canvas content after each change; an empty
    /// replacement records an explicit clear.
    pub fn commit_strokes(&mut self, slide_index: i32, strokes: Vec<Stroke>) {
        if self.identity.is_none() || slide_index <= 0 {
            warn!(slide = slide_index, "stroke commit dropped, no document bound");
            return;
        }
        let annotation = self
            .slides
            .entry(slide_index)
            .or_insert_with(|| SlideAnnotation::empty(slide_index));
        annotation.replace_strokes(strokes);
        trace!(
            slide = slide_index,
            strokes = annotation.stroke_count(),
            "strokes committed"
        );
    }

    /// Writes one slide through to the store regardless of dirtiness.
    ///
    /// Used at slide-show end, which is not subject to debouncing. Respects
    /// the transition lock like any other write.
    pub fn force_save(&mut self, slide_index: i32) {
        if !self.can_write(slide_index) {
            debug!(slide = slide_index, "forced save skipped while locked");
            return;
        }
        let Some(identity) = self.identity.clone() else {
            return;
        };
        if let Some(annotation) = self.slides.get_mut(&slide_index) {
            match self
                .store
                .save_slide(&identity, slide_index, &annotation.strokes)
            {
                Ok(()) => annotation.dirty = false,
                Err(e) => warn!(slide = slide_index, error = %e, "forced save failed"),
            }
        }
    }

    /// Writes every dirty slide through to the store.
    pub fn flush_dirty(&mut self) {
        let Some(identity) = self.identity.clone() else {
            return;
        };
        if self.lock_depth > 0 {
            debug!("flush skipped while locked");
            return;
        }
        for annotation in self.slides.values_mut().filter(|a| a.dirty) {
            match self
                .store
                .save_slide(&identity, annotation.slide_index, &annotation.strokes)
            {
                Ok(()) => annotation.dirty = false,
                Err(e) => warn!(
                    slide = annotation.slide_index,
                    error = %e,
                    "flush of dirty slide failed"
                ),
            }
        }
    }

    /// Drops the in-memory map without writing through.
    ///
    /// Used when a document is confirmed closed: its annotations must not
    /// leak into the next document's session.
    pub fn clear_all(&mut self) {
        debug!(slides = self.slides.len(), "cache cleared");
        self.slides.clear();
        self.identity = None;
        self.active_slide = None;
        self.deferred_slide = None;
        self.lock_depth = 0;
    }

    /// The cached annotation for a slide, if touched this session.
    #[must_use]
    pub fn get(&self, slide_index: i32) -> Option<&SlideAnnotation> {
        self.slides.get(&slide_index)
    }

    /// Every annotation touched this session.
    pub fn annotations(&self) -> impl Iterator<Item = &SlideAnnotation> {
        self.slides.values()
    }

    /// Strokes of the active slide, or nothing before the first switch.
    #[must_use]
    pub fn active_strokes(&self) -> &[Stroke] {
        self.active_slide
            .and_then(|index| self.slides.get(&index))
            .map_or(NO_STROKES, |annotation| annotation.strokes.as_slice())
    }

    fn save_outgoing(&mut self) {
        let Some(outgoing) = self.active_slide else {
            return;
        };
        let Some(identity) = self.identity.clone() else {
            return;
        };
        let Some(annotation) = self.slides.get_mut(&outgoing) else {
            return;
        };
        if !annotation.dirty {
            return;
        }
        match self
            .store
            .save_slide(&identity, outgoing, &annotation.strokes)
        {
            Ok(()) => {
                annotation.dirty = false;
                trace!(slide = outgoing, "outgoing slide written through");
            }
            // Annotation stays dirty; the next switch retries.
            Err(e) => warn!(slide = outgoing, error = %e, "outgoing save failed"),
        }
    }

    fn load_incoming(&mut self, slide_index: i32) {
        if self.slides.contains_key(&slide_index) {
            // Already cached this session; a dirty instance must never be
            // shadowed by a fresh disk read.
            return;
        }
        let Some(identity) = self.identity.clone() else {
            return;
        };
        let annotation = match self.store.load_slide(&identity, slide_index) {
            Ok(Some(annotation)) => annotation,
            Ok(None) => SlideAnnotation::empty(slide_index),
            Err(e) => {
                warn!(slide = slide_index, error = %e, "slide load failed, starting empty");
                SlideAnnotation::empty(slide_index)
            }
        };
        self.slides.insert(slide_index, annotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StrokePoint;
    use crate::storage::FilesystemStore;
    use std::path::Path;
    use tempfile::TempDir;

    fn identity() -> DocumentIdentity {
        DocumentIdentity::compute("deck", 30, Path::new("/tmp/deck.pptx"))
    }

    fn stroke() -> Stroke {
        Stroke::new(vec![StrokePoint {
            x: 1.0,
            y: 2.0,
            pressure: 1.0,
        }])
    }

    fn cache_with_store() -> (TempDir, SlideAnnotationCache<FilesystemStore>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FilesystemStore::new(dir.path()));
        let mut cache = SlideAnnotationCache::new(store);
        cache.initialize_for_document(identity());
        (dir, cache)
    }

    #[test]
    fn test_switch_to_empty_slide() {
        let (_dir, mut cache) = cache_with_store();
        let strokes = cache.switch_to(1);
        assert!(strokes.is_empty());
        assert_eq!(cache.active_slide(), Some(1));
    }

    /// Store wrapper logging the order of save/load calls.
    struct RecordingStore {
        inner: FilesystemStore,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn new(dir: &TempDir) -> Self {
            Self {
                inner: FilesystemStore::new(dir.path()),
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AnnotationStore for RecordingStore {
        fn load_slide(
            &self,
            identity: &DocumentIdentity,
            slide_index: i32,
        ) -> crate::Result<Option<SlideAnnotation>> {
            self.calls.lock().unwrap().push(format!("load:{slide_index}"));
            self.inner.load_slide(identity, slide_index)
        }

        fn save_slide(
            &self,
            identity: &DocumentIdentity,
            slide_index: i32,
            strokes: &[Stroke],
        ) -> crate::Result<()> {
            self.calls.lock().unwrap().push(format!("save:{slide_index}"));
            self.inner.save_slide(identity, slide_index, strokes)
        }

        fn list_slides(&self, identity: &DocumentIdentity) -> crate::Result<Vec<i32>> {
            self.inner.list_slides(identity)
        }

        fn load_position(
            &self,
            identity: &DocumentIdentity,
        ) -> crate::Result<Option<crate::models::PositionMemory>> {
            self.inner.load_position(identity)
        }

        fn save_position(&self, identity: &DocumentIdentity, last_page: i32) -> crate::Result<()> {
            self.inner.save_position(identity, last_page)
        }
    }

    #[test]
    fn test_store_sees_outgoing_save_strictly_before_incoming_load() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordingStore::new(&dir));
        let mut cache = SlideAnnotationCache::new(Arc::clone(&store));
        cache.initialize_for_document(identity());

        cache.switch_to(1);
        cache.commit_strokes(1, vec![stroke()]);
        cache.switch_to(2);

        assert_eq!(store.calls(), vec!["load:1", "save:1", "load:2"]);
    }

    #[test]
    fn test_switch_writes_outgoing_before_loading_incoming() {
        let (dir, mut cache) = cache_with_store();
        cache.switch_to(1);
        cache.commit_strokes(1, vec![stroke(), stroke()]);

        cache.switch_to(2);

        // The outgoing slide hit the disk during the switch.
        let store = FilesystemStore::new(dir.path());
        let persisted = store.load_slide(&identity(), 1).unwrap().unwrap();
        assert_eq!(persisted.stroke_count(), 2);
        assert!(!cache.get(1).unwrap().dirty);
    }

    #[test]
    fn test_dirty_slide_returns_cached_instance() {
        let (dir, mut cache) = cache_with_store();

        // Persist one stroke, then dirty the in-memory copy with three.
        cache.switch_to(1);
        cache.commit_strokes(1, vec![stroke()]);
        cache.switch_to(2);
        cache.commit_strokes(1, vec![stroke(), stroke(), stroke()]);

        // Overwrite the file behind the cache's back.
        let store = FilesystemStore::new(dir.path());
        store.save_slide(&identity(), 1, &[]).unwrap();

        // Coming back must return the cached instance, not a fresh read.
        let strokes = cache.switch_to(1);
        assert_eq!(strokes.len(), 3);
    }

    #[test]
    fn test_same_slide_switch_is_noop() {
        let (dir, mut cache) = cache_with_store();
        cache.switch_to(5);
        cache.commit_strokes(5, vec![stroke()]);

        // Same-slide switch performs zero store writes.
        cache.switch_to(5);
        let store = FilesystemStore::new(dir.path());
        assert!(store.load_slide(&identity(), 5).unwrap().is_none());
        assert!(cache.get(5).unwrap().dirty);
    }

    #[test]
    fn test_non_positive_index_ignored() {
        let (_dir, mut cache) = cache_with_store();
        cache.switch_to(3);
        cache.commit_strokes(3, vec![stroke()]);

        let strokes = cache.switch_to(0);
        assert_eq!(strokes.len(), 1);
        assert_eq!(cache.active_slide(), Some(3));

        cache.switch_to(-4);
        assert_eq!(cache.active_slide(), Some(3));
    }

    #[test]
    fn test_lock_gates_writes_and_queues_transition() {
        let (dir, mut cache) = cache_with_store();
        cache.switch_to(1);
        cache.commit_strokes(1, vec![stroke()]);

        cache.begin_transition();
        assert!(!cache.can_write(1));

        // Switch while locked: queued, nothing written, nothing loaded.
        cache.switch_to(2);
        assert_eq!(cache.active_slide(), Some(1));
        let store = FilesystemStore::new(dir.path());
        assert!(store.load_slide(&identity(), 1).unwrap().is_none());

        // Unlock hands back the queued target.
        let deferred = cache.end_transition();
        assert_eq!(deferred, Some(2));
        assert!(cache.can_write(1));
    }

    #[test]
    fn test_nested_lock_releases_at_zero() {
        let (_dir, mut cache) = cache_with_store();
        cache.begin_transition();
        cache.begin_transition();
        cache.switch_to(8);

        assert_eq!(cache.end_transition(), None);
        assert_eq!(cache.end_transition(), Some(8));
    }

    #[test]
    fn test_reset_lock_state_unblocks() {
        let (_dir, mut cache) = cache_with_store();
        cache.begin_transition();
        cache.begin_transition();
        cache.reset_lock_state();
        assert!(cache.can_write(1));
        // The queued transition is dropped with the lock.
        assert_eq!(cache.end_transition(), None);
    }

    #[test]
    fn test_clear_all_drops_without_writing() {
        let (dir, mut cache) = cache_with_store();
        cache.switch_to(1);
        cache.commit_strokes(1, vec![stroke()]);

        cache.clear_all();

        assert!(cache.identity().is_none());
        assert!(cache.active_strokes().is_empty());
        let store = FilesystemStore::new(dir.path());
        assert!(store.load_slide(&identity(), 1).unwrap().is_none());
    }

    #[test]
    fn test_force_save_writes_clean_slide() {
        let (dir, mut cache) = cache_with_store();
        cache.switch_to(6);
        cache.commit_strokes(6, vec![stroke()]);
        cache.force_save(6);

        let store = FilesystemStore::new(dir.path());
        let persisted = store.load_slide(&identity(), 6).unwrap().unwrap();
        assert_eq!(persisted.stroke_count(), 1);
        assert!(!cache.get(6).unwrap().dirty);
    }

    #[test]
    fn test_force_save_respects_lock() {
        let (dir, mut cache) = cache_with_store();
        cache.switch_to(6);
        cache.commit_strokes(6, vec![stroke()]);

        cache.begin_transition();
        cache.force_save(6);

        let store = FilesystemStore::new(dir.path());
        assert!(store.load_slide(&identity(), 6).unwrap().is_none());
    }

    #[test]
    fn test_flush_dirty_writes_all() {
        let (dir, mut cache) = cache_with_store();
        cache.switch_to(1);
        cache.commit_strokes(1, vec![stroke()]);
        cache.switch_to(2);
        cache.commit_strokes(2, vec![stroke(), stroke()]);

        cache.flush_dirty();

        let store = FilesystemStore::new(dir.path());
        assert_eq!(
            store
                .load_slide(&identity(), 2)
                .unwrap()
                .unwrap()
                .stroke_count(),
            2
        );
        assert!(cache.annotations().all(|a| !a.dirty));
    }

    #[test]
    fn test_reinitialize_clears_previous_document() {
        let (_dir, mut cache) = cache_with_store();
        cache.switch_to(1);
        cache.commit_strokes(1, vec![stroke()]);

        let other = DocumentIdentity::compute("other", 5, Path::new("/tmp/other.pptx"));
        cache.initialize_for_document(other.clone());

        assert_eq!(cache.identity(), Some(&other));
        assert!(cache.get(1).is_none());
        assert!(cache.switch_to(1).is_empty());
    }
}
