//! Storage and snapshot collaborator traits.

use crate::Result;
use crate::models::{DocumentIdentity, PositionMemory, SlideAnnotation, Stroke};

/// Trait for per-slide annotation stores.
///
/// The store is the authoritative long-term home of annotations; the cache
/// writes through to it on slide switches and session boundaries. All
/// operations are keyed by [`DocumentIdentity`], so two open documents can
/// never read or write each other's folders.
pub trait AnnotationStore: Send + Sync {
    /// Loads one slide's persisted annotation.
    ///
    /// Returns `Ok(None)` when the slide was never saved; the caller decides
    /// whether that means "empty", never this trait.
    fn load_slide(
        &self,
        identity: &DocumentIdentity,
        slide_index: i32,
    ) -> Result<Option<SlideAnnotation>>;

    /// Persists one slide's strokes, overwriting any prior content.
    ///
    /// An empty stroke slice is a valid save: it records "explicitly
    /// cleared", which is distinct from "never touched".
    fn save_slide(
        &self,
        identity: &DocumentIdentity,
        slide_index: i32,
        strokes: &[Stroke],
    ) -> Result<()>;

    /// Lists the indices of all slides with a persisted annotation.
    fn list_slides(&self, identity: &DocumentIdentity) -> Result<Vec<i32>>;

    /// Reads the last-shown-page record for a document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::IdentityMismatch`] when a record exists but
    /// was written for a different content hash; stale positions are never
    /// surfaced.
    fn load_position(&self, identity: &DocumentIdentity) -> Result<Option<PositionMemory>>;

    /// Writes the last-shown-page record for a document.
    fn save_position(&self, identity: &DocumentIdentity, last_page: i32) -> Result<()>;

    /// Checks whether a slide has a persisted annotation.
    fn slide_exists(&self, identity: &DocumentIdentity, slide_index: i32) -> Result<bool> {
        Ok(self.load_slide(identity, slide_index)?.is_some())
    }
}

/// Trait for rendering a slide's annotation canvas to a raster snapshot.
///
/// Rasterization of ink is the overlay's concern, not this crate's; bundle
/// export only persists whatever PNG bytes the renderer hands back.
pub trait SnapshotRenderer: Send + Sync {
    /// Renders one slide's annotation canvas as PNG bytes.
    fn render_png(&self, annotation: &SlideAnnotation) -> Result<Vec<u8>>;
}
