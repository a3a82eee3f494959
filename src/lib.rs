//! # Slidemark
//!
//! Presentation-synchronized annotation cache for slide-show ink overlays.
//!
//! Slidemark keeps a per-slide collection of freehand annotations consistent
//! with an externally-driven presentation document, across connect/disconnect
//! cycles, rapid slide navigation, crashes of the document host, and
//! multi-session persistence.
//!
//! ## Architecture
//!
//! - Identity-partitioned on-disk storage (one folder per open document)
//! - In-memory per-slide cache with write-through on slide switch
//! - Last-wins debouncing of bursty navigation notifications
//! - A single-context session actor fed by a bounded event queue
//! - Whole-deck bundle export/import with a validated manifest
//!
//! ## Example
//!
//! ```rust,ignore
//! use slidemark::{FilesystemStore, HostEvent, PresentationSessionController, SlidemarkConfig};
//! use slidemark::session::spawn_session;
//!
//! let config = SlidemarkConfig::default();
//! let store = FilesystemStore::with_create(&config.data_dir)?;
//! let controller = PresentationSessionController::new(config, store, surface);
//! let session = spawn_session(controller, snapshot_renderer, 256);
//! session.host_event(HostEvent::ConnectionChanged { connected: true }).await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cache;
pub mod config;
pub mod debounce;
pub mod models;
pub mod observability;
pub mod session;
pub mod storage;

// Re-exports for convenience
pub use cache::SlideAnnotationCache;
pub use config::{ConfigFile, SlidemarkConfig};
pub use debounce::{DebounceDecision, NavigationDebouncer};
pub use models::{
    ConnectionState, DocumentIdentity, HostEvent, NavigationEvent, PositionMemory, SessionMode,
    SlideAnnotation, Stroke, StrokePoint, StrokeStyle,
};
pub use session::{PresentationSessionController, RenderSurface, SessionHandle};
pub use storage::{AnnotationStore, BundleManifest, FilesystemStore, SnapshotRenderer};

/// Error type for slidemark operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Out-of-range slide indices, malformed config values |
/// | `OperationFailed` | Filesystem I/O errors, serde failures, archive writes |
/// | `BundleInvalid` | Missing/corrupt manifest, unreadable archive entries |
/// | `IdentityMismatch` | Stale position memory or a bundle for another document |
/// | `HostUnavailable` | The external document host reference is dead |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A slide index is zero or negative where a real slide is required
    /// - A configuration file contains out-of-range values
    /// - A folder name would escape the data directory
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O on slide files or position memory fails
    /// - JSON serialization of an annotation fails
    /// - Writing or reading a bundle archive fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A bundle archive was rejected.
    ///
    /// Raised when:
    /// - The archive has no `manifest.json`
    /// - The manifest fails to parse
    /// - A slide entry named by the manifest is missing or corrupt
    #[error("bundle invalid: {0}")]
    BundleInvalid(String),

    /// Persisted state belongs to a different document.
    ///
    /// Raised when:
    /// - Position memory was recorded for a different content hash
    /// - A bundle's manifest names another document or session mode
    ///
    /// This is always a hard refusal: stale annotations are never applied
    /// to the wrong document.
    #[error("identity mismatch: expected {expected}, found {found}")]
    IdentityMismatch {
        /// Identity of the active session.
        expected: String,
        /// Identity recorded in the persisted state.
        found: String,
    },

    /// The external document host became unreachable.
    ///
    /// Expected during normal document-close races; callers degrade to the
    /// disconnected state instead of treating this as fatal.
    #[error("host unavailable: {0}")]
    HostUnavailable(String),
}

/// Result type alias using the slidemark [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for an [`Error::OperationFailed`] with a named operation.
    pub(crate) fn op(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Returns the current Unix timestamp in seconds.
///
/// Returns 0 if the system clock is before the Unix epoch.
///
/// # Example
///
/// ```
/// use slidemark::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("slide index 0".to_string());
        assert_eq!(err.to_string(), "invalid input: slide index 0");
    }

    #[test]
    fn test_operation_failed_display() {
        let err = Error::op("save_slide", "disk full");
        assert_eq!(err.to_string(), "operation 'save_slide' failed: disk full");
    }

    #[test]
    fn test_identity_mismatch_display() {
        let err = Error::IdentityMismatch {
            expected: "a1b2c3d4".to_string(),
            found: "deadbeef".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("a1b2c3d4"));
        assert!(display.contains("deadbeef"));
    }

    #[test]
    fn test_current_timestamp_is_recent() {
        // 2020-01-01 as a sanity floor
        assert!(current_timestamp() > 1_577_836_800);
    }
}
