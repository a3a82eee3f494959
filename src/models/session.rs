//! Session state types.

use super::DocumentIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Connection lifecycle of the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live host connection; the cache must be empty.
    #[default]
    Disconnected,
    /// Host connected, document may be open, no slide show running.
    Connected,
    /// A slide show is running and navigation events are flowing.
    InSlideShow,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::InSlideShow => "in-slide-show",
        };
        f.write_str(s)
    }
}

/// Annotation mode the session runs in.
///
/// Recorded in bundle manifests; import refuses a bundle whose mode differs
/// from the active session's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Annotating over a live slide show.
    #[default]
    Presentation,
    /// Free-standing whiteboard pages, no host document.
    Whiteboard,
}

impl SessionMode {
    /// Returns the canonical string form used in manifests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Presentation => "presentation",
            Self::Whiteboard => "whiteboard",
        }
    }

    /// Parses a mode string, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "presentation" => Some(Self::Presentation),
            "whiteboard" => Some(Self::Whiteboard),
            _ => None,
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live state of one connected presentation document.
///
/// Created when a document-open notification arrives; destroyed on
/// document-close or shutdown. There is never more than one active session
/// at a time: a new open forces the previous session's close first.
#[derive(Debug, Clone)]
pub struct PresentationSession {
    /// Identity of the open document.
    pub identity: DocumentIdentity,
    /// 1-based index of the currently shown slide, 0 before the first show.
    pub current_slide: i32,
    /// Total slide count at open time.
    pub total_slides: i32,
    /// Full path of the document's backing file, when the host reported one.
    pub source_path: Option<PathBuf>,
}

impl PresentationSession {
    /// Creates a session for a freshly opened document.
    #[must_use]
    pub const fn new(
        identity: DocumentIdentity,
        total_slides: i32,
        source_path: Option<PathBuf>,
    ) -> Self {
        Self {
            identity,
            current_slide: 0,
            total_slides,
            source_path,
        }
    }
}

/// Last-shown-page record, persisted per document identity.
///
/// Written at document close, read at document open to offer resuming where
/// the previous session left off. Outlives a single session; its lifecycle
/// is tied to the store folder, not to [`PresentationSession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionMemory {
    /// 1-based index of the last shown page.
    pub last_page: i32,
    /// Content hash of the document the page belongs to.
    pub content_hash: String,
    /// Unix timestamp of the save.
    pub saved_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_default_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_session_mode_parse_roundtrip() {
        for mode in [SessionMode::Presentation, SessionMode::Whiteboard] {
            assert_eq!(SessionMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(SessionMode::parse("PRESENTATION"), Some(SessionMode::Presentation));
        assert_eq!(SessionMode::parse("chalkboard"), None);
    }

    #[test]
    fn test_new_session_has_no_current_slide() {
        let identity =
            DocumentIdentity::compute("deck", 9, std::path::Path::new("/tmp/deck.pptx"));
        let session = PresentationSession::new(identity, 9, None);
        assert_eq!(session.current_slide, 0);
        assert_eq!(session.total_slides, 9);
    }
}
