//! Filesystem-based annotation store.
//!
//! Stores each document's annotations in an identity-derived folder under
//! the data directory: one JSON file per touched slide plus one
//! `position.json` record. Slide files are written whole and overwrite any
//! prior content, so a reader never observes a partial stroke set.

use crate::models::{DocumentIdentity, PositionMemory, SlideAnnotation, Stroke};
use crate::storage::traits::AnnotationStore;
use crate::{Error, Result, current_timestamp};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum size for a single slide file (4MB).
/// Refuses absurd files instead of loading them into the cache.
const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// File name of the per-document position record.
const POSITION_FILE: &str = "position.json";

/// Serializable slide annotation format for filesystem storage.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredAnnotation {
    pub(crate) slide_index: i32,
    pub(crate) strokes: Vec<Stroke>,
    pub(crate) saved_at: u64,
}

impl StoredAnnotation {
    pub(crate) fn from_strokes(slide_index: i32, strokes: &[Stroke]) -> Self {
        Self {
            slide_index,
            strokes: strokes.to_vec(),
            saved_at: current_timestamp(),
        }
    }

    pub(crate) fn into_annotation(self) -> SlideAnnotation {
        SlideAnnotation::from_strokes(self.slide_index, self.strokes)
    }
}

/// Returns the file name for a slide's annotation, e.g. `slide_0007.json`.
pub(crate) fn slide_file_name(slide_index: i32) -> String {
    format!("slide_{slide_index:04}.json")
}

/// Parses a slide index back out of a `slide_NNNN.json` file name.
pub(crate) fn parse_slide_file_name(path: &Path) -> Option<i32> {
    if path.extension().is_none_or(|ext| ext != "json") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("slide_")?.parse::<i32>().ok()
}

/// Filesystem-based annotation store.
pub struct FilesystemStore {
    /// Base directory holding one folder per document identity.
    data_dir: PathBuf,
}

impl FilesystemStore {
    /// Creates a store rooted at the given data directory.
    ///
    /// Directory creation is deferred to the first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Creates a store and eagerly creates the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_create(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|e| Error::op("create_data_dir", e))?;
        Ok(Self { data_dir })
    }

    /// Returns the base data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the folder for a document identity, creating it if asked.
    fn document_dir(&self, identity: &DocumentIdentity, create: bool) -> Result<PathBuf> {
        let dir = self.data_dir.join(identity.folder_name());
        if create {
            fs::create_dir_all(&dir).map_err(|e| Error::op("create_document_dir", e))?;
        }
        Ok(dir)
    }

    fn slide_path(&self, identity: &DocumentIdentity, slide_index: i32) -> Result<PathBuf> {
        Ok(self
            .document_dir(identity, false)?
            .join(slide_file_name(slide_index)))
    }

    fn read_checked(path: &Path, operation: &str) -> Result<Vec<u8>> {
        let metadata = fs::metadata(path).map_err(|e| Error::op(operation, e))?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(Error::InvalidInput(format!(
                "annotation file exceeds maximum size of {MAX_FILE_SIZE} bytes: {}",
                path.display()
            )));
        }
        fs::read(path).map_err(|e| Error::op(operation, e))
    }
}

impl AnnotationStore for FilesystemStore {
    fn load_slide(
        &self,
        identity: &DocumentIdentity,
        slide_index: i32,
    ) -> Result<Option<SlideAnnotation>> {
        if slide_index <= 0 {
            return Err(Error::InvalidInput(format!(
                "slide index must be positive, got {slide_index}"
            )));
        }

        let path = self.slide_path(identity, slide_index)?;
        if !path.exists() {
            return Ok(None);
        }

        let bytes = Self::read_checked(&path, "read_slide_file")?;
        let stored: StoredAnnotation =
            serde_json::from_slice(&bytes).map_err(|e| Error::op("deserialize_slide", e))?;

        Ok(Some(stored.into_annotation()))
    }

    fn save_slide(
        &self,
        identity: &DocumentIdentity,
        slide_index: i32,
        strokes: &[Stroke],
    ) -> Result<()> {
        if slide_index <= 0 {
            return Err(Error::InvalidInput(format!(
                "slide index must be positive, got {slide_index}"
            )));
        }

        let dir = self.document_dir(identity, true)?;
        let path = dir.join(slide_file_name(slide_index));
        let stored = StoredAnnotation::from_strokes(slide_index, strokes);

        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| Error::op("serialize_slide", e))?;

        fs::write(&path, json).map_err(|e| Error::op("write_slide_file", e))?;

        tracing::trace!(
            slide = slide_index,
            strokes = strokes.len(),
            path = %path.display(),
            "slide annotation persisted"
        );
        Ok(())
    }

    fn list_slides(&self, identity: &DocumentIdentity) -> Result<Vec<i32>> {
        let dir = self.document_dir(identity, false)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| Error::op("read_document_dir", e))?;

        let mut indices = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::op("read_dir_entry", e))?;
            if let Some(index) = parse_slide_file_name(&entry.path()) {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    fn load_position(&self, identity: &DocumentIdentity) -> Result<Option<PositionMemory>> {
        let path = self.document_dir(identity, false)?.join(POSITION_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = Self::read_checked(&path, "read_position_file")?;
        let memory: PositionMemory =
            serde_json::from_slice(&bytes).map_err(|e| Error::op("deserialize_position", e))?;

        if memory.content_hash != identity.content_hash {
            return Err(Error::IdentityMismatch {
                expected: identity.content_hash.clone(),
                found: memory.content_hash,
            });
        }

        Ok(Some(memory))
    }

    fn save_position(&self, identity: &DocumentIdentity, last_page: i32) -> Result<()> {
        let dir = self.document_dir(identity, true)?;
        let memory = PositionMemory {
            last_page,
            content_hash: identity.content_hash.clone(),
            saved_at: current_timestamp(),
        };

        let json = serde_json::to_string_pretty(&memory)
            .map_err(|e| Error::op("serialize_position", e))?;

        fs::write(dir.join(POSITION_FILE), json).map_err(|e| Error::op("write_position_file", e))
    }
}
