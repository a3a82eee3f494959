//! Whole-deck bundle export and import.
//!
//! A bundle is one deflate ZIP archive holding every provided slide's
//! annotation JSON, one rendered PNG snapshot per slide, and a
//! `manifest.json` describing when the bundle was made and which document it
//! belongs to. Export stages everything in a temporary directory that is
//! removed on every exit path, success or failure.
//!
//! Unlike single-slide saves, bundle failures propagate: export and import
//! are explicit user actions that must report success or failure.

use crate::models::{DocumentIdentity, SessionMode, SlideAnnotation};
use crate::storage::filesystem::{StoredAnnotation, slide_file_name};
use crate::storage::traits::SnapshotRenderer;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Archive entry name of the manifest.
const MANIFEST_NAME: &str = "manifest.json";

/// Archive directory holding per-slide annotation JSON.
const SLIDES_DIR: &str = "slides";

/// Archive directory holding per-slide PNG snapshots.
const SNAPSHOTS_DIR: &str = "snapshots";

/// Source document description recorded in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDocument {
    /// Display name of the source document.
    pub display_name: String,
    /// Slide count of the source document.
    pub slide_count: i32,
    /// Identity content hash of the source document.
    pub content_hash: String,
    /// Full path of the source document, when it was known.
    pub source_path: Option<PathBuf>,
}

/// Manifest describing one exported bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Creation time of the bundle.
    pub created_at: DateTime<Utc>,
    /// Page count of the source deck.
    pub page_count: i32,
    /// Session mode the bundle was exported from.
    pub mode: SessionMode,
    /// The source document's identity.
    pub document: BundleDocument,
}

impl BundleManifest {
    /// Checks that this bundle belongs to the given session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentityMismatch`] when the manifest was recorded
    /// for a different document, and [`Error::BundleInvalid`] when the
    /// recorded session mode differs. Either way the bundle must not be
    /// merged into the active session.
    pub fn validate_for(&self, identity: &DocumentIdentity, mode: SessionMode) -> Result<()> {
        if self.mode != mode {
            return Err(Error::BundleInvalid(format!(
                "bundle was exported in {} mode, session is in {} mode",
                self.mode, mode
            )));
        }
        if self.document.content_hash != identity.content_hash {
            return Err(Error::IdentityMismatch {
                expected: identity.content_hash.clone(),
                found: self.document.content_hash.clone(),
            });
        }
        Ok(())
    }
}

/// Everything recovered from a bundle archive.
#[derive(Debug)]
pub struct BundleContents {
    /// The bundle's manifest.
    pub manifest: BundleManifest,
    /// Recovered slide annotations, ordered by slide index.
    pub slides: Vec<SlideAnnotation>,
}

/// Exports a deck's annotations into a single bundle archive.
///
/// Stages the manifest, per-slide JSON, and per-slide PNG snapshots in a
/// temporary directory, then packs the staged tree into `out_path`. The
/// staging directory is removed when this function returns, on every path.
///
/// # Errors
///
/// Propagates staging, rendering, and archive failures; export is a
/// user-initiated action and must report them.
pub fn bundle_all(
    identity: &DocumentIdentity,
    source_path: Option<&Path>,
    slides: &[SlideAnnotation],
    mode: SessionMode,
    renderer: &dyn SnapshotRenderer,
    out_path: &Path,
) -> Result<PathBuf> {
    // Staging directory: removed on drop, success or failure.
    let staging = tempfile::tempdir().map_err(|e| Error::op("create_staging_dir", e))?;
    let slides_dir = staging.path().join(SLIDES_DIR);
    let snapshots_dir = staging.path().join(SNAPSHOTS_DIR);
    fs::create_dir_all(&slides_dir).map_err(|e| Error::op("create_staging_dir", e))?;
    fs::create_dir_all(&snapshots_dir).map_err(|e| Error::op("create_staging_dir", e))?;

    let manifest = BundleManifest {
        created_at: Utc::now(),
        page_count: identity.slide_count,
        mode,
        document: BundleDocument {
            display_name: identity.display_name.clone(),
            slide_count: identity.slide_count,
            content_hash: identity.content_hash.clone(),
            source_path: source_path.map(Path::to_path_buf),
        },
    };

    let manifest_json =
        serde_json::to_string_pretty(&manifest).map_err(|e| Error::op("serialize_manifest", e))?;
    fs::write(staging.path().join(MANIFEST_NAME), &manifest_json)
        .map_err(|e| Error::op("write_manifest", e))?;

    let mut entries: Vec<(String, PathBuf)> = vec![(
        MANIFEST_NAME.to_string(),
        staging.path().join(MANIFEST_NAME),
    )];

    for slide in slides {
        let file_name = slide_file_name(slide.slide_index);

        let stored = StoredAnnotation::from_strokes(slide.slide_index, &slide.strokes);
        let json =
            serde_json::to_string_pretty(&stored).map_err(|e| Error::op("serialize_slide", e))?;
        let slide_path = slides_dir.join(&file_name);
        fs::write(&slide_path, json).map_err(|e| Error::op("stage_slide", e))?;
        entries.push((format!("{SLIDES_DIR}/{file_name}"), slide_path));

        let png = renderer.render_png(slide)?;
        let snapshot_name = format!("slide_{:04}.png", slide.slide_index);
        let snapshot_path = snapshots_dir.join(&snapshot_name);
        fs::write(&snapshot_path, png).map_err(|e| Error::op("stage_snapshot", e))?;
        entries.push((format!("{SNAPSHOTS_DIR}/{snapshot_name}"), snapshot_path));
    }

    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::op("create_bundle_dir", e))?;
    }

    let archive = fs::File::create(out_path).map_err(|e| Error::op("create_bundle_file", e))?;
    let mut writer = ZipWriter::new(archive);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in entries {
        writer
            .start_file(name, options)
            .map_err(|e| Error::op("write_bundle_entry", e))?;
        let bytes = fs::read(&path).map_err(|e| Error::op("read_staged_file", e))?;
        writer
            .write_all(&bytes)
            .map_err(|e| Error::op("write_bundle_entry", e))?;
    }

    writer.finish().map_err(|e| Error::op("finish_bundle", e))?;

    tracing::info!(
        document = %identity,
        slides = slides.len(),
        path = %out_path.display(),
        "bundle exported"
    );
    Ok(out_path.to_path_buf())
}

/// Reads a bundle archive back into its manifest and slides.
///
/// The manifest is located and parsed before any other entry is trusted;
/// an archive without one is rejected outright.
///
/// # Errors
///
/// Returns [`Error::BundleInvalid`] for a missing or corrupt manifest and
/// for unreadable slide entries, and [`Error::OperationFailed`] when the
/// archive itself cannot be opened.
pub fn unbundle_all(archive_path: &Path) -> Result<BundleContents> {
    let file = fs::File::open(archive_path).map_err(|e| Error::op("open_bundle_file", e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| Error::BundleInvalid(format!("unreadable archive: {e}")))?;

    let manifest: BundleManifest = {
        let mut entry = archive.by_name(MANIFEST_NAME).map_err(|_| {
            Error::BundleInvalid(format!("archive has no {MANIFEST_NAME}"))
        })?;
        let mut json = String::new();
        entry
            .read_to_string(&mut json)
            .map_err(|e| Error::BundleInvalid(format!("unreadable manifest: {e}")))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::BundleInvalid(format!("corrupt manifest: {e}")))?
    };

    let slide_entries: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with(SLIDES_DIR) && name.ends_with(".json"))
        .map(ToString::to_string)
        .collect();

    let mut slides = Vec::with_capacity(slide_entries.len());
    for name in slide_entries {
        let mut entry = archive
            .by_name(&name)
            .map_err(|e| Error::BundleInvalid(format!("unreadable entry {name}: {e}")))?;
        let mut json = String::new();
        entry
            .read_to_string(&mut json)
            .map_err(|e| Error::BundleInvalid(format!("unreadable entry {name}: {e}")))?;
        let stored: StoredAnnotation = serde_json::from_str(&json)
            .map_err(|e| Error::BundleInvalid(format!("corrupt slide entry {name}: {e}")))?;
        slides.push(stored.into_annotation());
    }
    slides.sort_unstable_by_key(|slide| slide.slide_index);

    tracing::info!(
        document = %manifest.document.display_name,
        slides = slides.len(),
        path = %archive_path.display(),
        "bundle imported"
    );
    Ok(BundleContents { manifest, slides })
}
