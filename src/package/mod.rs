//! Packaging of the finished project into a single archive.
//!
//! The archive is a gzip-compressed tarball of the project directory with
//! version-control, cache and orchestrator-internal entries left out.

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Entry names never included in an archive, at any depth.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".gitignore",
    "__pycache__",
    ".DS_Store",
    "target",
    ".foundry",
];

/// Produces one archive artifact from a source directory.
pub trait Packager: Send + Sync {
    fn package(&self, source_dir: &Path) -> Result<PathBuf>;
}

pub struct TarGzPackager {
    output_path: PathBuf,
    excludes: Vec<String>,
}

impl TarGzPackager {
    pub fn new(output_path: PathBuf) -> Self {
        Self {
            output_path,
            excludes: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Exclude additional entry names on top of the defaults.
    pub fn with_excludes(mut self, extra: impl IntoIterator<Item = String>) -> Self {
        self.excludes.extend(extra);
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.excludes.iter().any(|e| e == name)
    }
}

impl Packager for TarGzPackager {
    fn package(&self, source_dir: &Path) -> Result<PathBuf> {
        if !source_dir.exists() {
            bail!("Source directory does not exist: {}", source_dir.display());
        }
        if !source_dir.is_dir() {
            bail!("Source path is not a directory: {}", source_dir.display());
        }

        let output_dir = self
            .output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        if !output_dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&output_dir).with_context(|| {
                format!("Failed to create output directory: {}", output_dir.display())
            })?;
        }

        // Compare canonical paths so the archive never swallows its own directory.
        let skip_dir = output_dir.canonicalize().ok();
        let source_root = source_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", source_dir.display()))?;

        let file = File::create(&self.output_path).with_context(|| {
            format!("Failed to create archive: {}", self.output_path.display())
        })?;
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        let walker = WalkDir::new(&source_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let excluded_name = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| self.is_excluded(name));
                let is_output = skip_dir
                    .as_deref()
                    .is_some_and(|dir| entry.path() == dir);
                !excluded_name && !is_output
            });

        let mut files = 0usize;
        for entry in walker {
            let entry = entry.context("Failed to walk source directory")?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&source_root)
                .context("Archive entry outside the source directory")?;
            builder
                .append_path_with_name(entry.path(), relative)
                .with_context(|| format!("Failed to add {} to archive", relative.display()))?;
            files += 1;
        }

        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .context("Failed to finish archive")?;

        tracing::info!(
            archive = %self.output_path.display(),
            files,
            "Project packaged"
        );
        Ok(self.output_path.clone())
    }
}
