//! Durable endpoint → report bindings
//!
//! Each monitored endpoint owns at most one published report. The mapping is
//! kept in a flat text file, one `<identity>:<report_id>` per line, and is
//! reloaded at the start of every cycle so that out-of-band edits are picked
//! up.
//!
//! # Example
//!
//! ```no_run
//! use serverwatch::models::ReportId;
//! use serverwatch::storage::BindingStore;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), serverwatch::utils::error::StoreError> {
//! let mut store = BindingStore::load(Path::new("embeds.txt"))?;
//! if store.get("Alpha").is_none() {
//!     store.upsert("Alpha", ReportId(1234567890));
//!     store.persist()?;
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::ReportId;
use crate::utils::error::StoreError;

/// Problem found in a bindings file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Line could not be parsed and was skipped
    Malformed { line: usize, content: String },
    /// Identity appeared again; the later line replaced the earlier one
    Duplicate {
        line: usize,
        identity: String,
        previous: ReportId,
        current: ReportId,
    },
}

/// In-memory view of the bindings file
#[derive(Debug, Clone)]
pub struct BindingStore {
    path: PathBuf,
    bindings: BTreeMap<String, ReportId>,
    warnings: Vec<LoadWarning>,
}

impl BindingStore {
    /// Create an empty store that persists to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bindings: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Load bindings from `path`; a missing file yields an empty store
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No bindings file yet");
            return Ok(Self::empty(path));
        }

        let content = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let store = Self::parse(path, &content);

        for warning in &store.warnings {
            match warning {
                LoadWarning::Malformed { line, content } => tracing::warn!(
                    path = %path.display(),
                    line = line,
                    content = %content,
                    "Skipping malformed binding line"
                ),
                LoadWarning::Duplicate {
                    line,
                    identity,
                    previous,
                    current,
                } => tracing::warn!(
                    path = %path.display(),
                    line = line,
                    identity = %identity,
                    previous = %previous,
                    current = %current,
                    "Duplicate binding identity, later line wins"
                ),
            }
        }

        tracing::debug!(path = %path.display(), count = store.len(), "Bindings loaded");
        Ok(store)
    }

    /// Parse bindings file content
    ///
    /// The report id is the text after the last `:`, so identities may contain
    /// colons themselves.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
        let mut store = Self::empty(path);

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let parsed = line.rsplit_once(':').and_then(|(identity, id)| {
                let identity = identity.trim();
                if identity.is_empty() {
                    return None;
                }
                id.parse::<ReportId>().ok().map(|id| (identity, id))
            });

            let Some((identity, id)) = parsed else {
                store.warnings.push(LoadWarning::Malformed {
                    line: line_no,
                    content: line.to_string(),
                });
                continue;
            };

            if let Some(previous) = store.bindings.insert(identity.to_string(), id) {
                store.warnings.push(LoadWarning::Duplicate {
                    line: line_no,
                    identity: identity.to_string(),
                    previous,
                    current: id,
                });
            }
        }

        store
    }

    /// Report id bound to `identity`
    pub fn get(&self, identity: &str) -> Option<ReportId> {
        self.bindings.get(identity).copied()
    }

    /// Bind `identity` to `id`, returning the id it replaced
    pub fn upsert(&mut self, identity: impl Into<String>, id: ReportId) -> Option<ReportId> {
        self.bindings.insert(identity.into(), id)
    }

    /// Drop the binding of `identity`
    pub fn remove(&mut self, identity: &str) -> Option<ReportId> {
        self.bindings.remove(identity)
    }

    /// Write all bindings to the store's path
    ///
    /// Writes a temp file first, then renames it over the target.
    pub fn persist(&self) -> Result<(), StoreError> {
        let write_err = |source: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let file = File::create(&temp_path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(self.render().as_bytes())
            .map_err(write_err)?;
        writer
            .into_inner()
            .map_err(|e| write_err(e.into_error()))?
            .sync_all()
            .map_err(write_err)?;

        // Atomic rename
        fs::rename(&temp_path, &self.path).map_err(write_err)?;

        tracing::debug!(path = %self.path.display(), count = self.len(), "Bindings saved");
        Ok(())
    }

    /// File content for the current bindings
    pub fn render(&self) -> String {
        self.bindings
            .iter()
            .map(|(identity, id)| format!("{identity}:{id}\n"))
            .collect()
    }

    /// Problems found while loading
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ReportId)> {
        self.bindings.iter().map(|(identity, id)| (identity.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
