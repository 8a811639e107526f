//! Durable, resumable persistence of training state
//!
//! Layout under the checkpoint root, mirrored file-for-file under the optional
//! backup root:
//! - `checkpoint_{i}.examples.json`: the history window, tagged with the
//!   iteration whose model generated the newest examples
//! - `partial/iter_{i}_eps_{k}.json`: self-play progress of iteration `i`
//!   after `k` episodes
//! - `checkpoint_{i}.model.json` and `best.model.json`: model snapshots
//!
//! Every write goes to a temporary file in the target directory and is
//! renamed into place. Records carry their own keys; file names only help
//! humans and the cleanup of unreadable leftovers.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{Episode, HistoryWindow};
use crate::{CheckpointError, TrainableModel};

#[cfg(feature = "profiling")]
use crate::profiling::{Timer, PROF};
#[cfg(feature = "profiling")]
use std::sync::atomic::Ordering;

/// Version written into every history checkpoint.
pub const HISTORY_FORMAT_VERSION: u32 = 1;

/// File name of the "best" model alias.
pub const BEST_MODEL_FILE: &str = "best.model.json";

/// Subdirectory holding partial-progress records.
pub const PARTIAL_DIR: &str = "partial";

/// What to do when the history file to resume from does not exist in either
/// the checkpoint or the backup location.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingHistoryPolicy {
    /// Fail the load.
    #[default]
    Abort,
    /// Start from an empty history.
    ContinueEmpty,
    /// Ask the caller-supplied confirmation callback.
    Prompt,
}

/// Where and how often to persist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub dir: PathBuf,

    /// Secondary root that receives a copy of every file written to `dir`.
    pub backup_dir: Option<PathBuf>,

    /// Completed episodes between partial-progress saves.
    pub save_frequency: usize,

    pub missing_history: MissingHistoryPolicy,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./checkpoints"),
            backup_dir: None,
            save_frequency: 10,
            missing_history: MissingHistoryPolicy::Abort,
        }
    }
}

/// Key embedded in every partial-progress record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartialKey {
    pub iteration: usize,
    pub completed_episodes: usize,
}

/// Self-play progress of one iteration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub iteration: usize,
    pub completed_episodes: usize,
    pub episodes: Vec<Episode>,
}

impl PartialRecord {
    pub fn key(&self) -> PartialKey {
        PartialKey {
            iteration: self.iteration,
            completed_episodes: self.completed_episodes,
        }
    }
}

#[derive(Serialize)]
struct PartialRecordRef<'a> {
    iteration: usize,
    completed_episodes: usize,
    episodes: &'a [Episode],
}

#[derive(Deserialize)]
struct HistoryFile {
    format_version: u32,
    iteration: usize,
    window: HistoryWindow,
}

#[derive(Serialize)]
struct HistoryFileRef<'a> {
    format_version: u32,
    iteration: usize,
    window: &'a HistoryWindow,
}

pub fn history_file_name(tag: usize) -> String {
    format!("checkpoint_{tag}.examples.json")
}

pub fn model_file_name(iteration: usize) -> String {
    format!("checkpoint_{iteration}.model.json")
}

fn partial_rel_path(key: PartialKey) -> PathBuf {
    Path::new(PARTIAL_DIR).join(format!(
        "iter_{}_eps_{}.json",
        key.iteration, key.completed_episodes
    ))
}

/// Owns the on-disk layout. Never mutates training buffers: it only
/// serializes borrowed views and hands back deserialized copies.
#[derive(Clone, Debug)]
pub struct CheckpointManager {
    root: PathBuf,
    backup: Option<PathBuf>,
}

impl CheckpointManager {
    pub fn new(root: impl Into<PathBuf>, backup: Option<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backup,
        }
    }

    pub fn from_config(config: &CheckpointConfig) -> Self {
        Self::new(config.dir.clone(), config.backup_dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backup(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    pub fn history_path(&self, tag: usize) -> PathBuf {
        self.root.join(history_file_name(tag))
    }

    pub fn model_path(&self, iteration: usize) -> PathBuf {
        self.root.join(model_file_name(iteration))
    }

    pub fn best_path(&self) -> PathBuf {
        self.root.join(BEST_MODEL_FILE)
    }

    // ===== History =====

    /// Persist the whole window under `tag`. Fails if the primary write fails.
    pub fn save_history(
        &self,
        window: &HistoryWindow,
        tag: usize,
    ) -> Result<PathBuf, CheckpointError> {
        let file = HistoryFileRef {
            format_version: HISTORY_FORMAT_VERSION,
            iteration: tag,
            window,
        };
        let path = self.write_json(Path::new(&history_file_name(tag)), &file)?;

        #[cfg(feature = "profiling")]
        PROF.history_saves.fetch_add(1, Ordering::Relaxed);

        info!(
            "Saved training history ({} iterations, {} examples) to {}",
            window.len(),
            window.num_examples(),
            path.display()
        );
        Ok(path)
    }

    /// Load the window tagged `tag` from this manager's root.
    pub fn load_history(&self, tag: usize) -> Result<Option<HistoryWindow>, CheckpointError> {
        self.load_history_from(&self.root, tag)
    }

    /// Load the window tagged `tag` from `folder`, falling back to the backup
    /// copy when the primary one is missing or unreadable.
    ///
    /// `Ok(None)` means neither location has the file.
    pub fn load_history_from(
        &self,
        folder: &Path,
        tag: usize,
    ) -> Result<Option<HistoryWindow>, CheckpointError> {
        let name = history_file_name(tag);
        let primary = folder.join(&name);
        let backup = self.backup_for(folder).map(|b| b.join(&name));

        let primary_err = if primary.is_file() {
            match read_history(&primary, tag) {
                Ok(window) => {
                    info!("Loaded training history from {}", primary.display());
                    return Ok(Some(window));
                }
                Err(e) => {
                    warn!("Could not read {}: {e}", primary.display());
                    Some(e)
                }
            }
        } else {
            warn!("File {} with training history not found", primary.display());
            None
        };

        if let Some(backup) = backup.filter(|b| b.is_file()) {
            match read_history(&backup, tag) {
                Ok(window) => {
                    info!("Recovered training history from backup {}", backup.display());
                    return Ok(Some(window));
                }
                Err(e) => warn!("Backup copy {} is unusable: {e}", backup.display()),
            }
        }

        match primary_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    // ===== Partial progress =====

    /// Record that `episodes` are the completed self-play games of `iteration`.
    pub fn save_partial(
        &self,
        iteration: usize,
        episodes: &[Episode],
    ) -> Result<PathBuf, CheckpointError> {
        let key = PartialKey {
            iteration,
            completed_episodes: episodes.len(),
        };
        let record = PartialRecordRef {
            iteration,
            completed_episodes: episodes.len(),
            episodes,
        };
        let rel = partial_rel_path(key);
        let path = self.write_json(&rel, &record)?;

        // The new record supersedes the older ones of this iteration
        if let Err(e) = remove_partials(&self.root, iteration, Some(&path)) {
            warn!("Could not prune older partial records: {e}");
        }
        if let Some(backup) = &self.backup {
            if let Err(e) = remove_partials(backup, iteration, Some(&backup.join(&rel))) {
                warn!("Could not prune older backup partial records: {e}");
            }
        }

        #[cfg(feature = "profiling")]
        PROF.partial_saves.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Saved partial progress of iteration {iteration}: {} episodes",
            episodes.len()
        );
        Ok(path)
    }

    /// Best resumable progress for `iteration`: the well-formed record with the
    /// most episodes, at most `max_episodes`. Corrupt records are logged and
    /// skipped. The backup is scanned only if the primary root has none.
    pub fn latest_partial(&self, iteration: usize, max_episodes: usize) -> Option<PartialRecord> {
        if let Some(record) = best_partial(&self.root, iteration, max_episodes) {
            return Some(record);
        }
        let backup = self.backup.as_ref()?;
        let record = best_partial(backup, iteration, max_episodes)?;
        info!(
            "Recovered partial progress of iteration {iteration} from backup ({} episodes)",
            record.completed_episodes
        );
        Some(record)
    }

    /// Index of the partial records under the primary root.
    pub fn partial_index(&self) -> Vec<(PartialKey, PathBuf)> {
        index_partials(&self.root)
    }

    /// Delete every partial record of `iteration`, in both locations.
    /// Returns how many primary records were removed.
    pub fn clear_partials(&self, iteration: usize) -> Result<usize, CheckpointError> {
        let removed = remove_partials(&self.root, iteration, None)?;
        if let Some(backup) = &self.backup {
            if let Err(e) = remove_partials(backup, iteration, None) {
                warn!("Could not clean backup partial records: {e}");
            }
        }
        if removed > 0 {
            debug!("Removed {removed} partial records of iteration {iteration}");
        }
        Ok(removed)
    }

    /// Delete the partial records of every iteration up to and including
    /// `last`, in both locations. Returns how many primary records were removed.
    pub fn clear_partials_through(&self, last: usize) -> Result<usize, CheckpointError> {
        let mut stale: Vec<usize> = self
            .partial_index()
            .into_iter()
            .map(|(key, _)| key.iteration)
            .filter(|&iteration| iteration <= last)
            .collect();
        stale.dedup();

        let mut removed = 0;
        for iteration in stale {
            removed += self.clear_partials(iteration)?;
        }
        Ok(removed)
    }

    // ===== Models =====

    pub fn save_model<M: TrainableModel>(
        &self,
        model: &M,
        iteration: usize,
    ) -> Result<PathBuf, CheckpointError> {
        self.save_model_as(model, &model_file_name(iteration))
    }

    /// Point the "best" alias at `model`.
    pub fn save_best<M: TrainableModel>(&self, model: &M) -> Result<PathBuf, CheckpointError> {
        self.save_model_as(model, BEST_MODEL_FILE)
    }

    fn save_model_as<M: TrainableModel>(
        &self,
        model: &M,
        file_name: &str,
    ) -> Result<PathBuf, CheckpointError> {
        #[cfg(feature = "profiling")]
        let _t = Timer::new(&PROF.time_checkpoint_ns);

        let path = self.root.join(file_name);
        let write_err = |source| CheckpointError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(write_err)?;
        let tmp = NamedTempFile::new_in(&self.root).map_err(write_err)?;
        model.save(tmp.path()).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        self.mirror(Path::new(file_name));

        #[cfg(feature = "profiling")]
        PROF.model_saves.fetch_add(1, Ordering::Relaxed);

        info!("Saved model to {}", path.display());
        Ok(path)
    }

    /// Load `folder/file_name` into `model`, falling back to the backup copy.
    pub fn load_model<M: TrainableModel>(
        &self,
        model: &mut M,
        folder: &Path,
        file_name: &str,
    ) -> Result<PathBuf, CheckpointError> {
        let primary = folder.join(file_name);
        let primary_err = if primary.is_file() {
            match model.load(&primary) {
                Ok(()) => {
                    info!("Loaded model from {}", primary.display());
                    return Ok(primary);
                }
                Err(source) => {
                    warn!("Could not load model {}: {source}", primary.display());
                    Some(CheckpointError::Read {
                        path: primary.clone(),
                        source,
                    })
                }
            }
        } else {
            warn!("Model {} not found", primary.display());
            None
        };

        if let Some(backup) = self.backup_for(folder).map(|b| b.join(file_name)) {
            if backup.is_file() {
                match model.load(&backup) {
                    Ok(()) => {
                        info!("Recovered model from backup {}", backup.display());
                        return Ok(backup);
                    }
                    Err(e) => warn!("Backup model {} is unusable: {e}", backup.display()),
                }
            }
        }

        Err(primary_err.unwrap_or(CheckpointError::NotFound { path: primary }))
    }

    /// The backup only mirrors `root`, so other folders have none.
    fn backup_for(&self, folder: &Path) -> Option<&Path> {
        if folder == self.root {
            self.backup.as_deref()
        } else {
            None
        }
    }

    // ===== Writing =====

    fn write_json<T: Serialize>(&self, rel: &Path, value: &T) -> Result<PathBuf, CheckpointError> {
        #[cfg(feature = "profiling")]
        let _t = Timer::new(&PROF.time_checkpoint_ns);

        let path = self.root.join(rel);
        let bytes = serde_json::to_vec(value).map_err(|source| CheckpointError::Encode {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes).map_err(|source| CheckpointError::Write {
            path: path.clone(),
            source,
        })?;
        self.mirror(rel);
        Ok(path)
    }

    /// Copy a freshly written file into the backup root. Failures are logged only.
    fn mirror(&self, rel: &Path) {
        let Some(backup) = &self.backup else {
            return;
        };
        let src = self.root.join(rel);
        let dst = backup.join(rel);
        let copied = fs::read(&src).and_then(|bytes| write_atomic(&dst, &bytes));
        if let Err(e) = copied {
            warn!("Backup of {} to {} failed: {e}", src.display(), dst.display());
        }
    }
}

/// Read a history checkpoint, checking its format version and tag.
pub fn read_history(path: &Path, tag: usize) -> Result<HistoryWindow, CheckpointError> {
    let (iteration, window) = read_history_file(path)?;
    if iteration != tag {
        return Err(CheckpointError::KeyMismatch {
            path: path.to_path_buf(),
            expected: tag,
            found: iteration,
        });
    }
    Ok(window)
}

/// Read any history checkpoint, returning its tag and window.
pub fn read_history_file(path: &Path) -> Result<(usize, HistoryWindow), CheckpointError> {
    let bytes = fs::read(path).map_err(|source| CheckpointError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: HistoryFile =
        serde_json::from_slice(&bytes).map_err(|source| CheckpointError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    if file.format_version != HISTORY_FORMAT_VERSION {
        return Err(CheckpointError::Version {
            path: path.to_path_buf(),
            expected: HISTORY_FORMAT_VERSION,
            found: file.format_version,
        });
    }
    Ok((file.iteration, file.window))
}

/// Read a partial record and check that its key matches its contents.
pub fn read_partial(path: &Path) -> Result<PartialRecord, CheckpointError> {
    let bytes = fs::read(path).map_err(|source| CheckpointError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let record: PartialRecord =
        serde_json::from_slice(&bytes).map_err(|source| CheckpointError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    if record.episodes.len() != record.completed_episodes {
        return Err(CheckpointError::Inconsistent {
            path: path.to_path_buf(),
            claimed: record.completed_episodes,
            actual: record.episodes.len(),
        });
    }
    Ok(record)
}

/// Write `bytes` to a temporary file next to `path`, then rename it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn partial_files(root: &Path) -> Vec<PathBuf> {
    let dir = root.join(PARTIAL_DIR);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Could not list {}: {e}", dir.display());
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

fn read_key(path: &Path) -> Result<PartialKey, CheckpointError> {
    let bytes = fs::read(path).map_err(|source| CheckpointError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| CheckpointError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Rebuild the (key -> file) index of a partial directory from record contents.
fn index_partials(root: &Path) -> Vec<(PartialKey, PathBuf)> {
    let mut index = Vec::new();
    for path in partial_files(root) {
        match read_key(&path) {
            Ok(key) => index.push((key, path)),
            Err(e) => warn!("Discarding unreadable partial record: {e}"),
        }
    }
    index.sort();
    index
}

fn best_partial(root: &Path, iteration: usize, max_episodes: usize) -> Option<PartialRecord> {
    let mut candidates: Vec<(PartialKey, PathBuf)> = index_partials(root)
        .into_iter()
        .filter(|(key, _)| key.iteration == iteration && key.completed_episodes <= max_episodes)
        .collect();
    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    for (key, path) in candidates {
        match read_partial(&path) {
            Ok(record) if record.key() == key => return Some(record),
            Ok(record) => warn!(
                "Discarding partial record {}: key changed from {key:?} to {:?}",
                path.display(),
                record.key()
            ),
            Err(e) => warn!("Discarding partial record: {e}"),
        }
    }
    None
}

/// Delete the partial records of `iteration` under `root`, except `keep`.
fn remove_partials(
    root: &Path,
    iteration: usize,
    keep: Option<&Path>,
) -> Result<usize, CheckpointError> {
    let prefix = format!("iter_{iteration}_");
    let mut removed = 0;
    for path in partial_files(root) {
        if keep.is_some_and(|keep| keep == path.as_path()) {
            continue;
        }
        let belongs = match read_key(&path) {
            Ok(key) => key.iteration == iteration,
            // Unreadable leftovers can only be attributed by name
            Err(_) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix)),
        };
        if belongs {
            fs::remove_file(&path).map_err(|source| CheckpointError::Write {
                path: path.clone(),
                source,
            })?;
            removed += 1;
        }
    }
    Ok(removed)
}
