//! Persistence backends mirroring the store's index.
//!
//! A [`SessionBackend`] is the narrow seam between the in-memory index and
//! durable storage. [`FileSessionBackend`] keeps one pretty-printed JSON file
//! per session; [`MemorySessionBackend`] is an in-process fake for tests.

use crate::session::Session;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tenure_core::{TenureError, TenureResult};
use tracing::{debug, warn};

const SESSION_EXT: &str = "json";
const TEMP_EXT: &str = "json.tmp";
const WRITE_CHECK_FILE: &str = ".tenure-write-check";

/// Everything a backend could recover at startup.
#[derive(Debug, Default)]
pub struct LoadedSessions {
    /// Well-formed sessions, expired or not.
    pub sessions: Vec<Session>,
    /// Corrupt entries that were discarded (and deleted) while loading.
    pub malformed: usize,
}

/// Write-through mirror of the session index.
///
/// Implementations are called while the store holds its lock, so they never
/// see two operations at once from the same store.
pub trait SessionBackend: Send + Sync {
    /// Writes (or overwrites) the persisted copy of `session`.
    fn save(&self, session: &Session) -> TenureResult<()>;

    /// Removes the persisted copy of `id`. A missing entry is not an error.
    fn delete(&self, id: &str) -> TenureResult<()>;

    /// Reads every well-formed session, discarding corrupt entries.
    fn load_all(&self) -> TenureResult<LoadedSessions>;

    /// Directory backing this store, if any.
    fn location(&self) -> Option<&Path> {
        None
    }
}

// ---------------------------------------------------------------------------
// FileSessionBackend
// ---------------------------------------------------------------------------

/// File-based backend: `<dir>/<id>.json`, written via a temp file and rename.
#[derive(Debug)]
pub struct FileSessionBackend {
    dir: PathBuf,
}

impl FileSessionBackend {
    /// Opens (creating if needed) the storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> TenureResult<Self> {
        let dir = dir.into();
        if dir.exists() && !dir.is_dir() {
            return Err(TenureError::config(format!(
                "storage path '{}' exists and is not a directory",
                dir.display()
            )));
        }
        fs::create_dir_all(&dir).map_err(|e| {
            TenureError::config(format!(
                "storage path '{}' cannot be created: {e}",
                dir.display()
            ))
        })?;
        Self::check_writable(&dir)?;
        Ok(Self { dir })
    }

    /// Writes and removes a marker file so a read-only directory is rejected
    /// at construction instead of on the first save.
    fn check_writable(dir: &Path) -> TenureResult<()> {
        let marker = dir.join(WRITE_CHECK_FILE);
        fs::write(&marker, b"")
            .and_then(|()| fs::remove_file(&marker))
            .map_err(|e| {
                TenureError::config(format!(
                    "storage path '{}' is not writable: {e}",
                    dir.display()
                ))
            })
    }

    /// Path of the file mirroring session `id`.
    pub fn session_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{SESSION_EXT}"))
    }

    fn temp_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{TEMP_EXT}"))
    }

    /// Parses one session file. `None` means the file is corrupt.
    fn read_session(path: &Path, stem: &str) -> TenureResult<Option<Session>> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(path = %path.display(), "Session file is not valid UTF-8");
                return Ok(None);
            }
            Err(e) => return Err(TenureError::persistence("reading session file", path, e)),
        };
        match serde_json::from_str::<Session>(&data) {
            Ok(session) if session.id == stem => Ok(Some(session)),
            Ok(session) => {
                warn!(
                    path = %path.display(),
                    embedded_id = %session.id,
                    "Session file name does not match its id"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed session file");
                Ok(None)
            }
        }
    }

    fn remove_file(path: &Path, operation: &'static str) -> TenureResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TenureError::persistence(operation, path, e)),
        }
    }
}

impl SessionBackend for FileSessionBackend {
    fn save(&self, session: &Session) -> TenureResult<()> {
        let path = self.session_path(&session.id);
        let temp_path = self.temp_path(&session.id);

        let written = File::create(&temp_path)
            .map_err(|e| TenureError::persistence("creating temp session file", &temp_path, e))
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, session)?;
                writer
                    .flush()
                    .map_err(|e| TenureError::persistence("writing session file", &temp_path, e))
            })
            .and_then(|()| {
                fs::rename(&temp_path, &path)
                    .map_err(|e| TenureError::persistence("replacing session file", &path, e))
            });

        if written.is_err() && temp_path.exists() {
            if let Err(cleanup_err) = fs::remove_file(&temp_path) {
                warn!(
                    temp_file = %temp_path.display(),
                    error = %cleanup_err,
                    "Failed to clean up temp session file"
                );
            }
        }
        written?;

        debug!(session_id = %session.id, path = %path.display(), "Session persisted");
        Ok(())
    }

    fn delete(&self, id: &str) -> TenureResult<()> {
        Self::remove_file(&self.session_path(id), "deleting session file")?;
        debug!(session_id = %id, "Session file removed");
        Ok(())
    }

    fn load_all(&self) -> TenureResult<LoadedSessions> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| TenureError::persistence("scanning storage directory", &self.dir, e))?;

        let mut loaded = LoadedSessions::default();
        for entry in entries {
            let entry = entry
                .map_err(|e| TenureError::persistence("scanning storage directory", &self.dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.ends_with(&format!(".{TEMP_EXT}")) {
                // Leftover from a write interrupted before its rename.
                Self::remove_file(&path, "removing stale temp file")?;
                continue;
            }
            let Some(stem) = name.strip_suffix(&format!(".{SESSION_EXT}")) else {
                continue;
            };

            match Self::read_session(&path, stem)? {
                Some(session) => loaded.sessions.push(session),
                None => {
                    Self::remove_file(&path, "deleting malformed session file")?;
                    loaded.malformed += 1;
                }
            }
        }
        Ok(loaded)
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

// ---------------------------------------------------------------------------
// MemorySessionBackend
// ---------------------------------------------------------------------------

/// In-memory stand-in for [`FileSessionBackend`].
///
/// Clones share the same storage, so a test can keep one handle for
/// inspection while the store owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionBackend {
    sessions: std::sync::Arc<Mutex<HashMap<String, Session>>>,
}

impl MemorySessionBackend {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the backend, as if a previous process had saved `sessions`.
    pub fn with_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let backend = Self::new();
        backend
            .sessions
            .lock()
            .extend(sessions.into_iter().map(|s| (s.id.clone(), s)));
        backend
    }

    /// Number of persisted sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// `true` when nothing is persisted.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// `true` if session `id` is persisted.
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// The persisted copy of session `id`.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.lock().get(id).cloned()
    }
}

impl SessionBackend for MemorySessionBackend {
    fn save(&self, session: &Session) -> TenureResult<()> {
        self.sessions
            .lock()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> TenureResult<()> {
        self.sessions.lock().remove(id);
        Ok(())
    }

    fn load_all(&self) -> TenureResult<LoadedSessions> {
        Ok(LoadedSessions {
            sessions: self.sessions.lock().values().cloned().collect(),
            malformed: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Payload;
    use tempfile::TempDir;

    fn sample(owner: &str) -> Session {
        let mut payload = Payload::new();
        payload.insert("k".into(), serde_json::json!("v"));
        Session::new(owner, payload, 60).unwrap()
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let backend = FileSessionBackend::open(tmp.path()).unwrap();
        let session = sample("u1");

        backend.save(&session).unwrap();
        assert!(backend.session_path(&session.id).is_file());

        let loaded = backend.load_all().unwrap();
        assert_eq!(loaded.malformed, 0);
        assert_eq!(loaded.sessions, vec![session]);
    }

    #[test]
    fn saved_file_is_pretty_json() {
        let tmp = TempDir::new().unwrap();
        let backend = FileSessionBackend::open(tmp.path()).unwrap();
        let session = sample("u1");
        backend.save(&session).unwrap();

        let text = fs::read_to_string(backend.session_path(&session.id)).unwrap();
        assert!(text.contains('\n'));
        assert!(text.contains("\"owner_id\": \"u1\""));
        assert!(!backend.temp_path(&session.id).exists());
    }

    #[test]
    fn delete_missing_file_is_ok() {
        let tmp = TempDir::new().unwrap();
        let backend = FileSessionBackend::open(tmp.path()).unwrap();
        backend.delete("nope").unwrap();
    }

    #[test]
    fn load_discards_and_deletes_corrupt_files() {
        let tmp = TempDir::new().unwrap();
        let backend = FileSessionBackend::open(tmp.path()).unwrap();
        let good = sample("u1");
        backend.save(&good).unwrap();

        let garbage = tmp.path().join("garbage.json");
        fs::write(&garbage, "{ not json").unwrap();

        // Well-formed but stored under someone else's name.
        let renamed = tmp.path().join("other-id.json");
        fs::write(&renamed, serde_json::to_string(&sample("u2")).unwrap()).unwrap();

        let stale_tmp = tmp.path().join("half-written.json.tmp");
        fs::write(&stale_tmp, "{").unwrap();

        let binary = tmp.path().join("binary.json");
        fs::write(&binary, [0xff, 0xfe, 0x00]).unwrap();

        let unrelated = tmp.path().join("README.txt");
        fs::write(&unrelated, "keep me").unwrap();

        let loaded = backend.load_all().unwrap();
        assert_eq!(loaded.sessions.len(), 1);
        assert_eq!(loaded.sessions[0].id, good.id);
        assert_eq!(loaded.malformed, 3);
        assert!(!garbage.exists());
        assert!(!binary.exists());
        assert!(!renamed.exists());
        assert!(!stale_tmp.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn open_rejects_regular_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();

        let err = FileSessionBackend::open(&file).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn open_leaves_no_marker_behind() {
        let tmp = TempDir::new().unwrap();
        FileSessionBackend::open(tmp.path()).unwrap();
        assert!(!tmp.path().join(WRITE_CHECK_FILE).exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn open_rejects_read_only_directory() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("locked");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users ignore directory permissions; nothing to assert then.
        let writable = fs::write(dir.join("x"), b"").is_ok();
        let result = FileSessionBackend::open(&dir);
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
        if writable {
            return;
        }

        assert!(result.unwrap_err().is_configuration());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn open_rejects_kernel_filesystem() {
        let dir = Path::new("/sys/kernel");
        if !dir.is_dir() {
            return;
        }
        let err = FileSessionBackend::open(dir).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("not writable"));
    }

    #[test]
    fn open_creates_nested_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a").join("b");
        let backend = FileSessionBackend::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(backend.location(), Some(dir.as_path()));
    }

    #[test]
    fn memory_backend_clones_share_state() {
        let backend = MemorySessionBackend::new();
        let handle = backend.clone();
        let session = sample("u1");

        backend.save(&session).unwrap();
        assert!(handle.contains(&session.id));
        assert_eq!(handle.get(&session.id), Some(session.clone()));

        backend.delete(&session.id).unwrap();
        assert!(handle.is_empty());
        assert!(backend.location().is_none());
    }
}
