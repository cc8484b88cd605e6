//! JSON-file backed capture and history stores.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use spinrelay_core::history::push_capped;
use spinrelay_core::{
    CaptureStore, CapturedRequest, GameMode, HistoryError, HistoryRecord, HistoryStore,
    RequestClass,
};
use thiserror::Error;

type CaptureMap = BTreeMap<RequestClass, CapturedRequest>;

#[derive(Debug, Error)]
pub enum CaptureStoreError {
    #[error("capture file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("capture file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Captures kept in one JSON object keyed by request class.
///
/// The file is re-read on every lookup so an external capture tool can
/// overwrite it while a session runs.
#[derive(Debug, Clone)]
pub struct FileCaptureStore {
    path: PathBuf,
}

impl FileCaptureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every capture currently on disk. A missing file is an empty store.
    pub fn load(&self) -> Result<CaptureMap, CaptureStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(CaptureMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(CaptureMap::new()),
            Err(source) => Err(CaptureStoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, captures: &CaptureMap) -> Result<(), CaptureStoreError> {
        let text = serde_json::to_string_pretty(captures)?;
        write_file(&self.path, &text).map_err(|source| CaptureStoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Last-write-wins replacement of one class.
    pub fn publish(
        &self,
        class: RequestClass,
        request: CapturedRequest,
    ) -> Result<(), CaptureStoreError> {
        let mut captures = self.load()?;
        captures.insert(class, request);
        self.save(&captures)
    }

    /// Returns whether a capture was present.
    pub fn clear(&self, class: RequestClass) -> Result<bool, CaptureStoreError> {
        let mut captures = self.load()?;
        let removed = captures.remove(&class).is_some();
        if removed {
            self.save(&captures)?;
        }
        Ok(removed)
    }
}

impl CaptureStore for FileCaptureStore {
    fn current(&self, class: RequestClass) -> Option<CapturedRequest> {
        match self.load() {
            Ok(mut captures) => captures.remove(&class),
            Err(err) => {
                log::warn!("ignoring unreadable capture store: {err}");
                None
            }
        }
    }
}

/// History records for every mode in one JSON array, newest first.
#[derive(Debug)]
pub struct FileHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(storage(&self.path, &err)),
        }
    }

    fn write_all(&self, records: &[HistoryRecord]) -> Result<(), HistoryError> {
        let text = serde_json::to_string_pretty(records)?;
        write_file(&self.path, &text).map_err(|err| storage(&self.path, &err))
    }

    fn with_records<T>(
        &self,
        f: impl FnOnce(&mut Vec<HistoryRecord>) -> (T, bool),
    ) -> Result<T, HistoryError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| HistoryError::Storage("history lock poisoned".into()))?;
        let mut records = self.read_all()?;
        let (value, dirty) = f(&mut records);
        if dirty {
            self.write_all(&records)?;
        }
        Ok(value)
    }
}

impl HistoryStore for FileHistoryStore {
    fn append(&self, record: HistoryRecord) -> Result<(), HistoryError> {
        self.with_records(|records| {
            push_capped(records, record);
            ((), true)
        })
    }

    fn list(&self, mode: GameMode) -> Result<Vec<HistoryRecord>, HistoryError> {
        self.with_records(|records| {
            let listed = records.iter().filter(|r| r.mode == mode).cloned().collect();
            (listed, false)
        })
    }

    fn clear(&self, mode: GameMode) -> Result<(), HistoryError> {
        self.with_records(|records| {
            let before = records.len();
            records.retain(|r| r.mode != mode);
            ((), records.len() != before)
        })
    }
}

fn storage(path: &Path, err: &io::Error) -> HistoryError {
    HistoryError::Storage(format!("{}: {err}", path.display()))
}

fn write_file(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}
