//! Session storage backends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::model::{ApplicationSession, FieldOutcome, SessionStatus};
use crate::error::SessionError;
use crate::extract::PageSnapshot;

/// Durable per-job session records.
///
/// Backends implement the four primitives; the mutation helpers are
/// read-modify-write on top of them. One writer per job id is assumed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, job_id: &str) -> Result<Option<ApplicationSession>, SessionError>;

    /// Insert or replace.
    async fn put(&self, session: &ApplicationSession) -> Result<(), SessionError>;

    /// Returns whether a record existed.
    async fn delete(&self, job_id: &str) -> Result<bool, SessionError>;

    async fn list(&self) -> Result<Vec<ApplicationSession>, SessionError>;

    async fn create(
        &self,
        job_id: &str,
        profile_id: &str,
        url: &str,
    ) -> Result<ApplicationSession, SessionError> {
        let session = ApplicationSession::new(job_id, profile_id, url);
        self.put(&session).await?;
        info!(job_id, "Session created");
        Ok(session)
    }

    /// Store `session` with a fresh `updated_at`.
    async fn update(&self, session: &ApplicationSession) -> Result<(), SessionError> {
        let mut session = session.clone();
        session.touch();
        self.put(&session).await
    }

    async fn require(&self, job_id: &str) -> Result<ApplicationSession, SessionError> {
        self.get(job_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(job_id.to_string()))
    }

    /// Append a snapshot; returns its page number.
    async fn add_snapshot(&self, job_id: &str, snapshot: PageSnapshot) -> Result<usize, SessionError> {
        let mut session = self.require(job_id).await?;
        session.add_snapshot(snapshot);
        self.put(&session).await?;
        Ok(session.current_page)
    }

    async fn add_outcomes(&self, job_id: &str, outcomes: Vec<FieldOutcome>) -> Result<(), SessionError> {
        let mut session = self.require(job_id).await?;
        session.add_outcomes(outcomes);
        self.put(&session).await
    }

    async fn set_status(
        &self,
        job_id: &str,
        status: SessionStatus,
        message: Option<String>,
    ) -> Result<(), SessionError> {
        let mut session = self.require(job_id).await?;
        debug!(job_id, from = %session.status, to = %status, "Session status");
        session.set_status(status, message);
        self.put(&session).await
    }

    async fn set_metadata(&self, job_id: &str, key: &str, value: Value) -> Result<(), SessionError> {
        let mut session = self.require(job_id).await?;
        session.metadata.insert(key.to_string(), value);
        session.touch();
        self.put(&session).await
    }

    async fn get_metadata(&self, job_id: &str, key: &str) -> Result<Option<Value>, SessionError> {
        Ok(self
            .get(job_id)
            .await?
            .and_then(|s| s.metadata.get(key).cloned()))
    }

    async fn set_platform(&self, job_id: &str, platform: &str) -> Result<(), SessionError> {
        let mut session = self.require(job_id).await?;
        session.platform = platform.to_string();
        session.touch();
        self.put(&session).await
    }

    async fn record_navigation(&self, job_id: &str, url: &str) -> Result<(), SessionError> {
        let mut session = self.require(job_id).await?;
        session.record_navigation(url);
        self.put(&session).await
    }

    /// Sessions still running or waiting on a human.
    async fn list_active(&self) -> Result<Vec<ApplicationSession>, SessionError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|s| s.status.is_open())
            .collect())
    }

    /// Delete sessions not updated within `max_age`. Returns how many went.
    async fn cleanup_older_than(&self, max_age: Duration) -> Result<usize, SessionError> {
        let cutoff = Utc::now() - max_age;
        let mut removed = 0;
        for session in self.list().await? {
            if session.updated_at < cutoff && self.delete(&session.job_id).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "Cleaned up stale sessions");
        }
        Ok(removed)
    }
}

/// In-memory store for tests and one-shot runs.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, ApplicationSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, job_id: &str) -> Result<Option<ApplicationSession>, SessionError> {
        Ok(self.sessions.read().await.get(job_id).cloned())
    }

    async fn put(&self, session: &ApplicationSession) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .insert(session.job_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> Result<bool, SessionError> {
        Ok(self.sessions.write().await.remove(job_id).is_some())
    }

    async fn list(&self) -> Result<Vec<ApplicationSession>, SessionError> {
        let mut sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}

/// One pretty-printed JSON file per job under a directory.
///
/// Writes go through `{id}.json.tmp` and a rename so a crash never leaves
/// a half-written record. Reads are served from a cache once loaded.
pub struct FileSessionStore {
    dir: PathBuf,
    cache: DashMap<String, ApplicationSession>,
}

impl FileSessionStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!("FileSessionStore initialized at {:?}", dir);
        Ok(Self {
            dir,
            cache: DashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Job ids become file names: keep alphanumerics, `-` and `_`.
    fn sanitize_job_id(job_id: &str) -> String {
        job_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }

    fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::sanitize_job_id(job_id)))
    }

    async fn read_file(path: &Path) -> Result<Option<ApplicationSession>, SessionError> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, job_id: &str) -> Result<Option<ApplicationSession>, SessionError> {
        if let Some(cached) = self.cache.get(job_id) {
            return Ok(Some(cached.clone()));
        }
        let loaded = Self::read_file(&self.path_for(job_id)).await?;
        if let Some(session) = &loaded {
            self.cache.insert(job_id.to_string(), session.clone());
        }
        Ok(loaded)
    }

    async fn put(&self, session: &ApplicationSession) -> Result<(), SessionError> {
        let path = self.path_for(&session.job_id);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(session)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        self.cache.insert(session.job_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> Result<bool, SessionError> {
        let cached = self.cache.remove(job_id).is_some();
        match fs::remove_file(self.path_for(job_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(cached),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<ApplicationSession>, SessionError> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_file(&path).await {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable session file {:?}: {}", path, e),
            }
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}
