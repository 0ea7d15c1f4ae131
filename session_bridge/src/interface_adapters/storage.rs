use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{Session, SessionStorage};

// In-memory session storage; nothing survives the process.
#[derive(Clone, Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn load(&self, key: &str) -> Result<Option<Session>, String> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(key).cloned())
    }

    async fn save(&self, key: &str, session: &Session) -> Result<(), String> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(key.to_string(), session.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, String> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions.remove(key).is_some())
    }
}

// One JSON file per storage key under `dir`.
#[derive(Clone)]
pub struct FileSessionStorage {
    dir: PathBuf,
}

impl FileSessionStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn load(&self, key: &str) -> Result<Option<Session>, String> {
        let bytes = match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(format!("read session file: {err}")),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| format!("decode session file: {err}"))
    }

    async fn save(&self, key: &str, session: &Session) -> Result<(), String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| format!("create session dir: {err}"))?;
        let bytes =
            serde_json::to_vec(session).map_err(|err| format!("encode session: {err}"))?;

        // Write then rename so a crash never leaves a torn file behind.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|err| format!("write session file: {err}"))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|err| format!("replace session file: {err}"))
    }

    async fn remove(&self, key: &str) -> Result<bool, String> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(format!("remove session file: {err}")),
        }
    }
}
