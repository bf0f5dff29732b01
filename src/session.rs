use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::models::Session;

/// The single "current session" slot. Subscribers see every change; the value
/// is mirrored to a JSON file so a restart picks it back up.
pub struct SessionStore {
    path: Option<PathBuf>,
    tx: watch::Sender<Option<Session>>,
}

impl SessionStore {
    /// Rehydrates from `path`. A missing or unreadable file means no session.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = read_session(&path).await;
        if let Some(session) = &initial {
            info!(user_id = session.user_id(), "Session restored");
        }
        let (tx, _rx) = watch::channel(initial);
        Self {
            path: Some(path),
            tx,
        }
    }

    /// Slot without a backing file.
    pub fn in_memory(initial: Option<Session>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { path: None, tx }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    /// Persists first, then publishes.
    pub async fn replace(&self, session: Session) -> Result<()> {
        if let Some(path) = &self.path {
            write_session(path, &session).await?;
        }
        info!(user_id = session.user_id(), "Session replaced");
        self.tx.send_replace(Some(session));
        Ok(())
    }

    /// Publishes `None` even when the file could not be removed.
    pub async fn clear(&self) -> Result<()> {
        let removed = match &self.path {
            Some(path) => match fs::remove_file(path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
            },
            None => Ok(()),
        };
        self.tx.send_replace(None);
        info!("Session cleared");
        removed
    }
}

async fn read_session(path: &Path) -> Option<Session> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read session file");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt session file");
            None
        }
    }
}

async fn write_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(session).context("serializing session")?;
    fs::write(path, body)
        .await
        .with_context(|| format!("writing {}", path.display()))
}
