use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Persisted key-value data (`session.json` next to the config file).
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
struct SessionFile {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    theme: Theme,
}

/// Authenticated session shared with the HTTP boundaries.
///
/// Restored from disk on startup and cleared on logout; every mutation is
/// written back immediately.
#[derive(Debug)]
pub struct SessionContext {
    path: Option<PathBuf>,
    data: RwLock<SessionFile>,
}

impl SessionContext {
    /// Session that is never persisted.
    pub fn in_memory(token: Option<String>) -> Self {
        Self {
            path: None,
            data: RwLock::new(SessionFile {
                token,
                theme: Theme::default(),
            }),
        }
    }

    /// Load the stored session, starting empty when there is none.
    pub fn restore(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read session file: {:?}", path))?;
            match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Discarding unreadable session file {:?}: {}", path, e);
                    SessionFile::default()
                }
            }
        } else {
            SessionFile::default()
        };

        if data.token.is_some() {
            tracing::info!("Restored session from {:?}", path);
        }

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn theme(&self) -> Theme {
        self.read().theme
    }

    pub fn set_token(&self, token: String) -> Result<()> {
        self.update(|data| data.token = Some(token))
    }

    /// Forget the token. The theme preference survives a logout.
    pub fn logout(&self) -> Result<()> {
        self.update(|data| data.token = None)?;
        tracing::info!("Logged out");
        Ok(())
    }

    pub fn toggle_theme(&self) -> Result<Theme> {
        self.update(|data| data.theme = data.theme.toggled())?;
        Ok(self.theme())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionFile> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut SessionFile)) -> Result<()> {
        let snapshot = {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            f(&mut data);
            data.clone()
        };
        self.save(&snapshot)
    }

    fn save(&self, data: &SessionFile) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create session directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(data).context("Failed to serialize session")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write session file: {:?}", path))?;
        Ok(())
    }
}
