//! Client-held attribution token.
//!
//! One small value object with an explicit TTL and a last-click-wins
//! overwrite rule, persisted in client-held storage (a browser-local
//! key/value store in the web product; a JSON file here). The token is
//! passed explicitly into the signup flow, never read ambiently.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The attribution token issued at click time and exchanged at signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionToken {
    /// Normalized (uppercased) referral code.
    pub code: String,
    /// Click identifier minted by the click tracker.
    pub click_id: String,
    /// Unix timestamp of the click.
    pub clicked_at: i64,
}

impl AttributionToken {
    /// Whether the token has outlived the attribution window.
    pub const fn is_expired(&self, now: i64, window_days: i64) -> bool {
        now > self.clicked_at + window_days * 86_400
    }
}

/// Durable client-side slot for at most one attribution token.
///
/// A later click unconditionally overwrites an earlier one (last-click
/// attribution is program policy). `clear` is idempotent.
pub trait TokenStore {
    /// Read the stored token. Partial or corrupt state loads as `None`
    /// and is never repaired.
    fn load(&self) -> Option<AttributionToken>;

    /// Overwrite the slot with a new token.
    fn save(&self, token: &AttributionToken) -> std::io::Result<()>;

    /// Remove the slot contents, whether or not anything is stored.
    fn clear(&self);
}

/// JSON-file token store, the CLI stand-in for browser-local storage.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<AttributionToken> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let token: AttributionToken = match serde_json::from_str(&content) {
            Ok(token) => token,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Ignoring unreadable attribution token");
                return None;
            }
        };
        if token.code.is_empty() || token.click_id.is_empty() {
            return None;
        }
        Some(token)
    }

    fn save(&self, token: &AttributionToken) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(token).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, json)
    }

    fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// In-memory token store for tests and embedded callers.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<AttributionToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<AttributionToken> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, token: &AttributionToken) -> std::io::Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(())
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
