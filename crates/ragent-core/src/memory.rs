//! Bounded per-session conversation memory.
//!
//! Each session keeps at most `2 × N` messages (N user/assistant pairs);
//! older pairs are evicted on write. Sessions are independent: each has its
//! own lock, so concurrent turns in one session serialize while different
//! sessions never contend beyond the short map lookup.
//!
//! When a persistence path is configured, every mutation rewrites a JSON
//! file of the form `{ "<session>": [{"role": "user", "content": "..."}] }`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::RagError;
use crate::types::{Message, Role};

// ============================================================================
// Configuration
// ============================================================================

/// Conversation memory configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    /// Number of user/assistant pairs kept per session (N).
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Optional JSON file the sessions are persisted to.
    #[serde(default)]
    pub persist_path: Option<PathBuf>,
}

fn default_history_limit() -> usize {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            persist_path: None,
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<Vec<String>, RagError> {
        if self.history_limit == 0 {
            return Err(RagError::InvalidConfiguration {
                message: "memory.historyLimit cannot be 0".to_string(),
                hint: "Set historyLimit to at least 1 (recommended: 5)".to_string(),
            });
        }
        let mut warnings = Vec::new();
        if self.history_limit > 50 {
            warnings.push(format!(
                "memory.historyLimit ({}) is large; every prompt will carry that many turns",
                self.history_limit
            ));
        }
        Ok(warnings)
    }
}

// ============================================================================
// MemoryManager
// ============================================================================

type SessionTurns = Arc<Mutex<VecDeque<Message>>>;

/// Keyed store of bounded conversation histories.
pub struct MemoryManager {
    limit: usize,
    sessions: RwLock<HashMap<String, SessionTurns>>,
    persist_path: Option<PathBuf>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl MemoryManager {
    /// Create a manager, reading persisted sessions if configured.
    ///
    /// A missing file starts empty; an unreadable one starts empty with a
    /// warning.
    pub fn new(config: &MemoryConfig) -> Self {
        let sessions = match &config.persist_path {
            Some(path) => load_sessions(path, config.history_limit),
            None => HashMap::new(),
        };
        Self {
            limit: config.history_limit,
            sessions: RwLock::new(sessions),
            persist_path: config.persist_path.clone(),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// In-memory manager keeping `history_limit` pairs per session.
    pub fn in_memory(history_limit: usize) -> Self {
        Self::new(&MemoryConfig {
            history_limit,
            persist_path: None,
        })
    }

    /// Pairs kept per session.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append one user/assistant exchange. No-op for an empty session id.
    pub async fn add_turn(&self, session_id: &str, user_text: &str, assistant_text: &str) {
        if session_id.is_empty() {
            return;
        }

        self.append(session_id, user_text, assistant_text);
        debug!("Recorded turn for session '{}'", session_id);
        self.persist().await;
    }

    /// History rendered as `User: …` / `Assistant: …` lines.
    ///
    /// Returns the empty string for unknown or empty sessions.
    pub fn get_history(&self, session_id: &str) -> String {
        self.get_raw_history(session_id)
            .iter()
            .map(|m| {
                let label = match m.role {
                    Role::User => Role::User.label(),
                    _ => Role::Assistant.label(),
                };
                format!("{}: {}", label, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Stored messages, oldest first.
    pub fn get_raw_history(&self, session_id: &str) -> Vec<Message> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        match sessions.get(session_id) {
            Some(turns) => turns
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Forget one session.
    pub async fn clear_history(&self, session_id: &str) {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id)
            .is_some();
        if removed {
            debug!("Cleared session '{}'", session_id);
            self.persist().await;
        }
    }

    /// Forget every session.
    pub async fn clear_all(&self) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        debug!("Cleared all sessions");
        self.persist().await;
    }

    /// Known session ids, sorted.
    pub fn list_sessions(&self) -> Vec<String> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Append under the map lock; a concurrent clear never orphans the turn.
    fn append(&self, session_id: &str, user_text: &str, assistant_text: &str) {
        let push = |turns: &SessionTurns| {
            let mut turns = turns.lock().unwrap_or_else(|e| e.into_inner());
            turns.push_back(Message::user(user_text));
            turns.push_back(Message::assistant(assistant_text));
            let max = self.limit * 2;
            while turns.len() > max {
                turns.pop_front();
            }
        };

        {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            if let Some(turns) = sessions.get(session_id) {
                push(turns);
                return;
            }
        }
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        push(&*sessions.entry(session_id.to_string()).or_default());
    }

    fn snapshot(&self) -> BTreeMap<String, Vec<Message>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .iter()
            .map(|(id, turns)| {
                let turns = turns.lock().unwrap_or_else(|e| e.into_inner());
                (id.clone(), turns.iter().cloned().collect())
            })
            .collect()
    }

    async fn persist(&self) {
        let Some(path) = self.persist_path.clone() else {
            return;
        };
        // Serialize writers so an older snapshot never lands after a newer one
        let _guard = self.persist_lock.lock().await;
        let sessions = self.snapshot();
        let written = tokio::task::spawn_blocking(move || write_sessions(&path, &sessions))
            .await
            .map_err(RagError::from)
            .and_then(|r| r);
        if let Err(e) = written {
            warn!("Failed to persist conversation memory: {}", e);
        }
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("limit", &self.limit)
            .field("persist_path", &self.persist_path)
            .finish()
    }
}

fn load_sessions(path: &Path, limit: usize) -> HashMap<String, SessionTurns> {
    if !path.exists() {
        return HashMap::new();
    }

    let parsed = fs::read_to_string(path)
        .map_err(RagError::from)
        .and_then(|content| {
            serde_json::from_str::<BTreeMap<String, Vec<Message>>>(&content).map_err(RagError::from)
        });

    match parsed {
        Ok(stored) => {
            debug!(
                "Loaded {} sessions from {}",
                stored.len(),
                path.display()
            );
            stored
                .into_iter()
                .map(|(id, messages)| {
                    let skip = messages.len().saturating_sub(limit * 2);
                    let turns: VecDeque<Message> = messages.into_iter().skip(skip).collect();
                    (id, Arc::new(Mutex::new(turns)))
                })
                .collect()
        }
        Err(e) => {
            warn!(
                "Ignoring unreadable conversation memory at {}: {}",
                path.display(),
                e
            );
            HashMap::new()
        }
    }
}

fn write_sessions(path: &Path, sessions: &BTreeMap<String, Vec<Message>>) -> Result<(), RagError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(sessions)?;
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
