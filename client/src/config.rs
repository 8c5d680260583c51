//! Configuration management for the client.

use std::env;

use chatsync_engine::{DEFAULT_EARLY_PUSH_CAPACITY, DEFAULT_MAX_CONTENT_LEN};

use crate::sync::SyncOptions;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Identity of the local user
    pub user_id: String,
    /// Identity of the simulated peer in the demo
    pub peer_id: String,
    /// Conversation entered at startup
    pub conversation_id: String,
    /// Longest accepted message, in characters
    pub max_content_len: usize,
    /// Rows buffered while the initial load is in flight
    pub early_push_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let user_id = lookup("CHATSYNC_USER").unwrap_or_else(|| "alice".to_string());
        let peer_id = lookup("CHATSYNC_PEER").unwrap_or_else(|| "bob".to_string());

        if user_id.trim().is_empty() {
            return Err(ConfigError::EmptyUser);
        }
        if user_id == peer_id {
            return Err(ConfigError::PeerIsUser(user_id));
        }

        let conversation_id =
            lookup("CHATSYNC_CONVERSATION").unwrap_or_else(|| "general".to_string());

        let max_content_len = match lookup("CHATSYNC_MAX_CONTENT_LEN") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("CHATSYNC_MAX_CONTENT_LEN", value))?,
            None => DEFAULT_MAX_CONTENT_LEN,
        };

        let early_push_capacity = match lookup("CHATSYNC_EARLY_PUSH_CAPACITY") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("CHATSYNC_EARLY_PUSH_CAPACITY", value))?,
            None => DEFAULT_EARLY_PUSH_CAPACITY,
        };

        Ok(Self {
            user_id,
            peer_id,
            conversation_id,
            max_content_len,
            early_push_capacity,
        })
    }

    /// Controller options derived from this configuration.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            max_content_len: self.max_content_len,
            early_push_capacity: self.early_push_capacity,
            ..SyncOptions::default()
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CHATSYNC_USER must not be empty")]
    EmptyUser,

    #[error("CHATSYNC_PEER must differ from CHATSYNC_USER ({0})")]
    PeerIsUser(String),

    #[error("Invalid {0} value: {1}")]
    InvalidNumber(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.peer_id, "bob");
        assert_eq!(config.conversation_id, "general");
        assert_eq!(config.sync_options(), SyncOptions::default());
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CHATSYNC_USER", "carol"),
            ("CHATSYNC_CONVERSATION", "team"),
            ("CHATSYNC_MAX_CONTENT_LEN", "280"),
            ("CHATSYNC_EARLY_PUSH_CAPACITY", "8"),
        ]))
        .unwrap();
        assert_eq!(config.user_id, "carol");
        assert_eq!(config.conversation_id, "team");

        let options = config.sync_options();
        assert_eq!(options.max_content_len, 280);
        assert_eq!(options.early_push_capacity, 8);
        assert!(options.filter_own_pushes);
    }

    #[test]
    fn invalid_number() {
        let err = Config::from_lookup(lookup(&[("CHATSYNC_MAX_CONTENT_LEN", "lots")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid CHATSYNC_MAX_CONTENT_LEN value: lots");
    }

    #[test]
    fn peer_must_differ() {
        let err = Config::from_lookup(lookup(&[("CHATSYNC_PEER", "alice")])).unwrap_err();
        assert!(matches!(err, ConfigError::PeerIsUser(_)));
    }
}
