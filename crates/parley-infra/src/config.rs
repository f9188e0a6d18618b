//! Client configuration loader for Parley.
//!
//! Reads `config.toml` from the data directory (`~/.parley/` in production)
//! and deserializes it into [`ChatConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::Path;

use secrecy::SecretString;

use parley_types::config::ChatConfig;

/// Environment variable holding the backend bearer token.
pub const TOKEN_ENV: &str = "PARLEY_TOKEN";

/// Load client configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`ChatConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_chat_config(data_dir: &Path) -> ChatConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ChatConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ChatConfig::default();
        }
    };

    match toml::from_str::<ChatConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ChatConfig::default()
        }
    }
}

/// Pick the bearer token: an explicit value wins over [`TOKEN_ENV`].
///
/// Blank values count as absent.
pub fn resolve_token(explicit: Option<String>) -> Option<SecretString> {
    explicit
        .or_else(|| std::env::var(TOKEN_ENV).ok())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_chat_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_chat_config(tmp.path()).await;
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.message_poll_secs, 5);
        assert_eq!(config.conversation_poll_secs, 10);
    }

    #[tokio::test]
    async fn load_chat_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
base_url = "https://api.example.com"
message_poll_secs = 2
"#,
        )
        .await
        .unwrap();

        let config = load_chat_config(tmp.path()).await;
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.message_poll_secs, 2);
        // Unset fields keep their defaults.
        assert_eq!(config.notification_poll_secs, 30);
    }

    #[tokio::test]
    async fn load_chat_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "base_url = [not toml")
            .await
            .unwrap();

        let config = load_chat_config(tmp.path()).await;
        assert_eq!(config.base_url, "http://localhost:5000");
    }

    #[test]
    fn resolve_token_prefers_explicit_and_ignores_blank() {
        let token = resolve_token(Some(" abc ".to_string())).unwrap();
        assert_eq!(token.expose_secret(), "abc");
        assert!(resolve_token(Some("   ".to_string())).is_none());
    }
}
