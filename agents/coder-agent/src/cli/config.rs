//! Configuration module
//!
//! Captures the process environment once at startup into an immutable
//! configuration struct. Nothing outside this module reads environment
//! variables; a missing required value fails before any listener binds.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use thiserror::Error;

use crate::xpander::client::DEFAULT_BASE_URL;

/// Fixed local port the launcher listens on.
pub const DEFAULT_PORT: u16 = 41241;

/// Default listener address. Loopback keeps the listener private to the
/// host; containers override this to their external interface.
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Bedrock region used by the original launcher.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Model served through the Bedrock Converse API.
pub const DEFAULT_MODEL_ID: &str = "us.anthropic.claude-3-7-sonnet-20250219-v1:0";

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("set AWS_PROFILE, or both AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY")]
    MissingAwsIdentity,

    #[error("environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// How the Bedrock client authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwsIdentity {
    /// Named profile from the shared AWS config files.
    Profile(String),

    /// Static access key pair from the environment.
    StaticKeys {
        access_key_id: String,
        secret_access_key: String,
    },
}

/// Immutable launcher configuration, captured once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// xpander control plane API key.
    pub xpander_api_key: String,

    /// Remote agent id; `None` falls back to the saved identity file.
    pub agent_id: Option<String>,

    /// Control plane base URL.
    pub base_url: String,

    /// Bedrock credential source.
    pub aws: AwsIdentity,

    /// Bedrock region.
    pub aws_region: String,

    /// Bedrock model id.
    pub model_id: String,

    /// Address the listener binds to.
    pub bind_addr: IpAddr,

    /// Local listener port.
    pub port: u16,

    /// Directory holding the agent identity and instruction files.
    pub state_dir: PathBuf,

    /// Base directory for per-thread sandboxes.
    pub sandbox_dir: PathBuf,
}

impl Config {
    /// Capture configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Capture configuration through a lookup function.
    ///
    /// Empty values are treated as unset. Tests inject their own
    /// environment this way.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let xpander_api_key =
            get("XPANDER_API_KEY").ok_or(ConfigError::Missing("XPANDER_API_KEY"))?;

        let aws = match get("AWS_PROFILE") {
            Some(profile) => AwsIdentity::Profile(profile),
            None => {
                let access_key_id = get("AWS_ACCESS_KEY_ID");
                let secret_access_key = get("AWS_SECRET_ACCESS_KEY");
                match (access_key_id, secret_access_key) {
                    (Some(access_key_id), Some(secret_access_key)) => AwsIdentity::StaticKeys {
                        access_key_id,
                        secret_access_key,
                    },
                    _ => return Err(ConfigError::MissingAwsIdentity),
                }
            }
        };

        let bind_addr = match get("CODER_AGENT_BIND") {
            Some(raw) => raw.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
                name: "CODER_AGENT_BIND",
                reason: e.to_string(),
            })?,
            None => DEFAULT_BIND_ADDR,
        };

        let port = port_from_lookup(&lookup)?;

        Ok(Self {
            xpander_api_key,
            agent_id: get("XPANDER_AGENT_ID"),
            base_url: get("XPANDER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            aws,
            aws_region: get("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            model_id: get("BEDROCK_MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            bind_addr,
            port,
            state_dir: get("CODER_AGENT_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            sandbox_dir: get("CODER_AGENT_SANDBOX_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("sandboxes")),
        })
    }
}

/// Listener port alone, for callers that do not need the full
/// configuration (the status probe).
pub fn port_from_env() -> Result<u16, ConfigError> {
    port_from_lookup(|name| std::env::var(name).ok())
}

/// Parse the listener port through a lookup function.
pub fn port_from_lookup<F>(lookup: F) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("CODER_AGENT_PORT").filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
            name: "CODER_AGENT_PORT",
            reason: e.to_string(),
        }),
        None => Ok(DEFAULT_PORT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn from_map(map: &HashMap<String, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_full_environment() {
        let map = env(&[
            ("XPANDER_API_KEY", "key-123"),
            ("XPANDER_AGENT_ID", "agent-456"),
            ("AWS_PROFILE", "dev"),
        ]);

        let config = from_map(&map).unwrap();
        assert_eq!(config.xpander_api_key, "key-123");
        assert_eq!(config.agent_id.as_deref(), Some("agent-456"));
        assert_eq!(config.aws, AwsIdentity::Profile("dev".to_string()));
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.aws_region, DEFAULT_REGION);
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn test_missing_api_key() {
        let map = env(&[("AWS_PROFILE", "dev")]);
        let err = from_map(&map).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("XPANDER_API_KEY")));
    }

    #[test]
    fn test_static_keys() {
        let map = env(&[
            ("XPANDER_API_KEY", "key-123"),
            ("AWS_ACCESS_KEY_ID", "AKIA123"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]);

        let config = from_map(&map).unwrap();
        assert_eq!(
            config.aws,
            AwsIdentity::StaticKeys {
                access_key_id: "AKIA123".to_string(),
                secret_access_key: "secret".to_string(),
            }
        );
    }

    #[test]
    fn test_partial_static_keys_rejected() {
        let map = env(&[
            ("XPANDER_API_KEY", "key-123"),
            ("AWS_ACCESS_KEY_ID", "AKIA123"),
        ]);

        let err = from_map(&map).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAwsIdentity));
    }

    #[test]
    fn test_profile_wins_over_static_keys() {
        let map = env(&[
            ("XPANDER_API_KEY", "key-123"),
            ("AWS_PROFILE", "dev"),
            ("AWS_ACCESS_KEY_ID", "AKIA123"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]);

        let config = from_map(&map).unwrap();
        assert_eq!(config.aws, AwsIdentity::Profile("dev".to_string()));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let map = env(&[("XPANDER_API_KEY", "  "), ("AWS_PROFILE", "dev")]);
        let err = from_map(&map).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("XPANDER_API_KEY")));
    }

    #[test]
    fn test_invalid_port() {
        let map = env(&[
            ("XPANDER_API_KEY", "key-123"),
            ("AWS_PROFILE", "dev"),
            ("CODER_AGENT_PORT", "not-a-port"),
        ]);

        let err = from_map(&map).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "CODER_AGENT_PORT",
                ..
            }
        ));
    }

    #[test]
    fn test_overrides() {
        let map = env(&[
            ("XPANDER_API_KEY", "key-123"),
            ("AWS_PROFILE", "dev"),
            ("CODER_AGENT_PORT", "9000"),
            ("CODER_AGENT_BIND", "0.0.0.0"),
            ("AWS_REGION", "eu-west-1"),
            ("XPANDER_BASE_URL", "https://staging.xpander.ai"),
        ]);

        let config = from_map(&map).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.aws_region, "eu-west-1");
        assert_eq!(config.base_url, "https://staging.xpander.ai");
    }

    #[test]
    fn test_invalid_bind_address() {
        let map = env(&[
            ("XPANDER_API_KEY", "key-123"),
            ("AWS_PROFILE", "dev"),
            ("CODER_AGENT_BIND", "everywhere"),
        ]);

        let err = from_map(&map).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "CODER_AGENT_BIND",
                ..
            }
        ));
    }

    #[test]
    fn test_port_from_lookup() {
        assert_eq!(port_from_lookup(|_| None).unwrap(), DEFAULT_PORT);
        assert_eq!(
            port_from_lookup(|_| Some("9000".to_string())).unwrap(),
            9000
        );
        assert!(port_from_lookup(|_| Some("not-a-port".to_string())).is_err());
    }
}
