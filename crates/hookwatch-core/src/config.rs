use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3002;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_CONFIG_FILE: &str = "hookwatch.toml";
/// Retained history length. Fixed, not part of the runtime config.
pub const MAX_HISTORY_SIZE: usize = 50;
pub const MAX_FRAME_BYTES: usize = 64 * 1024; // inbound WS text frame cap
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
pub const DEFAULT_VIEWER_QUEUE: usize = 256; // per-viewer outbound frames
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Top-level config (hookwatch.toml + HOOKWATCH_* env + PORT/HOST env).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookwatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Requests with a larger body are rejected with 413 before ingestion.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Pretty-print every accepted payload to stdout (flushed immediately).
    #[serde(default = "bool_true")]
    pub echo_stdout: bool,
    /// Reject bodies whose Content-Type is not JSON, even if they parse.
    #[serde(default)]
    pub require_json_content_type: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            echo_stdout: true,
            require_json_content_type: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewerConfig {
    /// Outbound frames buffered per viewer before it is evicted as too slow.
    #[serde(default = "default_viewer_queue")]
    pub queue_capacity: usize,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_VIEWER_QUEUE,
            heartbeat_secs: HEARTBEAT_INTERVAL_SECS,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}
fn default_viewer_queue() -> usize {
    DEFAULT_VIEWER_QUEUE
}
fn default_heartbeat_secs() -> u64 {
    HEARTBEAT_INTERVAL_SECS
}

impl HookwatchConfig {
    /// Load config from a TOML file with env var overrides.
    ///
    /// Layers, lowest to highest priority:
    ///   1. Built-in defaults
    ///   2. TOML file (explicit path, else ./hookwatch.toml; missing is fine)
    ///   3. HOOKWATCH_* env vars, nested with `__` (HOOKWATCH_SERVER__PORT)
    ///   4. Plain PORT and HOST env vars
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        Self::figment(config_path)
            .extract()
            .map_err(|e| crate::error::HookwatchError::Config(e.to_string()))
    }

    /// The layered provider stack behind [`HookwatchConfig::load`].
    pub fn figment(config_path: Option<&str>) -> Figment {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_FILE);

        Figment::from(Serialized::defaults(HookwatchConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("HOOKWATCH_").split("__"))
            .merge(
                Env::raw()
                    .only(&["PORT", "HOST"])
                    .map(|key| format!("server.{}", key.as_str()).into()),
            )
    }

    /// Listener address as `(host, port)`, so IPv6 hosts need no brackets.
    pub fn bind_addr(&self) -> (&str, u16) {
        (self.server.host.as_str(), self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = HookwatchConfig::default();
        assert_eq!(cfg.server.port, 3002);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert!(cfg.ingest.echo_stdout);
        assert!(!cfg.ingest.require_json_content_type);
        assert_eq!(cfg.viewer.queue_capacity, DEFAULT_VIEWER_QUEUE);
        assert_eq!(cfg.bind_addr(), ("0.0.0.0", 3002));
    }

    #[test]
    fn ipv6_host_binds_without_brackets() {
        use std::net::ToSocketAddrs;

        let mut cfg = HookwatchConfig::default();
        cfg.server.host = "::1".into();
        let addr = cfg.bind_addr().to_socket_addrs().unwrap().next().unwrap();
        assert!(addr.is_ipv6());
        assert_eq!(addr.port(), 3002);
    }

    #[test]
    fn plain_port_and_host_env_override() {
        Jail::expect_with(|jail| {
            jail.set_env("PORT", "8080");
            jail.set_env("HOST", "127.0.0.1");
            let cfg: HookwatchConfig = HookwatchConfig::figment(None).extract()?;
            assert_eq!(cfg.server.port, 8080);
            assert_eq!(cfg.server.host, "127.0.0.1");
            assert_eq!(cfg.bind_addr(), ("127.0.0.1", 8080));
            Ok(())
        });
    }

    #[test]
    fn toml_file_then_prefixed_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "hookwatch.toml",
                r#"
                [server]
                max_body_bytes = 1024

                [ingest]
                echo_stdout = false

                [viewer]
                queue_capacity = 8
                "#,
            )?;
            jail.set_env("HOOKWATCH_VIEWER__QUEUE_CAPACITY", "16");

            let cfg: HookwatchConfig = HookwatchConfig::figment(None).extract()?;
            assert_eq!(cfg.server.max_body_bytes, 1024);
            assert!(!cfg.ingest.echo_stdout);
            assert_eq!(cfg.viewer.queue_capacity, 16);
            Ok(())
        });
    }

    #[test]
    fn explicit_path_is_used() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[server]\nmax_body_bytes = 7\n")?;
            let cfg: HookwatchConfig = HookwatchConfig::figment(Some("custom.toml")).extract()?;
            assert_eq!(cfg.server.max_body_bytes, 7);
            Ok(())
        });
    }
}
