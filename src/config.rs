// src/config.rs

//! Process configuration: the hosts file (peer directory), TOML-file
//! settings, and environment-variable overrides (spec.md §6.4). Loading
//! follows the teacher's `Config::from_file` convention of
//! `fs::read_to_string` + `toml::from_str` + `anyhow::Context`, not the
//! (unused, in the teacher) `config` crate.

use crate::core::NodeId;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::IpAddr;

/// A single line of the hosts file: `id,hostname,ip,port`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub hostname: String,
    pub ip: IpAddr,
    pub port: u16,
}

/// Parses a hosts file into `id -> NodeRecord`. Duplicate lines for the
/// same id are tolerated; the last one wins, matching the race-avoidance
/// policy in spec.md §5 (every node may append its own line).
pub fn parse_hosts_file(contents: &str) -> Result<BTreeMap<NodeId, NodeRecord>> {
    let mut nodes = BTreeMap::new();
    for (lineno, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(anyhow!("hosts file line {}: expected 4 comma-separated fields, got {}", lineno + 1, parts.len()));
        }
        let id: NodeId = parts[0].parse().with_context(|| format!("hosts file line {}: invalid id", lineno + 1))?;
        let ip: IpAddr = parts[2].parse().with_context(|| format!("hosts file line {}: invalid ip", lineno + 1))?;
        let port: u16 = parts[3].parse().with_context(|| format!("hosts file line {}: invalid port", lineno + 1))?;
        nodes.insert(id, NodeRecord { id, hostname: parts[1].to_string(), ip, port });
    }
    Ok(nodes)
}

pub fn load_hosts_file(path: &str) -> Result<BTreeMap<NodeId, NodeRecord>> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read hosts file at '{path}'"))?;
    parse_hosts_file(&contents)
}

/// Appends a line for `new_node` to the hosts file. Per spec.md §5: in a
/// local (single-host) deployment only node 0 performs this write, to avoid
/// a multi-writer race; in a multi-host deployment every node appends its
/// own line and duplicate entries are tolerated by the parser.
pub fn append_node_to_hosts_file(path: &str, self_id: NodeId, nodes: &BTreeMap<NodeId, NodeRecord>, new_node: &NodeRecord) -> Result<()> {
    if let Some(node_zero) = nodes.get(&0) {
        if node_zero.hostname == "localhost" && self_id != 0 {
            return Ok(());
        }
    }
    let line = format!("{},{},{},{}\n", new_node.id, new_node.hostname, new_node.ip, new_node.port);
    use std::io::Write;
    let mut f = fs::OpenOptions::new().append(true).create(true).open(path).with_context(|| format!("failed to open hosts file at '{path}'"))?;
    f.write_all(line.as_bytes())?;
    Ok(())
}

/// Optional shared-secret HMAC envelope for the inter-node wire protocol
/// (spec.md §1 non-goals: "message authentication beyond an optional
/// shared-secret HMAC").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub shared_secret: Option<String>,
}

/// TOML-file settings layered under environment-variable overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConfig {
    #[serde(default)]
    pub hosts_path: Option<String>,
    #[serde(default)]
    pub api_port: Option<u16>,
    #[serde(default)]
    pub number_of_nodes: Option<u32>,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RawConfig {
    fn default() -> Self {
        RawConfig { hosts_path: None, api_port: None, number_of_nodes: None, security: SecurityConfig::default(), log_level: default_log_level() }
    }
}

/// The fully-resolved configuration for one `quorumd` process.
#[derive(Debug, Clone)]
pub struct Config {
    pub id: NodeId,
    pub hosts_path: String,
    pub api_port: u16,
    pub number_of_nodes: u32,
    pub security: SecurityConfig,
    pub log_level: String,
    pub integration_test: bool,
    pub inject_start_state: bool,
    pub non_self_stab: bool,
}

impl Config {
    /// Loads a TOML file if present (missing file means "use defaults"),
    /// then applies environment-variable overrides named in spec.md §6.4.
    pub fn from_file_and_env(path: Option<&str>) -> Result<Self> {
        let raw: RawConfig = match path {
            Some(p) => {
                let contents = fs::read_to_string(p).with_context(|| format!("failed to read config file at '{p}'"))?;
                toml::from_str(&contents).with_context(|| format!("failed to parse TOML from '{p}'"))?
            }
            None => RawConfig::default(),
        };

        let id: NodeId = env_var("ID").context("ID environment variable is required")?.parse().context("ID must be a non-negative integer")?;

        let hosts_path = env_var("HOSTS_PATH").ok().or(raw.hosts_path).unwrap_or_else(|| "conf/hosts.txt".to_string());

        let api_port = env_override("API_PORT")?.or(raw.api_port).unwrap_or(8080);

        let number_of_nodes = env_override("NUMBER_OF_NODES")?.or(raw.number_of_nodes).context("NUMBER_OF_NODES must be set via env or config file")?;

        let integration_test = env_flag("INTEGRATION_TEST");
        let inject_start_state = env_flag("INJECT_START_STATE");
        let non_self_stab = env_flag("NON_SELF_STAB");

        let config = Config {
            id,
            hosts_path,
            api_port,
            number_of_nodes,
            security: raw.security,
            log_level: raw.log_level,
            integration_test,
            inject_start_state,
            non_self_stab,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.id >= self.number_of_nodes {
            return Err(anyhow!("ID {} out of range for NUMBER_OF_NODES {}", self.id, self.number_of_nodes));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow!("{name} is not set"))
}

fn env_override<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) => v.parse::<T>().map(Some).map_err(|e| anyhow!("invalid {name}: {e}")),
        Err(_) => Ok(None),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok()
}
