use alloy::primitives::Address;
use bridge_core::canonical_chain_id;
use bridge_core::evm::{EvmWalletConfig, RpcConnector};
use bridge_core::redact::SecretString;
use bridge_core::{LogScanConfig, RouteTable, SessionConfig, WatcherConfig};
use eyre::{eyre, Result, WrapErr};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CHAIN_RPC_PREFIX: &str = "CHAIN_RPC_";

/// Front-end configuration, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Signing key; read-only mode when absent
    pub wallet_private_key: Option<SecretString>,
    /// RPC of the wallet's network
    pub origin_rpc_url: Option<String>,
    /// Per-chain RPC overrides from `CHAIN_RPC_<chain id>`
    pub chain_rpc: BTreeMap<String, String>,
    /// Routes layered over the built-in table, from `BRIDGE_ROUTES`
    pub extra_routes: Vec<(String, String, Address)>,
    pub journal_dir: PathBuf,
    pub journal_max_entries: Option<usize>,
    pub discovery_from_block: u64,
    pub discovery_max_block_range: Option<u64>,
    pub refresh_delay: Duration,
    pub pair_poll_interval: Duration,
    pub chain_change_debounce: Duration,
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from("./.bridge-journal")
}

fn default_refresh_delay_secs() -> u64 {
    30
}

fn default_pair_poll_interval_ms() -> u64 {
    4000
}

fn default_chain_change_debounce_ms() -> u64 {
    100
}

fn optional<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| eyre!("{} has an invalid value: {:?}", name, raw)),
        _ => Ok(None),
    }
}

/// `origin:destination:contract` entries separated by commas
fn parse_routes(raw: &str) -> Result<Vec<(String, String, Address)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
            let [origin, destination, contract] = parts.as_slice() else {
                return Err(eyre!(
                    "BRIDGE_ROUTES entry {:?} must be origin:destination:contract",
                    entry
                ));
            };
            let contract: Address = contract
                .parse()
                .map_err(|e| eyre!("BRIDGE_ROUTES contract {:?} is invalid: {}", contract, e))?;
            Ok((
                canonical_chain_id(origin),
                canonical_chain_id(destination),
                contract,
            ))
        })
        .collect()
}

impl Config {
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let wallet_private_key = env::var("WALLET_PRIVATE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let chain_rpc = env::vars()
            .filter_map(|(key, value)| {
                let chain_id = key.strip_prefix(CHAIN_RPC_PREFIX)?;
                Some((canonical_chain_id(chain_id), value.trim().to_string()))
            })
            .filter(|(_, url)| !url.is_empty())
            .collect();

        let config = Config {
            wallet_private_key,
            origin_rpc_url: env::var("ORIGIN_RPC_URL")
                .ok()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            chain_rpc,
            extra_routes: parse_routes(&env::var("BRIDGE_ROUTES").unwrap_or_default())?,
            journal_dir: env::var("JOURNAL_DIR")
                .ok()
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_journal_dir),
            journal_max_entries: optional("JOURNAL_MAX_ENTRIES")?,
            discovery_from_block: optional("DISCOVERY_FROM_BLOCK")?.unwrap_or(0),
            discovery_max_block_range: optional("DISCOVERY_MAX_BLOCK_RANGE")?,
            refresh_delay: Duration::from_secs(
                optional("REFRESH_DELAY_SECS")?.unwrap_or(default_refresh_delay_secs()),
            ),
            pair_poll_interval: Duration::from_millis(
                optional("PAIR_POLL_INTERVAL_MS")?.unwrap_or(default_pair_poll_interval_ms()),
            ),
            chain_change_debounce: Duration::from_millis(
                optional("CHAIN_CHANGE_DEBOUNCE_MS")?
                    .unwrap_or(default_chain_change_debounce_ms()),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if let Some(key) = &self.wallet_private_key {
            let raw = key.expose().trim();
            let hex = raw.strip_prefix("0x").unwrap_or(raw);
            if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(eyre!("WALLET_PRIVATE_KEY must be 64 hex chars (optionally 0x-prefixed)"));
            }
            if self.origin_rpc_url.is_none() {
                return Err(eyre!("ORIGIN_RPC_URL is required when WALLET_PRIVATE_KEY is set"));
            }
        }

        if self.journal_max_entries == Some(0) {
            return Err(eyre!("JOURNAL_MAX_ENTRIES must be at least 1"));
        }

        if self.discovery_max_block_range == Some(0) {
            return Err(eyre!("DISCOVERY_MAX_BLOCK_RANGE must be at least 1"));
        }

        if self.pair_poll_interval.is_zero() {
            return Err(eyre!("PAIR_POLL_INTERVAL_MS must be greater than zero"));
        }

        Ok(())
    }

    pub fn routes(&self) -> RouteTable {
        self.extra_routes.iter().fold(
            RouteTable::builtin(),
            |table, (origin, destination, contract)| {
                table.with_route(origin, destination, *contract)
            },
        )
    }

    /// Registry endpoints, then `CHAIN_RPC_*`, then `ORIGIN_RPC_URL` for `origin`
    pub fn connector(&self, origin: Option<&str>) -> RpcConnector {
        let mut connector = RpcConnector::with_registry_defaults();
        for (chain_id, url) in &self.chain_rpc {
            connector = connector.with_endpoint(chain_id, url);
        }
        if let (Some(origin), Some(url)) = (origin, &self.origin_rpc_url) {
            connector = connector.with_endpoint(origin, url);
        }
        connector
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            scan: LogScanConfig {
                from_block: self.discovery_from_block,
                max_block_range: self.discovery_max_block_range,
            },
            pair_watch: Some(WatcherConfig {
                poll_interval: self.pair_poll_interval,
                max_block_range: self.discovery_max_block_range.unwrap_or(10_000),
                ..Default::default()
            }),
        }
    }

    pub fn wallet_config(&self) -> Option<EvmWalletConfig> {
        let key = self.wallet_private_key.clone()?;
        let rpc_url = self.origin_rpc_url.as_deref()?;
        Some(EvmWalletConfig::new(rpc_url, key))
    }
}
