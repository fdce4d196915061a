// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Configuration of the voting client and the persisted network selection.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    iter::once,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::{Result, anyhow, bail};
use indexmap::IndexSet;
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use suivote_utils::{
    backoff::ExponentialBackoffConfig,
    config::{home_relative, load_from_yaml, path_or_defaults_if_exist, save_to_yaml},
};

use crate::{
    client::{
        SuiClientResult,
        contract_config::ContractConfig,
        metrics::SuiClientMetricSet,
        read_client::SuiReadClient,
        submission::DEFAULT_RESET_DELAY,
    },
    explorer::Explorer,
};

/// The Sui networks the dashboard can be deployed on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Sui mainnet.
    Mainnet,
    /// Sui testnet.
    #[default]
    Testnet,
    /// Sui devnet.
    Devnet,
    /// A local network.
    Localnet,
}

impl Network {
    /// The name of the network, as used in configuration contexts and explorer links.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Localnet => "localnet",
        }
    }

    /// The public full node of the network.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://fullnode.mainnet.sui.io:443",
            Self::Testnet => "https://fullnode.testnet.sui.io:443",
            Self::Devnet => "https://fullnode.devnet.sui.io:443",
            Self::Localnet => "http://127.0.0.1:9000",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "devnet" => Ok(Self::Devnet),
            "localnet" => Ok(Self::Localnet),
            other => Err(anyhow!(
                "unknown network '{other}'; expected mainnet, testnet, devnet, or localnet"
            )),
        }
    }
}

/// Configuration of the submission pipelines.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Time after which a finished submission can be repeated.
    #[serde_as(as = "DurationMilliSeconds")]
    #[serde(rename = "reset_delay_millis")]
    pub reset_delay: Duration,
    /// Wait for finality before reporting success.
    pub wait_for_finality: bool,
    /// Query the events of vote transactions.
    pub query_events: bool,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            reset_delay: DEFAULT_RESET_DELAY,
            wait_for_finality: true,
            query_events: true,
        }
    }
}

/// Returns the default paths for the voting client configuration file.
pub fn default_configuration_paths() -> Vec<PathBuf> {
    const CONFIG_FILE_NAMES: [&str; 2] = ["suivote_config.yaml", "suivote_config.yml"];
    let mut directories = vec![PathBuf::from(".")];
    if let Ok(xdg_config_dir) = std::env::var("XDG_CONFIG_HOME") {
        directories.push(PathBuf::from(xdg_config_dir).join("suivote"));
    }
    if let Some(home_dir) = home::home_dir() {
        directories.push(home_dir.join(".config").join("suivote"));
        directories.push(home_dir.join(".suivote"));
    }
    directories
        .into_iter()
        .cartesian_product(CONFIG_FILE_NAMES)
        .map(|(directory, file_name)| directory.join(file_name))
        .collect()
}

/// Loads the client configuration from the given path and context.
///
/// If no path is provided, tries to load the configuration first from the local folder, and then
/// from the standard configuration directories. An explicit context takes precedence over the
/// network; without either, the default context is used.
pub fn load_configuration(
    path: Option<impl AsRef<Path>>,
    context: Option<&str>,
    network: Option<Network>,
) -> Result<ClientConfig> {
    let path = path_or_defaults_if_exist(path, &default_configuration_paths())
        .ok_or(anyhow!("could not find a valid suivote configuration file"))?;
    let (config, context) = match (context, network) {
        (None, Some(network)) => ClientConfig::load_for_network(&path, network)?,
        (context, _) => ClientConfig::load_from_multi_config(&path, context)?,
    };
    tracing::info!(
        "using suivote configuration from '{}' with {} context",
        path.display(),
        context.map_or("default".to_string(), |c| format!("'{c}'"))
    );
    Ok(config)
}

/// Config for the voting client on one network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClientConfig {
    /// The network the contracts are deployed on.
    #[serde(default)]
    pub network: Network,
    /// The deployed package and dashboard.
    #[serde(flatten)]
    pub contract_config: ContractConfig,
    /// Path to the wallet configuration.
    #[serde(default)]
    pub wallet_config: Option<PathBuf>,
    /// RPC URLs to use for reads.
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    /// Backoff for retried RPC calls.
    #[serde(default)]
    pub backoff_config: ExponentialBackoffConfig,
    /// Gas budget of transactions, in MIST.
    #[serde(default)]
    pub gas_budget: Option<u64>,
    /// Base URL of the explorer; defaults to Suiscan for the network.
    #[serde(default)]
    pub explorer_url: Option<String>,
    /// Behavior of the submission pipelines.
    #[serde(default)]
    pub submission: SubmissionConfig,
}

impl ClientConfig {
    /// Creates a new client config from a contract config, using default values for the other
    /// fields.
    pub fn new_from_contract_config(network: Network, contract_config: ContractConfig) -> Self {
        Self {
            network,
            contract_config,
            wallet_config: Default::default(),
            rpc_urls: Default::default(),
            backoff_config: Default::default(),
            gas_budget: Default::default(),
            explorer_url: Default::default(),
            submission: Default::default(),
        }
    }

    /// Loads the client configuration from the given path along with a context. If the file is a
    /// multi-config file, the context argument can be used to override the default context.
    pub fn load_from_multi_config(
        path: impl AsRef<Path>,
        context: Option<&str>,
    ) -> Result<(Self, Option<String>)> {
        let path = path.as_ref();
        let config: MultiClientConfig = match load_from_yaml(path) {
            Ok(config) => config,
            Err(e) => {
                bail!(
                    "unable to parse the client config file: [config_filename='{}', error='{:#}']",
                    path.display(),
                    e
                )
            }
        };
        match config {
            MultiClientConfig::SingletonConfig(config) => {
                if let Some(context) = context {
                    bail!(
                        "cannot specify context when using a single-context configuration file \
                        [config_filename='{}', specified_context='{}']",
                        path.display(),
                        context,
                    )
                }
                Ok((config, None))
            }
            MultiClientConfig::MultiConfig {
                contexts,
                default_context,
            } => {
                let target_context = context.unwrap_or(&default_context);
                let config = contexts.get(target_context).cloned().ok_or_else(|| {
                    anyhow!(
                        "context '{}' not found in multi-config file '{}'. available context(s): \
                        [{}]",
                        target_context,
                        path.display(),
                        contexts.keys().sorted().map(|x| format!("'{x}'")).join(", ")
                    )
                })?;
                Ok((config, Some(target_context.to_string())))
            }
        }
    }

    /// Loads the configuration of `network` from the given path.
    ///
    /// In a multi-config file, the context named after the network is preferred; otherwise the
    /// first context (by name) configured for the network is used.
    pub fn load_for_network(
        path: impl AsRef<Path>,
        network: Network,
    ) -> Result<(Self, Option<String>)> {
        let path = path.as_ref();
        let config: MultiClientConfig = load_from_yaml(path)?;
        match config {
            MultiClientConfig::SingletonConfig(config) => {
                if config.network != network {
                    bail!(
                        "the configuration file '{}' is for {}, but {} is selected",
                        path.display(),
                        config.network,
                        network
                    )
                }
                Ok((config, None))
            }
            MultiClientConfig::MultiConfig { contexts, .. } => {
                let selected = contexts.get_key_value(network.as_str()).or_else(|| {
                    contexts
                        .iter()
                        .filter(|(_, config)| config.network == network)
                        .min_by_key(|(name, _)| name.as_str())
                });
                let Some((context, config)) = selected else {
                    bail!(
                        "no context for {} in multi-config file '{}'. configured network(s): [{}]",
                        network,
                        path.display(),
                        contexts
                            .values()
                            .map(|config| config.network.as_str())
                            .sorted()
                            .dedup()
                            .join(", ")
                    )
                };
                Ok((config.clone(), Some(context.clone())))
            }
        }
    }

    /// The RPC URLs to read from, starting with the wallet's URL if given.
    ///
    /// Falls back to the public full node of the network if no URL is configured.
    pub fn read_rpc_urls(&self, wallet_rpc_url: Option<&str>) -> Vec<String> {
        match wallet_rpc_url {
            Some(wallet_rpc_url) => combine_rpc_urls(wallet_rpc_url, &self.rpc_urls),
            None if self.rpc_urls.is_empty() => vec![self.network.default_rpc_url().to_owned()],
            None => combine_rpc_urls(&self.rpc_urls[0], &self.rpc_urls[1..]),
        }
    }

    /// Creates a [`SuiReadClient`] connected to the first reachable URL of
    /// [`Self::read_rpc_urls`].
    pub async fn new_read_client(
        &self,
        wallet_rpc_url: Option<&str>,
        metrics: Option<Arc<SuiClientMetricSet>>,
    ) -> SuiClientResult<SuiReadClient> {
        connect_to_first(self.read_rpc_urls(wallet_rpc_url), |rpc_url| {
            let backoff_config = self.backoff_config.clone();
            let metrics = metrics.clone();
            async move { SuiReadClient::new(&rpc_url, backoff_config, metrics).await }
        })
        .await
    }

    /// The explorer links of the network.
    pub fn explorer(&self) -> Explorer {
        Explorer::new(self.network, self.explorer_url.clone())
    }
}

/// Calls `connect` with each of `rpc_urls` in order until one succeeds.
///
/// Returns the error of the last URL if none of them can be reached.
pub(crate) async fn connect_to_first<F, Fut, T>(
    rpc_urls: Vec<String>,
    mut connect: F,
) -> SuiClientResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = SuiClientResult<T>>,
{
    let mut last_error = None;
    for rpc_url in rpc_urls {
        match connect(rpc_url.clone()).await {
            Ok(client) => return Ok(client),
            Err(error) => {
                tracing::warn!(rpc_url, %error, "failed to connect to full node");
                last_error = Some(error);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("no RPC URL configured").into()))
}

/// Combines the main RPC URL with additional RPC endpoints, ensuring uniqueness of each URL string.
pub fn combine_rpc_urls(rpc: impl AsRef<str>, additional_rpc_endpoints: &[String]) -> Vec<String> {
    once(rpc.as_ref().to_string())
        .chain(additional_rpc_endpoints.iter().cloned())
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect::<Vec<_>>()
}

/// Multi config for the client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
#[allow(clippy::large_enum_variant)]
pub enum MultiClientConfig {
    /// A configuration with a single context.
    SingletonConfig(ClientConfig),
    /// A configuration with potentially multiple contexts, typically one per network.
    MultiConfig {
        /// The contexts for the configuration.
        contexts: HashMap<String, ClientConfig>,
        /// The default context to use if none is specified.
        default_context: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSelection {
    network: Network,
}

/// Durable storage of the selected network.
///
/// The selection is read once at start-up to pick the configuration context; changing it takes
/// effect by reconnecting the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSelectionStore {
    path: PathBuf,
}

impl NetworkSelectionStore {
    /// Creates a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store at `~/.suivote/network.yaml`, if the home directory is known.
    pub fn at_default_location() -> Option<Self> {
        home_relative(".suivote/network.yaml").map(Self::new)
    }

    /// The path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the selected network; `None` if nothing was selected yet.
    pub fn load(&self) -> Result<Option<Network>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let selection: PersistedSelection = load_from_yaml(&self.path)?;
        Ok(Some(selection.network))
    }

    /// Persists `network` as the selected network.
    pub fn save(&self, network: Network) -> Result<()> {
        save_to_yaml(&PersistedSelection { network }, &self.path)?;
        tracing::info!(%network, path = %self.path.display(), "network selection saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use tempfile::TempDir;

    use super::*;
    use crate::client::SuiClientError;

    type TestResult = anyhow::Result<()>;

    // editorconfig-checker-disable
    const MULTI_CONFIG: &str = indoc! {"
        contexts:
            testnet:
                network: testnet
                package_id: 0x000000000000000000000000000000000000000000000000000000000000002a
                dashboard_object: 0x000000000000000000000000000000000000000000000000000000000000000d
            devnet:
                network: devnet
                package_id: 0x000000000000000000000000000000000000000000000000000000000000002b
                dashboard_object: 0x000000000000000000000000000000000000000000000000000000000000000e
                rpc_urls:
                    - http://localhost:9000
                submission:
                    reset_delay_millis: 1000
        default_context: testnet
    "};
    // editorconfig-checker-enable

    fn write_config(dir: &TempDir, yaml: &str) -> Result<PathBuf> {
        let filename = dir.path().join("suivote_config.yaml");
        std::fs::write(&filename, yaml.as_bytes())?;
        Ok(filename)
    }

    #[test]
    fn parses_minimal_config_file() -> TestResult {
        let yaml = indoc! {"
            package_id: 0x2a
            dashboard_object: 0xd
        "};

        let config: ClientConfig = serde_yaml::from_str(yaml)?;

        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.submission, SubmissionConfig::default());
        assert_eq!(config.submission.reset_delay, Duration::from_secs(3));
        assert_eq!(
            config.read_rpc_urls(None),
            vec![Network::Testnet.default_rpc_url()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn connects_to_the_first_reachable_url() -> TestResult {
        let urls = vec![
            "http://down.example".to_owned(),
            "http://up.example".to_owned(),
            "http://unused.example".to_owned(),
        ];
        let mut attempts = vec![];

        let connected = connect_to_first(urls, |rpc_url| {
            attempts.push(rpc_url.clone());
            async move {
                if rpc_url.contains("down") {
                    Err(SuiClientError::Internal(anyhow!("connection refused")))
                } else {
                    Ok(rpc_url)
                }
            }
        })
        .await?;

        assert_eq!(connected, "http://up.example");
        assert_eq!(attempts, ["http://down.example", "http://up.example"]);
        Ok(())
    }

    #[tokio::test]
    async fn reports_the_last_error_if_no_url_is_reachable() {
        let urls = vec!["http://a.example".to_owned(), "http://b.example".to_owned()];

        let result: SuiClientResult<()> = connect_to_first(urls, |rpc_url| async move {
            Err(SuiClientError::Internal(anyhow!("{rpc_url} is down")))
        })
        .await;

        let error = result.expect_err("no URL is reachable");
        assert!(error.to_string().contains("http://b.example is down"));
    }

    #[test]
    fn parses_multi_config_default_context() -> TestResult {
        let dir = TempDir::new()?;
        let filename = write_config(&dir, MULTI_CONFIG)?;

        let (config, context) = ClientConfig::load_from_multi_config(filename, None)?;

        assert_eq!(context.as_deref(), Some("testnet"));
        assert_eq!(config.network, Network::Testnet);
        Ok(())
    }

    #[test]
    fn parses_multi_config_specified_context() -> TestResult {
        let dir = TempDir::new()?;
        let filename = write_config(&dir, MULTI_CONFIG)?;

        let (config, context) = ClientConfig::load_from_multi_config(filename, Some("devnet"))?;

        assert_eq!(context.as_deref(), Some("devnet"));
        assert_eq!(config.network, Network::Devnet);
        assert_eq!(config.submission.reset_delay, Duration::from_secs(1));
        assert!(config.submission.wait_for_finality);
        assert_eq!(config.read_rpc_urls(None), vec!["http://localhost:9000"]);
        Ok(())
    }

    #[test]
    fn parses_multi_config_specified_erroneous_context() -> TestResult {
        let dir = TempDir::new()?;
        let filename = write_config(&dir, MULTI_CONFIG)?;

        let error = ClientConfig::load_from_multi_config(filename, Some("mainnet"))
            .expect_err("mainnet is not configured");

        assert!(error.to_string().contains("'devnet', 'testnet'"));
        Ok(())
    }

    #[test]
    fn parses_singleton_config_specified_erroneous_context() -> TestResult {
        let dir = TempDir::new()?;
        let filename = write_config(
            &dir,
            indoc! {"
                package_id: 0x2a
                dashboard_object: 0xd
            "},
        )?;

        let result = ClientConfig::load_from_multi_config(filename, Some("testnet"));
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn selects_the_context_of_a_network() -> TestResult {
        let dir = TempDir::new()?;
        let filename = write_config(
            &dir,
            &MULTI_CONFIG.replace("    devnet:\n", "    staging:\n"),
        )?;

        let (config, context) = ClientConfig::load_for_network(&filename, Network::Devnet)?;
        assert_eq!(context.as_deref(), Some("staging"));
        assert_eq!(config.network, Network::Devnet);

        let (_, context) = ClientConfig::load_for_network(&filename, Network::Testnet)?;
        assert_eq!(context.as_deref(), Some("testnet"));

        let error = ClientConfig::load_for_network(&filename, Network::Mainnet)
            .expect_err("mainnet is not configured");
        assert!(error.to_string().contains("[devnet, testnet]"));
        Ok(())
    }

    #[test]
    fn explicit_context_overrides_the_network() -> TestResult {
        let dir = TempDir::new()?;
        let filename = write_config(&dir, MULTI_CONFIG)?;

        let config = load_configuration(Some(&filename), Some("testnet"), Some(Network::Devnet))?;
        assert_eq!(config.network, Network::Testnet);

        let config = load_configuration(Some(&filename), None, Some(Network::Devnet))?;
        assert_eq!(config.network, Network::Devnet);
        Ok(())
    }

    #[test]
    fn singleton_config_must_match_the_network() -> TestResult {
        let dir = TempDir::new()?;
        let filename = write_config(
            &dir,
            indoc! {"
                network: devnet
                package_id: 0x2a
                dashboard_object: 0xd
            "},
        )?;

        assert!(ClientConfig::load_for_network(&filename, Network::Devnet).is_ok());
        assert!(ClientConfig::load_for_network(&filename, Network::Testnet).is_err());
        Ok(())
    }

    #[test]
    fn test_combine_rpc_urls() {
        let rpc_urls = vec![
            "http://localhost:2".to_string(),
            "http://localhost:1".to_string(),
            "http://localhost:2".to_string(),
        ];
        assert_eq!(
            combine_rpc_urls("http://localhost:1", &rpc_urls),
            vec!["http://localhost:1", "http://localhost:2"]
        );
    }

    #[test]
    fn network_selection_is_persisted() -> TestResult {
        let dir = TempDir::new()?;
        let store = NetworkSelectionStore::new(dir.path().join("nested").join("network.yaml"));

        assert_eq!(store.load()?, None);
        store.save(Network::Devnet)?;
        assert_eq!(store.load()?, Some(Network::Devnet));
        store.save(Network::Mainnet)?;
        assert_eq!(store.load()?, Some(Network::Mainnet));
        Ok(())
    }

    #[test]
    fn networks_parse_case_insensitively() -> TestResult {
        assert_eq!(" Localnet ".parse::<Network>()?, Network::Localnet);
        assert!("moonnet".parse::<Network>().is_err());
        Ok(())
    }
}
