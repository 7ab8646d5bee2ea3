//! CLI for this application
//!
use std::path::PathBuf;
use std::time::Duration;

use crate::config_error;
use crate::error::Result;
use crate::node::{default_output_file, default_registry_file, NodeAddress};
use crate::settings::{self, FailurePolicy, LogFormat, NodeSettings, PeerSettings, SeedSettings};

#[derive(Clone, Debug, clap::Parser)]
#[command(name = settings::APP_NAME, version = settings::APP_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    // Log output format
    #[clap(
        long,
        global = true,
        default_value = "text",
        env("RUMOR_LOG_FORMAT"),
        help = "Log format: 'text' or 'json'"
    )]
    pub log_format: LogFormat,
}

#[derive(Clone, Debug, clap::Subcommand)]
pub enum Command {
    /// Run a seed node that bootstraps peer membership
    Seed(SeedArgs),
    /// Run a peer node that gossips and detects failed peers
    Peer(PeerArgs),
}

/// Options shared by both roles
#[derive(Clone, Debug, clap::Args)]
pub struct CommonArgs {
    // TCP port for protocol traffic
    #[clap(long, env("RUMOR_PORT"), help = "Port to bind the protocol listener to")]
    pub port: u16,

    // Advertised host
    #[clap(
        long,
        default_value = settings::DEFAULT_HOST,
        env("RUMOR_HOST"),
        help = "Host other nodes use to reach this node"
    )]
    pub host: String,

    // Server listen address
    #[clap(
        long,
        default_value = settings::DEFAULT_LISTEN_ADDRESS,
        env("RUMOR_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // Shared seed list
    #[clap(
        long,
        default_value = settings::DEFAULT_SEED_CONFIG,
        env("RUMOR_SEED_CONFIG"),
        help = "Seed list file (one host:port per line)"
    )]
    pub seed_config: PathBuf,

    // Event log
    #[clap(
        long,
        env("RUMOR_OUTPUT_FILE"),
        help = "Event log file [default: output_<port>.txt]"
    )]
    pub output_file: Option<PathBuf>,

    // HTTP API listen port
    #[clap(
        long,
        env("RUMOR_HTTP_PORT"),
        help = "Port to bind the HTTP status API to; disabled when absent"
    )]
    pub http_port: Option<u16>,

    #[clap(
        long,
        default_value_t = settings::IO_TIMEOUT_MS,
        env("RUMOR_IO_TIMEOUT_MS"),
        help = "Timeout for each connect, send and receive in milliseconds"
    )]
    pub io_timeout_ms: u64,
}

impl CommonArgs {
    fn validate(&self) -> Result<()> {
        NodeAddress::validate_host(&self.host)
            .map_err(|e| config_error!("Invalid --host {:?}: {}", self.host, e))?;
        if self.io_timeout_ms == 0 {
            return Err(config_error!("--io-timeout-ms must be positive"));
        }
        Ok(())
    }

    fn output_file(&self) -> PathBuf {
        self.output_file
            .clone()
            .unwrap_or_else(|| default_output_file(self.port))
    }
}

#[derive(Clone, Debug, clap::Args)]
pub struct SeedArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    // Durable registry
    #[clap(
        long,
        env("RUMOR_REGISTRY_FILE"),
        help = "Registry snapshot file [default: peerslist_<port>.txt]"
    )]
    pub registry_file: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::Args)]
pub struct PeerArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    // Seeds in addition to the seed list
    #[clap(
        long = "seed",
        env("RUMOR_SEEDS"),
        value_delimiter = ',',
        help = "Seed address host:port; may be repeated"
    )]
    pub seeds: Vec<NodeAddress>,

    #[clap(
        long,
        default_value = "cumulative",
        env("RUMOR_FAILURE_POLICY"),
        help = "failure-policy: 'cumulative' or 'consecutive'"
    )]
    pub failure_policy: FailurePolicy,

    #[clap(
        long,
        default_value_t = settings::GOSSIP_MESSAGE_COUNT,
        env("RUMOR_GOSSIP_COUNT"),
        help = "Number of generated gossip messages; 0 disables the generator"
    )]
    pub gossip_count: usize,

    #[clap(
        long,
        default_value_t = settings::GOSSIP_INTERVAL_SECS,
        env("RUMOR_GOSSIP_INTERVAL_SECS"),
        help = "Seconds between generated gossip messages"
    )]
    pub gossip_interval_secs: u64,

    #[clap(
        long,
        default_value_t = settings::PROBE_PERIOD_SECS,
        env("RUMOR_PROBE_PERIOD_SECS"),
        help = "Seconds between liveness probe rounds"
    )]
    pub probe_period_secs: u64,

    #[clap(
        long,
        default_value_t = settings::PROBE_DELAY_SECS,
        env("RUMOR_PROBE_DELAY_SECS"),
        help = "Seconds before the first liveness probe round"
    )]
    pub probe_delay_secs: u64,

    #[clap(
        long,
        env("RUMOR_NO_ADOPT_PROBING_PEERS"),
        help = "Do not add unknown peers that send liveness requests"
    )]
    pub no_adopt_probing_peers: bool,
}

impl Cli {
    pub fn into_settings(self) -> Result<NodeSettings> {
        match self.command {
            Command::Seed(args) => args.into_settings().map(NodeSettings::Seed),
            Command::Peer(args) => args.into_settings().map(NodeSettings::Peer),
        }
    }
}

impl SeedArgs {
    pub fn into_settings(self) -> Result<SeedSettings> {
        self.common.validate()?;
        let mut settings = SeedSettings::new(self.common.host.clone(), self.common.port);
        settings.listen_address = self.common.listen_address.clone();
        settings.seed_config = Some(self.common.seed_config.clone());
        settings.output_file = Some(self.common.output_file());
        settings.http_port = self.common.http_port;
        settings.io_timeout = Duration::from_millis(self.common.io_timeout_ms);
        settings.registry_file = Some(
            self.registry_file
                .unwrap_or_else(|| default_registry_file(self.common.port)),
        );
        Ok(settings)
    }
}

impl PeerArgs {
    pub fn into_settings(self) -> Result<PeerSettings> {
        self.common.validate()?;
        // probers are identified by the IP their connection comes from
        if self.common.host.parse::<std::net::IpAddr>().is_err() {
            return Err(config_error!(
                "Peer --host must be an IP address, got {:?}",
                self.common.host
            ));
        }
        if self.probe_period_secs == 0 {
            return Err(config_error!("--probe-period-secs must be positive"));
        }
        if self.gossip_count > 0 && self.gossip_interval_secs == 0 {
            return Err(config_error!("--gossip-interval-secs must be positive"));
        }

        let mut settings = PeerSettings::new(self.common.host.clone(), self.common.port);
        settings.listen_address = self.common.listen_address.clone();
        settings.seeds = self.seeds;
        settings.seed_config = Some(self.common.seed_config.clone());
        settings.output_file = Some(self.common.output_file());
        settings.http_port = self.common.http_port;
        settings.io_timeout = Duration::from_millis(self.common.io_timeout_ms);
        settings.failure_policy = self.failure_policy;
        settings.adopt_probing_peers = !self.no_adopt_probing_peers;
        settings.gossip_count = self.gossip_count;
        settings.gossip_interval = Duration::from_secs(self.gossip_interval_secs);
        settings.probe_period = Duration::from_secs(self.probe_period_secs);
        settings.probe_delay = Duration::from_secs(self.probe_delay_secs);
        Ok(settings)
    }
}
