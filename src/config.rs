use crate::peer::types::IceServerConfig;
use crate::utils::ice_servers_from_urls;
use anyhow::{bail, Context};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Parser)]
#[command(
    name = "ssc-signal",
    author,
    version,
    about = "Signaling server handing out WebRTC data channel offers over HTTP"
)]
pub struct Cli {
    /// Address the HTTP listener binds to.
    #[arg(long, env = "SSC_LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: String,

    /// ICE server URL; repeat for several. Bare `host:port` means STUN.
    #[arg(
        long = "ice-server",
        env = "SSC_ICE_SERVERS",
        value_delimiter = ',',
        default_value = DEFAULT_STUN_SERVER
    )]
    pub ice_servers: Vec<String>,

    /// Username for TURN servers.
    #[arg(long, env = "SSC_TURN_USERNAME")]
    pub turn_username: Option<String>,

    /// Credential for TURN servers.
    #[arg(long, env = "SSC_TURN_CREDENTIAL")]
    pub turn_credential: Option<String>,

    /// Upper bound on offer creation plus candidate gathering.
    #[arg(long, env = "SSC_NEGOTIATION_TIMEOUT_SECS", default_value_t = 10)]
    pub negotiation_timeout_secs: u64,

    /// Label of the data channel opened for every channel.
    #[arg(long, env = "SSC_DATA_CHANNEL_LABEL", default_value = "ssc-data")]
    pub data_channel_label: String,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, env = "SSC_LOG", default_value = "info")]
    pub log_filter: String,
}

/// Validated server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub ice_servers: Vec<IceServerConfig>,
    pub negotiation_timeout: Duration,
    pub data_channel_label: String,
    pub log_filter: String,
}

impl TryFrom<Cli> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let listen_addr: SocketAddr = cli
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", cli.listen_addr))?;

        if cli.negotiation_timeout_secs == 0 {
            bail!("negotiation timeout must be greater than zero");
        }
        if cli.data_channel_label.is_empty() {
            bail!("data channel label cannot be empty");
        }

        let ice_servers = ice_servers_from_urls(
            &cli.ice_servers,
            cli.turn_username.as_deref(),
            cli.turn_credential.as_deref(),
        );
        for server in &ice_servers {
            if server.is_turn() && (server.username.is_none() || server.credential.is_none()) {
                bail!(
                    "TURN server {} requires --turn-username and --turn-credential",
                    server.url
                );
            }
        }

        Ok(ServerConfig {
            listen_addr,
            ice_servers,
            negotiation_timeout: Duration::from_secs(cli.negotiation_timeout_secs),
            data_channel_label: cli.data_channel_label,
            log_filter: cli.log_filter,
        })
    }
}
