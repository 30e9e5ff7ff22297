use clap::Args;
use clusteradm::{start_server, AdminConfig, Dispatcher};

/// Arguments for the Serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind to (overrides `listen_address`)
    #[clap(long)]
    pub address: Option<String>,

    /// Port to listen on (overrides `listen_port`)
    #[clap(long)]
    pub port: Option<u16>,
}

pub fn run(mut config: AdminConfig, args: ServeArgs) -> anyhow::Result<()> {
    let ServeArgs { address, port } = args;

    if let Some(address) = address {
        config.listen_address = address;
    }
    if let Some(port) = port {
        config.listen_port = port;
    }

    tracing::debug!("effective configuration:\n{}", config.summary());

    let dispatcher = Dispatcher::from_config(&config);
    let bind_address = config.bind_address();

    super::runtime()?.block_on(start_server(dispatcher, &bind_address))
}
