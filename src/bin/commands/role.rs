use clap::Args;
use clusteradm::{AdminConfig, PeerRoleProber, RoleProbe};
use std::net::IpAddr;

/// Arguments for the Role command
#[derive(Args)]
pub struct RoleArgs {
    /// Private address of the peer node, e.g. fdaa:0:1:a7b::2
    #[clap(value_name = "ADDRESS")]
    pub address: IpAddr,
}

pub fn run(config: &AdminConfig, args: RoleArgs) -> anyhow::Result<()> {
    let RoleArgs { address } = args;

    let prober = PeerRoleProber::new(config.probe_timeout);
    let role = super::runtime()?.block_on(prober.probe(address))?;
    println!("{}", role);
    Ok(())
}
