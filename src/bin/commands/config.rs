use clap::Args;
use clusteradm::AdminConfig;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Write a commented template to the config file path if none exists
    #[clap(long)]
    pub init: bool,
}

fn config_path(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(AdminConfig::default_config_path)
}

pub fn init(explicit: Option<&str>) -> anyhow::Result<()> {
    let path = config_path(explicit)
        .ok_or_else(|| anyhow::anyhow!("No home directory found; pass --config"))?;
    AdminConfig::write_template(&path)?;
    println!("Configuration template written to {}", path);
    Ok(())
}

pub fn run(config: &AdminConfig, explicit: Option<&str>) -> anyhow::Result<()> {
    println!(
        "Config File:        {}",
        config_path(explicit).as_deref().unwrap_or("(none)")
    );
    println!("{}", config.summary());
    Ok(())
}
