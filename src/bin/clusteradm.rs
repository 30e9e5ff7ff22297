use clap::{Parser, Subcommand};
use clusteradm::AdminConfig;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.clusteradm/clusteradm.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the administrative HTTP server
    Serve(commands::serve::ServeArgs),

    /// Show the effective configuration
    Config(commands::config::ConfigArgs),

    /// Ask a peer node for its replication role
    Role(commands::role::RoleArgs),
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    // `config --init` creates the file, so it must not require one to exist
    if let Commands::Config(args) = &cli.command {
        if args.init {
            let result = commands::config::init(cli.config.as_deref());
            exit_on_error(result);
            return;
        }
    }

    let config = match AdminConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::run(config, args),
        Commands::Config(_) => commands::config::run(&config, cli.config.as_deref()),
        Commands::Role(args) => commands::role::run(&config, args),
    };

    exit_on_error(result);
}

fn exit_on_error(result: anyhow::Result<()>) {
    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
