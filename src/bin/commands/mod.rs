pub mod config;
pub mod role;
pub mod serve;

/// Build the multi-threaded runtime used by async subcommands
pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create runtime: {}", e))
}
