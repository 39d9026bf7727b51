use clap::Parser;
use tracing::Level;

use steward::cli::{self, Cli, Commands};
use steward::config::StewardConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let is_hook = matches!(cli.command, Commands::Hook);

    let config = match cli.load_config() {
        Ok(config) => config,
        // A hook must still answer, so fall back to defaults.
        Err(e) if is_hook => {
            eprintln!("steward: {}; using default config", e);
            let mut config = StewardConfig::default();
            cli.apply_overrides(&mut config);
            config
        }
        Err(e) => return Err(e.into()),
    };

    let level = config.log_level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::run(cli, config))?;
    Ok(())
}
