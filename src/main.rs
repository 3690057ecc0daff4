use clap::Parser;
use swagger_validator::cli::{run_cli, Cli};
use swagger_validator::logging::{init_logging_with_config, LogConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging_with_config(&LogConfig::from_env())?;
    run_cli(cli)
}
