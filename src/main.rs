use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use chess_session::config::Cli;
use chess_session::models::SessionSnapshot;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_schema {
        let schema = schemars::schema_for!(SessionSnapshot);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    // stdout belongs to the board
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("chess_session=info".parse()?))
        .init();

    tracing::info!(engine = %cli.engine, "chess session starting");
    chess_session::app::run(cli)
}
