mod app;
mod cli;
mod renderer;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use app::App;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    let app = App::new(args)?;
    app.run()?;

    Ok(())
}
