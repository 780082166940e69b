use anyhow::{Context, Result};
use clap::Parser;
use prompt_context_cli::cli::{Cli, Commands};
use prompt_context_cli::repl::Repl;
use prompt_context_cli::{render, CancelSlot, PctxConfig, Session};
use std::io::{self, Write};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PctxConfig::load(cli.config.as_deref())?.with_working_dir(cli.working_dir);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with_writer(io::stderr)
        .init();
    for warning in &config.warnings {
        warn!("{warning}");
    }

    let cancel = CancelSlot::default();
    let worker = {
        let cancel = cancel.clone();
        let command = cli.command.unwrap_or(Commands::Repl);
        tokio::task::spawn_blocking(move || run(config, command, cancel))
    };
    tokio::pin!(worker);

    // Ctrl-C aborts the running diff, not the process
    loop {
        tokio::select! {
            done = &mut worker => return done.context("pctx worker panicked")?,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("interrupt received, cancelling running diff");
                cancel.cancel();
            }
        }
    }
}

/// Everything touching the single-threaded manager runs here
fn run(config: PctxConfig, command: Commands, cancel: CancelSlot) -> Result<()> {
    match command {
        Commands::Render { input } => {
            let items = render::read_items(&input)?;
            let out = render::render_items(&config, &items, cancel.current());
            let mut stdout = io::stdout().lock();
            stdout.write_all(out.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
        Commands::Repl => {
            info!(working_dir = %config.working_dir().display(), "pctx starting");
            let session = Session::new(&config);
            let repl = Repl::new(&session.manager, cancel);
            repl.run(io::stdin().lock(), io::stdout())
        }
    }
}
