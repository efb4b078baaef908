//! pkgdoc CLI - resolve Go import paths to documentation.

use anyhow::{Context, Result};
use clap::Parser;
use pkgdoc_core::{Config, DocService, FetchContext, valid_remote_path};
use std::io::{self, Write};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod output;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;

    execute_command(cli.command, &config).await
}

fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Cancel `ctx` on Ctrl-C so in-flight requests stop together.
fn cancel_on_interrupt(ctx: &FetchContext) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctx.cancel();
        }
    });
}

async fn execute_command(command: Commands, config: &Config) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match command {
        Commands::Get {
            import_path,
            json,
            timeout,
        } => {
            let docs = DocService::from_config(config)?;
            let ctx = timeout.map_or_else(FetchContext::new, |secs| {
                FetchContext::with_timeout(Duration::from_secs(secs))
            });
            cancel_on_interrupt(&ctx);

            let page = match docs.get_doc(&ctx, &import_path).await {
                Ok(page) => page,
                Err(_) if ctx.is_cancelled() => anyhow::bail!("interrupted"),
                Err(e) => {
                    return Err(e).with_context(|| format!("getting documentation for {import_path}"));
                },
            };
            if json {
                serde_json::to_writer_pretty(&mut stdout, &page.package)?;
                writeln!(stdout)?;
            } else {
                output::write_page(&mut stdout, &page)?;
            }
        },
        Commands::Check { import_paths } => {
            let mut invalid = 0;
            for path in &import_paths {
                let valid = pkgdoc_core::is_standard_package(path) || valid_remote_path(path);
                if !valid {
                    invalid += 1;
                }
                writeln!(stdout, "{}\t{path}", if valid { "ok" } else { "invalid" })?;
            }
            if invalid > 0 {
                anyhow::bail!("{invalid} of {} import paths are invalid", import_paths.len());
            }
        },
        Commands::Index { json } => {
            let docs = DocService::from_config(config)?;
            let index = docs.package_index().await?;
            if json {
                serde_json::to_writer_pretty(
                    &mut stdout,
                    &serde_json::json!({
                        "packages": index.packages,
                        "commands": index.commands,
                    }),
                )?;
                writeln!(stdout)?;
            } else {
                output::write_index(&mut stdout, &index)?;
            }
        },
        Commands::Reload { import_path } => {
            let docs = DocService::from_config(config)?;
            docs.reload(&import_path).await?;
            writeln!(stdout, "Reloaded {import_path}")?;
        },
    }
    Ok(())
}
