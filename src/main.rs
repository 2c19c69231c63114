use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use epubcast::cli::Args;
use epubcast::config::{Config, TransportConfig};
use epubcast::feed::FeedFetcher;
use epubcast::services::{EpubWriter, Mailer, ReadableExtractor};
use epubcast::{App, CompileRequest, Delivery, Services, UnitOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version also come through here
            return if e.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(EnvFilter::from_default_env(), args.verbose))
        .with_writer(std::io::stderr)
        .init();

    if let Err(message) = args.validate() {
        eprintln!("error: {}", message);
        return ExitCode::from(1);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Warnings and errors only; `--verbose` raises this crate alone to debug.
fn log_filter(base: EnvFilter, verbose: bool) -> EnvFilter {
    let filter = base.add_directive(tracing::Level::WARN.into());
    if !verbose {
        return filter;
    }
    match "epubcast=debug".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.out_dir));

    let delivery = match &args.to {
        Some(_) => {
            let Some(path) = args
                .transport_config
                .clone()
                .or_else(|| config.transport_config.as_ref().map(PathBuf::from))
            else {
                bail!("--to needs a mail transport: pass --transport-config or set transport_config");
            };
            let transport = TransportConfig::load(&path)?;
            let sender = Mailer::from_config(&transport, args.transport)?;
            Some(Delivery {
                sender: Box::new(sender),
                from: transport.from,
            })
        }
        None => None,
    };

    let services = Services {
        feeds: Box::new(FeedFetcher::new(&config)?),
        extractor: Box::new(ReadableExtractor::new(&config)?),
        assembler: Box::new(EpubWriter),
        delivery,
    };

    let mut app = App::open(&out_dir, services)
        .with_context(|| format!("Failed to open cache in {}", out_dir.display()))?;

    if !args.urls.is_empty() {
        let report = match app.sync(&args.urls).await {
            Ok(report) => report,
            Err(e) => {
                // keep articles already fetched in this run
                app.close()?;
                return Err(anyhow::Error::new(e).context("Failed to sync sources"));
            }
        };
        println!(
            "Synced {} source(s): {} new article(s), {} already cached",
            args.urls.len(),
            report.added,
            report.unchanged + report.revived
        );
    }

    let request = CompileRequest {
        mode: args.mode.unwrap_or(config.default_mode),
        recipient: args.to.clone(),
        selection: args.selection(),
    };
    let compiled = app.compile(&request).await;
    app.close().context("Failed to save cache")?;
    let report = compiled.context("Failed to compile articles")?;

    if report.units.is_empty() {
        println!("No unsent articles");
    }
    for unit in &report.units {
        match &unit.outcome {
            UnitOutcome::Written => println!("Wrote {}", unit.file.display()),
            UnitOutcome::Sent => println!("Sent {} ({} article(s))", unit.title, unit.articles.len()),
            UnitOutcome::Failed(reason) => println!("Failed {}: {}", unit.title, reason),
        }
    }

    if report.failures() > 0 {
        bail!("{} of {} send(s) failed", report.failures(), report.units.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(verbose: bool) -> Vec<String> {
        log_filter(EnvFilter::new(""), verbose)
            .to_string()
            .split(',')
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_verbose_only_raises_own_crate() {
        let verbose = directives(true);
        assert!(verbose.contains(&"epubcast=debug".to_string()));
        assert!(verbose.contains(&"warn".to_string()));
        assert!(!verbose.contains(&"debug".to_string()));
    }

    #[test]
    fn test_default_is_warn() {
        assert_eq!(directives(false), vec!["warn".to_string()]);
    }
}
