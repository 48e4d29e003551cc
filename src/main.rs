//! CLI entry point for the Socket API client.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use futures_util::StreamExt;
use socket_sdk::types::FullScanParams;
use socket_sdk::{ApiResult, ApiValue, BatchStreamOptions, ClientOptions, SocketClient};
use tracing::{debug, info, warn};

mod cli;
mod progress;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(command = ?args.command, "CLI arguments parsed");

    let client = build_client(&args)?;

    match args.command {
        Command::Quota => {
            let quota = expect_success(client.get_quota().await)?;
            println!("{}", quota.quota);
        }
        Command::Orgs => {
            let response = expect_success(client.get_organizations().await)?;
            for (id, org) in &response.organizations {
                let slug = org.slug.as_deref().unwrap_or(id);
                match org.name.as_deref() {
                    Some(name) => println!("{slug}\t{name}"),
                    None => println!("{slug}"),
                }
            }
        }
        Command::Purl {
            purls,
            chunk_size,
            concurrency,
            alerts,
        } => {
            run_purl(&client, purls, chunk_size, concurrency, alerts, args.quiet).await?;
        }
        Command::Scan {
            org,
            files,
            repo,
            branch,
            base_path,
        } => {
            let base_path = match base_path {
                Some(path) => path,
                None => std::env::current_dir().context("failed to resolve current directory")?,
            };
            let mut params = FullScanParams::new(repo);
            params.branch = branch;
            run_scan(&client, &org, &files, &base_path, &params).await?;
        }
    }

    Ok(())
}

fn build_client(args: &Args) -> Result<SocketClient> {
    let Some(token) = args.api_token.as_deref() else {
        bail!("API token is required: pass --api-token or set SOCKET_API_TOKEN");
    };

    let mut options = ClientOptions::default()
        .timeout(Duration::from_millis(args.timeout_ms))
        .retries(args.retries)
        .retry_delay(Duration::from_millis(args.retry_delay_ms))
        .cache(args.cache);
    if let Some(base_url) = &args.base_url {
        options = options.base_url(base_url.clone());
    }

    SocketClient::with_options(token, options).context("invalid client configuration")
}

/// Converts a failed call into an error carrying the full message and cause.
fn expect_success<T>(result: ApiResult<T>) -> Result<T> {
    result.into_result().map_err(|error| anyhow!(error.report()))
}

async fn run_purl(
    client: &SocketClient,
    purls: Vec<String>,
    chunk_size: u16,
    concurrency: u8,
    alerts: bool,
    quiet: bool,
) -> Result<()> {
    let chunk_size = usize::from(chunk_size);
    let total = purls.len();
    let bar = progress::chunk_progress(quiet, progress::chunk_count(total, chunk_size));

    let mut options = BatchStreamOptions {
        chunk_size,
        concurrency: usize::from(concurrency),
        ..BatchStreamOptions::default()
    };
    if alerts {
        options.query.push(("alerts".to_string(), "true".to_string()));
    }

    let mut stream = std::pin::pin!(client.batch_package_stream(purls, options));
    let mut artifacts = 0usize;
    let mut failures = 0usize;
    while let Some(result) = stream.next().await {
        bar.inc(1);
        match result {
            ApiResult::Success { data, .. } => {
                for artifact in data {
                    artifacts += 1;
                    let line = match &artifact {
                        ApiValue::Known(known) => serde_json::to_string(known)?,
                        ApiValue::Opaque(value) => value.to_string(),
                    };
                    bar.suspend(|| println!("{line}"));
                }
            }
            ApiResult::Error(error) => {
                failures += 1;
                bar.suspend(|| eprintln!("{}", error.report()));
            }
        }
    }
    bar.finish_and_clear();

    info!(components = total, artifacts, failures, "package analysis complete");
    if failures > 0 {
        bail!("{failures} package batch request(s) failed");
    }
    Ok(())
}

async fn run_scan(
    client: &SocketClient,
    org: &str,
    files: &[PathBuf],
    base_path: &std::path::Path,
    params: &FullScanParams,
) -> Result<()> {
    let scan = expect_success(
        client
            .create_org_full_scan(org, files, base_path, params)
            .await,
    )?;
    match scan {
        ApiValue::Known(scan) => {
            info!(id = %scan.id, "full scan created");
            match scan.html_report_url {
                Some(url) => println!("{}\t{url}", scan.id),
                None => println!("{}", scan.id),
            }
        }
        ApiValue::Opaque(value) => {
            warn!("full scan response had an unrecognized shape");
            println!("{value}");
        }
    }
    Ok(())
}
