//! Proxy Probe CLI
//!
//! The `proxy-probe` command checks Windows nodes against the cluster proxy
//! configuration.
//!
//! ## Commands
//!
//! - `parse`: Decode a `Format-List` environment listing into JSON
//! - `check-env`: Compare node and service environments with the expected proxy
//! - `check-certs`: Check that a CA bundle was imported into each node's root store
//! - `gen-cert`: Print a fresh self-signed test certificate

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use node_exec::{generate_certificate, SshExecutor};
use proxy_probe_core::proxy::{wait_for_system_env, REQUIRED_SERVICES};
use proxy_probe_core::{
    parse_output, verify_bundle_imported, verify_nodes, CertCheck, PollSettings, ProxyEnv,
};

#[derive(Parser)]
#[command(name = "proxy-probe")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cluster proxy conformance checks for Windows nodes", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a `Format-List` environment listing and print it as JSON
    Parse {
        /// Listing file (default: stdin)
        file: Option<PathBuf>,
    },

    /// Check proxy variables on nodes, system-wide and per service
    CheckEnv {
        /// Node address (repeatable)
        #[arg(short, long = "address", required = true)]
        addresses: Vec<String>,

        /// Expected HTTP_PROXY
        #[arg(long, env = "HTTP_PROXY", default_value = "")]
        http_proxy: String,

        /// Expected HTTPS_PROXY
        #[arg(long, env = "HTTPS_PROXY", default_value = "")]
        https_proxy: String,

        /// Expected NO_PROXY
        #[arg(long, env = "NO_PROXY", default_value = "")]
        no_proxy: String,

        /// Service to check (repeatable, default: all required services)
        #[arg(short, long = "service")]
        services: Vec<String>,

        /// Wait for the system variables to converge before checking
        #[arg(long)]
        wait: bool,
    },

    /// Check that every certificate in a PEM bundle is in the node root store
    CheckCerts {
        /// Node address (repeatable)
        #[arg(short, long = "address", required = true)]
        addresses: Vec<String>,

        /// PEM bundle file
        #[arg(short, long)]
        bundle: PathBuf,
    },

    /// Print a new self-signed test certificate (PEM)
    GenCert,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    proxy_probe_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Parse { file } => cmd_parse(file.as_deref()),
        Commands::CheckEnv {
            addresses,
            http_proxy,
            https_proxy,
            no_proxy,
            services,
            wait,
        } => {
            let expected = ProxyEnv {
                http_proxy,
                https_proxy,
                no_proxy,
            };
            cmd_check_env(&addresses, &expected, &services, wait).await
        }
        Commands::CheckCerts { addresses, bundle } => cmd_check_certs(&addresses, &bundle).await,
        Commands::GenCert => cmd_gen_cert(),
    }
}

fn cmd_parse(file: Option<&Path>) -> Result<()> {
    let listing = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read listing: {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read listing from stdin")?;
            buf
        }
    };
    print_json(&parse_output(&listing))
}

async fn cmd_check_env(
    addresses: &[String],
    expected: &ProxyEnv,
    services: &[String],
    wait: bool,
) -> Result<()> {
    let executor = SshExecutor::from_env();
    let services: Vec<&str> = if services.is_empty() {
        REQUIRED_SERVICES.to_vec()
    } else {
        services.iter().map(String::as_str).collect()
    };

    if wait {
        let policy = PollSettings::from_env().node_policy()?;
        for address in addresses {
            wait_for_system_env(&executor, address, expected, &policy)
                .await
                .into_result(&format!("proxy variables on {address}"))?;
        }
    }

    let reports = verify_nodes(&executor, addresses, expected, &services).await;
    print_json(&reports)?;

    let dirty = reports.iter().filter(|r| !r.is_clean()).count();
    if dirty > 0 {
        for report in &reports {
            for mismatch in &report.mismatches {
                eprintln!("{}: {}", report.address, mismatch);
            }
            for failure in &report.failures {
                eprintln!("{}: {} unreadable: {}", report.address, failure.source, failure.error);
            }
        }
        anyhow::bail!("{} of {} nodes have incorrect proxy settings", dirty, reports.len());
    }
    info!(nodes = reports.len(), "proxy settings verified");
    Ok(())
}

#[derive(Serialize)]
struct NodeCertReport {
    address: String,
    checks: Vec<CertCheck>,
}

async fn cmd_check_certs(addresses: &[String], bundle: &Path) -> Result<()> {
    let bundle = std::fs::read_to_string(bundle)
        .with_context(|| format!("Failed to read CA bundle: {:?}", bundle))?;
    let executor = SshExecutor::from_env();

    let mut reports = Vec::new();
    for address in addresses {
        let checks = verify_bundle_imported(&executor, address, &bundle)
            .await
            .with_context(|| format!("Failed to check certificates on {address}"))?;
        reports.push(NodeCertReport {
            address: address.clone(),
            checks,
        });
    }
    print_json(&reports)?;

    let missing: usize = reports
        .iter()
        .map(|r| r.checks.iter().filter(|c| !c.imported()).count())
        .sum();
    if missing > 0 {
        anyhow::bail!("{} certificate imports missing or duplicated", missing);
    }
    Ok(())
}

fn cmd_gen_cert() -> Result<()> {
    let pem = generate_certificate().context("Failed to generate certificate")?;
    print!("{}", pem);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
