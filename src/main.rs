use anyhow::Context;
use clap::Parser;
use portsweep::cli::Args;
use portsweep::logging;
use portsweep::output;
use portsweep::scanner::Scanner;
use portsweep::types::{expand_addresses, expand_ports};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = args.settings().context("failed to load settings")?;
    let log = logging::init(&args.log_config(&settings)).context("failed to open log file")?;
    let config = args.scan_config(&settings);
    let format = args.output_format(&settings);

    let addresses = expand_addresses(&args.host)
        .await
        .with_context(|| format!("invalid host '{}'", args.host))?;
    let ports = expand_ports(&args.ports)
        .with_context(|| format!("invalid ports '{}'", args.ports))?;

    info!(
        addresses = addresses.len(),
        ports = ports.len(),
        scan_type = %config.scan_type,
        "scan configured"
    );

    let mut scanner = Scanner::new(addresses, ports, config, log)?;
    scanner.start()?;
    scanner.scan().await?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    scanner.report(format, &mut out)?;
    out.flush()?;

    scanner.stop()?;
    Ok(())
}
