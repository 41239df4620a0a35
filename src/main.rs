//! WP Monitor CLI - Check WordPress sites and email the report

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wp_monitor::{Args, Config, Endpoints, Monitor, SmtpNotifier, output_results};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    match run(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> wp_monitor::Result<()> {
    let config = Config::from_args(args)?;
    info!("Checking {} site(s)", config.sites.len());

    let monitor = Monitor::new(&config, Endpoints::default())?;
    let notifier = SmtpNotifier::new(config.smtp.clone(), config.recipients.clone());
    let summary = monitor.run(&notifier).await;

    if let Some(path) = &config.report_file {
        // The run already did its work; a failed copy is not fatal
        match std::fs::write(path, &summary.report) {
            Ok(()) => info!("Report written to {}", path.display()),
            Err(e) => error!("Failed to write report to {}: {}", path.display(), e),
        }
    }

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    output_results(&summary.results, config.output_format, &mut writer)?;

    Ok(())
}
