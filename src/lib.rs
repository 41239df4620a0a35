//! WP Monitor - Scheduled WordPress site monitoring
//!
//! Collects installed versions, certificate expiry, malware verdicts,
//! performance scores and uptime for a list of WordPress sites and emails a
//! consolidated HTML report.
//!
//! # Example
//!
//! ```no_run
//! use wp_monitor::{Args, Config, Endpoints, Monitor, SmtpNotifier};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> wp_monitor::Result<()> {
//!     let config = Config::from_args(Args::parse())?;
//!     let monitor = Monitor::new(&config, Endpoints::default())?;
//!     let notifier = SmtpNotifier::new(config.smtp.clone(), config.recipients.clone());
//!     let summary = monitor.run(&notifier).await;
//!     println!("checked {} sites", summary.results.len());
//!     Ok(())
//! }
//! ```

pub mod checks;
pub mod config;
pub mod directory;
pub mod error;
pub mod inspector;
pub mod marketplace;
pub mod monitor;
pub mod notifier;
pub mod output;
pub mod report;
pub mod slug;

pub use checks::{
    CertificateProbe, HealthChecker, MalwareStatus, PerformanceScore, Severity, UptimeStatus,
};
pub use config::{Args, Config, SmtpSettings};
pub use directory::{DirectoryClient, ItemKind, Lookup};
pub use error::{Error, Result};
pub use inspector::{Component, Inspector, Inventory, Site};
pub use marketplace::MarketplaceClient;
pub use monitor::{Endpoints, Monitor, RunSummary};
pub use notifier::{Notifier, SmtpNotifier};
pub use output::{OutputFormat, output_results};
pub use report::{CheckResult, ComponentStatus, build_report};
