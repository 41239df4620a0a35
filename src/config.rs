//! Run configuration
//!
//! Every setting comes from the environment (the monitor runs unattended as
//! a scheduled job). The same settings are accepted as long flags for local
//! runs.

use crate::error::{Error, Result};
use crate::inspector::Site;
use crate::output::OutputFormat;
use chrono_tz::Tz;
use clap::Parser;
use lettre::message::Mailbox;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default SMTP submission port (STARTTLS)
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default pause between sites, in seconds
const DEFAULT_DELAY_SECS: u64 = 5;

/// Scheduled WordPress monitor - emails an HTML report of versions, SSL, malware, performance and uptime
#[derive(Parser, Debug, Default)]
#[command(name = "wp-monitor")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Comma-separated list of sites to check
    #[arg(long, env = "URLS")]
    pub urls: Option<String>,

    /// Comma-separated list of report recipients
    #[arg(long, env = "TO_EMAIL")]
    pub to_email: Option<String>,

    /// Shared secret sent to the sites' version-info.php
    #[arg(long, env = "GH_TOKEN", hide_env_values = true)]
    pub site_token: Option<String>,

    /// Envato API personal token
    #[arg(long, env = "ENVATO_API_KEY", hide_env_values = true)]
    pub envato_api_key: Option<String>,

    /// Google Safe Browsing API key
    #[arg(long, env = "SAFE_BROWSING_API_KEY", hide_env_values = true)]
    pub safe_browsing_api_key: Option<String>,

    /// Google PageSpeed Insights API key
    #[arg(long, env = "PAGE_SPEED_API_KEY", hide_env_values = true)]
    pub page_speed_api_key: Option<String>,

    /// SMTP server host
    #[arg(long, env = "SMTP_SERVER")]
    pub smtp_server: Option<String>,

    /// SMTP server port [default: 587]
    #[arg(long, env = "SMTP_PORT")]
    pub smtp_port: Option<String>,

    /// SMTP username
    #[arg(long, env = "SMTP_USER")]
    pub smtp_user: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Sender address of the report
    #[arg(long, env = "EMAIL_ADDRESS")]
    pub email_address: Option<String>,

    /// IANA timezone used for report timestamps
    #[arg(long, env = "REPORT_TIMEZONE", default_value = "Europe/Warsaw")]
    pub timezone: String,

    /// Pause between sites, in seconds [default: 5]
    #[arg(long, env = "CHECK_DELAY_SECS")]
    pub delay_secs: Option<String>,

    /// Console summary format (human, json, none)
    #[arg(long, env = "OUTPUT_FORMAT", default_value = "human")]
    pub output_format: String,

    /// Also write the HTML report to this file
    #[arg(long, env = "REPORT_FILE")]
    pub report_file: Option<PathBuf>,
}

/// SMTP transport settings
///
/// All optional: a missing value only fails the final delivery.
#[derive(Debug, Clone, Default)]
pub struct SmtpSettings {
    /// Server host
    pub server: Option<String>,
    /// Server port
    pub port: u16,
    /// Login username
    pub user: Option<String>,
    /// Login password
    pub password: Option<String>,
    /// Sender address
    pub from: Option<String>,
}

/// Validated configuration for a run
#[derive(Debug, Clone)]
pub struct Config {
    /// Sites to check, in order
    pub sites: Vec<Site>,
    /// Report recipients
    pub recipients: Vec<Mailbox>,
    /// Site auth header value
    pub site_token: Option<String>,
    /// Envato bearer token
    pub envato_token: Option<String>,
    /// Safe Browsing API key
    pub safe_browsing_key: Option<String>,
    /// PageSpeed API key
    pub pagespeed_key: Option<String>,
    /// Mail transport
    pub smtp: SmtpSettings,
    /// Reporting timezone
    pub timezone: Tz,
    /// Pause between sites
    pub delay: Duration,
    /// Console summary format
    pub output_format: OutputFormat,
    /// Optional copy of the HTML report on disk
    pub report_file: Option<PathBuf>,
}

/// Treat unset and empty values alike (CI secrets expand to "")
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma-separated list, rejecting empty entries
fn split_list(value: &str, setting: &'static str) -> Result<Vec<String>> {
    let items: Vec<String> = value.split(',').map(|s| s.trim().to_string()).collect();
    if items.iter().any(|s| s.is_empty()) {
        return Err(Error::MissingSetting(setting));
    }
    Ok(items)
}

/// Parse an optional numeric setting; blank falls back to `default`
fn number_or<T: std::str::FromStr>(
    value: Option<String>,
    setting: &'static str,
    default: T,
) -> Result<T> {
    match non_empty(value) {
        Some(v) => v.parse().map_err(|_| Error::InvalidNumber(setting, v)),
        None => Ok(default),
    }
}

/// SMTP port; an unparsable value falls back to the default with a warning
fn smtp_port(value: Option<String>) -> u16 {
    number_or(value, "SMTP_PORT", DEFAULT_SMTP_PORT).unwrap_or_else(|e| {
        warn!("{}, using {}", e, DEFAULT_SMTP_PORT);
        DEFAULT_SMTP_PORT
    })
}

impl Config {
    /// Validate parsed arguments into a run configuration
    pub fn from_args(args: Args) -> Result<Self> {
        let urls = non_empty(args.urls).ok_or(Error::MissingSetting("URLS"))?;
        let sites = split_list(&urls, "URLS")?
            .iter()
            .map(|url| Site::parse(url))
            .collect::<Result<Vec<_>>>()?;

        let to_email = non_empty(args.to_email).ok_or(Error::MissingSetting("TO_EMAIL"))?;
        let recipients = split_list(&to_email, "TO_EMAIL")?
            .into_iter()
            .map(|addr| {
                addr.parse::<Mailbox>()
                    .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let timezone = args
            .timezone
            .parse::<Tz>()
            .map_err(|_| Error::InvalidTimezone(args.timezone.clone()))?;

        Ok(Self {
            sites,
            recipients,
            site_token: non_empty(args.site_token),
            envato_token: non_empty(args.envato_api_key),
            safe_browsing_key: non_empty(args.safe_browsing_api_key),
            pagespeed_key: non_empty(args.page_speed_api_key),
            smtp: SmtpSettings {
                server: non_empty(args.smtp_server),
                port: smtp_port(args.smtp_port),
                user: non_empty(args.smtp_user),
                password: non_empty(args.smtp_password),
                from: non_empty(args.email_address),
            },
            timezone,
            delay: Duration::from_secs(number_or(
                args.delay_secs,
                "CHECK_DELAY_SECS",
                DEFAULT_DELAY_SECS,
            )?),
            output_format: args.output_format.parse()?,
            report_file: args.report_file,
        })
    }
}
