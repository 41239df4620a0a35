//! Sequential monitoring run over all configured sites

use crate::checks::{
    CertificateProbe, HealthChecker, PAGESPEED_API_BASE, SAFE_BROWSING_API_BASE, TLS_PORT,
    classify_expiry,
};
use crate::config::Config;
use crate::directory::{DirectoryClient, WP_API_BASE};
use crate::error::Result;
use crate::inspector::{Inspector, Site, http_client};
use crate::marketplace::{ENVATO_API_BASE, MarketplaceClient};
use crate::notifier::Notifier;
use crate::report::{CheckResult, NOT_AVAILABLE, REPORT_SUBJECT, build_report};
use chrono::Utc;
use chrono_tz::Tz;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Date format of the SSL expiry column
const EXPIRY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp format of the checked-at column
const CHECKED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// External API locations
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// WordPress.org API base
    pub directory: String,
    /// Envato API base
    pub marketplace: String,
    /// Safe Browsing API base
    pub safe_browsing: String,
    /// PageSpeed Insights API base
    pub pagespeed: String,
    /// Port probed for certificates
    pub tls_port: u16,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            directory: WP_API_BASE.to_string(),
            marketplace: ENVATO_API_BASE.to_string(),
            safe_browsing: SAFE_BROWSING_API_BASE.to_string(),
            pagespeed: PAGESPEED_API_BASE.to_string(),
            tls_port: TLS_PORT,
        }
    }
}

/// Outcome of a complete run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One result per site, in configuration order
    pub results: Vec<CheckResult>,
    /// Rendered HTML report
    pub report: String,
    /// Whether the report email was delivered
    pub delivered: bool,
}

/// Drives inspection and health checks across sites
#[derive(Debug)]
pub struct Monitor {
    sites: Vec<Site>,
    inspector: Inspector,
    checker: HealthChecker,
    timezone: Tz,
    delay: Duration,
}

impl Monitor {
    /// Create a monitor for the configured sites
    pub fn new(config: &Config, endpoints: Endpoints) -> Result<Self> {
        let client = http_client()?;

        let inspector = Inspector::new(
            client.clone(),
            DirectoryClient::new(client.clone(), endpoints.directory),
            MarketplaceClient::new(
                client.clone(),
                endpoints.marketplace,
                config.envato_token.clone(),
            ),
            config.site_token.clone(),
        );
        let checker = HealthChecker::new(
            client,
            config.safe_browsing_key.clone(),
            config.pagespeed_key.clone(),
        )
        .with_api_bases(endpoints.safe_browsing, endpoints.pagespeed)
        .with_tls_port(endpoints.tls_port);

        Ok(Self {
            sites: config.sites.clone(),
            inspector,
            checker,
            timezone: config.timezone,
            delay: config.delay,
        })
    }

    /// Check one site
    pub async fn check_site(&self, site: &Site) -> CheckResult {
        info!(site = %site, "Processing URL: {}", site);

        let inventory = self.inspector.inspect(site).await;

        let probe = self.checker.check_certificate(site.host()).await;
        let ssl_expiry_severity = classify_expiry(&probe, Utc::now());
        let ssl_expiry_date = match &probe {
            CertificateProbe::Valid { expires_at } => expires_at
                .with_timezone(&self.timezone)
                .format(EXPIRY_DATE_FORMAT)
                .to_string(),
            CertificateProbe::Invalid { .. } => NOT_AVAILABLE.to_string(),
        };

        let performance_score = self.checker.performance_score(site.url()).await;
        let malware_status = self.checker.scan_for_malware(site.url()).await;
        let uptime_status = self.checker.check_uptime(site.url()).await;

        let checked_at = Utc::now()
            .with_timezone(&self.timezone)
            .format(CHECKED_AT_FORMAT)
            .to_string();

        CheckResult {
            url: site.url().to_string(),
            php_version: inventory.php_version,
            wp_version: inventory.wp_version,
            plugins: inventory.plugins,
            themes: inventory.themes,
            performance_score,
            malware_status,
            ssl_valid: probe.is_valid(),
            ssl_expiry_date,
            ssl_expiry_severity,
            uptime_status,
            checked_at,
        }
    }

    /// Check every site in order, pausing between sites
    pub async fn check_all(&self) -> Vec<CheckResult> {
        paced(&self.sites, self.delay, |site| self.check_site(site)).await
    }

    /// Check every site, build the report and hand it to the notifier
    ///
    /// A delivery failure is logged and reported in the summary, never
    /// returned as an error.
    pub async fn run<N: Notifier>(&self, notifier: &N) -> RunSummary {
        let results = self.check_all().await;
        let report = build_report(&results);

        let delivered = match notifier.send(REPORT_SUBJECT, &report).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send email: {}", e);
                false
            }
        };

        RunSummary {
            results,
            report,
            delivered,
        }
    }
}

/// Run `check` on each item in order, sleeping `delay` between items
///
/// No pause before the first item or after the last one.
async fn paced<I, F, Fut>(items: I, delay: Duration, mut check: F) -> Vec<Fut::Output>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future,
{
    let mut results = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        results.push(check(item).await);
    }
    results
}
