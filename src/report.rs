//! HTML report for a monitoring run
//!
//! Rendering is a pure function of the finished results; no I/O happens here.

use crate::checks::{MalwareStatus, PerformanceScore, Severity, UptimeStatus};
use crate::inspector::{Component, UNKNOWN};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Subject line of the report email
pub const REPORT_SUBJECT: &str = "Installed PHP, WordPress & Plugins Version Check Results";

/// Latest-version cell color when an update is available
const UPDATE_COLOR: &str = "#E67E22";

/// Shown for the expiry date of an invalid certificate
pub const NOT_AVAILABLE: &str = "N/A";

const TABLE_OPEN: &str = "<table border='1' style='border-collapse: collapse; width: 100%;'>";
const CELL_STYLE: &str = "padding: 8px; text-align: center;";

/// Compare two version strings semantically
/// Returns Ordering::Greater if current > latest (ahead/dev version)
/// Returns Ordering::Less if current < latest (outdated)
/// Returns Ordering::Equal if they match
pub fn compare_versions(current: &str, latest: &str) -> Ordering {
    // Parse version parts, handling alpha/beta/rc suffixes
    fn parse_version(v: &str) -> (Vec<u64>, bool) {
        let pos = v.find(|c: char| c == '-' || c.is_ascii_alphabetic());
        let version_part = match pos {
            Some(p) => &v[..p],
            None => v,
        };
        let has_suffix = pos.is_some();

        let parts: Vec<u64> = version_part
            .split('.')
            .filter_map(|p| p.parse().ok())
            .collect();

        (parts, has_suffix)
    }

    let (current_parts, current_has_suffix) = parse_version(current.trim());
    let (latest_parts, latest_has_suffix) = parse_version(latest.trim());

    let max_len = current_parts.len().max(latest_parts.len());
    for i in 0..max_len {
        let c = current_parts.get(i).copied().unwrap_or(0);
        let l = latest_parts.get(i).copied().unwrap_or(0);
        match c.cmp(&l) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    // 7.0 > 7.0-beta
    match (current_has_suffix, latest_has_suffix) {
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Update state of an installed component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// Installed version is the latest (or newer)
    UpToDate,
    /// Latest version could not be resolved
    Unresolved,
    /// A newer version is available
    UpdateAvailable,
}

impl ComponentStatus {
    /// Classify a component by its installed and latest versions
    pub fn of(component: &Component) -> Self {
        if component.latest_version == UNKNOWN {
            Self::Unresolved
        } else if update_available(&component.installed_version, &component.latest_version) {
            Self::UpdateAvailable
        } else {
            Self::UpToDate
        }
    }
}

/// Whether `latest` is a known version newer than `installed`
pub fn update_available(installed: &str, latest: &str) -> bool {
    latest != UNKNOWN
        && installed != UNKNOWN
        && compare_versions(installed, latest) == Ordering::Less
}

/// Everything collected for one site
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Normalized site URL
    pub url: String,
    /// PHP version (or "Unknown")
    pub php_version: String,
    /// WordPress version (or "Unknown")
    pub wp_version: String,
    /// Installed plugins
    pub plugins: Vec<Component>,
    /// Installed themes
    pub themes: Vec<Component>,
    /// PageSpeed performance score
    pub performance_score: PerformanceScore,
    /// Safe Browsing verdict
    pub malware_status: MalwareStatus,
    /// Whether the TLS handshake succeeded
    pub ssl_valid: bool,
    /// Certificate expiry date in the reporting timezone, or "N/A"
    pub ssl_expiry_date: String,
    /// Expiry classification
    pub ssl_expiry_severity: Severity,
    /// Reachability of the site root
    pub uptime_status: UptimeStatus,
    /// When the site was checked, in the reporting timezone
    pub checked_at: String,
}

impl CheckResult {
    /// Number of plugins and themes with an update available
    pub fn outdated_count(&self) -> usize {
        self.plugins
            .iter()
            .chain(&self.themes)
            .filter(|c| ComponentStatus::of(c) == ComponentStatus::UpdateAvailable)
            .count()
    }

    /// Label of the SSL status column
    pub fn ssl_status(&self) -> &'static str {
        if self.ssl_valid { "Valid" } else { "Invalid" }
    }
}

/// Escape text for inclusion in HTML
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// HTML rendering of a results sequence
pub struct HtmlReport<'a> {
    results: &'a [CheckResult],
}

impl<'a> HtmlReport<'a> {
    /// Wrap the results of a run
    pub fn new(results: &'a [CheckResult]) -> Self {
        Self { results }
    }

    fn summary_table(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<h4>Website Checks:</h4>")?;
        writeln!(f, "{}", TABLE_OPEN)?;
        write!(f, "<tr>")?;
        for heading in [
            "URL",
            "PHP Version",
            "WordPress Version",
            "SSL Status",
            "SSL Expiry Date",
            "Performance Score",
            "Malware Scan",
            "Uptime Status",
            "Checked At",
        ] {
            write!(f, "<th style='{}'>{}</th>", CELL_STYLE, heading)?;
        }
        writeln!(f, "</tr>")?;

        for result in self.results {
            let severity = result.ssl_expiry_severity.color();
            let ssl_color = if result.ssl_valid { "green" } else { "red" };
            let uptime_color = match result.uptime_status {
                UptimeStatus::Online => "green",
                UptimeStatus::Error => "red",
            };

            write!(f, "<tr class='site'>")?;
            write!(f, "<td style='{}'>{}</td>", CELL_STYLE, escape_html(&result.url))?;
            write!(f, "<td style='{}'>{}</td>", CELL_STYLE, escape_html(&result.php_version))?;
            write!(f, "<td style='{}'>{}</td>", CELL_STYLE, escape_html(&result.wp_version))?;
            write!(
                f,
                "<td class='ssl-status' style='{} color: {}'><span style='color:{};'>{}</span></td>",
                CELL_STYLE,
                severity,
                ssl_color,
                result.ssl_status()
            )?;
            write!(
                f,
                "<td class='ssl-expiry' style='{} color: {}'>{}</td>",
                CELL_STYLE,
                severity,
                escape_html(&result.ssl_expiry_date)
            )?;
            write!(f, "<td style='{}'>{}</td>", CELL_STYLE, result.performance_score)?;
            write!(f, "<td style='{}'>{}</td>", CELL_STYLE, result.malware_status)?;
            write!(
                f,
                "<td style='{}'><span style='color:{};'>{}</span></td>",
                CELL_STYLE, uptime_color, result.uptime_status
            )?;
            write!(f, "<td style='{}'>{}</td>", CELL_STYLE, escape_html(&result.checked_at))?;
            writeln!(f, "</tr>")?;
        }

        writeln!(f, "</table>")
    }

    fn component_table(
        f: &mut fmt::Formatter<'_>,
        title: &str,
        column: &str,
        components: &[Component],
    ) -> fmt::Result {
        writeln!(f, "<h5>{}:</h5>", title)?;
        writeln!(f, "{}", TABLE_OPEN)?;
        writeln!(
            f,
            "<tr><th>{}</th><th>Installed Version</th><th>Latest Version</th></tr>",
            column
        )?;

        for component in components {
            let status = ComponentStatus::of(component);
            let (class, color) = match status {
                ComponentStatus::UpdateAvailable => ("update-available", UPDATE_COLOR),
                ComponentStatus::Unresolved => ("unresolved", "black"),
                ComponentStatus::UpToDate => ("up-to-date", "black"),
            };
            let latest = match status {
                ComponentStatus::Unresolved => format!("<span style='color:red;'>{}</span>", UNKNOWN),
                _ => escape_html(&component.latest_version),
            };

            writeln!(
                f,
                "<tr class='{}'><td>{}</td><td>{}</td><td style='color: {}'>{}</td></tr>",
                class,
                escape_html(&component.name),
                escape_html(&component.installed_version),
                color,
                latest
            )?;
        }

        writeln!(f, "</table>")
    }
}

impl fmt::Display for HtmlReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<html>")?;
        writeln!(f, "<body>")?;
        self.summary_table(f)?;
        writeln!(f, "<h3>Plugins and Themes</h3>")?;

        for result in self.results {
            writeln!(f, "<h4>{}</h4>", escape_html(&result.url))?;
            Self::component_table(f, "Plugins", "Plugin", &result.plugins)?;
            Self::component_table(f, "Themes", "Theme", &result.themes)?;
        }

        writeln!(f, "</body>")?;
        write!(f, "</html>")
    }
}

/// Render the HTML document for a run
pub fn build_report(results: &[CheckResult]) -> String {
    HtmlReport::new(results).to_string()
}
