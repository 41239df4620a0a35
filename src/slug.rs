//! Display name to WordPress.org slug resolution
//!
//! The directory keys plugins and themes by slug, and slugs follow no
//! enforced convention relative to display names. Known mismatches live in
//! an override table; everything else gets a fixed set of guesses.

/// Display names whose slug cannot be guessed from the name
const SLUG_OVERRIDES: &[(&str, &str)] = &[
    // Plugins
    (
        "Cookie-Banner-Plugin für WordPress – Cookiebot CMP by Usercentrics",
        "cookiebot",
    ),
    ("Complianz – GDPR/CCPA Cookie Consent", "complianz-gdpr"),
    ("Yoast SEO", "wordpress-seo"),
    ("WP Social Widget", "wp-social-widget"),
    ("Smush", "wp-smushit"),
    ("Self-Hosted Google Fonts", "selfhost-google-fonts"),
    ("ShortPixel Image Optimizer", "shortpixel-image-optimiser"),
    ("WPCode Lite", "insert-headers-and-footers"),
    // Themes
    ("Twenty Twenty-Four", "twentytwentyfour"),
];

/// Look up the curated slug for a display name (exact match)
pub fn override_for(name: &str) -> Option<&'static str> {
    SLUG_OVERRIDES
        .iter()
        .find(|(display, _)| *display == name)
        .map(|(_, slug)| *slug)
}

/// Candidate slugs for a display name, in the order they should be tried
///
/// Always non-empty. An override yields exactly one candidate; otherwise four
/// transforms of the lowercased name are returned, duplicates included.
pub fn candidates(name: &str) -> Vec<String> {
    if let Some(slug) = override_for(name) {
        return vec![slug.to_string()];
    }

    let lower = name.to_lowercase();
    vec![
        lower.replace(' ', "-"),
        lower.replace(' ', "_"),
        lower.replace(' ', ""),
        lower.replace(' ', "-").replace('.', ""),
    ]
}
