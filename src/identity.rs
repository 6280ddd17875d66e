//! Client platform and operating-system identity.
//!
//! The handshake reports a `platform` and an `os` string to the server.
//! Where they come from is up to the embedding application; this module
//! provides the trait plus three sources:
//!
//! | Provider | Source |
//! |----------|--------|
//! | [`HostIdentity`] | compile target (default) |
//! | [`StaticIdentity`] | fixed strings |
//! | [`UserAgentIdentity`] | browser-style user-agent sniffing |

// ============================================================================
// Imports
// ============================================================================

use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::FxHashMap;

// ============================================================================
// Constants
// ============================================================================

/// Reported when no browser rule matches.
pub const UNKNOWN_BROWSER: &str = "An unknown browser";

/// Reported when no OS rule matches.
pub const UNKNOWN_OS: &str = "an unknown OS";

/// Platform reported by [`HostIdentity`].
pub const HOST_PLATFORM: &str = "Rust";

// ============================================================================
// IdentityProvider
// ============================================================================

/// Supplies the identity strings sent during authentication.
pub trait IdentityProvider: Send + Sync {
    /// Platform (browser or runtime) name.
    fn platform(&self) -> String;

    /// Operating system name.
    fn operating_system(&self) -> String;
}

// ============================================================================
// HostIdentity
// ============================================================================

/// Identity derived from the compile target.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostIdentity;

impl IdentityProvider for HostIdentity {
    fn platform(&self) -> String {
        HOST_PLATFORM.to_string()
    }

    fn operating_system(&self) -> String {
        os_name(std::env::consts::OS).to_string()
    }
}

/// Maps a Rust target OS to the names the backend knows.
fn os_name(target_os: &str) -> &'static str {
    match target_os {
        "windows" => "Windows",
        "macos" => "Mac",
        "ios" => "iPhone/iPod",
        "linux" | "android" => "Linux",
        _ => UNKNOWN_OS,
    }
}

// ============================================================================
// StaticIdentity
// ============================================================================

/// Fixed identity strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity {
    platform: String,
    operating_system: String,
}

impl StaticIdentity {
    /// Creates a fixed identity.
    #[inline]
    #[must_use]
    pub fn new(platform: impl Into<String>, operating_system: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            operating_system: operating_system.into(),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn platform(&self) -> String {
        self.platform.clone()
    }

    fn operating_system(&self) -> String {
        self.operating_system.clone()
    }
}

// ============================================================================
// UserAgentIdentity
// ============================================================================

/// Which navigator string a detection rule inspects.
#[derive(Debug, Clone, Copy)]
enum Field {
    UserAgent,
    Vendor,
    Platform,
}

/// A substring rule mapping to an identity.
struct Rule {
    field: Field,
    needle: &'static str,
    identity: &'static str,
    version_search: Option<&'static str>,
}

impl Rule {
    const fn new(field: Field, needle: &'static str, identity: &'static str) -> Self {
        Self {
            field,
            needle,
            identity,
            version_search: None,
        }
    }

    const fn versioned(mut self, search: &'static str) -> Self {
        self.version_search = Some(search);
        self
    }
}

/// Browser rules, first match wins.
const BROWSER_RULES: &[Rule] = &[
    Rule::new(Field::UserAgent, "Chrome", "Chrome"),
    Rule::new(Field::UserAgent, "OmniWeb", "OmniWeb").versioned("OmniWeb/"),
    Rule::new(Field::Vendor, "Apple", "Safari").versioned("Version"),
    Rule::new(Field::UserAgent, "Opera", "Opera").versioned("Version"),
    Rule::new(Field::Vendor, "iCab", "iCab"),
    Rule::new(Field::Vendor, "KDE", "Konqueror"),
    Rule::new(Field::UserAgent, "Firefox", "Firefox"),
    Rule::new(Field::Vendor, "Camino", "Camino"),
    Rule::new(Field::UserAgent, "Netscape", "Netscape"),
    Rule::new(Field::UserAgent, "MSIE", "Explorer").versioned("MSIE"),
    Rule::new(Field::UserAgent, "Gecko", "Mozilla").versioned("rv"),
    Rule::new(Field::UserAgent, "Mozilla", "Netscape").versioned("Mozilla"),
];

/// OS rules, first match wins.
const OS_RULES: &[Rule] = &[
    Rule::new(Field::Platform, "Win", "Windows"),
    Rule::new(Field::Platform, "Mac", "Mac"),
    Rule::new(Field::UserAgent, "iPhone", "iPhone/iPod"),
    Rule::new(Field::Platform, "Linux", "Linux"),
];

/// Identity sniffed from browser navigator strings.
///
/// # Example
///
/// ```
/// use gamesparks_rt::identity::{IdentityProvider, UserAgentIdentity};
///
/// let identity = UserAgentIdentity::detect(
///     "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0",
///     "Linux x86_64",
///     "",
/// );
/// assert_eq!(identity.platform(), "Firefox");
/// assert_eq!(identity.operating_system(), "Linux");
/// assert_eq!(identity.version(), Some("120.0"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentIdentity {
    browser: String,
    version: Option<String>,
    operating_system: String,
}

impl UserAgentIdentity {
    /// Detects browser, version and OS.
    ///
    /// # Arguments
    ///
    /// * `user_agent` - `navigator.userAgent`
    /// * `platform` - `navigator.platform`
    /// * `vendor` - `navigator.vendor`
    #[must_use]
    pub fn detect(user_agent: &str, platform: &str, vendor: &str) -> Self {
        let lookup = |field: Field| match field {
            Field::UserAgent => user_agent,
            Field::Vendor => vendor,
            Field::Platform => platform,
        };

        let browser_rule = BROWSER_RULES
            .iter()
            .find(|rule| lookup(rule.field).contains(rule.needle));

        let version = browser_rule.and_then(|rule| {
            let search = rule.version_search.unwrap_or(rule.identity);
            search_version(user_agent, search)
        });

        let operating_system = OS_RULES
            .iter()
            .find(|rule| lookup(rule.field).contains(rule.needle))
            .map_or(UNKNOWN_OS, |rule| rule.identity);

        Self {
            browser: browser_rule.map_or(UNKNOWN_BROWSER, |rule| rule.identity).to_string(),
            version,
            operating_system: operating_system.to_string(),
        }
    }

    /// Returns the detected browser version, if any.
    #[inline]
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl IdentityProvider for UserAgentIdentity {
    fn platform(&self) -> String {
        self.browser.clone()
    }

    fn operating_system(&self) -> String {
        self.operating_system.clone()
    }
}

/// Version patterns keyed by search string, compiled once.
static VERSION_PATTERNS: OnceLock<FxHashMap<&'static str, Regex>> = OnceLock::new();

fn version_patterns() -> &'static FxHashMap<&'static str, Regex> {
    VERSION_PATTERNS.get_or_init(|| {
        BROWSER_RULES
            .iter()
            .map(|rule| rule.version_search.unwrap_or(rule.identity))
            .filter_map(|search| {
                let pattern = format!(r"{}.(\d+(?:\.\d+)?)", regex::escape(search));
                Regex::new(&pattern).ok().map(|re| (search, re))
            })
            .collect()
    })
}

/// Reads the numeric version that follows `search` plus one separator.
fn search_version(haystack: &str, search: &str) -> Option<String> {
    version_patterns()
        .get(search)?
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// ============================================================================
// Tests
// ============================================================================
