//! User-agent classification into browser and OS families
//!
//! Classification happens in two steps: raw strings that look like crawlers
//! or that the backend could not record are excluded outright, everything
//! else is handed to an [`AgentParser`] which reports best-effort family
//! names.

use std::sync::Arc;
use woothee::parser::Parser;

/// Family name used when the parser cannot tell
pub const OTHERS: &str = "Others";

/// Lowercase markers that exclude a user agent from every ranking
const EXCLUDED_MARKERS: &[&str] = &["bot", "unknown"];

/// Families reported by an [`AgentParser`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAgent {
    pub browser: Option<String>,
    pub os: Option<String>,
}

/// User-agent parsing capability
///
/// Implementations are treated as black boxes returning whatever family
/// names they can recognize.
pub trait AgentParser: Send + Sync {
    fn parse(&self, ua: &str) -> ParsedAgent;
}

/// Browser and OS family of a counted user agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedAgent {
    pub browser: String,
    pub os: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Bot or unrecorded agent; contributes to no ranking
    Excluded,
    Agent(ClassifiedAgent),
}

#[derive(Clone)]
pub struct UserAgentClassifier {
    parser: Arc<dyn AgentParser>,
}

impl UserAgentClassifier {
    pub fn new(parser: Arc<dyn AgentParser>) -> Self {
        Self { parser }
    }

    pub fn classify(&self, ua: &str) -> Classification {
        if is_excluded(ua) {
            return Classification::Excluded;
        }

        let parsed = self.parser.parse(ua);
        Classification::Agent(ClassifiedAgent {
            browser: parsed.browser.unwrap_or_else(|| OTHERS.to_string()),
            os: parsed.os.unwrap_or_else(|| OTHERS.to_string()),
        })
    }
}

impl Default for UserAgentClassifier {
    fn default() -> Self {
        Self::new(Arc::new(WootheeAgentParser))
    }
}

pub fn is_excluded(ua: &str) -> bool {
    let ua = ua.to_lowercase();
    EXCLUDED_MARKERS.iter().any(|marker| ua.contains(marker))
}

/// Value woothee reports for anything it could not identify
const WOOTHEE_UNKNOWN: &str = "UNKNOWN";

/// Categories whose family names describe a person's browser and device
const BROWSING_CATEGORIES: &[&str] = &["pc", "smartphone", "mobilephone", "appliance"];

/// [`AgentParser`] backed by the woothee project's UA dataset
///
/// Crawlers, HTTP libraries and unrecognized strings report no families.
#[derive(Debug, Clone, Copy, Default)]
pub struct WootheeAgentParser;

impl AgentParser for WootheeAgentParser {
    fn parse(&self, ua: &str) -> ParsedAgent {
        let parser = Parser::new();
        let Some(result) = parser.parse(ua) else {
            return ParsedAgent::default();
        };
        if !BROWSING_CATEGORIES.iter().any(|category| *category == result.category) {
            return ParsedAgent::default();
        }

        let known = |name: &str| {
            (!name.is_empty() && name != WOOTHEE_UNKNOWN).then(|| name.to_string())
        };
        ParsedAgent {
            browser: known(result.name),
            os: known(result.os),
        }
    }
}
