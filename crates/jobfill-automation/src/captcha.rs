//! CAPTCHA detection.
//!
//! Two paths feed one verdict. The static path scans filtered HTML for
//! provider markers, challenge iframes and "prove you are human" wording;
//! confidence grows with the number of signals and is floored when a named
//! provider is present. The live path asks the rendered page which widgets
//! exist and whether they are visible. [`CaptchaDetector::detect`] ORs the
//! two and keeps the higher confidence.

use std::fmt;

use jobfill_browser::PageDriver;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Class/id substrings of known CAPTCHA widgets.
const INDICATORS: &[&str] = &[
    "g-recaptcha",
    "recaptcha",
    "h-captcha",
    "hcaptcha",
    "cf-turnstile",
    "captcha",
    "challenge-form",
    "challenge-running",
    "cf-challenge",
    "arkose",
    "funcaptcha",
];

static IFRAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"recaptcha.*iframe",
        r"hcaptcha.*iframe",
        r"challenges\.cloudflare",
        r"captcha.*frame",
    ])
});

static TEXT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"verify.*human",
        r"verify.*robot",
        r"prove.*human",
        r"not.*robot",
        r"security.*check",
        r"complete.*captcha",
        r"solve.*puzzle",
        r"i.?m not a robot",
        r"confirm.*human",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
        .collect()
}

/// Marker the fake page keys scripted probe responses on.
pub const PROBE_MARKER: &str = "jobfill:captcha-probe";

const LIVE_PROBE: &str = r#"/* jobfill:captcha-probe */
const result = { found: false, type: 'unknown', selectors: [], iframes: [], visible: false };
const mark = (el, type, tag) => {
    result.found = true;
    result.type = type;
    result.selectors.push(tag);
    result.visible = el.offsetParent !== null;
};
const recaptcha = document.querySelector('.g-recaptcha, [data-sitekey], iframe[src*="recaptcha"]');
if (recaptcha) mark(recaptcha, 'recaptcha', 'recaptcha');
const hcaptcha = document.querySelector('.h-captcha, iframe[src*="hcaptcha"]');
if (hcaptcha) mark(hcaptcha, 'hcaptcha', 'hcaptcha');
const turnstile = document.querySelector('.cf-turnstile, #cf-challenge-running, iframe[src*="challenges.cloudflare"]');
if (turnstile) mark(turnstile, 'cloudflare', 'cloudflare');
const arkose = document.querySelector('[id*="arkose"], [class*="funcaptcha"], iframe[src*="arkoselabs"]');
if (arkose && !result.found) mark(arkose, 'arkose', 'arkose');
const generic = document.querySelector('[class*="captcha"], [id*="captcha"]');
if (generic && !result.found) mark(generic, 'generic', 'captcha');
document.querySelectorAll('iframe').forEach(f => {
    const src = f.src || '';
    if (/captcha|challenge/.test(src)) {
        result.iframes.push(src);
        result.found = true;
    }
});
const text = document.body ? document.body.innerText : '';
if (/i.?m not a robot|verify.*human|prove.*human/i.test(text)) {
    result.found = true;
    if (result.type === 'unknown') result.type = 'text-based';
}
return result;"#;

/// CAPTCHA family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CaptchaKind {
    Recaptcha,
    Hcaptcha,
    Cloudflare,
    Arkose,
    Generic,
    TextBased,
    #[default]
    #[serde(other)]
    Unknown,
}

impl CaptchaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptchaKind::Recaptcha => "recaptcha",
            CaptchaKind::Hcaptcha => "hcaptcha",
            CaptchaKind::Cloudflare => "cloudflare",
            CaptchaKind::Arkose => "arkose",
            CaptchaKind::Generic => "generic",
            CaptchaKind::TextBased => "text-based",
            CaptchaKind::Unknown => "unknown",
        }
    }

    /// Named providers outrank keyword and text matches.
    fn is_branded(&self) -> bool {
        matches!(
            self,
            CaptchaKind::Recaptcha | CaptchaKind::Hcaptcha | CaptchaKind::Cloudflare | CaptchaKind::Arkose
        )
    }
}

impl fmt::Display for CaptchaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of one detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CaptchaDetection {
    pub detected: bool,
    pub kind: CaptchaKind,
    pub confidence: f64,
    /// Markers that fired.
    pub signals: Vec<String>,
    pub message: String,
}

impl CaptchaDetection {
    pub fn none() -> Self {
        Self::default()
    }

    /// OR of two verdicts with the higher confidence. When both detect,
    /// a named provider wins over a generic or text match.
    pub fn merge(self, other: CaptchaDetection) -> CaptchaDetection {
        match (self.detected, other.detected) {
            (false, false) => CaptchaDetection {
                confidence: self.confidence.max(other.confidence),
                ..CaptchaDetection::none()
            },
            (true, false) => self,
            (false, true) => other,
            (true, true) => {
                let confidence = self.confidence.max(other.confidence);
                let (mut primary, secondary) = if other.kind.is_branded() && !self.kind.is_branded() {
                    (other, self)
                } else {
                    (self, other)
                };
                primary.confidence = confidence;
                for signal in secondary.signals {
                    if !primary.signals.contains(&signal) {
                        primary.signals.push(signal);
                    }
                }
                primary
            }
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProbeResult {
    found: bool,
    #[serde(rename = "type")]
    kind: CaptchaKind,
    selectors: Vec<String>,
    iframes: Vec<String>,
    visible: bool,
}

/// Stateless detector; the pattern tables are compiled once per process.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptchaDetector;

impl CaptchaDetector {
    pub fn new() -> Self {
        Self
    }

    /// Static scan of (filtered) HTML.
    pub fn detect_html(&self, html: &str) -> CaptchaDetection {
        if html.is_empty() {
            return CaptchaDetection::none();
        }
        let lower = html.to_lowercase();

        let indicators: Vec<&str> = INDICATORS.iter().copied().filter(|i| lower.contains(i)).collect();
        let text_hits = TEXT_PATTERNS.iter().filter(|p| p.is_match(html)).count();
        let iframe_hits: Vec<&Regex> = IFRAME_PATTERNS.iter().filter(|p| p.is_match(html)).collect();

        let total = indicators.len() + text_hits + iframe_hits.len();
        if total == 0 {
            return CaptchaDetection::none();
        }

        let kind = Self::classify(&indicators, &iframe_hits);
        let has = |names: &[&str]| indicators.iter().any(|i| names.contains(i));
        let mut confidence = (total as f64 * 0.25).min(1.0);
        if has(&["g-recaptcha", "recaptcha"]) || has(&["h-captcha", "hcaptcha"]) {
            confidence = confidence.max(0.9);
        } else if has(&["cf-turnstile", "cf-challenge"]) {
            confidence = confidence.max(0.85);
        }

        CaptchaDetection {
            detected: confidence >= 0.5,
            kind,
            confidence,
            signals: indicators.iter().map(|s| s.to_string()).collect(),
            message: format!("CAPTCHA detected: {}", kind),
        }
    }

    fn classify(indicators: &[&str], iframe_hits: &[&Regex]) -> CaptchaKind {
        let any = |needles: &[&str]| indicators.iter().any(|i| needles.iter().any(|n| i.contains(n)));
        if any(&["recaptcha"]) {
            CaptchaKind::Recaptcha
        } else if any(&["hcaptcha", "h-captcha"]) {
            CaptchaKind::Hcaptcha
        } else if any(&["cf-", "turnstile"]) {
            CaptchaKind::Cloudflare
        } else if any(&["arkose", "funcaptcha"]) {
            CaptchaKind::Arkose
        } else if iframe_hits.iter().any(|p| p.as_str().contains("recaptcha")) {
            CaptchaKind::Recaptcha
        } else if iframe_hits.iter().any(|p| p.as_str().contains("hcaptcha")) {
            CaptchaKind::Hcaptcha
        } else {
            CaptchaKind::Generic
        }
    }

    /// Query the rendered page. Probe failures count as "nothing found".
    pub async fn detect_page(&self, driver: &dyn PageDriver) -> CaptchaDetection {
        let raw = match driver.execute_script(LIVE_PROBE, &[]).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("CAPTCHA probe failed: {}", e);
                return CaptchaDetection::none();
            }
        };
        let probe: ProbeResult = serde_json::from_value(raw).unwrap_or_default();
        if !probe.found {
            return CaptchaDetection::none();
        }

        let mut signals = probe.selectors;
        signals.extend(probe.iframes);
        CaptchaDetection {
            detected: true,
            kind: probe.kind,
            confidence: if probe.visible { 0.95 } else { 0.7 },
            signals,
            message: format!("CAPTCHA detected via page analysis: {}", probe.kind),
        }
    }

    /// Live probe merged with the static scan of `html`.
    pub async fn detect(&self, driver: &dyn PageDriver, html: &str) -> CaptchaDetection {
        let verdict = self.detect_page(driver).await.merge(self.detect_html(html));
        if verdict.detected {
            debug!(kind = %verdict.kind, confidence = verdict.confidence, "CAPTCHA present");
        }
        verdict
    }
}
