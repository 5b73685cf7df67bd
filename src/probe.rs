use tracing::debug;

use crate::logbook::Logbook;

/// Flag families the launch tables dispatch on. The candidate table is
/// closed, so every browser resolves to exactly one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserFamily {
    Firefox,
    Chromium,
    Other,
}

/// One probe-table entry: executable name, display label, flag family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSpec {
    pub command: &'static str,
    pub label: &'static str,
    pub family: BrowserFamily,
}

const fn spec(command: &'static str, label: &'static str, family: BrowserFamily) -> BrowserSpec {
    BrowserSpec {
        command,
        label,
        family,
    }
}

/// Known browsers, in probe (and therefore reporting) order.
pub const BROWSER_CANDIDATES: [BrowserSpec; 7] = [
    spec("firefox", "Firefox", BrowserFamily::Firefox),
    spec("google-chrome", "Chrome", BrowserFamily::Chromium),
    spec("chromium-browser", "Chromium", BrowserFamily::Chromium),
    spec("brave-browser", "Brave", BrowserFamily::Chromium),
    spec("opera", "Opera", BrowserFamily::Other),
    spec("vivaldi", "Vivaldi", BrowserFamily::Other),
    spec("microsoft-edge", "Edge", BrowserFamily::Chromium),
];

/// Restrict the candidate table to an executable-name subset. An empty
/// subset keeps every candidate; unknown names are ignored.
pub fn filter_candidates(subset: &[String]) -> Vec<BrowserSpec> {
    BROWSER_CANDIDATES
        .iter()
        .filter(|candidate| subset.is_empty() || subset.iter().any(|name| name == candidate.command))
        .cloned()
        .collect()
}

/// Resolve which candidates actually exist on the host, preserving
/// candidate order. Probing is the only side effect.
pub fn available_browsers(candidates: &[BrowserSpec], logbook: &Logbook) -> Vec<BrowserSpec> {
    let mut available = Vec::new();
    for candidate in candidates {
        match which::which(candidate.command) {
            Ok(path) => {
                debug!(command = candidate.command, path = %path.display(), "resolved browser binary");
                logbook.record(format!("Found browser: {}", candidate.label));
                available.push(candidate.clone());
            }
            Err(_) => {
                logbook.record(format!("Browser not available: {}", candidate.label));
            }
        }
    }
    available
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_logbook() -> (tempfile::TempDir, Logbook) {
        let dir = tempfile::tempdir().unwrap();
        let logbook = Logbook::create(&dir.path().join("probe.log")).unwrap();
        (dir, logbook)
    }

    #[test]
    fn candidate_table_keeps_probe_order() {
        let commands: Vec<_> = BROWSER_CANDIDATES.iter().map(|b| b.command).collect();
        assert_eq!(
            commands,
            vec![
                "firefox",
                "google-chrome",
                "chromium-browser",
                "brave-browser",
                "opera",
                "vivaldi",
                "microsoft-edge",
            ]
        );
    }

    #[test]
    fn empty_subset_keeps_every_candidate() {
        assert_eq!(filter_candidates(&[]).len(), BROWSER_CANDIDATES.len());
    }

    #[test]
    fn subset_filter_preserves_table_order() {
        let subset = vec!["vivaldi".to_string(), "firefox".to_string()];
        let filtered = filter_candidates(&subset);
        let commands: Vec<_> = filtered.iter().map(|b| b.command).collect();
        assert_eq!(commands, vec!["firefox", "vivaldi"]);
    }

    #[test]
    fn unknown_subset_names_are_ignored() {
        let subset = vec!["netscape-navigator".to_string()];
        assert!(filter_candidates(&subset).is_empty());
    }

    #[test]
    fn unresolvable_candidates_are_dropped() {
        let (_dir, logbook) = test_logbook();
        let candidates = [spec(
            "definitely-not-a-real-browser-binary",
            "Ghost",
            BrowserFamily::Other,
        )];
        assert!(available_browsers(&candidates, &logbook).is_empty());
    }
}
