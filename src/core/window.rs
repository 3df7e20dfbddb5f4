//! Window handles and title matching
//!
//! Handles are recomputed on every listing call; nothing here is cached
//! between tool invocations.

use regex::RegexBuilder;
use serde::Serialize;

use super::errors::{DesktopError, DesktopResult};

/// Maximum compiled regex size, bounds pathological patterns
const MAX_REGEX_SIZE: usize = 1_048_576;

/// Unique identifier for a window across platforms
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PlatformWindowId {
    /// X11 window ID
    X11(u32),
    /// Opaque identifier handed out by a non-X11 backend
    Opaque(String),
}

/// Geometry of a window, in absolute screen coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A window as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowHandle {
    pub id: PlatformWindowId,
    pub title: String,
    /// Window class/app name
    pub class: String,
    /// `None` when the backend cannot bound-box the window
    pub bounds: Option<Geometry>,
    /// Whether this is the foreground window
    pub active: bool,
}

/// A window accepted by [`find_window`] together with its match score (0-100)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowMatch {
    pub window: WindowHandle,
    pub score: u8,
}

/// Returns the active window, if the backend reported one
pub fn active_window(windows: &[WindowHandle]) -> Option<&WindowHandle> {
    windows.iter().find(|w| w.active)
}

/// Keeps the first `active` flag and clears any others
///
/// Window managers occasionally report stale focus during transitions; callers
/// are promised at most one foreground window.
pub fn normalize_active(windows: &mut [WindowHandle]) {
    let mut seen = false;
    for window in windows.iter_mut() {
        if window.active {
            if seen {
                window.active = false;
            }
            seen = true;
        }
    }
}

/// Matches `pattern` against window titles
///
/// With `use_regex` the pattern is a case-insensitive regular expression and
/// every matching title scores 100. Otherwise titles are scored by fuzzy
/// similarity normalised to 0-100 and accepted at or above `threshold`.
///
/// Results are ordered by descending score; ties keep enumeration order.
/// An empty result means nothing matched.
pub fn find_window(
    windows: &[WindowHandle],
    pattern: &str,
    use_regex: bool,
    threshold: u8,
) -> DesktopResult<Vec<WindowMatch>> {
    if pattern.is_empty() {
        return Err(DesktopError::invalid("title_pattern", "must not be empty"));
    }
    if threshold > 100 {
        return Err(DesktopError::invalid(
            "threshold",
            format!("{threshold} is outside 0-100"),
        ));
    }

    let mut matches: Vec<WindowMatch> = if use_regex {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .size_limit(MAX_REGEX_SIZE)
            .build()
            .map_err(|e| DesktopError::invalid("title_pattern", e.to_string()))?;

        windows
            .iter()
            .filter(|w| !w.title.is_empty() && regex.is_match(&w.title))
            .map(|w| WindowMatch {
                window: w.clone(),
                score: 100,
            })
            .collect()
    } else {
        let scorer = TitleScorer::new(pattern);
        windows
            .iter()
            .filter(|w| !w.title.is_empty())
            .filter_map(|w| {
                let score = scorer.score(&w.title);
                (score >= threshold).then(|| WindowMatch {
                    window: w.clone(),
                    score,
                })
            })
            .collect()
    };

    // sort_by is stable, so equal scores keep enumeration order
    matches.sort_by(|a, b| b.score.cmp(&a.score));

    tracing::debug!(
        pattern,
        use_regex,
        threshold,
        matched = matches.len(),
        "Matched window titles"
    );

    Ok(matches)
}

/// Fuzzy title similarity on a 0-100 scale
///
/// Partial ratio: the pattern is compared, case-insensitively, against every
/// pattern-length window of the title (windows running off either end are
/// clipped) and the best normalized Levenshtein similarity wins. A title
/// containing the pattern verbatim scores 100; single typos cost a few points
/// instead of rejecting the title.
pub struct TitleScorer {
    pattern: String,
    len: usize,
}

impl TitleScorer {
    pub fn new(pattern: &str) -> Self {
        let pattern = pattern.to_lowercase();
        Self {
            len: pattern.chars().count(),
            pattern,
        }
    }

    pub fn score(&self, title: &str) -> u8 {
        let title: Vec<char> = title.to_lowercase().chars().collect();
        if title.is_empty() || self.len == 0 {
            return 0;
        }

        let similarity = if title.len() <= self.len {
            let title: String = title.iter().collect();
            strsim::normalized_levenshtein(&self.pattern, &title)
        } else {
            let leading = (1..self.len).map(|end| &title[..end]);
            let sliding = (0..title.len()).map(|start| &title[start..(start + self.len).min(title.len())]);
            leading
                .chain(sliding)
                .map(|window| {
                    let window: String = window.iter().collect();
                    strsim::normalized_levenshtein(&self.pattern, &window)
                })
                .fold(0.0_f64, f64::max)
        };

        (similarity * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: u32, title: &str, active: bool) -> WindowHandle {
        WindowHandle {
            id: PlatformWindowId::X11(id),
            title: title.to_string(),
            class: String::new(),
            bounds: Some(Geometry::new(0, 0, 800, 600)),
            active,
        }
    }

    fn desktop() -> Vec<WindowHandle> {
        vec![
            window(1, "Terminal", false),
            window(2, "Untitled - Notepad", true),
            window(3, "", false),
            window(4, "Mozilla Firefox", false),
        ]
    }

    #[test]
    fn test_fuzzy_finds_notepad() {
        let matches = find_window(&desktop(), "Notepad", false, 60).unwrap();
        assert!(!matches.is_empty());
        assert_eq!(matches[0].window.title, "Untitled - Notepad");
        assert!(matches[0].score >= 60);
    }

    #[test]
    fn test_fuzzy_is_case_insensitive() {
        let matches = find_window(&desktop(), "notepad", false, 60).unwrap();
        assert_eq!(matches[0].window.id, PlatformWindowId::X11(2));
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let matches = find_window(&desktop(), "Spreadsheet", false, 60).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_verbatim_substring_scores_100() {
        let scorer = TitleScorer::new("Notepad");
        assert_eq!(scorer.score("Untitled - Notepad"), 100);
        assert_eq!(scorer.score("NOTEPAD"), 100);
    }

    #[test]
    fn test_unrelated_titles_score_low() {
        let scorer = TitleScorer::new("Notepad");
        assert!(scorer.score("Terminal") < 40);
        assert!(scorer.score("Mozilla Firefox") < 40);
        assert_eq!(scorer.score(""), 0);

        // Letters in order are not enough to pass the default threshold
        assert!(TitleScorer::new("note").score("Nautilus - other text editor") < 60);
    }

    #[test]
    fn test_typos_still_match() {
        assert!(TitleScorer::new("Notpead").score("Untitled - Notepad") >= 60);
        assert!(TitleScorer::new("Notepad++").score("Untitled - Notepad") >= 60);

        let matches = find_window(&desktop(), "Notpead", false, 60).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].window.id, PlatformWindowId::X11(2));
    }

    #[test]
    fn test_regex_matches_all_candidates_in_order() {
        let matches = find_window(&desktop(), "^(terminal|mozilla)", true, 60).unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.window.id.clone()).collect();
        assert_eq!(ids, vec![PlatformWindowId::X11(1), PlatformWindowId::X11(4)]);
        assert!(matches.iter().all(|m| m.score == 100));
    }

    #[test]
    fn test_regex_never_matches_untitled_windows() {
        let matches = find_window(&desktop(), ".*", true, 0).unwrap();
        assert_eq!(matches.len(), 3);
    }

    #[test]
    fn test_malformed_regex_is_invalid_argument() {
        let err = find_window(&desktop(), "(unclosed", true, 60).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_threshold_out_of_range() {
        let err = find_window(&desktop(), "Notepad", false, 101).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(find_window(&desktop(), "", false, 60).is_err());
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        let windows = vec![
            window(7, "Notepad - a.txt", false),
            window(8, "Notepad - b.txt", false),
        ];
        let matches = find_window(&windows, "Notepad", false, 60).unwrap();
        assert_eq!(matches[0].window.id, PlatformWindowId::X11(7));
        assert_eq!(matches[1].window.id, PlatformWindowId::X11(8));
    }

    #[test]
    fn test_normalize_active_keeps_first() {
        let mut windows = vec![
            window(1, "a", true),
            window(2, "b", true),
            window(3, "c", false),
        ];
        normalize_active(&mut windows);
        assert_eq!(windows.iter().filter(|w| w.active).count(), 1);
        assert_eq!(active_window(&windows).map(|w| w.title.as_str()), Some("a"));
    }
}
