//! On-topic filtering for primary-source candidates.
//!
//! Order of application:
//! 1. exact-phrase precedence (quoted phrase in the query)
//! 2. focus-term token match, title matches preferred over summary matches,
//!    with exclusion patterns dropping adaptation and off-topic subpages
//! 3. entertainment-content detection on the summary
//! 4. relaxed fallback when everything was filtered out

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::Candidate;

static QUOTED_PHRASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));

static FOCUS_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9]+").expect("valid regex"));

/// Parenthetical disambiguators for adaptations and non-subject pages, with
/// optional qualifiers such as "(2015 film)" or "(American band)".
static ADAPTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\((?:[^)]*\s)?(?:film|movie|book|novel|tv series|soap opera|fictional character|comics|band|documentary|album|song|video game|disambiguation|play|musical)\)",
    )
    .expect("valid regex")
});

/// Title prefixes for subpages that are only relevant when they name the subject.
const OFF_TOPIC_SUBPAGE_MARKERS: &[&str] = &["criticism of ", "controversies "];

const ENTERTAINMENT_INDICATORS: &[&str] = &[
    "is a film",
    "is a movie",
    "is a documentary",
    "is a book written",
    "is a biography written",
    "is a song by",
    "is an album by",
    "is a television series",
    "is a play",
    "is a musical",
    "directed by",
    "starring",
    "was released on",
];

/// First double-quoted phrase in `query`, if any.
pub fn extract_quoted_phrase(query: &str) -> Option<String> {
    QUOTED_PHRASE_RE
        .captures(query)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty())
}

/// Lowercase alphanumeric tokens longer than two characters.
pub fn focus_tokens(term: &str) -> Vec<String> {
    FOCUS_TOKEN_RE
        .find_iter(term)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| t.len() > 2)
        .collect()
}

fn matches_tokens(text: &str, tokens: &[String]) -> bool {
    let lowered = text.to_lowercase();
    tokens.iter().all(|t| lowered.contains(t.as_str()))
}

/// Whether `title` names an adaptation, a disambiguation page, or a
/// criticism/controversies page about something other than `focus`.
pub fn is_excluded_title(title: &str, focus: Option<&str>) -> bool {
    if ADAPTATION_RE.is_match(title) {
        return true;
    }
    let subject = focus.map(|f| f.trim().to_lowercase()).unwrap_or_default();
    let lowered = title.to_lowercase();
    OFF_TOPIC_SUBPAGE_MARKERS.iter().any(|marker| {
        lowered
            .find(marker)
            .map(|idx| !lowered[idx + marker.len()..].contains(subject.as_str()))
            .unwrap_or(false)
    })
}

/// Whether a summary reads like it describes a film, book, song, or show.
pub fn looks_like_entertainment(summary: &str) -> bool {
    let lowered = summary.to_lowercase();
    ENTERTAINMENT_INDICATORS
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

fn by_phrase(candidates: &[Candidate], phrase: Option<&str>) -> Vec<Candidate> {
    let Some(phrase) = phrase.map(str::to_lowercase) else {
        return candidates.to_vec();
    };
    let filtered: Vec<Candidate> = candidates
        .iter()
        .filter(|c| c.title.to_lowercase().contains(&phrase))
        .cloned()
        .collect();
    // Phrase precedence, not requirement.
    if filtered.is_empty() {
        candidates.to_vec()
    } else {
        filtered
    }
}

fn by_focus(candidates: Vec<Candidate>, focus: &str) -> Vec<Candidate> {
    let tokens = focus_tokens(focus);
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| !is_excluded_title(&c.title, Some(focus)))
        .collect();
    if tokens.is_empty() {
        return kept;
    }

    let title_matches: Vec<Candidate> = kept
        .iter()
        .filter(|c| matches_tokens(&c.title, &tokens))
        .cloned()
        .collect();
    if !title_matches.is_empty() {
        return title_matches;
    }
    kept.into_iter()
        .filter(|c| matches_tokens(&c.summary, &tokens))
        .collect()
}

/// Apply every on-topic filter to `candidates`.
///
/// The relaxed fallback re-checks exclusion patterns but deliberately skips
/// the entertainment detector.
pub fn filter_candidates(
    candidates: &[Candidate],
    query: &str,
    focus: Option<&str>,
) -> Vec<Candidate> {
    let focus = focus.map(str::trim).filter(|f| !f.is_empty());
    let phrase = extract_quoted_phrase(query);

    let mut survivors = by_phrase(candidates, phrase.as_deref());
    if let Some(focus) = focus {
        survivors = by_focus(survivors, focus);
    }
    survivors.retain(|c| {
        let keep = !looks_like_entertainment(&c.summary);
        if !keep {
            debug!(title = %c.title, "Dropping entertainment page");
        }
        keep
    });

    if survivors.is_empty() && !candidates.is_empty() {
        if let Some(focus) = focus {
            let needle = focus.to_lowercase();
            if let Some(fallback) = candidates.iter().find(|c| {
                c.title.to_lowercase().contains(&needle)
                    && !is_excluded_title(&c.title, Some(focus))
            }) {
                debug!(title = %fallback.title, "Relaxed fallback accepted candidate");
                return vec![fallback.clone()];
            }
        }
    }
    survivors
}
