//! The fuzzywuzzy-style four-measure ensemble (spec §4.3): ratio,
//! partial_ratio, token_sort_ratio, and token_set_ratio over normalized
//! entity names, ported from `entity_resolver.py`'s `_try_fuzzy_match`.
//!
//! `fuzzy-matcher`'s `SkimMatcherV2` (already a workspace dependency, used
//! for path fuzzy-matching in the TUI) scores subsequence matches rather
//! than edit distance, so it stands in for the token-set measure, where a
//! subsequence-style match is the right shape; the other three measures are
//! edit-distance ratios via `strsim`.

use std::collections::BTreeSet;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use strsim::normalized_levenshtein;

/// Edit-distance similarity in `[0, 1]`.
pub fn ratio(a: &str, b: &str) -> f32 {
    normalized_levenshtein(a, b) as f32
}

/// Best ratio of the shorter string against any equal-length window of the
/// longer one (fuzzywuzzy's `partial_ratio`): rewards strings where one is
/// a near-exact substring of the other even when surrounded by extra text.
pub fn partial_ratio(a: &str, b: &str) -> f32 {
    let (short, long) = if a.chars().count() <= b.chars().count() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return if long.is_empty() { 1.0 } else { 0.0 };
    }
    let short_chars: Vec<char> = short.chars().collect();
    let long_chars: Vec<char> = long.chars().collect();
    if short_chars.len() >= long_chars.len() {
        return ratio(short, long);
    }

    let window = short_chars.len();
    let mut best = 0.0f32;
    for start in 0..=(long_chars.len() - window) {
        let candidate: String = long_chars[start..start + window].iter().collect();
        let score = ratio(short, &candidate);
        if score > best {
            best = score;
        }
    }
    best
}

/// Ratio of the two strings' whitespace-separated tokens sorted into a
/// canonical order first, so word order doesn't matter ("Dana Scully" vs.
/// "Scully, Dana").
pub fn token_sort_ratio(a: &str, b: &str) -> f32 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Ratio over the shared-token / unique-token decomposition (fuzzywuzzy's
/// `token_set_ratio`): two names that share most of their words but differ
/// by one extra token ("API Migration" vs. "API Migration Project") still
/// score highly. Each of the three pairwise comparisons uses the skim
/// subsequence matcher rather than edit distance.
pub fn token_set_ratio(a: &str, b: &str) -> f32 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let shared = intersection.join(" ");
    let combined_a = join_nonempty(&shared, &only_a.join(" "));
    let combined_b = join_nonempty(&shared, &only_b.join(" "));

    let matcher = SkimMatcherV2::default();
    [
        skim_ratio(&matcher, &shared, &combined_a),
        skim_ratio(&matcher, &shared, &combined_b),
        skim_ratio(&matcher, &combined_a, &combined_b),
    ]
    .into_iter()
    .fold(0.0f32, f32::max)
}

fn join_nonempty(shared: &str, rest: &str) -> String {
    match (shared.is_empty(), rest.is_empty()) {
        (true, true) => String::new(),
        (true, false) => rest.to_string(),
        (false, true) => shared.to_string(),
        (false, false) => format!("{shared} {rest}"),
    }
}

fn skim_ratio(matcher: &SkimMatcherV2, x: &str, y: &str) -> f32 {
    if x.is_empty() && y.is_empty() {
        return 1.0;
    }
    let longer_len = x.chars().count().max(y.chars().count());
    if longer_len == 0 {
        return 0.0;
    }
    let score = matcher.fuzzy_match(y, x).or_else(|| matcher.fuzzy_match(x, y));
    match score {
        // SkimMatcherV2 awards roughly up to 16 points per matched char
        // (base score plus consecutive-match bonus); scaling by the
        // longer string's length gives a bounded, deterministic ratio.
        Some(score) => (score as f32 / (longer_len as f32 * 16.0)).clamp(0.0, 1.0),
        None => 0.0,
    }
}

/// The full ensemble: max of the four measures, boosted 1.2x (capped at
/// 1.0) when one normalized name contains the other outright (spec §4.3).
pub fn ensemble_score(a: &str, b: &str) -> f32 {
    let base = [ratio(a, b), partial_ratio(a, b), token_sort_ratio(a, b), token_set_ratio(a, b)]
        .into_iter()
        .fold(0.0f32, f32::max);

    if !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a)) {
        (base * 1.2).min(1.0)
    } else {
        base
    }
}
