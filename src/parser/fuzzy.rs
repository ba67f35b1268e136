//! Fuzzy target-name recovery.
//!
//! §4.5's failure mode and §4.8's recovery transition share this: given a requested name and the
//! candidates visible in a file, rank by `strsim::normalized_levenshtein`, keep everything at or
//! above the listing threshold, and let the caller decide whether the top score clears the
//! auto-recovery bar.

use crate::error::SimilarCandidate;

/// Threshold above which a candidate is worth listing to the user at all (§4.5).
pub const LISTING_THRESHOLD: f64 = 0.5;

/// Rank `candidates` by similarity to `requested`, keeping only those at or above
/// [`LISTING_THRESHOLD`], highest score first.
pub fn rank(requested: &str, candidates: &[String]) -> Vec<SimilarCandidate> {
    let mut scored: Vec<SimilarCandidate> = candidates
        .iter()
        .map(|c| SimilarCandidate {
            name: c.clone(),
            score: strsim::normalized_levenshtein(requested, c),
        })
        .filter(|c| c.score >= LISTING_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Whether the top-ranked candidate clears `threshold` and should be used for silent recovery.
pub fn best_match_clears(ranked: &[SimilarCandidate], threshold: f64) -> Option<&SimilarCandidate> {
    ranked.first().filter(|c| c.score >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_ranks_first_with_score_one() {
        let candidates = vec!["Greeter".to_string(), "Greeting".to_string()];
        let ranked = rank("Greeter", &candidates);
        assert_eq!(ranked[0].name, "Greeter");
        assert_eq!(ranked[0].score, 1.0);
    }

    #[test]
    fn low_similarity_candidates_are_dropped() {
        let candidates = vec!["Zephyr".to_string(), "Greetr".to_string()];
        let ranked = rank("Greeter", &candidates);
        assert!(ranked.iter().all(|c| c.name != "Zephyr"));
        assert!(ranked.iter().any(|c| c.name == "Greetr"));
    }

    #[test]
    fn best_match_clears_respects_threshold() {
        let ranked = rank("Greeter", &["Greetr".to_string()]);
        assert!(best_match_clears(&ranked, 0.85).is_none());
        assert!(best_match_clears(&ranked, 0.5).is_some());
    }
}
