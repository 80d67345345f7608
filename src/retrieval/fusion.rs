//! Score fusion across the dense and lexical signals
//!
//! The two retrieval paths score in incompatible spaces: dense search
//! yields a distance (lower is better, unbounded above), lexical search
//! yields a BM25 score (higher is better, unbounded). Both are squashed
//! into [0, 1] and combined with a single weighted formula:
//!
//! `fused = w * 1/(1 + distance) + (1 - w) * (2/(1 + e^(-score/scale)) - 1)`
//!
//! The lexical squash is anchored at zero so that a missing lexical
//! signal and a zero lexical score contribute identically.

use crate::config::RetrievalConfig;

/// Normalize a dense distance into a similarity in [0, 1]
pub fn normalize_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Squash an unbounded lexical score into [0, 1), anchored at zero
pub fn squash_lexical(score: f32, scale: f32) -> f32 {
    2.0 / (1.0 + (-score.max(0.0) / scale).exp()) - 1.0
}

/// Fuse the two normalized components with the configured dense weight.
/// A path that did not return the chunk contributes zero.
pub fn fuse_scores(
    dense_distance: Option<f32>,
    lexical_score: Option<f32>,
    config: &RetrievalConfig,
) -> f32 {
    let dense_component = dense_distance.map(normalize_distance).unwrap_or(0.0);
    let lexical_component = lexical_score
        .map(|s| squash_lexical(s, config.lexical_scale))
        .unwrap_or(0.0);

    config.dense_weight * dense_component + (1.0 - config.dense_weight) * lexical_component
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RetrievalConfig {
        RetrievalConfig::default() // dense_weight 0.6, lexical_scale 10
    }

    #[test]
    fn test_normalize_distance_range() {
        assert!((normalize_distance(0.0) - 1.0).abs() < 1e-6);
        assert!((normalize_distance(1.0) - 0.5).abs() < 1e-6);
        assert!(normalize_distance(100.0) < 0.01);
    }

    #[test]
    fn test_squash_lexical_zero_anchored() {
        assert!(squash_lexical(0.0, 10.0).abs() < 1e-6, "zero score must squash to zero");
        assert!(squash_lexical(5.0, 10.0) > 0.0);
        assert!(squash_lexical(1000.0, 10.0) < 1.0, "squash must saturate below one");
    }

    #[test]
    fn test_squash_lexical_monotone() {
        let mut prev = -1.0;
        for s in [0.0, 0.5, 1.0, 2.0, 5.0, 10.0, 50.0] {
            let v = squash_lexical(s, 10.0);
            assert!(v > prev);
            prev = v;
        }
    }

    #[test]
    fn test_missing_path_contributes_zero() {
        let cfg = config();
        let dense_only = fuse_scores(Some(0.5), None, &cfg);
        assert!((dense_only - 0.6 * (1.0 / 1.5)).abs() < 1e-6);

        let lexical_only = fuse_scores(None, Some(5.0), &cfg);
        assert!((lexical_only - 0.4 * squash_lexical(5.0, 10.0)).abs() < 1e-6);

        assert_eq!(fuse_scores(None, None, &cfg), 0.0);
    }

    #[test]
    fn test_fusion_monotone_in_distance() {
        // Strictly decreasing distance with lexical held constant must
        // not decrease the fused score
        let cfg = config();
        let mut prev = -1.0;
        for d in [2.0_f32, 1.0, 0.5, 0.25, 0.1, 0.0] {
            let fused = fuse_scores(Some(d), Some(3.0), &cfg);
            assert!(fused >= prev, "fused must not decrease as distance improves");
            prev = fused;
        }
    }

    #[test]
    fn test_reference_scenario_ordering() {
        // Dense: A1 d=0.1, B1 d=0.4; Lexical: A2 s=5, B1 s=2; w=0.6
        let cfg = config();

        let a1 = fuse_scores(Some(0.1), None, &cfg);
        let b1 = fuse_scores(Some(0.4), Some(2.0), &cfg);
        let a2 = fuse_scores(None, Some(5.0), &cfg);

        // Exact values from the formulas
        assert!((a1 - 0.545_454_5).abs() < 1e-4, "a1 = {}", a1);
        assert!((b1 - 0.468_438).abs() < 1e-4, "b1 = {}", b1);
        assert!((a2 - 0.097_968).abs() < 1e-4, "a2 = {}", a2);

        assert!(a1 > b1 && b1 > a2, "expected order A1 > B1 > A2");
    }
}
