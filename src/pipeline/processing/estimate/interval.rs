//! Binomial proportion intervals.
//!
//! The Wilson score interval stays inside [0, 1] and keeps sensible coverage
//! at the small per-mutation sample sizes seen here, where the plain normal
//! approximation collapses to zero width at 0% and 100%.

// Rational approximation coefficients for the inverse standard normal CDF
// (Acklam), relative error below 1.15e-9.
const A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_69e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];

const P_LOW: f64 = 0.02425;

/// Quantile of the standard normal distribution, for `p` in (0, 1).
/// Out-of-range input saturates to the infinities.
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Two-sided Wilson score interval for `successes` out of `trials` at
/// critical value `z`. `None` when `trials` is zero or below `successes`.
pub fn wilson_interval(successes: u64, trials: u64, z: f64) -> Option<(f64, f64)> {
    if trials == 0 || successes > trials {
        return None;
    }

    let n = trials as f64;
    let p = successes as f64 / n;
    let z2 = z * z;

    let denominator = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denominator;
    let half_width = z * ((p * (1.0 - p) / n) + z2 / (4.0 * n * n)).sqrt() / denominator;

    let low = (center - half_width).max(0.0);
    let high = (center + half_width).min(1.0);
    // Exact bounds at the extremes; rounding can leave them a hair off
    let low = if successes == 0 { 0.0 } else { low };
    let high = if successes == trials { 1.0 } else { high };
    Some((low, high))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_quantile_known_values() {
        assert!((normal_quantile(0.975) - 1.959_964).abs() < 1e-6);
        assert!((normal_quantile(0.995) - 2.575_829).abs() < 1e-6);
        assert!(normal_quantile(0.5).abs() < 1e-12);
        assert!((normal_quantile(0.01) + 2.326_348).abs() < 1e-6);
    }

    #[test]
    fn test_wilson_reference_values() {
        // 40 of 150 at 95%
        let (low, high) = wilson_interval(40, 150, normal_quantile(0.975)).unwrap();
        assert!((low - 0.2024).abs() < 1e-3, "low {}", low);
        assert!((high - 0.3426).abs() < 1e-3, "high {}", high);
    }

    #[test]
    fn test_wilson_extremes_stay_in_unit_interval() {
        let z = normal_quantile(0.975);
        let (low, high) = wilson_interval(0, 10, z).unwrap();
        assert_eq!(low, 0.0);
        assert!(high > 0.0 && high < 1.0);

        let (low, high) = wilson_interval(10, 10, z).unwrap();
        assert!(low > 0.0 && low < 1.0);
        assert_eq!(high, 1.0);
    }

    #[test]
    fn test_wilson_rejects_impossible_counts() {
        assert!(wilson_interval(1, 0, 1.96).is_none());
        assert!(wilson_interval(11, 10, 1.96).is_none());
    }

    #[test]
    fn test_wilson_is_deterministic() {
        let a = wilson_interval(7, 33, normal_quantile(0.975));
        let b = wilson_interval(7, 33, normal_quantile(0.975));
        assert_eq!(a, b);
    }
}
