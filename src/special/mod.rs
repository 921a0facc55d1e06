//! Densities and distribution functions for the strategy posteriors
//!
//! Log-space Beta and Normal pdf/cdf evaluations used by the marginal
//! likelihood integrand. Everything is computed in log space so that the
//! product `f_i(x) * prod_j F_j(x)` can be summed instead of multiplied.

use std::f64::consts::{LN_2, PI, SQRT_2};

// ==================== Constants ====================

/// Continued fraction convergence threshold
const CF_EPSILON: f64 = 1e-14;

/// Guard against division by zero inside the continued fraction
const CF_FPMIN: f64 = 1e-300;

/// Maximum continued fraction iterations
const CF_MAX_ITER: usize = 300;

// ==================== Posterior Marginals ====================

/// Latent-value distribution of a single strategy
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Marginal {
    Beta { alpha: f64, beta: f64 },
    Normal { mean: f64, std_dev: f64 },
}

impl Marginal {
    pub fn log_pdf(&self, x: f64) -> f64 {
        match *self {
            Marginal::Beta { alpha, beta } => beta_log_pdf(x, alpha, beta),
            Marginal::Normal { mean, std_dev } => normal_log_pdf(x, mean, std_dev),
        }
    }

    pub fn log_cdf(&self, x: f64) -> f64 {
        match *self {
            Marginal::Beta { alpha, beta } => beta_log_cdf(x, alpha, beta),
            Marginal::Normal { mean, std_dev } => normal_log_cdf(x, mean, std_dev),
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            Marginal::Beta { alpha, beta } => alpha / (alpha + beta),
            Marginal::Normal { mean, .. } => mean,
        }
    }

    pub fn std_dev(&self) -> f64 {
        match *self {
            Marginal::Beta { alpha, beta } => {
                let total = alpha + beta;
                (alpha * beta / (total * total * (total + 1.0))).sqrt()
            }
            Marginal::Normal { std_dev, .. } => std_dev,
        }
    }

    /// Parameter bits, used as part of memoization keys
    pub(crate) fn key(&self) -> (u8, [u64; 2]) {
        match *self {
            Marginal::Beta { alpha, beta } => (0, [alpha.to_bits(), beta.to_bits()]),
            Marginal::Normal { mean, std_dev } => (1, [mean.to_bits(), std_dev.to_bits()]),
        }
    }
}

// ==================== Gamma and Beta Functions ====================

/// ln(Γ(x)) via recurrence up to x >= 10 followed by Stirling's series
pub fn ln_gamma(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::INFINITY;
    }

    let mut x = x;
    let mut result = 0.0;
    while x < 10.0 {
        result -= x.ln();
        x += 1.0;
    }

    let inv_x = 1.0 / x;
    let inv_x2 = inv_x * inv_x;
    let correction =
        inv_x * (1.0 / 12.0 - inv_x2 * (1.0 / 360.0 - inv_x2 * (1.0 / 1260.0 - inv_x2 / 1680.0)));

    result + (x - 0.5) * x.ln() - x + 0.5 * (2.0 * PI).ln() + correction
}

/// ln(B(a, b))
pub fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Log density of Beta(a, b) at x
pub fn beta_log_pdf(x: f64, a: f64, b: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) {
        return f64::NEG_INFINITY;
    }
    let left = if a == 1.0 { 0.0 } else { (a - 1.0) * x.ln() };
    let right = if b == 1.0 { 0.0 } else { (b - 1.0) * (1.0 - x).ln() };
    left + right - ln_beta(a, b)
}

/// Log of the regularized incomplete beta function I_x(a, b), the Beta CDF
pub fn beta_log_cdf(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if x >= 1.0 {
        return 0.0;
    }

    let ln_front = -ln_beta(a, b) + a * x.ln() + b * (1.0 - x).ln();

    // I_x(a,b) = 1 - I_{1-x}(b,a) keeps the continued fraction convergent
    if x < (a + 1.0) / (a + b + 2.0) {
        ln_front + (beta_cf(x, a, b) / a).ln()
    } else {
        let upper_tail = ln_front.exp() * beta_cf(1.0 - x, b, a) / b;
        if upper_tail >= 1.0 {
            f64::NEG_INFINITY
        } else {
            (-upper_tail).ln_1p()
        }
    }
}

/// Beta CDF
pub fn beta_cdf(x: f64, a: f64, b: f64) -> f64 {
    beta_log_cdf(x, a, b).exp()
}

/// Continued fraction for the incomplete beta function (modified Lentz)
fn beta_cf(x: f64, a: f64, b: f64) -> f64 {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < CF_FPMIN {
        d = CF_FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=CF_MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        // Even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < CF_FPMIN {
            d = CF_FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < CF_FPMIN {
            c = CF_FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        // Odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < CF_FPMIN {
            d = CF_FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < CF_FPMIN {
            c = CF_FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < CF_EPSILON {
            break;
        }
    }

    h
}

// ==================== Normal Distribution ====================

/// Log density of Normal(mean, std_dev) at x
pub fn normal_log_pdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    let z = (x - mean) / std_dev;
    -0.5 * z * z - std_dev.ln() - 0.5 * (2.0 * PI).ln()
}

/// Log CDF of Normal(mean, std_dev) at x
///
/// Uses `erfc` so the lower tail keeps relative precision.
pub fn normal_log_cdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    let z = (x - mean) / std_dev;
    let tail = erfc(-z / SQRT_2);
    if tail <= 0.0 {
        return f64::NEG_INFINITY;
    }
    tail.ln() - LN_2
}

/// Normal CDF
pub fn normal_cdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    normal_log_cdf(x, mean, std_dev).exp()
}

/// Complementary error function (Chebyshev fit, fractional error < 1.2e-7)
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marginal_moments() {
        let beta = Marginal::Beta {
            alpha: 2.0,
            beta: 6.0,
        };
        assert!((beta.mean() - 0.25).abs() < 1e-12);
        // var = 12 / (64 * 9)
        assert!((beta.std_dev() - (12.0f64 / 576.0).sqrt()).abs() < 1e-12);
        let normal = Marginal::Normal {
            mean: -1.5,
            std_dev: 0.01,
        };
        assert_eq!((normal.mean(), normal.std_dev()), (-1.5, 0.01));
    }

    #[test]
    fn test_ln_gamma_known_values() {
        // Γ(1) = Γ(2) = 1, Γ(5) = 24, Γ(0.5) = √π
        assert!(ln_gamma(1.0).abs() < 1e-9);
        assert!(ln_gamma(2.0).abs() < 1e-9);
        assert!((ln_gamma(5.0) - 24f64.ln()).abs() < 1e-9);
        assert!((ln_gamma(0.5) - PI.sqrt().ln()).abs() < 1e-9);
        assert!((ln_gamma(100.0) - 359.134_205_369_575_4).abs() < 1e-8);
    }

    #[test]
    fn test_uniform_beta() {
        // Beta(1, 1) is uniform on [0, 1]
        for &x in &[0.1, 0.25, 0.5, 0.9] {
            assert!(beta_log_pdf(x, 1.0, 1.0).abs() < 1e-9);
            assert!((beta_cdf(x, 1.0, 1.0) - x).abs() < 1e-9, "cdf({x})");
        }
    }

    #[test]
    fn test_beta_cdf_closed_forms() {
        // Beta(2, 1): F(x) = x^2; Beta(1, 3): F(x) = 1 - (1 - x)^3
        for &x in &[0.05, 0.3, 0.7, 0.99] {
            assert!((beta_cdf(x, 2.0, 1.0) - x * x).abs() < 1e-9);
            assert!((beta_cdf(x, 1.0, 3.0) - (1.0 - (1.0 - x).powi(3))).abs() < 1e-9);
        }
        assert_eq!(beta_log_cdf(0.0, 2.0, 2.0), f64::NEG_INFINITY);
        assert_eq!(beta_log_cdf(1.0, 2.0, 2.0), 0.0);
    }

    #[test]
    fn test_beta_cdf_symmetry() {
        let a = 4.5;
        let b = 2.25;
        for &x in &[0.2, 0.5, 0.8] {
            let lhs = beta_cdf(x, a, b);
            let rhs = 1.0 - beta_cdf(1.0 - x, b, a);
            assert!((lhs - rhs).abs() < 1e-9, "symmetry at {x}: {lhs} vs {rhs}");
        }
    }

    #[test]
    fn test_normal_cdf_values() {
        assert!((normal_cdf(0.0, 0.0, 1.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96, 0.0, 1.0) - 0.975_002_1).abs() < 1e-6);
        assert!((normal_cdf(-1.0, 0.0, 1.0) - 0.158_655_25).abs() < 1e-6);
        assert!((normal_cdf(3.0, 1.0, 2.0) - 0.841_344_75).abs() < 1e-6);
    }

    #[test]
    fn test_normal_log_cdf_lower_tail_finite() {
        let v = normal_log_cdf(-10.0, 0.0, 1.0);
        assert!(v.is_finite(), "deep tail should stay finite, got {v}");
        // ln Φ(-10) ≈ -53.23
        assert!((v + 53.231).abs() < 0.01, "got {v}");
    }

    #[test]
    fn test_marginal_dispatch() {
        let beta = Marginal::Beta {
            alpha: 2.0,
            beta: 1.0,
        };
        assert!((beta.log_pdf(0.5) - 1f64.ln()).abs() < 1e-9);
        let normal = Marginal::Normal {
            mean: 0.0,
            std_dev: 1.0,
        };
        assert!((normal.log_pdf(0.0) + 0.5 * (2.0 * PI).ln()).abs() < 1e-12);
        assert_ne!(beta.key(), normal.key());
    }
}
