//! Adaptive numerical integration
//!
//! Globally adaptive Gauss-Kronrod (7/15 point) quadrature with an explicit
//! subdivision budget, plus the per-run memo of log pdf/cdf evaluations that
//! the marginal likelihood integrand reuses across strategies.
//!
//! The cache is owned by a single run. Values are keyed by the exact
//! parameter bits, and the learner clears it when a run starts so nothing
//! computed under one prior vector survives into another run.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::special::Marginal;
use crate::types::PRECISION_EPSILON;

// ==================== Gauss-Kronrod Nodes ====================

/// Kronrod abscissae (the odd entries are the 7-point Gauss nodes, last is the centre)
const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];

/// Kronrod weights
const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_18,
    0.140_653_259_715_525_92,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_83,
];

/// Gauss weights for XGK[1], XGK[3], XGK[5] and the centre
const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

// ==================== Options and Errors ====================

/// Quadrature tolerances and cost budget
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadratureOptions {
    /// Absolute error tolerance on each integral
    pub tolerance: f64,
    /// Maximum number of interval bisections per integral
    pub max_subdivisions: usize,
    /// Number of equal segments the support is split into before adapting
    pub initial_segments: usize,
}

impl Default for QuadratureOptions {
    fn default() -> Self {
        Self {
            tolerance: PRECISION_EPSILON,
            max_subdivisions: 2000,
            initial_segments: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuadratureError {
    #[error("quadrature did not converge: estimate {estimate}, error {error} after {subdivisions} subdivisions")]
    NotConverged {
        estimate: f64,
        error: f64,
        subdivisions: usize,
    },
    #[error("integrand is not finite at x = {0}")]
    NonFiniteIntegrand(f64),
    #[error("invalid integration interval [{lower}, {upper}]")]
    InvalidInterval { lower: f64, upper: f64 },
}

/// Result of a converged integration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Integral {
    pub value: f64,
    pub error: f64,
    pub subdivisions: usize,
}

// ==================== Integration ====================

#[derive(Clone, Copy, Debug)]
struct Segment {
    lower: f64,
    upper: f64,
    value: f64,
    error: f64,
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.error.total_cmp(&other.error) == Ordering::Equal
    }
}

impl Eq for Segment {}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error.total_cmp(&other.error)
    }
}

/// Apply the 15-point Kronrod rule (and embedded 7-point Gauss rule) on one segment
fn kronrod_segment<F>(f: &mut F, lower: f64, upper: f64) -> Result<Segment, QuadratureError>
where
    F: FnMut(f64) -> f64,
{
    let center = 0.5 * (lower + upper);
    let half = 0.5 * (upper - lower);

    let mut eval = |x: f64| -> Result<f64, QuadratureError> {
        let y = f(x);
        if y.is_finite() {
            Ok(y)
        } else {
            Err(QuadratureError::NonFiniteIntegrand(x))
        }
    };

    let fc = eval(center)?;
    let mut kronrod = fc * WGK[7];
    let mut gauss = fc * WG[3];

    for j in 0..7 {
        let dx = half * XGK[j];
        let pair = eval(center - dx)? + eval(center + dx)?;
        kronrod += WGK[j] * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }

    Ok(Segment {
        lower,
        upper,
        value: kronrod * half,
        error: ((kronrod - gauss) * half).abs(),
    })
}

/// Integrate `f` over `[lower, upper]` to the configured absolute tolerance.
///
/// The segment with the largest error estimate is bisected until the summed
/// error falls below the tolerance. Exhausting the subdivision budget is an
/// error, never a silently returned estimate.
pub fn integrate<F>(
    f: F,
    lower: f64,
    upper: f64,
    options: &QuadratureOptions,
) -> Result<Integral, QuadratureError>
where
    F: FnMut(f64) -> f64,
{
    integrate_with_breakpoints(f, lower, upper, &[], options)
}

/// [`integrate`] with extra initial segment boundaries.
///
/// A narrow feature that falls between the Kronrod nodes of every initial
/// segment has an error estimate of zero and is never bisected. Placing a
/// breakpoint on each feature gives it segments of its own. Breakpoints
/// outside `(lower, upper)` are ignored.
pub fn integrate_with_breakpoints<F>(
    mut f: F,
    lower: f64,
    upper: f64,
    breakpoints: &[f64],
    options: &QuadratureOptions,
) -> Result<Integral, QuadratureError>
where
    F: FnMut(f64) -> f64,
{
    if !(lower.is_finite() && upper.is_finite()) || lower >= upper {
        return Err(QuadratureError::InvalidInterval { lower, upper });
    }

    let edges = initial_edges(lower, upper, breakpoints, options.initial_segments.max(1));
    let mut heap = BinaryHeap::with_capacity(edges.len() + 2 * options.max_subdivisions);
    for pair in edges.windows(2) {
        heap.push(kronrod_segment(&mut f, pair[0], pair[1])?);
    }

    let mut subdivisions = 0;
    loop {
        let (value, error) = heap
            .iter()
            .fold((0.0, 0.0), |(v, e), s| (v + s.value, e + s.error));

        if error <= options.tolerance {
            return Ok(Integral {
                value,
                error,
                subdivisions,
            });
        }
        if subdivisions >= options.max_subdivisions {
            return Err(QuadratureError::NotConverged {
                estimate: value,
                error,
                subdivisions,
            });
        }

        let worst = match heap.pop() {
            Some(segment) => segment,
            None => return Err(QuadratureError::InvalidInterval { lower, upper }),
        };
        let mid = 0.5 * (worst.lower + worst.upper);
        heap.push(kronrod_segment(&mut f, worst.lower, mid)?);
        heap.push(kronrod_segment(&mut f, mid, worst.upper)?);
        subdivisions += 1;
    }
}

/// Sorted, deduplicated segment boundaries: an even grid plus the breakpoints
fn initial_edges(lower: f64, upper: f64, breakpoints: &[f64], segments: usize) -> Vec<f64> {
    let width = (upper - lower) / segments as f64;
    let mut edges: Vec<f64> = (0..segments)
        .map(|k| lower + k as f64 * width)
        .chain(
            breakpoints
                .iter()
                .copied()
                .filter(|x| x.is_finite() && *x > lower && *x < upper),
        )
        .collect();
    edges.push(upper);
    edges.sort_by(f64::total_cmp);

    let min_width = (upper - lower) * f64::EPSILON * 4.0;
    let mut deduped: Vec<f64> = Vec::with_capacity(edges.len());
    for x in edges {
        match deduped.last() {
            Some(&last) if x - last <= min_width => {}
            _ => deduped.push(x),
        }
    }
    // Keep the exact upper bound even if a breakpoint sat just below it
    if let Some(last) = deduped.last_mut() {
        *last = upper;
    }
    deduped
}

// ==================== Evaluation Cache ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    family: u8,
    params: [u64; 2],
    x: u64,
}

impl CacheKey {
    fn new(marginal: &Marginal, x: f64) -> Self {
        let (family, params) = marginal.key();
        Self {
            family,
            params,
            x: x.to_bits(),
        }
    }
}

/// Memo of log pdf / log cdf evaluations for one scoring run
#[derive(Debug, Default)]
pub struct IntegrationCache {
    log_pdf: HashMap<CacheKey, f64>,
    log_cdf: HashMap<CacheKey, f64>,
    hits: u64,
    misses: u64,
}

impl IntegrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_pdf(&mut self, marginal: &Marginal, x: f64) -> f64 {
        let key = CacheKey::new(marginal, x);
        if let Some(&v) = self.log_pdf.get(&key) {
            self.hits += 1;
            return v;
        }
        self.misses += 1;
        let v = marginal.log_pdf(x);
        self.log_pdf.insert(key, v);
        v
    }

    pub fn log_cdf(&mut self, marginal: &Marginal, x: f64) -> f64 {
        let key = CacheKey::new(marginal, x);
        if let Some(&v) = self.log_cdf.get(&key) {
            self.hits += 1;
            return v;
        }
        self.misses += 1;
        let v = marginal.log_cdf(x);
        self.log_cdf.insert(key, v);
        v
    }

    /// Drop every memoized value and reset the counters
    pub fn clear(&mut self) {
        self.log_pdf.clear();
        self.log_cdf.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.log_pdf.len() + self.log_cdf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
