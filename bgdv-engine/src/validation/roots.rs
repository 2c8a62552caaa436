//! Numeric real-root finder
//!
//! Finds every real root of a one-variable function inside a solve domain
//! `(lower, upper]`:
//!
//! 1. Sample the domain, linearly every `grid_step` up to `dense_limit`, then
//!    geometrically by `growth_factor` up to `upper`.
//! 2. Refine each sign change by bisection. A refined point whose residual
//!    exceeds `residual_tolerance` was a pole (e.g. `TAN` at 90°), not a root.
//! 3. Refine each local minimum of `|f|` without a sign change by
//!    golden-section search, catching tangential roots.
//! 4. Refine each edge where the function stops being defined (`SQRT` of a
//!    negative number), catching roots that sit exactly on that edge.
//! 5. Deduplicate.
//!
//! Non-finite samples are skipped. Roots are returned in ascending order.

use bgdv_common::reference::SolveDomain;
use bgdv_common::SolverSettings;

/// Offset of the first sample from the open lower bound, in grid steps
const LOWER_BOUND_OFFSET: f64 = 1e-6;

/// Upper bound on samples in the linear part of the grid
const MAX_LINEAR_SAMPLES: usize = 1_000_000;

/// Roots closer than this many grid steps are merged
const DEDUP_STEPS: f64 = 1e-3;

/// Golden-section ratio
const INV_PHI: f64 = 0.618_033_988_749_894_8;

#[derive(Debug, Clone, Copy)]
struct Sample {
    x: f64,
    y: f64,
}

impl Sample {
    fn defined(&self) -> bool {
        self.y.is_finite()
    }
}

/// Root finder configured from `[solver]` settings
#[derive(Debug, Clone, Copy)]
pub struct RootFinder {
    settings: SolverSettings,
}

impl Default for RootFinder {
    fn default() -> Self {
        Self::new(SolverSettings::default())
    }
}

impl RootFinder {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Every real root of `f` in `domain`, ascending
    pub fn find_roots(&self, f: impl Fn(f64) -> f64, domain: SolveDomain) -> Vec<f64> {
        let samples: Vec<Sample> = self
            .grid(domain)
            .into_iter()
            .map(|x| Sample { x, y: f(x) })
            .collect();

        let mut roots = Vec::new();

        for (i, window) in samples.windows(2).enumerate() {
            let (a, b) = (window[0], window[1]);

            match (a.defined(), b.defined()) {
                (true, true) => {
                    if a.y == 0.0 {
                        roots.push(a.x);
                    } else if a.y.signum() != b.y.signum() && b.y != 0.0 {
                        if let Some(root) = self.bisect(&f, a, b) {
                            roots.push(root);
                        }
                    } else if let Some(c) = samples.get(i + 2) {
                        if c.defined() && b.y.abs() < a.y.abs() && b.y.abs() < c.y.abs() {
                            if let Some(root) = self.golden_section(&f, a.x, c.x) {
                                roots.push(root);
                            }
                        }
                    }
                }
                (true, false) | (false, true) => {
                    if let Some(root) = self.defined_edge(&f, a, b) {
                        roots.push(root);
                    }
                }
                (false, false) => {}
            }
        }

        if let Some(last) = samples.last() {
            if last.y == 0.0 {
                roots.push(last.x);
            }
        }

        self.dedup(roots)
    }

    /// Sample points covering `(lower, upper]`
    fn grid(&self, domain: SolveDomain) -> Vec<f64> {
        let SolverSettings {
            grid_step,
            dense_limit,
            growth_factor,
            ..
        } = self.settings;

        let mut points = Vec::new();
        if !(domain.lower.is_finite() && domain.upper.is_finite() && domain.lower < domain.upper) {
            return points;
        }

        // Widen the linear step so a far-reaching lower bound stays bounded
        let linear_end = dense_limit.max(0.0).min(domain.upper);
        let step = grid_step.max((linear_end - domain.lower) / MAX_LINEAR_SAMPLES as f64);

        let mut x = domain.lower + step * LOWER_BOUND_OFFSET;
        while x < domain.upper {
            points.push(x);
            x = if x < dense_limit || x <= 0.0 {
                domain.lower + step * (points.len() as f64)
            } else {
                x * growth_factor
            };
        }
        points.push(domain.upper);

        points
    }

    /// Refine a sign change `a.y * b.y < 0`
    fn bisect(&self, f: &impl Fn(f64) -> f64, a: Sample, b: Sample) -> Option<f64> {
        let (mut lo, mut hi) = (a, b);

        for _ in 0..self.settings.bisection_iterations {
            let x = (lo.x + hi.x) / 2.0;
            if x == lo.x || x == hi.x {
                break;
            }
            let mid = Sample { x, y: f(x) };
            if !mid.defined() {
                return None;
            }
            if mid.y == 0.0 {
                return Some(mid.x);
            }
            if mid.y.signum() == lo.y.signum() {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let best = if lo.y.abs() <= hi.y.abs() { lo } else { hi };
        self.accept(best)
    }

    /// Minimise `|f|` over `[lo, hi]`
    fn golden_section(&self, f: &impl Fn(f64) -> f64, lo: f64, hi: f64) -> Option<f64> {
        let (mut lo, mut hi) = (lo, hi);
        let abs = |x: f64| f(x).abs();

        let mut x1 = hi - INV_PHI * (hi - lo);
        let mut x2 = lo + INV_PHI * (hi - lo);
        let (mut f1, mut f2) = (abs(x1), abs(x2));

        for _ in 0..self.settings.bisection_iterations {
            if f1 < f2 {
                hi = x2;
                x2 = x1;
                f2 = f1;
                x1 = hi - INV_PHI * (hi - lo);
                f1 = abs(x1);
            } else {
                lo = x1;
                x1 = x2;
                f1 = f2;
                x2 = lo + INV_PHI * (hi - lo);
                f2 = abs(x2);
            }
        }

        let x = (lo + hi) / 2.0;
        self.accept(Sample { x, y: f(x) })
    }

    /// Refine the boundary between a defined and an undefined sample
    fn defined_edge(&self, f: &impl Fn(f64) -> f64, a: Sample, b: Sample) -> Option<f64> {
        let (mut inside, mut outside) = if a.defined() { (a, b) } else { (b, a) };

        for _ in 0..self.settings.bisection_iterations {
            let x = (inside.x + outside.x) / 2.0;
            if x == inside.x || x == outside.x {
                break;
            }
            let mid = Sample { x, y: f(x) };
            if mid.defined() {
                inside = mid;
            } else {
                outside = mid;
            }
        }

        self.accept(inside)
    }

    fn accept(&self, sample: Sample) -> Option<f64> {
        (sample.defined() && sample.y.abs() <= self.settings.residual_tolerance).then_some(sample.x)
    }

    fn dedup(&self, mut roots: Vec<f64>) -> Vec<f64> {
        roots.sort_by(|a, b| a.total_cmp(b));
        let tolerance = self.settings.grid_step * DEDUP_STEPS;

        let mut unique: Vec<f64> = Vec::with_capacity(roots.len());
        for root in roots {
            match unique.last() {
                Some(last) if (root - last).abs() <= tolerance.max(last.abs() * 1e-9) => {}
                _ => unique.push(root),
            }
        }
        unique
    }
}
