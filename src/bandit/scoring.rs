//! Scoring kernels and the variant → kernel mapping.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::bandit::math::{dot, mat_vec_mul, Matrix, Vector, FEATURE_DIM};

/// Which scoring kernel a variant uses. Closed set; the choice is per
/// candidate, not a separate code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Control bucket: the bandit contributes nothing, ranking is the
    /// normalized offline score alone.
    OfflineOnly,
    /// Linear UCB: mean + alpha · uncertainty.
    Ucb,
    /// Diagonal-Gaussian Thompson sampling.
    Thompson,
}

impl Strategy {
    /// Stable mapping from the assigned variant index. Variant 0 is the
    /// control; unmapped variants fall through to UCB.
    pub fn for_variant(variant: u32) -> Self {
        match variant {
            0 => Strategy::OfflineOnly,
            2 => Strategy::Thompson,
            _ => Strategy::Ucb,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::OfflineOnly => "offline_only",
            Strategy::Ucb => "ucb",
            Strategy::Thompson => "thompson",
        };
        f.write_str(name)
    }
}

/// `θ·x + alpha · sqrt(xᵀ·A⁻¹·x)`
pub fn ucb_score(theta: &Vector, x: &Vector, a_inv: &Matrix, alpha: f64) -> f64 {
    let mean = dot(theta, x);
    let tmp = mat_vec_mul(a_inv, x);
    let uncertainty = dot(x, &tmp).sqrt();
    mean + alpha * uncertainty
}

/// Draw `θ̃[i] ~ Normal(θ[i], sqrt(max(A⁻¹[i][i], 0)))` component-wise and
/// return `θ̃·x`. Diagonal approximation of the posterior.
pub fn thompson_score<R: Rng + ?Sized>(
    rng: &mut R,
    theta: &Vector,
    x: &Vector,
    a_inv: &Matrix,
) -> f64 {
    let mut sample = [0.0; FEATURE_DIM];
    for i in 0..FEATURE_DIM {
        let variance = a_inv[i][i].max(0.0);
        let z: f64 = rng.sample(StandardNormal);
        sample[i] = theta[i] + z * variance.sqrt();
    }
    dot(&sample, x)
}
