use crate::model::distribution::{
    Distribution, DistributionSpec, FlatAxis, FlatParams, GaussianParams, InitialCoordinates,
    ParticleDistribution, TwissPlane,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

/// Samples exactly `spec.particle_count` particles, deterministically for a seed.
pub fn generate(spec: &DistributionSpec) -> ParticleDistribution {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let rows = (0..spec.particle_count)
        .map(|_| match &spec.distribution {
            Distribution::Flat(params) => sample_flat(&mut rng, params),
            Distribution::Gaussian(params) => sample_gaussian(&mut rng, params),
        })
        .collect();
    ParticleDistribution::new(rows)
}

fn uniform(rng: &mut StdRng, axis: &FlatAxis) -> f64 {
    if axis.width == 0.0 {
        axis.mean
    } else {
        rng.random_range(axis.lower()..=axis.upper())
    }
}

fn sample_flat(rng: &mut StdRng, params: &FlatParams) -> InitialCoordinates {
    InitialCoordinates {
        x: uniform(rng, &params.x),
        px: uniform(rng, &params.px),
        y: uniform(rng, &params.y),
        py: uniform(rng, &params.py),
        t: uniform(rng, &params.t),
        pt: uniform(rng, &params.pt),
    }
}

/// Pair of independent standard normals (Box–Muller).
fn standard_normals(rng: &mut StdRng) -> (f64, f64) {
    // 1 - U keeps the argument of ln strictly positive.
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    let radius = (-2.0 * u1.ln()).sqrt();
    let phase = TAU * u2;
    (radius * phase.cos(), radius * phase.sin())
}

fn twiss(rng: &mut StdRng, plane: &TwissPlane) -> (f64, f64) {
    let (n1, n2) = standard_normals(rng);
    let position = (plane.emittance * plane.beta).sqrt() * n1;
    let angle = (plane.emittance / plane.beta).sqrt() * (n2 - plane.alpha * n1);
    (position, angle)
}

fn sample_gaussian(rng: &mut StdRng, params: &GaussianParams) -> InitialCoordinates {
    let (x, px) = twiss(rng, &params.x);
    let (y, py) = twiss(rng, &params.y);
    let (nt, npt) = standard_normals(rng);
    InitialCoordinates {
        x,
        px,
        y,
        py,
        t: params.sigma_t * nt,
        pt: params.sigma_pt * npt,
    }
}
