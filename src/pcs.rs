//! Polynomial commitment backend — KZG on BN254
//!
//! The aggregation pipeline only needs two things from a commitment scheme:
//! a way to commit a coefficient vector, and to know whether commitments may
//! be queued into indexed slots and produced in one batch. Everything else
//! (the opening argument, verification pairings) lives outside this crate,
//! so the surface here is the [`PcsBackend`] trait plus the KZG
//! implementation the prover ships with.
//!
//! The SRS is held by the backend value — callers that need a production
//! ceremony load its G1 powers with [`Kzg::from_powers`]; [`Kzg::setup_dev`]
//! derives throwaway powers from a seeded RNG for tests and development.

use ark_ec::{CurveGroup, Group, VariableBaseMSM};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{rngs::StdRng, SeedableRng};

use ark_bn254::G1Projective;
use ark_ff::{One, UniformRand};

use crate::{F, G1};

/// PCS commitment newtype (wraps **G1Affine** directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Commitment(pub G1);

/// Errors surfaced by commitment backends.
#[derive(Debug, thiserror::Error)]
pub enum PcsError {
    /// The polynomial's degree exceeds what the loaded SRS supports.
    #[error("polynomial degree {degree} exceeds SRS capacity {max_degree}")]
    DegreeOverflow {
        /// Degree of the offending polynomial.
        degree: usize,
        /// Largest degree the SRS supports.
        max_degree: usize,
    },
    /// An SRS with no powers was supplied.
    #[error("empty SRS provided")]
    EmptySrs,
}

/// Commitment backend consumed by the prover context.
pub trait PcsBackend {
    /// Whether commit requests may be enqueued at sequential slot indices
    /// and produced in one deterministic batch. Backends without batch
    /// support are committed-and-written immediately instead; both modes
    /// yield the same verifier-visible byte sequence.
    const SUPPORTS_BATCH_MODE: bool;

    /// Largest polynomial degree this backend can commit.
    fn max_degree(&self) -> usize;

    /// Commit a coefficient vector (ascending powers).
    fn commit_coeffs(&self, coeffs: &[F]) -> Result<Commitment, PcsError>;
}

/// KZG commitments over BN254: `C = Σ aᵢ · [τⁱ]G₁`.
#[derive(Debug, Clone)]
pub struct Kzg {
    powers: Vec<G1>,
}

impl Kzg {
    /// Load a trusted G1 SRS (powers of τ).
    pub fn from_powers(powers: Vec<G1>) -> Result<Self, PcsError> {
        if powers.is_empty() {
            return Err(PcsError::EmptySrs);
        }
        Ok(Self { powers })
    }

    /// Derive a development SRS from a seed. The toxic waste τ is sampled
    /// and dropped inside this function; nothing outside tests should rely
    /// on knowing it.
    pub fn setup_dev(max_degree: usize, seed: [u8; 32]) -> Self {
        let mut rng = StdRng::from_seed(seed);
        let tau = F::rand(&mut rng);
        let gen = G1Projective::generator();

        let mut powers = Vec::with_capacity(max_degree + 1);
        let mut cur = F::one();
        for _ in 0..=max_degree {
            powers.push((gen * cur).into_affine());
            cur *= tau;
        }
        Self { powers }
    }
}

impl PcsBackend for Kzg {
    const SUPPORTS_BATCH_MODE: bool = true;

    fn max_degree(&self) -> usize {
        self.powers.len() - 1
    }

    fn commit_coeffs(&self, coeffs: &[F]) -> Result<Commitment, PcsError> {
        if coeffs.len() > self.powers.len() {
            return Err(PcsError::DegreeOverflow {
                degree: coeffs.len() - 1,
                max_degree: self.max_degree(),
            });
        }
        let acc = G1Projective::msm(&self.powers[..coeffs.len()], coeffs)
            .expect("bases and scalars were sliced to equal length");
        Ok(Commitment(acc.into_affine()))
    }
}
