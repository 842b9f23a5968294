//! Crate root: public surface, core aliases, and protocol-wide invariants
//!
//! This crate implements the **opening-aggregation core** of a PLONK-style
//! prover: the machinery that collects per-round opening claims, groups them
//! by shared evaluation-point sets, and builds the combined quotient
//! polynomial `H(X) = (Σ rⁱ (Pᵢ(X) − Rᵢ(X))) / Z(X)` the polynomial
//! commitment scheme consumes. The lookup argument prover that feeds the
//! aggregator lives here as well, together with its compression, permutation
//! and grand-product subroutines.
//!
//! ## Invariants
//!
//! - **Field & Curve.** The scalar field is `ark_bn254::Fr` (`F` in this
//!   crate); commitments use KZG on BN254 (`G1 = ark_bn254::G1Affine`). All
//!   arithmetic is constant-time as provided by Arkworks; we **forbid
//!   unsafe** throughout the crate.
//!
//! - **Transcript discipline.** Every challenge (`θ`, `β`, `γ`, `x`, `r`) is
//!   a synchronization point: all prior commitments and evaluations are
//!   absorbed before the challenge is derived. Parallel work inside a round
//!   is resolved to a deterministic append order before the next challenge.
//!
//! - **Linear ownership.** Claims, groups and polynomials flow by move:
//!   lookup prover → grouper → quotient builder → PCS. The transcript, the
//!   blinder and the batch-commit queue have a single logical owner
//!   ([`prover::ProverCtx`]) and are mutated through `&mut`.
//!
//! - **Failure model.** The prover is single-shot; every error is
//!   local-fatal (no retry, no partial proof). Errors are precise typed
//!   enums, never UB.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

use ark_poly::{univariate::DensePolynomial, Evaluations, Radix2EvaluationDomain};

/// Opening claims, the two-level grouper, and the super point set.
pub mod opening;
/// Per-group combined quotient construction (LDE + linearization + division).
pub mod quotient;
/// Expression AST and the table evaluator used by lookup compression.
pub mod expression;
/// Lookup-argument prover pipeline (compress → permute → commit → Z → open).
pub mod lookup;
/// Grand-product accumulator built from numerator/denominator callbacks.
pub mod grand_product;
/// Chunked worker-pool dispatch for data-parallel fills.
pub mod parallel;
/// Polynomial commitment backend interface and the KZG implementation.
pub mod pcs;
/// Fiat–Shamir transcript (domain-separated hashing, hash→field).
pub mod transcript;
/// Prover context, batch-commit queue, and the full proving round.
pub mod prover;
/// R1CS binary container reader (circom layout).
pub mod r1cs;

// ============================================================================
// Canonical aliases (centralization)
// ============================================================================

/// Scalar field used across the crate (BN254).
pub type F = ark_bn254::Fr;

/// G1 affine group element used for commitments.
pub type G1 = ark_bn254::G1Affine;

/// Dense univariate polynomial in coefficient form.
pub type Poly = DensePolynomial<F>;

/// Polynomial in Lagrange (evaluation) form over the proving domain.
pub type Evals = Evaluations<F, Domain>;

/// Radix-2 FFT domain `H = {1, ω, …, ω^{N−1}}`.
pub type Domain = Radix2EvaluationDomain<F>;

// ============================================================================
// Root-level re-exports
// ============================================================================

pub use crate::opening::{OpeningClaim, OpeningGroup, OpeningGrouper, PolyOpenings};
pub use crate::pcs::{Commitment, Kzg, PcsBackend};
pub use crate::prover::{LookupBatchProof, ProverCtx};
pub use crate::quotient::CombinedQuotient;
