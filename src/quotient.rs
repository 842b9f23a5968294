//! Combined quotient construction per opening group
//!
//! For a group `{(Pᵢ, [vᵢ,₀ … vᵢ,ₖ₋₁])}ᵢ` sharing points `[x₀ … xₖ₋₁]` and an
//! aggregation challenge `r`, we build
//!
//! ```text
//! Rᵢ(X)  — the unique degree <k polynomial with Rᵢ(xⱼ) = vᵢ,ⱼ
//! N(X)   = Σᵢ rⁱ · (Pᵢ(X) − Rᵢ(X))
//! Z(X)   = Πⱼ (X − xⱼ)
//! H(X)   = N(X) / Z(X)
//! ```
//!
//! `Z` divides `N` exactly iff every claimed value is the true evaluation;
//! a nonzero remainder means the claim set is inconsistent and the proof
//! must abort. The power of `r` an oracle receives is its index in the
//! group, i.e. the grouper's first-appearance order, which the verifier
//! reconstructs identically.

use ark_ff::{batch_inversion, One, Zero};
use ark_poly::univariate::DenseOrSparsePolynomial;
use ark_poly::DenseUVPolynomial;

use crate::opening::OpeningGroup;
use crate::{Poly, F};

/// Errors surfaced by the quotient builder.
#[derive(Debug, thiserror::Error)]
pub enum QuotientError {
    /// Lagrange interpolation saw non-distinct evaluation points.
    #[error("interpolation failed: evaluation points are not pairwise distinct")]
    Interpolation,
    /// `Z(X) ∤ N(X)`: a claimed value is not the true evaluation.
    #[error("vanishing polynomial does not divide the combined numerator")]
    Divisibility,
}

/// Output of [`OpeningGroup::combined_quotient`]: the per-oracle low-degree
/// extensions and the combined quotient the PCS consumes.
#[derive(Debug, Clone)]
pub struct CombinedQuotient {
    /// `Rᵢ(X)`, one per oracle, in group order.
    pub low_degree_extensions: Vec<Poly>,
    /// `H(X) = N(X) / Z(X)`.
    pub quotient: Poly,
}

impl<'a> OpeningGroup<'a, Poly> {
    /// Build the low-degree extensions and the combined quotient for this
    /// group under the aggregation challenge `r`.
    pub fn combined_quotient(&self, r: F) -> Result<CombinedQuotient, QuotientError> {
        // Interpolation and root products index points positionally, so
        // work on owned copies of the shared point handles.
        let points: Vec<F> = self.points.iter().map(|p| **p).collect();

        let low_degree_extensions: Vec<Poly> = self
            .poly_openings
            .iter()
            .map(|po| lagrange_interpolate(&points, &po.openings))
            .collect::<Result<_, _>>()?;

        // numerators: [P₀ − R₀, P₁ − R₁, …]
        let numerators: Vec<Poly> = self
            .poly_openings
            .iter()
            .zip(&low_degree_extensions)
            .map(|(po, lde)| po.oracle - lde)
            .collect();

        // N(X) = n₀ + r·(n₁ + r·(n₂ + …)) — Horner over the group order.
        let numerator = linearize(numerators, r);

        // H(X) = N(X) / Πⱼ (X − xⱼ), exactly.
        let vanishing = vanishing_poly(&points);
        let (quotient, remainder) = DenseOrSparsePolynomial::from(&numerator)
            .divide_with_q_and_r(&DenseOrSparsePolynomial::from(&vanishing))
            .ok_or(QuotientError::Divisibility)?;
        if !remainder.is_zero() {
            return Err(QuotientError::Divisibility);
        }

        Ok(CombinedQuotient { low_degree_extensions, quotient })
    }
}

/// Fold numerator polynomials with ascending powers of `r`.
fn linearize(numerators: Vec<Poly>, r: F) -> Poly {
    numerators.into_iter().rev().fold(Poly::zero(), |acc, n| &scale(&acc, r) + &n)
}

/// `s · P(X)`.
fn scale(p: &Poly, s: F) -> Poly {
    Poly::from_coefficients_vec(p.coeffs.iter().map(|c| *c * s).collect())
}

/// Unique polynomial of degree `< points.len()` through `(points[j], values[j])`.
///
/// Distinct points make the Vandermonde system invertible; a repeated point
/// shows up as a vanishing basis denominator and is reported as an
/// interpolation failure.
pub fn lagrange_interpolate(points: &[F], values: &[F]) -> Result<Poly, QuotientError> {
    debug_assert_eq!(points.len(), values.len());

    // Denominators Πₘ≠ⱼ (xⱼ − xₘ), inverted in one batch.
    let mut denoms: Vec<F> = points
        .iter()
        .enumerate()
        .map(|(j, xj)| {
            points
                .iter()
                .enumerate()
                .filter(|&(m, _)| m != j)
                .fold(F::one(), |acc, (_, xm)| acc * (*xj - xm))
        })
        .collect();
    if denoms.iter().any(|d| d.is_zero()) {
        return Err(QuotientError::Interpolation);
    }
    batch_inversion(&mut denoms);

    let mut acc = Poly::zero();
    for (j, (value, denom_inv)) in values.iter().zip(&denoms).enumerate() {
        // basis_j(X) = Πₘ≠ⱼ (X − xₘ) / (xⱼ − xₘ)
        let mut basis = Poly::from_coefficients_vec(vec![*value * denom_inv]);
        for (m, xm) in points.iter().enumerate() {
            if m != j {
                basis = &basis * &Poly::from_coefficients_vec(vec![-*xm, F::one()]);
            }
        }
        acc = &acc + &basis;
    }
    Ok(acc)
}

/// `Z(X) = Πⱼ (X − xⱼ)`.
pub fn vanishing_poly(points: &[F]) -> Poly {
    points.iter().fold(Poly::from_coefficients_vec(vec![F::one()]), |acc, x| {
        &acc * &Poly::from_coefficients_vec(vec![-*x, F::one()])
    })
}
