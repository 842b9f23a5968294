//! Opening claims and the two-level grouper
//!
//! A proof round ends with many `(oracle, point, value)` claims. Opening each
//! one separately would cost one witness polynomial per claim; instead we
//! partition the claims so that every polynomial opened at the **same set of
//! points** shares one low-degree extension and one vanishing-polynomial
//! division (see `quotient`).
//!
//! The grouper is **parametric in the oracle**: the prover instantiates it
//! with dense polynomials, the verifier with commitments. The only contract
//! an oracle must satisfy is value-equality of the handle, which plain Rust
//! references already provide (`&T: PartialEq` compares referents). Points
//! are field elements held by reference; `&F` inherits the field's total
//! order, so an ordered set of point references is ordered **by value** —
//! two distinct memory locations holding the same element collapse.
//!
//! ## Algorithm (two passes, deterministic)
//!
//! 1. *By oracle.* Walk the claims once, building an ordered list of
//!    `(oracle, point-set)` entries and accumulating the super point set.
//! 2. *By point-set.* Merge entries whose point sets are structurally equal;
//!    the oracles of a merged entry keep first-appearance order, which later
//!    fixes the power of the aggregation challenge each oracle receives.
//!
//! A single pass keyed by point-set would have to hash point sets and would
//! silently conflate a polynomial opened twice at the same point; the
//! two-pass form is `O(N·G)` with `G` bounded by the number of distinct
//! oracles — tens to low thousands in practice.

use std::collections::BTreeSet;

use crate::F;

/// A single oracle with a single claimed opening `value = P(point)`.
///
/// `oracle` resolves to a dense polynomial on the prover side or to a
/// commitment on the verifier side. Identity for deduplication is the
/// `(oracle, point)` pair.
#[derive(Debug, Clone, Copy)]
pub struct OpeningClaim<'a, O> {
    /// Polynomial `Pᵢ` or commitment `Cᵢ`.
    pub oracle: &'a O,
    /// Evaluation point `xᵢ`.
    pub point: &'a F,
    /// Claimed value `Pᵢ(xᵢ)`.
    pub value: F,
}

impl<'a, O> OpeningClaim<'a, O> {
    /// Bundle an oracle handle, a point handle and the claimed value.
    pub fn new(oracle: &'a O, point: &'a F, value: F) -> Self {
        Self { oracle, point, value }
    }
}

/// One oracle with its claimed values at every point of a shared point list,
/// in the list's order: `[Pᵢ(x₀), Pᵢ(x₁), …]`.
#[derive(Debug, Clone)]
pub struct PolyOpenings<'a, O> {
    /// Polynomial `Pᵢ` or commitment `Cᵢ`.
    pub oracle: &'a O,
    /// `openings[j] = Pᵢ(points[j])` for the owning group's `points`.
    pub openings: Vec<F>,
}

/// Oracles sharing one evaluation-point set, plus that set in canonical
/// (ascending) order.
///
/// Invariants, maintained by [`OpeningGrouper::group`]:
/// - every `poly_openings[i].openings` has length `points.len()`;
/// - oracles within the group are pairwise distinct;
/// - `points` is sorted by the field's total order and duplicate-free.
#[derive(Debug, Clone)]
pub struct OpeningGroup<'a, O> {
    /// Per-oracle claimed-value rows.
    pub poly_openings: Vec<PolyOpenings<'a, O>>,
    /// The shared point set `[x₀, x₁, …]`, ascending.
    pub points: Vec<&'a F>,
}

/// Errors surfaced while grouping claims.
#[derive(Debug, thiserror::Error)]
pub enum GroupingError {
    /// Two claims on the same `(oracle, point)` pair disagree on the value.
    #[error("inconsistent claims on one (oracle, point) pair: {left} vs {right}")]
    InconsistentClaim {
        /// Value recorded first.
        left: F,
        /// Conflicting value.
        right: F,
    },
}

/// Partitions a batch of claims into [`OpeningGroup`]s and records the
/// super point set (the sorted union of every point referenced anywhere in
/// the batch, which tells the PCS which evaluations must appear in the
/// transcript).
#[derive(Debug)]
pub struct OpeningGrouper<'a, O> {
    groups: Vec<OpeningGroup<'a, O>>,
    super_point_set: BTreeSet<&'a F>,
}

impl<'a, O: PartialEq> OpeningGrouper<'a, O> {
    /// Group `claims` by oracle, then by point-set.
    ///
    /// Claims duplicated with equal values collapse (set semantics); claims
    /// duplicated with differing values are rejected.
    pub fn group(claims: &'a [OpeningClaim<'a, O>]) -> Result<Self, GroupingError> {
        let mut super_point_set = BTreeSet::new();

        // Pass 1 — group by oracle, collecting each oracle's point set.
        let mut by_oracle: Vec<(&'a O, BTreeSet<&'a F>)> = Vec::new();
        for claim in claims {
            super_point_set.insert(claim.point);
            match by_oracle.iter_mut().find(|(oracle, _)| *oracle == claim.oracle) {
                Some((_, points)) => {
                    points.insert(claim.point);
                }
                None => {
                    let mut points = BTreeSet::new();
                    points.insert(claim.point);
                    by_oracle.push((claim.oracle, points));
                }
            }
        }

        // Pass 2 — merge oracles whose point sets are equal as sets of values.
        let mut by_points: Vec<(BTreeSet<&'a F>, Vec<&'a O>)> = Vec::new();
        for (oracle, points) in by_oracle {
            match by_points.iter_mut().find(|(set, _)| *set == points) {
                Some((_, oracles)) => oracles.push(oracle),
                None => by_points.push((points, vec![oracle])),
            }
        }

        // Materialize value rows; ordered-set iteration gives the canonical
        // ascending point order shared by prover and verifier.
        let mut groups = Vec::with_capacity(by_points.len());
        for (points, oracles) in by_points {
            let points: Vec<&'a F> = points.into_iter().collect();
            let mut poly_openings = Vec::with_capacity(oracles.len());
            for oracle in oracles {
                let mut openings = Vec::with_capacity(points.len());
                for point in &points {
                    openings.push(claimed_value(claims, oracle, point)?);
                }
                poly_openings.push(PolyOpenings { oracle, openings });
            }
            groups.push(OpeningGroup { poly_openings, points });
        }

        Ok(Self { groups, super_point_set })
    }

    /// The opening groups, in deterministic emission order.
    pub fn groups(&self) -> &[OpeningGroup<'a, O>] {
        &self.groups
    }

    /// Sorted union of every point referenced by the input batch.
    pub fn super_point_set(&self) -> &BTreeSet<&'a F> {
        &self.super_point_set
    }

    /// Consume the grouper, yielding the groups and the super point set.
    pub fn into_parts(self) -> (Vec<OpeningGroup<'a, O>>, BTreeSet<&'a F>) {
        (self.groups, self.super_point_set)
    }
}

/// Look up the claimed value for `(oracle, point)` in the original claim
/// list, rejecting contradictory duplicates.
///
/// A miss is impossible: every pair reaching this function was inserted into
/// a pass-1 point set by a claim in the same list.
fn claimed_value<'a, O: PartialEq>(
    claims: &'a [OpeningClaim<'a, O>],
    oracle: &O,
    point: &F,
) -> Result<F, GroupingError> {
    let mut found: Option<F> = None;
    for claim in claims {
        if claim.oracle != oracle || claim.point != point {
            continue;
        }
        match found {
            None => found = Some(claim.value),
            Some(prior) if prior == claim.value => {}
            Some(prior) => {
                return Err(GroupingError::InconsistentClaim { left: prior, right: claim.value })
            }
        }
    }
    Ok(found.expect("claim recorded during pass 1 must be present"))
}
