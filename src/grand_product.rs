//! Grand-product accumulator
//!
//! Builds the running product `Z` whose boundary values encode the lookup
//! relation: `Z(ω⁰) = 1` and, because the permuted columns are permutations
//! of the compressed ones, the product telescopes back to 1 after a full
//! cycle.
//!
//! The numerator and denominator are filled by caller-supplied callbacks
//! over disjoint chunks (see `parallel`); the sequential calls between the
//! two fills and before the inversion are the barriers the protocol
//! requires. Denominators are inverted in one batch.

use ark_ff::{batch_inversion, One};
use ark_poly::EvaluationDomain;

use crate::parallel::parallelize;
use crate::{Domain, Evals, F};

/// Build the accumulator `Z` over `domain`.
///
/// `numerator_cb` multiplies its per-row factor **into** a chunk whose slots
/// start at one; `denominator_cb` **assigns** its per-row factor. Both
/// receive `(chunk, chunk_index, chunk_size)` and must derive row indices
/// from the latter two.
///
/// The result satisfies `Z(ω⁰) = 1` and
/// `Z(ωⁱ⁺¹) = Z(ωⁱ) · num(i) / den(i)`.
pub fn create_grand_product_poly<N, D>(domain: Domain, numerator_cb: N, denominator_cb: D) -> Evals
where
    N: Fn(&mut [F], usize, usize) + Send + Sync,
    D: Fn(&mut [F], usize, usize) + Send + Sync,
{
    let n = domain.size();

    let mut ratios = vec![F::one(); n];
    parallelize(&mut ratios, numerator_cb);

    let mut denominators = vec![F::one(); n];
    parallelize(&mut denominators, denominator_cb);
    batch_inversion(&mut denominators);

    parallelize(&mut ratios, |chunk, chunk_index, chunk_size| {
        let mut i = chunk_index * chunk_size;
        for value in chunk.iter_mut() {
            *value *= denominators[i];
            i += 1;
        }
    });

    // Prefix product; the scan is inherently sequential and cheap next to
    // the fills above.
    let mut z = Vec::with_capacity(n);
    let mut acc = F::one();
    z.push(acc);
    for ratio in ratios.iter().take(n - 1) {
        acc *= ratio;
        z.push(acc);
    }

    Evals::from_vec_and_domain(z, domain)
}
