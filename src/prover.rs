//! Prover context and the full proving round
//!
//! [`ProverCtx`] owns the shared resources of a proving round — the FFT
//! domain, the Fiat–Shamir transcript, the blinder and the commitment
//! backend — so that each is mutated by exactly one logical owner. The
//! batch-commit queue lives here too: callers assign commitments to
//! sequential slots up front, and the flush resolves them to a
//! deterministic transcript append order before the next challenge is
//! drawn.
//!
//! [`prove`] wires the whole pipeline for a batch of circuit instances:
//!
//! ```text
//! θ → compress → permute → commit A'/S' → β, γ → grand product → commit Z
//!   → x → transform → evaluate → open → group → r → quotients → commit H
//! ```

use ark_poly::{EvaluationDomain, Polynomial};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{rngs::StdRng, SeedableRng};

use ark_ff::{UniformRand, Zero};

use crate::expression::RefTable;
use crate::lookup::{LookupArgument, LookupError, LookupProver, OpeningPointSet};
use crate::opening::{GroupingError, OpeningClaim, OpeningGrouper};
use crate::pcs::{Commitment, PcsBackend, PcsError};
use crate::quotient::QuotientError;
use crate::transcript::{FsLabel, Transcript};
use crate::{Domain, Evals, Poly, F};

/// Source of blinding scalars; owned by the context so exactly one party
/// draws from it.
#[derive(Debug)]
pub struct Blinder {
    rng: StdRng,
}

impl Blinder {
    /// Deterministic blinder for a given seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { rng: StdRng::from_seed(seed) }
    }

    /// Draw a fresh blinding scalar.
    pub fn generate(&mut self) -> F {
        F::rand(&mut self.rng)
    }
}

/// A slot-assigned commitment awaiting the batch flush.
#[derive(Debug)]
struct PendingCommit {
    label: FsLabel,
    coeffs: Vec<F>,
}

/// Errors surfaced by the proving round.
#[derive(Debug, thiserror::Error)]
pub enum ProveError {
    /// Lookup subroutine failure (permutation).
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// Claim grouping failure.
    #[error(transparent)]
    Grouping(#[from] GroupingError),
    /// Quotient construction failure.
    #[error(transparent)]
    Quotient(#[from] QuotientError),
    /// Commitment backend failure.
    #[error(transparent)]
    Pcs(#[from] PcsError),
}

/// Shared prover state: domain, transcript, blinder, backend and the
/// batch-commit queue.
pub struct ProverCtx<P: PcsBackend> {
    domain: Domain,
    transcript: Transcript,
    blinder: Blinder,
    backend: P,
    batch_queue: Vec<Option<PendingCommit>>,
}

impl<P: PcsBackend> ProverCtx<P> {
    /// Assemble a context from its owned parts.
    pub fn new(domain: Domain, transcript: Transcript, blinder: Blinder, backend: P) -> Self {
        Self { domain, transcript, blinder, backend, batch_queue: Vec::new() }
    }

    /// The proving domain.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Mutable access to the blinder.
    pub fn blinder_mut(&mut self) -> &mut Blinder {
        &mut self.blinder
    }

    /// Derive a challenge; a synchronization point — everything absorbed so
    /// far is bound into the result.
    pub fn challenge(&mut self, label: FsLabel) -> F {
        self.transcript.challenge_f_l(label)
    }

    /// Commit an evaluation-form polynomial under its blinding scalar and
    /// absorb the commitment immediately.
    ///
    /// The committed polynomial is `P(X) + blind·Z_H(X)` — the same
    /// coefficient form the opening round interpolates, so commitment and
    /// openings agree while out-of-domain evaluations are randomized.
    pub fn commit_and_write(
        &mut self,
        evals: &Evals,
        blind: F,
        label: FsLabel,
    ) -> Result<Commitment, PcsError> {
        let coeffs = self.blinded_coeffs(evals, blind);
        let commitment = self.backend.commit_coeffs(&coeffs)?;
        self.transcript.absorb_commitment_l(label, &commitment);
        Ok(commitment)
    }

    /// Commit a coefficient-form polynomial and absorb the commitment
    /// immediately.
    pub fn commit_poly_and_write(
        &mut self,
        poly: &Poly,
        label: FsLabel,
    ) -> Result<Commitment, PcsError> {
        let commitment = self.backend.commit_coeffs(&poly.coeffs)?;
        self.transcript.absorb_commitment_l(label, &commitment);
        Ok(commitment)
    }

    /// Assign a blinded evaluation-form polynomial to batch slot
    /// `commit_idx`.
    ///
    /// Slots are claimed before any parallel work begins; the flush later
    /// resolves them in index order, so the transcript sequence is
    /// independent of production order. The queued coefficients carry the
    /// `blind·Z_H(X)` mask, as in [`Self::commit_and_write`].
    pub fn batch_commit_at(&mut self, evals: &Evals, blind: F, label: FsLabel, commit_idx: usize) {
        if self.batch_queue.len() <= commit_idx {
            self.batch_queue.resize_with(commit_idx + 1, || None);
        }
        let coeffs = self.blinded_coeffs(evals, blind);
        let prior = self.batch_queue[commit_idx].replace(PendingCommit { label, coeffs });
        debug_assert!(prior.is_none(), "batch slot {commit_idx} assigned twice");
    }

    /// Produce every queued commitment in slot order, absorbing each into
    /// the transcript. Empties the queue.
    pub fn flush_batched_commitments(&mut self) -> Result<Vec<Commitment>, PcsError> {
        let queue = std::mem::take(&mut self.batch_queue);
        queue
            .into_iter()
            .map(|slot| {
                let pending = slot.expect("every batch slot below the high-water mark is assigned");
                let commitment = self.backend.commit_coeffs(&pending.coeffs)?;
                self.transcript.absorb_commitment_l(pending.label, &commitment);
                Ok(commitment)
            })
            .collect()
    }

    /// `P(X) + blind·(Xⁿ − 1)`: the mask vanishes on the domain, so the
    /// committed in-domain values are unchanged while openings at the
    /// challenge point reflect the blind.
    fn blinded_coeffs(&self, evals: &Evals, blind: F) -> Vec<F> {
        let n = self.domain.size();
        let mut coeffs = self.domain.ifft(&evals.evals);
        coeffs.resize(n + 1, F::zero());
        coeffs[0] -= blind;
        coeffs[n] += blind;
        coeffs
    }

    /// Evaluate `poly` at `point` and stream the value into the transcript.
    pub fn evaluate_and_write(&mut self, poly: &Poly, point: F) -> F {
        let value = poly.evaluate(&point);
        self.transcript.absorb_scalar_l(FsLabel::LookupEval, &value);
        value
    }
}

/// Proof object for one lookup batch round.
///
/// Commitment vectors are ordered instance-major, argument-minor — the
/// order the prover appended them to the transcript. `evals` follows the
/// five-per-argument evaluation schedule; `quotient_comms` has one entry
/// per opening group in grouper emission order.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct LookupBatchProof {
    /// Commitments to the permuted input columns `A'`.
    pub permuted_input_comms: Vec<Commitment>,
    /// Commitments to the permuted table columns `S'`.
    pub permuted_table_comms: Vec<Commitment>,
    /// Commitments to the grand-product columns `Z`.
    pub grand_product_comms: Vec<Commitment>,
    /// The evaluation-point challenge `x`.
    pub eval_point: F,
    /// Claimed evaluations in transcript order.
    pub evals: Vec<F>,
    /// Commitments to the combined quotients `H`, one per opening group.
    pub quotient_comms: Vec<Commitment>,
}

/// Run the full proving round for `arguments` over a batch of circuit
/// instances (`tables`, one evaluation table per instance).
pub fn prove<P: PcsBackend>(
    ctx: &mut ProverCtx<P>,
    arguments: &[LookupArgument],
    tables: &[RefTable<'_>],
    challenges: &[F],
) -> Result<LookupBatchProof, ProveError> {
    let domain = ctx.domain();
    let mut provers: Vec<LookupProver> = tables.iter().map(|_| LookupProver::new()).collect();

    // θ
    let theta = ctx.challenge(FsLabel::Theta);
    LookupProver::batch_compress_pairs(&mut provers, domain, arguments, theta, tables, challenges);

    for prover in &mut provers {
        prover.permute_pairs(ctx)?;
    }

    let mut commit_idx = 0usize;
    let mut permuted_comms =
        LookupProver::batch_commit_permuted_pairs(&provers, ctx, &mut commit_idx)?;
    permuted_comms.extend(ctx.flush_batched_commitments()?);

    // β, γ — drawn only after every permuted commitment is absorbed.
    let beta = ctx.challenge(FsLabel::Beta);
    let gamma = ctx.challenge(FsLabel::Gamma);

    for prover in &mut provers {
        prover.create_grand_product_polys(ctx, beta, gamma);
    }

    let mut commit_idx = 0usize;
    let mut grand_product_comms =
        LookupProver::batch_commit_grand_product_polys(&provers, ctx, &mut commit_idx)?;
    grand_product_comms.extend(ctx.flush_batched_commitments()?);

    // x
    let x = ctx.challenge(FsLabel::EvalPoint);
    let point_set = OpeningPointSet::from_challenge(&domain, x);

    for prover in &mut provers {
        prover.transform_evals_to_poly();
    }

    let mut evals = Vec::new();
    for prover in &provers {
        evals.extend(prover.evaluate(ctx, &point_set));
    }

    let mut openings: Vec<OpeningClaim<'_, Poly>> = Vec::new();
    for prover in &provers {
        prover.open(&point_set, &mut openings);
    }
    let grouper = OpeningGrouper::group(&openings)?;

    // r — drawn after all evaluations; fixes the per-oracle powers.
    let r = ctx.challenge(FsLabel::Aggregation);

    let mut quotient_comms = Vec::with_capacity(grouper.groups().len());
    for group in grouper.groups() {
        let combined = group.combined_quotient(r)?;
        quotient_comms.push(ctx.commit_poly_and_write(&combined.quotient, FsLabel::QuotientCommit)?);
    }

    let (permuted_input_comms, permuted_table_comms) = split_interleaved(permuted_comms);

    Ok(LookupBatchProof {
        permuted_input_comms,
        permuted_table_comms,
        grand_product_comms,
        eval_point: x,
        evals,
        quotient_comms,
    })
}

/// Un-interleave `[input₀, table₀, input₁, table₁, …]`.
fn split_interleaved(comms: Vec<Commitment>) -> (Vec<Commitment>, Vec<Commitment>) {
    let mut inputs = Vec::with_capacity(comms.len() / 2);
    let mut tables = Vec::with_capacity(comms.len() / 2);
    for (i, c) in comms.into_iter().enumerate() {
        if i % 2 == 0 {
            inputs.push(c);
        } else {
            tables.push(c);
        }
    }
    (inputs, tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::pcs::Kzg;
    use ark_ff::One;

    fn test_ctx(n: usize) -> ProverCtx<Kzg> {
        ProverCtx::new(
            Domain::new(n).unwrap(),
            Transcript::new("multiopen.test"),
            Blinder::from_seed([11u8; 32]),
            Kzg::setup_dev(n, [42u8; 32]),
        )
    }

    fn single_lookup() -> Vec<LookupArgument> {
        vec![LookupArgument {
            input_expressions: vec![Expression::column(0)],
            table_expressions: vec![Expression::column(1)],
        }]
    }

    fn columns() -> Vec<Vec<F>> {
        vec![
            [1u64, 2, 3, 1].map(F::from).to_vec(),
            [1u64, 2, 3, 4].map(F::from).to_vec(),
        ]
    }

    #[test]
    fn grand_product_boundaries_telescope() {
        let mut ctx = test_ctx(4);
        let arguments = single_lookup();
        let cols = columns();
        let tables = [RefTable::new(&cols)];

        let mut provers = vec![LookupProver::new()];
        LookupProver::batch_compress_pairs(
            &mut provers,
            ctx.domain(),
            &arguments,
            F::from(3u64),
            &tables,
            &[],
        );
        provers[0].permute_pairs(&mut ctx).unwrap();
        let beta = F::from(17u64);
        let gamma = F::from(29u64);
        provers[0].create_grand_product_polys(&mut ctx, beta, gamma);

        let z = provers[0].grand_product_polys()[0].evals();
        assert_eq!(z.evals[0], F::one());

        // Closing the cycle: A' = [1,1,2,3], S' = [1,4,2,3]; row 3 wraps to 1.
        let last_ratio = (F::from(1u64) + beta) * (F::from(4u64) + gamma)
            / ((F::from(3u64) + beta) * (F::from(3u64) + gamma));
        assert_eq!(z.evals[3] * last_ratio, F::one());
    }

    #[test]
    fn full_round_produces_three_opening_groups() {
        let mut ctx = test_ctx(4);
        let arguments = single_lookup();
        let cols = columns();
        let tables = [RefTable::new(&cols)];

        let proof = prove(&mut ctx, &arguments, &tables, &[]).unwrap();

        // Point sets {x, x_next}, {x, x_prev} and {x} are distinct, so the
        // grouper emits exactly three groups and three quotients.
        assert_eq!(proof.quotient_comms.len(), 3);
        assert_eq!(proof.permuted_input_comms.len(), 1);
        assert_eq!(proof.permuted_table_comms.len(), 1);
        assert_eq!(proof.grand_product_comms.len(), 1);
        assert_eq!(proof.evals.len(), 5);
    }

    #[test]
    fn aggregated_instances_share_groups() {
        let mut ctx = test_ctx(4);
        let arguments = single_lookup();
        let cols_a = columns();
        let cols_b = vec![
            [2u64, 2, 4, 4].map(F::from).to_vec(),
            [2u64, 3, 4, 5].map(F::from).to_vec(),
        ];
        let tables = [RefTable::new(&cols_a), RefTable::new(&cols_b)];

        let proof = prove(&mut ctx, &arguments, &tables, &[]).unwrap();

        // Two instances double the commitments and evaluations, but every
        // Zᵢ shares {x, x_next} (and so on), so there are still 3 groups.
        assert_eq!(proof.permuted_input_comms.len(), 2);
        assert_eq!(proof.grand_product_comms.len(), 2);
        assert_eq!(proof.evals.len(), 10);
        assert_eq!(proof.quotient_comms.len(), 3);
    }

    #[test]
    fn proofs_are_bit_for_bit_deterministic() {
        let run = || {
            let mut ctx = test_ctx(4);
            let arguments = single_lookup();
            let cols = columns();
            let tables = [RefTable::new(&cols)];
            prove(&mut ctx, &arguments, &tables, &[]).unwrap()
        };

        let p1 = run();
        let p2 = run();
        assert_eq!(p1, p2);

        let mut b1 = Vec::new();
        let mut b2 = Vec::new();
        p1.serialize_compressed(&mut b1).unwrap();
        p2.serialize_compressed(&mut b2).unwrap();
        assert_eq!(b1, b2);
    }

    #[test]
    fn distinct_blinds_hide_the_committed_columns() {
        let run = |blinder_seed: [u8; 32]| {
            let mut ctx = ProverCtx::new(
                Domain::new(4).unwrap(),
                Transcript::new("multiopen.test"),
                Blinder::from_seed(blinder_seed),
                Kzg::setup_dev(4, [42u8; 32]),
            );
            let arguments = single_lookup();
            let cols = columns();
            let tables = [RefTable::new(&cols)];
            prove(&mut ctx, &arguments, &tables, &[]).unwrap()
        };

        // Same witness, different blinds: every committed column changes.
        let p1 = run([1u8; 32]);
        let p2 = run([2u8; 32]);
        assert_ne!(p1.permuted_input_comms, p2.permuted_input_comms);
        assert_ne!(p1.permuted_table_comms, p2.permuted_table_comms);
        assert_ne!(p1.grand_product_comms, p2.grand_product_comms);
    }

    #[test]
    fn proof_roundtrips_through_serialization() {
        let mut ctx = test_ctx(4);
        let arguments = single_lookup();
        let cols = columns();
        let tables = [RefTable::new(&cols)];
        let proof = prove(&mut ctx, &arguments, &tables, &[]).unwrap();

        let mut bytes = Vec::new();
        proof.serialize_compressed(&mut bytes).unwrap();
        let back = LookupBatchProof::deserialize_compressed(bytes.as_slice()).unwrap();
        assert_eq!(proof, back);
    }

    // A backend without batch mode: commitments are written immediately.
    struct StreamingKzg(Kzg);

    impl PcsBackend for StreamingKzg {
        const SUPPORTS_BATCH_MODE: bool = false;

        fn max_degree(&self) -> usize {
            self.0.max_degree()
        }

        fn commit_coeffs(&self, coeffs: &[F]) -> Result<Commitment, PcsError> {
            self.0.commit_coeffs(coeffs)
        }
    }

    #[test]
    fn batch_and_immediate_commit_modes_agree() {
        let arguments = single_lookup();
        let cols = columns();

        let batched = {
            let mut ctx = test_ctx(4);
            let tables = [RefTable::new(&cols)];
            prove(&mut ctx, &arguments, &tables, &[]).unwrap()
        };
        let immediate = {
            let mut ctx = ProverCtx::new(
                Domain::new(4).unwrap(),
                Transcript::new("multiopen.test"),
                Blinder::from_seed([11u8; 32]),
                StreamingKzg(Kzg::setup_dev(4, [42u8; 32])),
            );
            let tables = [RefTable::new(&cols)];
            prove(&mut ctx, &arguments, &tables, &[]).unwrap()
        };

        assert_eq!(batched, immediate);
    }

    #[test]
    fn invalid_circuit_aborts_without_a_proof() {
        let mut ctx = test_ctx(4);
        let arguments = single_lookup();
        let cols = vec![
            [1u64, 9, 3, 1].map(F::from).to_vec(), // 9 is not in the table
            [1u64, 2, 3, 4].map(F::from).to_vec(),
        ];
        let tables = [RefTable::new(&cols)];
        assert!(matches!(
            prove(&mut ctx, &arguments, &tables, &[]),
            Err(ProveError::Lookup(LookupError::Permutation))
        ));
    }
}
