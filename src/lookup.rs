//! Lookup-argument prover
//!
//! One [`LookupProver`] instance exists per lookup batch per circuit
//! instance. Its lifecycle is a strict pipeline, each transition consuming
//! one set of verifier challenges:
//!
//! ```text
//! compress (θ) → permute → commit A'/S' → grand product (β, γ) → commit Z
//!              → transform → evaluate (x) → open
//! ```
//!
//! Compression folds each argument's expression lists into single columns
//! `A_c = Σ θ^{m−1−j} Aⱼ` and `S_c` likewise. Permutation rearranges the
//! pair so the grand product telescopes; a fresh blinding scalar rides with
//! every permuted column and every accumulator. After the evaluation point
//! is drawn, the three committed polynomials per argument are interpolated
//! to coefficient form, evaluated at the point (and its rotations), and
//! emitted as opening claims for the grouper.
//!
//! Any subroutine failure aborts the proof; no partial proof is emitted.

use std::collections::BTreeMap;
use std::mem;

use ark_ff::Zero;
use ark_poly::{DenseUVPolynomial, EvaluationDomain, Polynomial};

use crate::expression::{Expression, RefTable, SimpleEvaluator};
use crate::grand_product::create_grand_product_poly;
use crate::opening::OpeningClaim;
use crate::parallel::parallelize;
use crate::pcs::{Commitment, PcsBackend, PcsError};
use crate::prover::ProverCtx;
use crate::transcript::FsLabel;
use crate::{Domain, Evals, Poly, F};

/// One lookup argument: every row of the input expressions must appear
/// somewhere in the table expressions.
#[derive(Debug, Clone)]
pub struct LookupArgument {
    /// Expressions `A₀ … Aₘ₋₁` compressed into the input column.
    pub input_expressions: Vec<Expression>,
    /// Expressions `S₀ … Sₘ₋₁` compressed into the table column.
    pub table_expressions: Vec<Expression>,
}

/// Input/table pairing shared by the compressed and permuted stages.
#[derive(Debug, Clone)]
pub struct LookupPair<T> {
    /// `A_c` or `A'`.
    pub input: T,
    /// `S_c` or `S'`.
    pub table: T,
}

impl<T> LookupPair<T> {
    /// Pair an input column with its table column.
    pub fn new(input: T, table: T) -> Self {
        Self { input, table }
    }
}

/// Errors surfaced by the lookup prover.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The compressed input contains a value absent from the table; the
    /// circuit is invalid.
    #[error("compressed input contains a value absent from the table")]
    Permutation,
}

/// A committed polynomial together with its blinding scalar, in evaluation
/// form until the proving round interpolates it.
///
/// The blind `b` enters the polynomial as the mask `b·Z_H(X)`: it vanishes
/// on the domain, so the in-domain values are untouched, while every opening
/// at the out-of-domain challenge point is randomized. The commit path folds
/// the same mask into the committed coefficients (see
/// `ProverCtx::commit_and_write`), keeping commitment and openings
/// consistent.
#[derive(Debug, Clone)]
pub struct BlindedPolynomial {
    form: PolyForm,
    blind: F,
}

#[derive(Debug, Clone)]
enum PolyForm {
    Evals(Evals),
    Coeffs(Poly),
}

impl BlindedPolynomial {
    fn from_evals(evals: Evals, blind: F) -> Self {
        Self { form: PolyForm::Evals(evals), blind }
    }

    /// Evaluation form; valid before [`Self::transform_evals_to_poly`].
    pub fn evals(&self) -> &Evals {
        match &self.form {
            PolyForm::Evals(e) => e,
            PolyForm::Coeffs(_) => panic!("polynomial already in coefficient form"),
        }
    }

    /// Coefficient form; valid after [`Self::transform_evals_to_poly`].
    pub fn poly(&self) -> &Poly {
        match &self.form {
            PolyForm::Coeffs(p) => p,
            PolyForm::Evals(_) => panic!("polynomial still in evaluation form"),
        }
    }

    /// The blinding scalar; the commit path folds it into the `b·Z_H(X)`
    /// mask.
    pub fn blind(&self) -> F {
        self.blind
    }

    /// Interpolate and apply the blinding mask: the result is
    /// `P(X) + b·(Xⁿ − 1)`, the polynomial the commitment was taken over.
    fn transform_evals_to_poly(&mut self) {
        if matches!(self.form, PolyForm::Evals(_)) {
            let form = mem::replace(&mut self.form, PolyForm::Coeffs(Poly::zero()));
            if let PolyForm::Evals(evals) = form {
                let n = evals.domain().size();
                let mut coeffs = evals.interpolate().coeffs;
                coeffs.resize(n + 1, F::zero());
                coeffs[0] -= self.blind;
                coeffs[n] += self.blind;
                self.form = PolyForm::Coeffs(Poly::from_coefficients_vec(coeffs));
            }
        }
    }
}

/// The evaluation point `x` and its domain rotations.
#[derive(Debug, Clone, Copy)]
pub struct OpeningPointSet {
    /// The challenge point.
    pub x: F,
    /// `ω⁻¹·x`.
    pub x_prev: F,
    /// `ω·x`.
    pub x_next: F,
}

impl OpeningPointSet {
    /// Derive the rotation points from the challenge.
    pub fn from_challenge(domain: &Domain, x: F) -> Self {
        Self { x, x_prev: x * domain.group_gen_inv(), x_next: x * domain.group_gen() }
    }
}

/// `A_c(X) = θᵐ⁻¹A₀(X) + θᵐ⁻²A₁(X) + … + Aₘ₋₁(X)`.
pub fn compress_expressions(
    domain: Domain,
    expressions: &[Expression],
    theta: F,
    evaluator: &SimpleEvaluator<'_>,
) -> Evals {
    let mut acc = vec![F::zero(); domain.size()];
    for expression in expressions {
        let evals = evaluator.evaluate_over_domain(expression, domain);
        parallelize(&mut acc, |chunk, chunk_index, chunk_size| {
            let mut i = chunk_index * chunk_size;
            for value in chunk.iter_mut() {
                *value = *value * theta + evals.evals[i];
                i += 1;
            }
        });
    }
    Evals::from_vec_and_domain(acc, domain)
}

/// Rearrange a compressed pair into `(A', S')` admitting the grand product:
/// `A'` is the input sorted by value; `S'` carries the matching table value
/// at each first occurrence and the unused table values elsewhere.
pub fn permute_expression_pair(pair: &LookupPair<Evals>) -> Result<LookupPair<Evals>, LookupError> {
    let domain = pair.input.domain();

    let mut permuted_input = pair.input.evals.clone();
    permuted_input.sort();

    let mut leftover: BTreeMap<F, usize> = BTreeMap::new();
    for value in &pair.table.evals {
        *leftover.entry(*value).or_insert(0) += 1;
    }

    let mut permuted_table = vec![F::zero(); permuted_input.len()];
    let mut repeated_rows = Vec::new();
    for (i, value) in permuted_input.iter().enumerate() {
        if i == 0 || permuted_input[i - 1] != *value {
            // First occurrence: the table column must supply the value here.
            let count = leftover.get_mut(value).ok_or(LookupError::Permutation)?;
            *count -= 1;
            if *count == 0 {
                leftover.remove(value);
            }
            permuted_table[i] = *value;
        } else {
            repeated_rows.push(i);
        }
    }

    // Unused table values fill the repeated rows; counts balance because
    // both columns have the domain's length.
    let mut rest = leftover.into_iter().flat_map(|(value, count)| std::iter::repeat(value).take(count));
    for i in repeated_rows {
        permuted_table[i] = rest.next().expect("input and table columns have equal length");
    }

    Ok(LookupPair::new(
        Evals::from_vec_and_domain(permuted_input, domain),
        Evals::from_vec_and_domain(permuted_table, domain),
    ))
}

/// Per-instance lookup prover driving the round pipeline.
#[derive(Debug, Default)]
pub struct LookupProver {
    compressed_pairs: Vec<LookupPair<Evals>>,
    permuted_pairs: Vec<LookupPair<BlindedPolynomial>>,
    grand_product_polys: Vec<BlindedPolynomial>,
}

impl LookupProver {
    /// Fresh prover with no state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The permuted pairs, once [`Self::permute_pairs`] has run.
    pub fn permuted_pairs(&self) -> &[LookupPair<BlindedPolynomial>] {
        &self.permuted_pairs
    }

    /// The grand-product accumulators, once built.
    pub fn grand_product_polys(&self) -> &[BlindedPolynomial] {
        &self.grand_product_polys
    }

    fn compress_pair(
        domain: Domain,
        argument: &LookupArgument,
        theta: F,
        evaluator: &SimpleEvaluator<'_>,
    ) -> LookupPair<Evals> {
        let compressed_input =
            compress_expressions(domain, &argument.input_expressions, theta, evaluator);
        let compressed_table =
            compress_expressions(domain, &argument.table_expressions, theta, evaluator);
        LookupPair::new(compressed_input, compressed_table)
    }

    /// Compress every argument against this instance's evaluator.
    pub fn compress_pairs(
        &mut self,
        domain: Domain,
        arguments: &[LookupArgument],
        theta: F,
        evaluator: &SimpleEvaluator<'_>,
    ) {
        self.compressed_pairs = arguments
            .iter()
            .map(|argument| Self::compress_pair(domain, argument, theta, evaluator))
            .collect();
    }

    /// Batch variant: one prover per circuit instance, each with its own
    /// evaluation table, the same arguments and θ.
    pub fn batch_compress_pairs(
        provers: &mut [Self],
        domain: Domain,
        arguments: &[LookupArgument],
        theta: F,
        tables: &[RefTable<'_>],
        challenges: &[F],
    ) {
        assert_eq!(provers.len(), tables.len());
        for (prover, table) in provers.iter_mut().zip(tables) {
            let evaluator = SimpleEvaluator::new(*table, challenges);
            prover.compress_pairs(domain, arguments, theta, &evaluator);
        }
    }

    /// Permute each compressed pair and attach fresh blinding scalars.
    pub fn permute_pairs<P: PcsBackend>(
        &mut self,
        ctx: &mut ProverCtx<P>,
    ) -> Result<(), LookupError> {
        let mut permuted = Vec::with_capacity(self.compressed_pairs.len());
        for pair in &self.compressed_pairs {
            let LookupPair { input, table } = permute_expression_pair(pair)?;
            let input_blind = ctx.blinder_mut().generate();
            let table_blind = ctx.blinder_mut().generate();
            permuted.push(LookupPair::new(
                BlindedPolynomial::from_evals(input, input_blind),
                BlindedPolynomial::from_evals(table, table_blind),
            ));
        }
        self.permuted_pairs = permuted;
        Ok(())
    }

    /// Commit every permuted input and table column across `provers`.
    ///
    /// With a batch-mode backend the columns are slot-assigned at sequential
    /// indices and produced on flush; otherwise each is committed and
    /// written immediately. Both modes yield the same verifier-visible
    /// bytes.
    pub fn batch_commit_permuted_pairs<P: PcsBackend>(
        provers: &[Self],
        ctx: &mut ProverCtx<P>,
        commit_idx: &mut usize,
    ) -> Result<Vec<Commitment>, PcsError> {
        let mut immediate = Vec::new();
        if provers.is_empty() {
            return Ok(immediate);
        }

        if P::SUPPORTS_BATCH_MODE {
            for prover in provers {
                for pair in &prover.permuted_pairs {
                    ctx.batch_commit_at(
                        pair.input.evals(),
                        pair.input.blind(),
                        FsLabel::PermutedInputCommit,
                        *commit_idx,
                    );
                    *commit_idx += 1;
                    ctx.batch_commit_at(
                        pair.table.evals(),
                        pair.table.blind(),
                        FsLabel::PermutedTableCommit,
                        *commit_idx,
                    );
                    *commit_idx += 1;
                }
            }
        } else {
            for prover in provers {
                for pair in &prover.permuted_pairs {
                    immediate.push(ctx.commit_and_write(
                        pair.input.evals(),
                        pair.input.blind(),
                        FsLabel::PermutedInputCommit,
                    )?);
                    immediate.push(ctx.commit_and_write(
                        pair.table.evals(),
                        pair.table.blind(),
                        FsLabel::PermutedTableCommit,
                    )?);
                }
            }
        }
        Ok(immediate)
    }

    /// Build the grand-product accumulator for every pair.
    ///
    /// The compressed pairs feed the numerators and are dropped afterwards;
    /// the opening round only touches `A'`, `S'` and `Z`.
    pub fn create_grand_product_polys<P: PcsBackend>(
        &mut self,
        ctx: &mut ProverCtx<P>,
        beta: F,
        gamma: F,
    ) {
        assert_eq!(self.compressed_pairs.len(), self.permuted_pairs.len());
        let compressed = mem::take(&mut self.compressed_pairs);

        let mut polys = Vec::with_capacity(compressed.len());
        for (compressed_pair, permuted_pair) in compressed.iter().zip(&self.permuted_pairs) {
            let z = create_grand_product_poly(
                ctx.domain(),
                numerator_callback(compressed_pair, beta, gamma),
                denominator_callback(permuted_pair, beta, gamma),
            );
            polys.push(BlindedPolynomial::from_evals(z, ctx.blinder_mut().generate()));
        }
        self.grand_product_polys = polys;
    }

    /// Commit every grand-product accumulator across `provers`.
    pub fn batch_commit_grand_product_polys<P: PcsBackend>(
        provers: &[Self],
        ctx: &mut ProverCtx<P>,
        commit_idx: &mut usize,
    ) -> Result<Vec<Commitment>, PcsError> {
        let mut immediate = Vec::new();
        if provers.is_empty() {
            return Ok(immediate);
        }

        if P::SUPPORTS_BATCH_MODE {
            for prover in provers {
                for z in &prover.grand_product_polys {
                    ctx.batch_commit_at(z.evals(), z.blind(), FsLabel::GrandProductCommit, *commit_idx);
                    *commit_idx += 1;
                }
            }
        } else {
            for prover in provers {
                for z in &prover.grand_product_polys {
                    immediate.push(ctx.commit_and_write(
                        z.evals(),
                        z.blind(),
                        FsLabel::GrandProductCommit,
                    )?);
                }
            }
        }
        Ok(immediate)
    }

    /// Interpolate `A'`, `S'` and `Z` to coefficient form, applying each
    /// polynomial's blinding mask.
    pub fn transform_evals_to_poly(&mut self) {
        for pair in &mut self.permuted_pairs {
            pair.input.transform_evals_to_poly();
            pair.table.transform_evals_to_poly();
        }
        for z in &mut self.grand_product_polys {
            z.transform_evals_to_poly();
        }
    }

    /// Evaluate the committed polynomials at the point set and stream the
    /// values into the transcript. Per argument: `Z` at `x` and `x_next`,
    /// `A'` at `x` and `x_prev`, `S'` at `x`.
    pub fn evaluate<P: PcsBackend>(
        &self,
        ctx: &mut ProverCtx<P>,
        point_set: &OpeningPointSet,
    ) -> Vec<F> {
        assert_eq!(self.grand_product_polys.len(), self.permuted_pairs.len());

        let mut values = Vec::with_capacity(5 * self.grand_product_polys.len());
        for (z, permuted_pair) in self.grand_product_polys.iter().zip(&self.permuted_pairs) {
            values.push(ctx.evaluate_and_write(z.poly(), point_set.x));
            values.push(ctx.evaluate_and_write(z.poly(), point_set.x_next));
            values.push(ctx.evaluate_and_write(permuted_pair.input.poly(), point_set.x));
            values.push(ctx.evaluate_and_write(permuted_pair.input.poly(), point_set.x_prev));
            values.push(ctx.evaluate_and_write(permuted_pair.table.poly(), point_set.x));
        }
        values
    }

    /// Emit the same five claims per argument as [`OpeningClaim`]s for the
    /// grouper.
    pub fn open<'a>(
        &'a self,
        point_set: &'a OpeningPointSet,
        openings: &mut Vec<OpeningClaim<'a, Poly>>,
    ) {
        assert_eq!(self.grand_product_polys.len(), self.permuted_pairs.len());

        for (z, permuted_pair) in self.grand_product_polys.iter().zip(&self.permuted_pairs) {
            let z_poly = z.poly();
            let input_poly = permuted_pair.input.poly();
            let table_poly = permuted_pair.table.poly();

            openings.push(OpeningClaim::new(z_poly, &point_set.x, z_poly.evaluate(&point_set.x)));
            openings.push(OpeningClaim::new(
                z_poly,
                &point_set.x_next,
                z_poly.evaluate(&point_set.x_next),
            ));
            openings.push(OpeningClaim::new(
                input_poly,
                &point_set.x,
                input_poly.evaluate(&point_set.x),
            ));
            openings.push(OpeningClaim::new(
                input_poly,
                &point_set.x_prev,
                input_poly.evaluate(&point_set.x_prev),
            ));
            openings.push(OpeningClaim::new(
                table_poly,
                &point_set.x,
                table_poly.evaluate(&point_set.x),
            ));
        }
    }
}

/// `(A_c(xᵢ) + β) · (S_c(xᵢ) + γ)`, multiplied into the chunk.
fn numerator_callback<'p>(
    compressed_pair: &'p LookupPair<Evals>,
    beta: F,
    gamma: F,
) -> impl Fn(&mut [F], usize, usize) + Send + Sync + 'p {
    move |chunk, chunk_index, chunk_size| {
        let mut i = chunk_index * chunk_size;
        for value in chunk.iter_mut() {
            *value *= compressed_pair.input.evals[i] + beta;
            *value *= compressed_pair.table.evals[i] + gamma;
            i += 1;
        }
    }
}

/// `(A'(xᵢ) + β) · (S'(xᵢ) + γ)`, assigned to the chunk.
fn denominator_callback<'p>(
    permuted_pair: &'p LookupPair<BlindedPolynomial>,
    beta: F,
    gamma: F,
) -> impl Fn(&mut [F], usize, usize) + Send + Sync + 'p {
    move |chunk, chunk_index, chunk_size| {
        let mut i = chunk_index * chunk_size;
        for value in chunk.iter_mut() {
            *value = (permuted_pair.input.evals().evals[i] + beta)
                * (permuted_pair.table.evals().evals[i] + gamma);
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcs::Kzg;
    use crate::prover::{Blinder, ProverCtx};
    use crate::transcript::Transcript;
    use ark_ff::One;

    fn evals_from(values: &[u64], domain: Domain) -> Evals {
        Evals::from_vec_and_domain(values.iter().map(|&v| F::from(v)).collect(), domain)
    }

    #[test]
    fn permutation_sorts_input_and_aligns_table() {
        let domain = Domain::new(4).unwrap();
        let pair =
            LookupPair::new(evals_from(&[1, 2, 3, 1], domain), evals_from(&[1, 2, 3, 4], domain));

        let permuted = permute_expression_pair(&pair).unwrap();
        let input: Vec<F> = permuted.input.evals.clone();
        let table: Vec<F> = permuted.table.evals.clone();

        // Sorted input; the table value matches at each first occurrence,
        // and the leftover table value 4 fills the repeated row.
        assert_eq!(input, [1u64, 1, 2, 3].map(F::from));
        assert_eq!(table[0], F::one());
        assert_eq!(table[1], F::from(4u64));
        assert_eq!(table[2], F::from(2u64));
        assert_eq!(table[3], F::from(3u64));
    }

    #[test]
    fn permutation_admits_the_grand_product() {
        // Both permuted columns must be permutations of the originals.
        let domain = Domain::new(8).unwrap();
        let pair = LookupPair::new(
            evals_from(&[5, 5, 5, 2, 2, 7, 7, 7], domain),
            evals_from(&[7, 5, 2, 9, 9, 9, 9, 9], domain),
        );
        let permuted = permute_expression_pair(&pair).unwrap();

        let mut lhs = pair.input.evals.clone();
        let mut rhs = permuted.input.evals.clone();
        lhs.sort();
        rhs.sort();
        assert_eq!(lhs, rhs);

        let mut lhs = pair.table.evals.clone();
        let mut rhs = permuted.table.evals.clone();
        lhs.sort();
        rhs.sort();
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn missing_table_value_is_a_permutation_failure() {
        let domain = Domain::new(4).unwrap();
        let pair =
            LookupPair::new(evals_from(&[1, 6, 3, 1], domain), evals_from(&[1, 2, 3, 4], domain));
        assert!(matches!(permute_expression_pair(&pair), Err(LookupError::Permutation)));
    }

    #[test]
    fn compression_folds_with_powers_of_theta() {
        let domain = Domain::new(4).unwrap();
        let columns = vec![
            (1u64..=4).map(F::from).collect::<Vec<F>>(),
            (5u64..=8).map(F::from).collect::<Vec<F>>(),
        ];
        let evaluator = SimpleEvaluator::new(RefTable::new(&columns), &[]);
        let theta = F::from(10u64);

        let compressed = compress_expressions(
            domain,
            &[Expression::column(0), Expression::column(1)],
            theta,
            &evaluator,
        );
        // θ·col0 + col1, row-wise.
        for row in 0..4 {
            assert_eq!(compressed.evals[row], theta * columns[0][row] + columns[1][row]);
        }
    }

    fn pipeline_ctx() -> ProverCtx<Kzg> {
        ProverCtx::new(
            Domain::new(4).unwrap(),
            Transcript::new("multiopen.test"),
            Blinder::from_seed([5u8; 32]),
            Kzg::setup_dev(4, [8u8; 32]),
        )
    }

    /// Run compress → permute → grand product for the standard fixture.
    fn pipeline_prover(ctx: &mut ProverCtx<Kzg>, columns: &[Vec<F>]) -> LookupProver {
        let arguments = [LookupArgument {
            input_expressions: vec![Expression::column(0)],
            table_expressions: vec![Expression::column(1)],
        }];
        let evaluator = SimpleEvaluator::new(RefTable::new(columns), &[]);
        let mut prover = LookupProver::new();
        prover.compress_pairs(ctx.domain(), &arguments, F::from(3u64), &evaluator);
        prover.permute_pairs(ctx).unwrap();
        prover.create_grand_product_polys(ctx, F::from(17u64), F::from(29u64));
        prover
    }

    fn fixture_columns() -> Vec<Vec<F>> {
        vec![
            [1u64, 2, 3, 1].map(F::from).to_vec(),
            [1u64, 2, 3, 4].map(F::from).to_vec(),
        ]
    }

    #[test]
    fn blinding_mask_vanishes_on_the_domain() {
        let mut ctx = pipeline_ctx();
        let domain = ctx.domain();
        let columns = fixture_columns();
        let mut prover = pipeline_prover(&mut ctx, &columns);

        let expected_input = prover.permuted_pairs()[0].input.evals().evals.clone();
        let expected_z = prover.grand_product_polys()[0].evals().evals.clone();

        prover.transform_evals_to_poly();

        let input_poly = prover.permuted_pairs()[0].input.poly();
        let z_poly = prover.grand_product_polys()[0].poly();
        for i in 0..4 {
            let w = domain.element(i);
            assert_eq!(input_poly.evaluate(&w), expected_input[i]);
            assert_eq!(z_poly.evaluate(&w), expected_z[i]);
        }
        // The mask raises the degree to n; the unmasked columns fit in n − 1.
        assert_eq!(input_poly.degree(), 4);
        assert_eq!(z_poly.degree(), 4);
    }

    #[test]
    fn commitment_matches_the_opened_polynomial() {
        let mut ctx = pipeline_ctx();
        let columns = fixture_columns();
        let mut prover = pipeline_prover(&mut ctx, &columns);

        let from_evals = {
            let pair = &prover.permuted_pairs()[0];
            ctx.commit_and_write(pair.input.evals(), pair.input.blind(), FsLabel::PermutedInputCommit)
                .unwrap()
        };
        prover.transform_evals_to_poly();
        let from_coeffs = ctx
            .commit_poly_and_write(
                prover.permuted_pairs()[0].input.poly(),
                FsLabel::PermutedInputCommit,
            )
            .unwrap();

        assert_eq!(from_evals, from_coeffs);
    }
}
