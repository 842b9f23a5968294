//! Expression AST and the table evaluator feeding lookup compression
//!
//! A lookup argument names its input and table columns symbolically; the
//! prover resolves them against a per-instance table of column evaluations.
//! The AST below is the minimum closed surface the compression step needs:
//! column queries (with rotation), challenges, constants, and the ring
//! operations.

use crate::parallel::parallelize;
use crate::{Domain, Evals, F};
use ark_ff::Zero;
use ark_poly::EvaluationDomain;

/// A column reference with a row rotation (`rotation = 1` reads the next
/// row, `-1` the previous row; rows wrap around the domain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnQuery {
    /// Index into the instance's column table.
    pub column: usize,
    /// Row offset, wrapping.
    pub rotation: i32,
}

/// Symbolic expression evaluated row-wise over the proving domain.
#[derive(Debug, Clone)]
pub enum Expression {
    /// A constant field element.
    Constant(F),
    /// A (rotated) column cell.
    Column(ColumnQuery),
    /// A previously drawn verifier challenge, by index.
    Challenge(usize),
    /// Negation.
    Negated(Box<Expression>),
    /// Addition.
    Sum(Box<Expression>, Box<Expression>),
    /// Multiplication.
    Product(Box<Expression>, Box<Expression>),
    /// Multiplication by a constant.
    Scaled(Box<Expression>, F),
}

impl Expression {
    /// Query `column` at the current row.
    pub fn column(column: usize) -> Self {
        Expression::Column(ColumnQuery { column, rotation: 0 })
    }

    /// Query `column` at the current row shifted by `rotation`.
    pub fn rotated(column: usize, rotation: i32) -> Self {
        Expression::Column(ColumnQuery { column, rotation })
    }
}

/// Borrowed table of column evaluations for one circuit instance.
///
/// All columns must have the domain's length; the evaluator indexes them
/// positionally.
#[derive(Debug, Clone, Copy)]
pub struct RefTable<'a> {
    /// Column-major evaluations, one `Vec` per column.
    pub columns: &'a [Vec<F>],
}

impl<'a> RefTable<'a> {
    /// Wrap a borrowed column set.
    pub fn new(columns: &'a [Vec<F>]) -> Self {
        Self { columns }
    }
}

/// Row-wise expression evaluator over one instance's columns and the
/// challenges drawn so far.
#[derive(Debug, Clone, Copy)]
pub struct SimpleEvaluator<'a> {
    table: RefTable<'a>,
    challenges: &'a [F],
}

impl<'a> SimpleEvaluator<'a> {
    /// Bind an evaluator to an instance table and the challenge list.
    pub fn new(table: RefTable<'a>, challenges: &'a [F]) -> Self {
        Self { table, challenges }
    }

    /// Evaluate `expr` at `row`.
    pub fn evaluate(&self, expr: &Expression, row: usize) -> F {
        match expr {
            Expression::Constant(c) => *c,
            Expression::Column(q) => {
                let column = &self.table.columns[q.column];
                let n = column.len() as i64;
                let i = (row as i64 + q.rotation as i64).rem_euclid(n);
                column[i as usize]
            }
            Expression::Challenge(i) => self.challenges[*i],
            Expression::Negated(e) => -self.evaluate(e, row),
            Expression::Sum(a, b) => self.evaluate(a, row) + self.evaluate(b, row),
            Expression::Product(a, b) => self.evaluate(a, row) * self.evaluate(b, row),
            Expression::Scaled(e, s) => self.evaluate(e, row) * s,
        }
    }

    /// Evaluate `expr` at every row of `domain`, chunk-parallel.
    pub fn evaluate_over_domain(&self, expr: &Expression, domain: Domain) -> Evals {
        let mut values = vec![F::zero(); domain.size()];
        parallelize(&mut values, |chunk, chunk_index, chunk_size| {
            let mut row = chunk_index * chunk_size;
            for value in chunk.iter_mut() {
                *value = self.evaluate(expr, row);
                row += 1;
            }
        });
        Evals::from_vec_and_domain(values, domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::One;

    fn columns() -> Vec<Vec<F>> {
        vec![
            (1u64..=4).map(F::from).collect(),
            (10u64..=13).map(F::from).collect(),
        ]
    }

    #[test]
    fn rotations_wrap_around_the_column() {
        let cols = columns();
        let ev = SimpleEvaluator::new(RefTable::new(&cols), &[]);

        assert_eq!(ev.evaluate(&Expression::rotated(0, 1), 3), F::from(1u64));
        assert_eq!(ev.evaluate(&Expression::rotated(0, -1), 0), F::from(4u64));
        assert_eq!(ev.evaluate(&Expression::rotated(1, 2), 3), F::from(11u64));
    }

    #[test]
    fn compound_expressions_evaluate_row_wise() {
        let cols = columns();
        let challenges = [F::from(7u64)];
        let ev = SimpleEvaluator::new(RefTable::new(&cols), &challenges);

        // (col0 + challenge0) · 2 − col1, at row 1: (2 + 7)·2 − 11 = 7.
        let expr = Expression::Sum(
            Box::new(Expression::Scaled(
                Box::new(Expression::Sum(
                    Box::new(Expression::column(0)),
                    Box::new(Expression::Challenge(0)),
                )),
                F::from(2u64),
            )),
            Box::new(Expression::Negated(Box::new(Expression::column(1)))),
        );
        assert_eq!(ev.evaluate(&expr, 1), F::from(7u64));
    }

    #[test]
    fn domain_evaluation_matches_row_evaluation() {
        let cols = columns();
        let ev = SimpleEvaluator::new(RefTable::new(&cols), &[]);
        let domain = Domain::new(4).unwrap();

        let expr = Expression::Product(
            Box::new(Expression::column(0)),
            Box::new(Expression::Sum(
                Box::new(Expression::column(1)),
                Box::new(Expression::Constant(F::one())),
            )),
        );
        let evals = ev.evaluate_over_domain(&expr, domain);
        for row in 0..4 {
            assert_eq!(evals.evals[row], ev.evaluate(&expr, row));
        }
    }
}
