//! Fiat–Shamir transcript with domain separation
//!
//! A **deterministic, label-stable** Fiat–Shamir transform built on BLAKE3
//! with explicit domain-separation tags and length-delimited absorbs.
//!
//! ### Design
//! - **Stable labels.** Every absorb is prefixed by a fixed tag and a
//!   human-readable label, so the prover and verifier replay the exact same
//!   byte schedule.
//! - **Length-delimited items.** All absorbs carry an explicit byte-length
//!   prefix to avoid concatenation ambiguity.
//! - **Clone-before-challenge.** Challenge derivation clones the running
//!   hash state and reads the BLAKE3 XOF, so deriving a challenge never
//!   mutates the absorb state (only a local counter advances).
//!
//! The transcript is a total order: every challenge of the proving round is
//! derived only after all commitments and evaluations preceding it have
//! been absorbed.

use ark_ff::PrimeField;
use ark_serialize::CanonicalSerialize;
use blake3::Hasher;
use std::io::Read;

use crate::{pcs, F};

/// Canonical labels; part of the transcript's **stable** domain separation.
/// Adding variants is backward-compatible, renaming existing ones is not.
#[derive(Clone, Copy, Debug)]
pub enum FsLabel {
    /// Compression challenge θ.
    Theta,
    /// Grand-product challenge β.
    Beta,
    /// Grand-product challenge γ.
    Gamma,
    /// Evaluation-point challenge x.
    EvalPoint,
    /// Aggregation challenge r (powers combine the numerators).
    Aggregation,
    /// Commitment to a permuted input column A'.
    PermutedInputCommit,
    /// Commitment to a permuted table column S'.
    PermutedTableCommit,
    /// Commitment to a grand-product column Z.
    GrandProductCommit,
    /// Commitment to a combined quotient H.
    QuotientCommit,
    /// A claimed polynomial evaluation streamed into the proof.
    LookupEval,
}

impl FsLabel {
    #[inline]
    fn as_str(&self) -> &'static str {
        match self {
            FsLabel::Theta => "theta",
            FsLabel::Beta => "beta",
            FsLabel::Gamma => "gamma",
            FsLabel::EvalPoint => "eval_point",
            FsLabel::Aggregation => "aggregation",
            FsLabel::PermutedInputCommit => "permuted_input_commit",
            FsLabel::PermutedTableCommit => "permuted_table_commit",
            FsLabel::GrandProductCommit => "grand_product_commit",
            FsLabel::QuotientCommit => "quotient_commit",
            FsLabel::LookupEval => "lookup_eval",
        }
    }
}

/// Fiat–Shamir transcript with domain separation (BLAKE3-based).
pub struct Transcript {
    /// Domain-separation label for this transcript instance.
    label: &'static str,
    /// Running hash state.
    hasher: Hasher,
    /// Monotone counter for challenge derivations.
    ctr: u64,
}

impl Transcript {
    /// Create a new transcript under a domain-separation `label`
    /// distinguishing independent proof types.
    pub fn new(label: &'static str) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(b"MULTIOPEN.transcript.v1");
        hasher.update(label.as_bytes());
        Self { label, hasher, ctr: 0 }
    }

    // ---------------------------- Absorb ----------------------------

    /// Absorb an arbitrary byte slice (length-delimited).
    pub fn absorb_bytes_l(&mut self, label: FsLabel, bytes: &[u8]) {
        self.absorb_bytes(label.as_str(), bytes);
    }

    fn absorb_bytes(&mut self, label: &'static str, bytes: &[u8]) {
        self.hasher.update(b"item:");
        self.hasher.update(label.as_bytes());
        self.hasher.update(b":len:");
        self.hasher.update(&(bytes.len() as u64).to_be_bytes());
        self.hasher.update(b":data:");
        self.hasher.update(bytes);
    }

    /// Absorb a PCS commitment using compressed G1 encoding.
    pub fn absorb_commitment_l(&mut self, label: FsLabel, c: &pcs::Commitment) {
        let mut bytes = Vec::with_capacity(48);
        c.0.serialize_compressed(&mut bytes).expect("serialize G1");
        self.absorb_bytes_l(label, &bytes);
    }

    /// Absorb a field element using compressed canonical serialization.
    pub fn absorb_scalar_l(&mut self, label: FsLabel, f: &F) {
        let mut bytes = Vec::with_capacity(32);
        f.serialize_compressed(&mut bytes).expect("serialize field");
        self.absorb_bytes_l(label, &bytes);
    }

    /// Absorb a big-endian counter (sizes, indices).
    pub fn absorb_counter_l(&mut self, label: FsLabel, ctr: u64) {
        self.absorb_bytes_l(label, &ctr.to_be_bytes());
    }

    // --------------------------- Challenge ---------------------------

    /// Derive a single field challenge.
    ///
    /// Clones the running state and applies the XOF, so calls are pure
    /// functions of the absorb schedule and the `(label, counter)` tuple.
    pub fn challenge_f_l(&mut self, label: FsLabel) -> F {
        let out = hash_to_field(&self.hasher, self.label, label.as_str(), self.ctr);
        self.ctr = self.ctr.wrapping_add(1);
        out
    }
}

/// Derive one field element from (a clone of) `base` under a fixed DST.
fn hash_to_field(base: &Hasher, tlabel: &'static str, label: &'static str, ctr: u64) -> F {
    let mut h = base.clone();
    h.update(b"challenge:");
    h.update(b"MULTIOPEN.v1");
    h.update(b":tlabel:");
    h.update(tlabel.as_bytes());
    h.update(b":label:");
    h.update(label.as_bytes());
    h.update(b":ctr:");
    h.update(&ctr.to_be_bytes());

    let mut xof = h.finalize_xof();
    let mut buf = [0u8; 64];
    let _ = xof.read(&mut buf);
    F::from_le_bytes_mod_order(&buf)
}
