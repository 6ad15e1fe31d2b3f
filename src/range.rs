//! Proofs that a committed integer attribute satisfies an inequality against a public value.
//!
//! The non-negative difference `Δ` between the attribute and the bound is decomposed into bits.
//! Each bit gets a Pedersen commitment `C_j = b_j * G + r_j * H`, constrained to open to zero or
//! one by `C_j = b_j * C_j + t_j * H`. A final constraint links `Σ_j 2^j * C_j` to the attribute
//! variable shared with the signature proof.

use bls12_381::{G1Projective, Scalar};
use ff::Field;
use group::Group;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    encoding::base58_seq,
    pedersen::PedersenGenerators,
    pres_request::PredicateType,
    zkp::{AllocPointVar, AllocScalarVar, Constraint, PointVar, Prover, ScalarVar, Verifier},
};

macro_rules! label {
    ($s:literal) => {
        concat!("anoncreds_bls::range::", $s)
    };
}

/// Bit width of the difference between an attribute and a predicate bound. Any difference of two
/// 32-bit signed integers that is non-negative fits.
pub const PREDICATE_BITS: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProof {
    #[serde(with = "base58_seq")]
    pub bit_commitments: Vec<G1Projective>,
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("predicate {0} {1} is not satisfied by the attribute value")]
    Unsatisfied(PredicateType, i32),
    #[error("expected {PREDICATE_BITS} bit commitments, got {0}")]
    MalformedProof(usize),
}

impl PredicateType {
    /// Returns `(sign, offset)` such that the predicate holds exactly when
    /// `sign * m + offset >= 0`.
    fn linear_form(&self, p_value: i32) -> (i64, i64) {
        let p = i64::from(p_value);
        match self {
            PredicateType::GE => (1, -p),
            PredicateType::GT => (1, -p - 1),
            PredicateType::LE => (-1, p),
            PredicateType::LT => (-1, p - 1),
        }
    }

    pub fn is_satisfied(&self, value: i32, p_value: i32) -> bool {
        let (sign, offset) = self.linear_form(p_value);
        sign * i64::from(value) + offset >= 0
    }
}

fn scalar_from_i64(x: i64) -> Scalar {
    match x < 0 {
        true => -Scalar::from(x.unsigned_abs()),
        false => Scalar::from(x as u64),
    }
}

/// Adds the constraints proving that the attribute allocated as `m_var`, with integer value
/// `value`, satisfies the predicate.
///
/// `gens` must contain exactly one attribute generator `G` along with the blinding generator `H`.
///
/// This function is paired with [constrain_predicate].
#[allow(clippy::too_many_arguments)]
pub fn prove_predicate_constraints<R>(
    prover: &mut Prover<'_, G1Projective>,
    gens: &PedersenGenerators<G1Projective>,
    m_var: ScalarVar,
    value: i32,
    p_type: PredicateType,
    p_value: i32,
    rng: &mut R,
) -> Result<RangeProof, Error>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let (sign, offset) = p_type.linear_form(p_value);
    let delta = sign * i64::from(value) + offset;
    if delta < 0 {
        return Err(Error::Unsatisfied(p_type, p_value));
    }
    let delta = delta as u64;

    let g = gens.generators[0];
    let h = gens.blind;
    let mut bit_commitments = Vec::with_capacity(PREDICATE_BITS);
    let mut bit_vars = Vec::with_capacity(PREDICATE_BITS);
    let mut total_blind = Scalar::zero();
    let mut power = Scalar::one();
    for j in 0..PREDICATE_BITS {
        let bit = Scalar::from((delta >> j) & 1);
        let r = Scalar::random(&mut *rng);
        let t = r * (Scalar::one() - bit);
        bit_commitments.push(g * bit + h * r);
        bit_vars.push(BitVars {
            b: prover.alloc_scalars([(label!("b_j"), bit)])[0],
            r: prover.alloc_scalars([(label!("r_j"), r)])[0],
            t: prover.alloc_scalars([(label!("t_j"), t)])[0],
        });
        total_blind += power * r;
        power = power.double();
    }
    let total_blind_var = prover.alloc_scalars([(label!("r_total"), total_blind)])[0];

    let proof = RangeProof { bit_commitments };
    constrain_bits(
        prover,
        gens,
        m_var,
        (sign, offset),
        &proof,
        &bit_vars,
        total_blind_var,
    );
    Ok(proof)
}

/// Add constraints for a predicate proof to a [Verifier].
///
/// This function is paired with [prove_predicate_constraints].
pub fn constrain_predicate(
    verifier: &mut Verifier<'_, G1Projective>,
    gens: &PedersenGenerators<G1Projective>,
    m_var: ScalarVar,
    p_type: PredicateType,
    p_value: i32,
    proof: &RangeProof,
) -> Result<(), Error> {
    if proof.bit_commitments.len() != PREDICATE_BITS {
        return Err(Error::MalformedProof(proof.bit_commitments.len()));
    }
    let bit_vars = (0..PREDICATE_BITS)
        .map(|_| BitVars {
            b: verifier.alloc_scalars([label!("b_j")])[0],
            r: verifier.alloc_scalars([label!("r_j")])[0],
            t: verifier.alloc_scalars([label!("t_j")])[0],
        })
        .collect::<Vec<_>>();
    let total_blind_var = verifier.alloc_scalars([label!("r_total")])[0];
    constrain_bits(
        verifier,
        gens,
        m_var,
        p_type.linear_form(p_value),
        proof,
        &bit_vars,
        total_blind_var,
    );
    Ok(())
}

struct BitVars {
    b: ScalarVar,
    r: ScalarVar,
    t: ScalarVar,
}

// Constraint definition shared by prover and verifier.
fn constrain_bits<CS>(
    cs: &mut CS,
    gens: &PedersenGenerators<G1Projective>,
    m_var: ScalarVar,
    (sign, offset): (i64, i64),
    proof: &RangeProof,
    bit_vars: &[BitVars],
    total_blind_var: ScalarVar,
) where
    CS: AllocScalarVar<ScalarVar>
        + AllocPointVar<PointVar>
        + AllocPointVar<(&'static str, G1Projective)>,
{
    let g = gens.generators[0];
    let g_var = cs.alloc_point((label!("g"), g));
    let h_var = cs.alloc_point((label!("h"), gens.blind));

    for (c_j, vars) in proof.bit_commitments.iter().zip(bit_vars) {
        let c_var = cs.alloc_point((label!("c_j"), *c_j));

        // C_j = b_j * G + r_j * H
        let mut constraint_open = Constraint::new();
        constraint_open.add(cs, vars.b, g_var);
        constraint_open.add(cs, vars.r, h_var);
        constraint_open.eq(cs, c_var);

        // C_j = b_j * C_j + t_j * H, which forces b_j * (b_j - 1) = 0
        let mut constraint_bit = Constraint::new();
        constraint_bit.add(cs, vars.b, c_var);
        constraint_bit.add(cs, vars.t, h_var);
        constraint_bit.eq(cs, c_var);
    }

    // Σ_j 2^j * C_j - offset * G = sign * m * G + r_total * H
    let mut power = Scalar::one();
    let mut weighted = G1Projective::identity();
    for c_j in proof.bit_commitments.iter() {
        weighted += c_j * power;
        power = power.double();
    }
    let lhs = weighted - g * scalar_from_i64(offset);
    let mut constraint_link = Constraint::new();
    constraint_link.add(cs, m_var, (label!("sign_g"), g * scalar_from_i64(sign)));
    constraint_link.add(cs, total_blind_var, h_var);
    constraint_link.eq(cs, (label!("weighted_bits"), lhs));
}
