//! BBS+ signatures over BLS12-381 with blind issuance and zero-knowledge proofs of knowledge.
//!
//! A signature on messages `m_1..m_n` is `(A, e, s)` with `A = (x + e)^-1 * B`, where
//! `B = P1 + s * H0 + Σ_i m_i * G_i + X` and `X` is an optional extra base element. Validity is
//! publicly checked with the pairing equation `e(A, W + e * P2) = e(B, P2)` for `W = x * P2`.

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use ff::Field;
use group::Group;
use itertools::Itertools;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    encoding::{base58, base58_seq},
    zkp::{
        AllocPointVar, AllocScalarVar, CompactProof, Constraint, PointVar, ProofError, Prover,
        ScalarVar, Transcript, Verifier,
    },
};

macro_rules! label {
    ($s:literal) => {
        concat!("anoncreds_bls::bbs::", $s)
    };
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SecretKey {
    #[serde(with = "base58")]
    x: Scalar,
    #[serde(with = "base58")]
    h0_log: Scalar,
    #[serde(with = "base58_seq")]
    generator_logs: Vec<Scalar>,
}

impl core::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecretKey").finish_non_exhaustive()
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.x = Scalar::zero();
        self.h0_log = Scalar::zero();
        self.generator_logs.iter_mut().for_each(|g| *g = Scalar::zero());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "base58")]
    pub w: G2Projective,
    #[serde(with = "base58")]
    pub h0: G1Projective,
    #[serde(with = "base58_seq")]
    pub generators: Vec<G1Projective>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "base58")]
    pub a: G1Projective,
    #[serde(with = "base58")]
    pub e: Scalar,
    #[serde(with = "base58")]
    pub s: Scalar,
}

/// Randomized signature elements revealed in a proof of knowledge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureProof {
    #[serde(with = "base58")]
    pub a_prime: G1Projective,
    #[serde(with = "base58")]
    pub a_bar: G1Projective,
    #[serde(with = "base58")]
    pub d: G1Projective,
}

/// Proof that the issuer knows the discrete logs of every public key element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCorrectnessProof {
    pub g1: CompactProof,
    pub g2: CompactProof,
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("verification failed")]
    VerificationFailed,
    #[error("expected {expected} messages, got {actual}")]
    MessageCount { expected: usize, actual: usize },
    #[error("malformed proof: {0}")]
    MalformedProof(&'static str),
    #[error("schnorr proof verification error: {0:?}")]
    ZkpError(ProofError),
}

impl From<ProofError> for Error {
    fn from(value: ProofError) -> Self {
        match value {
            ProofError::VerificationFailure => Error::VerificationFailed,
            other => Error::ZkpError(other),
        }
    }
}

pub(crate) fn random_nonzero<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Scalar {
    loop {
        let x = Scalar::random(&mut *rng);
        if !bool::from(x.is_zero()) {
            return x;
        }
    }
}

fn invert(x: Scalar) -> Scalar {
    // NOTE: Callers only invert values sampled to be non-zero.
    x.invert().unwrap_or(Scalar::zero())
}

impl SecretKey {
    pub fn gen<R>(message_count: usize, rng: &mut R) -> Self
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        Self {
            x: random_nonzero(rng),
            h0_log: random_nonzero(rng),
            generator_logs: (0..message_count).map(|_| random_nonzero(rng)).collect(),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            w: G2Projective::generator() * self.x,
            h0: G1Projective::generator() * self.h0_log,
            generators: self
                .generator_logs
                .iter()
                .map(|a| G1Projective::generator() * a)
                .collect(),
        }
    }

    pub fn message_count(&self) -> usize {
        self.generator_logs.len()
    }

    /// Sign a commitment to hidden messages together with messages known to the signer.
    ///
    /// `commitment` must be of the form `s' * H0 + Σ_j m_j * G_j` over the hidden messages; the
    /// returned `s` omits `s'`, which the holder adds back with [Signature::unblind].
    pub fn blind_sign<R>(
        &self,
        pk: &PublicKey,
        commitment: G1Projective,
        known: &[(usize, Scalar)],
        extra: G1Projective,
        rng: &mut R,
    ) -> Result<Signature, Error>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        if let Some((i, _)) = known.iter().find(|(i, _)| *i >= pk.generators.len()) {
            return Err(Error::MessageCount {
                expected: pk.generators.len(),
                actual: i + 1,
            });
        }
        let s = Scalar::random(&mut *rng);
        let e = loop {
            let e = Scalar::random(&mut *rng);
            if !bool::from((self.x + e).is_zero()) {
                break e;
            }
        };
        let b = G1Projective::generator()
            + commitment
            + pk.h0 * s
            + known.iter().map(|(i, m)| pk.generators[*i] * m).sum::<G1Projective>()
            + extra;
        Ok(Signature {
            a: b * invert(self.x + e),
            e,
            s,
        })
    }

    pub fn sign<R>(
        &self,
        pk: &PublicKey,
        messages: &[Scalar],
        extra: G1Projective,
        rng: &mut R,
    ) -> Result<Signature, Error>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        pk.check_count(messages.len())?;
        let known = messages.iter().copied().enumerate().collect::<Vec<_>>();
        self.blind_sign(pk, G1Projective::identity(), &known, extra, rng)
    }

    /// Prove knowledge of the discrete logs of `H0` and each `G_i` relative to `P1`, and of `x`
    /// relative to `P2`.
    pub fn prove_key_correctness(
        &self,
        pk: &PublicKey,
        transcript: &mut Transcript,
    ) -> KeyCorrectnessProof {
        let mut prover = Prover::new(label!("key_correctness_g1").as_bytes(), transcript);
        let p1 = prover.alloc_point((label!("p1"), G1Projective::generator()));
        let mut constraint = Constraint::new();
        constraint.add(&mut prover, (label!("h0_log"), self.h0_log), p1);
        constraint.eq(&mut prover, (label!("h0"), pk.h0));
        for (a, g) in self.generator_logs.iter().zip(pk.generators.iter()) {
            let mut constraint = Constraint::new();
            constraint.add(&mut prover, (label!("g_log"), *a), p1);
            constraint.eq(&mut prover, (label!("g"), *g));
        }
        let g1 = prover.prove_compact();

        let mut prover = Prover::new(label!("key_correctness_g2").as_bytes(), transcript);
        let mut constraint = Constraint::new();
        constraint.add(
            &mut prover,
            (label!("x"), self.x),
            (label!("p2"), G2Projective::generator()),
        );
        constraint.eq(&mut prover, (label!("w"), pk.w));
        let g2 = prover.prove_compact();

        KeyCorrectnessProof { g1, g2 }
    }
}

impl PublicKey {
    fn check_count(&self, actual: usize) -> Result<(), Error> {
        match actual == self.generators.len() {
            true => Ok(()),
            false => Err(Error::MessageCount {
                expected: self.generators.len(),
                actual,
            }),
        }
    }

    /// Compute `B = P1 + s * H0 + Σ_i m_i * G_i + extra`.
    pub fn base(
        &self,
        s: Scalar,
        messages: &[Scalar],
        extra: G1Projective,
    ) -> Result<G1Projective, Error> {
        self.check_count(messages.len())?;
        Ok(G1Projective::generator()
            + self.h0 * s
            + messages
                .iter()
                .zip(self.generators.iter())
                .map(|(m, g)| *g * m)
                .sum::<G1Projective>()
            + extra)
    }

    pub fn verify_key_correctness(
        &self,
        proof: &KeyCorrectnessProof,
        transcript: &mut Transcript,
    ) -> Result<(), Error> {
        let mut verifier = Verifier::new(label!("key_correctness_g1").as_bytes(), transcript);
        let p1 = verifier.alloc_point((label!("p1"), G1Projective::generator()));
        let mut constraint = Constraint::new();
        constraint.add(&mut verifier, label!("h0_log"), p1);
        constraint.eq(&mut verifier, (label!("h0"), self.h0));
        for g in self.generators.iter() {
            let mut constraint = Constraint::new();
            constraint.add(&mut verifier, label!("g_log"), p1);
            constraint.eq(&mut verifier, (label!("g"), *g));
        }
        verifier.verify_compact(&proof.g1)?;

        let mut verifier = Verifier::new(label!("key_correctness_g2").as_bytes(), transcript);
        let mut constraint = Constraint::new();
        constraint.add(
            &mut verifier,
            label!("x"),
            (label!("p2"), G2Projective::generator()),
        );
        constraint.eq(&mut verifier, (label!("w"), self.w));
        verifier.verify_compact(&proof.g2)?;
        Ok(())
    }
}

impl Signature {
    /// Upon receiving a blind signature, the holder adds the blinding factor used in the
    /// commitment back into `s`.
    pub fn unblind(&mut self, blind: Scalar) {
        self.s += blind;
    }

    pub fn verify(
        &self,
        pk: &PublicKey,
        messages: &[Scalar],
        extra: G1Projective,
    ) -> Result<(), Error> {
        if bool::from(self.a.is_identity()) {
            return Err(Error::VerificationFailed);
        }
        let b = pk.base(self.s, messages, extra)?;
        let lhs = pairing(
            &G1Affine::from(self.a),
            &G2Affine::from(pk.w + G2Projective::generator() * self.e),
        );
        let rhs = pairing(&G1Affine::from(b), &G2Affine::generator());
        match lhs == rhs {
            true => Ok(()),
            false => Err(Error::VerificationFailed),
        }
    }

    /// Adds the constraints for a zero-knowledge proof of knowledge of this signature to a
    /// [Prover], in order to compose with other statements being proven.
    ///
    /// Messages listed in `hidden` are not disclosed; their variables must already be allocated
    /// with the message values so that they can be shared with other statements. All other
    /// messages are revealed to the verifier. If `extra` is given, the extra base element of the
    /// signature is proven to equal `rho * point` for the allocated `rho`.
    ///
    /// This function is paired with [constrain_signature_proof].
    pub fn prove_constraints<R>(
        &self,
        prover: &mut Prover<'_, G1Projective>,
        pk: &PublicKey,
        messages: &[Scalar],
        hidden: &[(usize, ScalarVar)],
        extra: Option<(ScalarVar, G1Projective, G1Projective)>,
        rng: &mut R,
    ) -> Result<SignatureProof, Error>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let extra_base = extra.map(|(_, _, base)| base).unwrap_or(G1Projective::identity());
        let b = pk.base(self.s, messages, extra_base)?;

        let r1 = random_nonzero(rng);
        let r2 = Scalar::random(&mut *rng);
        let r3 = invert(r1);
        let a_prime = self.a * r1;
        let a_bar = b * r1 - a_prime * self.e;
        let d = b * r1 - pk.h0 * r2;
        let s_prime = self.s - r2 * r3;

        let revealed = revealed_indices(pk, hidden)?
            .into_iter()
            .map(|i| (i, messages[i]))
            .collect::<Vec<_>>();

        let vars = KnowledgeVars {
            e: prover.alloc_scalars([(label!("e"), self.e)])[0],
            r2: prover.alloc_scalars([(label!("r2"), r2)])[0],
            r3: prover.alloc_scalars([(label!("r3"), r3)])[0],
            s_prime: prover.alloc_scalars([(label!("s_prime"), s_prime)])[0],
        };
        let proof = SignatureProof { a_prime, a_bar, d };
        constrain_knowledge(
            prover,
            pk,
            &proof,
            &revealed,
            hidden,
            extra.map(|(rho, point, _)| (rho, point)),
            vars,
        );
        Ok(proof)
    }
}

struct KnowledgeVars {
    e: ScalarVar,
    r2: ScalarVar,
    r3: ScalarVar,
    s_prime: ScalarVar,
}

fn revealed_indices(pk: &PublicKey, hidden: &[(usize, ScalarVar)]) -> Result<Vec<usize>, Error> {
    if hidden.iter().map(|(i, _)| i).duplicates().next().is_some() {
        return Err(Error::MalformedProof("message hidden twice"));
    }
    if hidden.iter().any(|(i, _)| *i >= pk.generators.len()) {
        return Err(Error::MalformedProof("hidden message index out of range"));
    }
    Ok((0..pk.generators.len())
        .filter(|i| !hidden.iter().any(|(j, _)| j == i))
        .collect())
}

// Constraint definition shared by prover and verifier.
//
//   Ā - D = -e * A' + r2 * H0
//   P1 + Σ_revealed m_i * G_i = r3 * D - s' * H0 - Σ_hidden m_j * G_j - rho * X
fn constrain_knowledge<CS>(
    cs: &mut CS,
    pk: &PublicKey,
    proof: &SignatureProof,
    revealed: &[(usize, Scalar)],
    hidden: &[(usize, ScalarVar)],
    extra: Option<(ScalarVar, G1Projective)>,
    vars: KnowledgeVars,
) where
    CS: AllocScalarVar<ScalarVar>
        + AllocPointVar<PointVar>
        + AllocPointVar<(&'static str, G1Projective)>,
{
    let h0 = cs.alloc_point((label!("h0"), pk.h0));
    let d = cs.alloc_point((label!("d"), proof.d));

    let mut constraint_a = Constraint::new();
    constraint_a.add(cs, vars.e, (label!("-a_prime"), -proof.a_prime));
    constraint_a.add(cs, vars.r2, h0);
    constraint_a.eq(cs, (label!("a_bar-d"), proof.a_bar - proof.d));

    let mut constraint_b = Constraint::new();
    constraint_b.add(cs, vars.r3, d);
    constraint_b.add(cs, vars.s_prime, (label!("-h0"), -pk.h0));
    for (i, m_var) in hidden {
        constraint_b.add(cs, *m_var, (label!("-g_i"), -pk.generators[*i]));
    }
    if let Some((rho, point)) = extra {
        constraint_b.add(cs, rho, (label!("-extra"), -point));
    }
    let lhs = G1Projective::generator()
        + revealed
            .iter()
            .map(|(i, m)| pk.generators[*i] * m)
            .sum::<G1Projective>();
    constraint_b.eq(cs, (label!("revealed"), lhs));
}

/// Add constraints for a proof of knowledge of a signature to a [Verifier], and check the
/// pairing equation over the randomized signature.
///
/// `revealed` and `hidden` must together cover each message index exactly once.
///
/// This function is paired with [Signature::prove_constraints].
pub fn constrain_signature_proof(
    verifier: &mut Verifier<'_, G1Projective>,
    pk: &PublicKey,
    proof: &SignatureProof,
    revealed: &[(usize, Scalar)],
    hidden: &[(usize, ScalarVar)],
    extra: Option<(ScalarVar, G1Projective)>,
) -> Result<(), Error> {
    let expected = revealed_indices(pk, hidden)?;
    let mut actual = revealed.iter().map(|(i, _)| *i).collect::<Vec<_>>();
    actual.sort_unstable();
    if actual != expected {
        return Err(Error::MalformedProof(
            "revealed and hidden messages do not cover the key",
        ));
    }

    if bool::from(proof.a_prime.is_identity()) {
        return Err(Error::VerificationFailed);
    }
    let lhs = pairing(&G1Affine::from(proof.a_prime), &G2Affine::from(pk.w));
    let rhs = pairing(&G1Affine::from(proof.a_bar), &G2Affine::generator());
    if lhs != rhs {
        return Err(Error::VerificationFailed);
    }

    let vars = KnowledgeVars {
        e: verifier.alloc_scalars([label!("e")])[0],
        r2: verifier.alloc_scalars([label!("r2")])[0],
        r3: verifier.alloc_scalars([label!("r3")])[0],
        s_prime: verifier.alloc_scalars([label!("s_prime")])[0],
    };
    constrain_knowledge(verifier, pk, proof, revealed, hidden, extra, vars);
    Ok(())
}
