//! Schnorr proofs of knowledge for linear relations over a prime-order group, made
//! non-interactive with a Merlin transcript.
//!
//! Statements are expressed as constraints of the form `P = Σ_i x_i * G_i`, where the `x_i` are
//! secret scalars known to the prover and the points are public. Scalars are shared between
//! constraints by reusing the same [ScalarVar], which is how proofs over several statements are
//! linked together.

use bls12_381::Scalar;
use ff::Field;
use group::{Group, GroupEncoding};
use itertools::zip_eq;
use serde::{Deserialize, Serialize};

use crate::encoding::{base58, base58_seq};

/// Fiat-Shamir transcript shared by the proofs in this crate. Thin wrapper over
/// [merlin::Transcript] that knows how to absorb group elements and squeeze field elements.
#[derive(Clone)]
pub struct Transcript(merlin::Transcript);

impl Transcript {
    pub fn new(label: &'static [u8]) -> Self {
        Self(merlin::Transcript::new(label))
    }

    pub fn append_message(&mut self, label: &'static [u8], message: &[u8]) {
        self.0.append_message(label, message);
    }

    pub fn append_point<G: GroupEncoding>(&mut self, label: &'static [u8], point: &G) {
        self.0.append_message(label, point.to_bytes().as_ref());
    }

    pub fn challenge_scalar(&mut self, label: &'static [u8]) -> Scalar {
        let mut wide = [0u8; 64];
        self.0.challenge_bytes(label, &mut wide);
        Scalar::from_bytes_wide(&wide)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScalarVar(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PointVar(usize);

/// A proof consisting of the challenge and one response per allocated scalar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactProof {
    #[serde(with = "base58")]
    pub challenge: Scalar,
    #[serde(with = "base58_seq")]
    pub responses: Vec<Scalar>,
}

impl CompactProof {
    pub fn response(&self, var: ScalarVar) -> Option<Scalar> {
        self.responses.get(var.0).copied()
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    #[error("proof verification failed")]
    VerificationFailure,
    #[error("proof is malformed")]
    FormatError,
}

/// Operations common to the prover and verifier side of a constraint system.
pub trait SchnorrCS {
    fn constrain(&mut self, lhs: PointVar, linear_combination: Vec<(ScalarVar, PointVar)>);

    fn transcript(&mut self) -> &mut Transcript;
}

pub trait AllocScalarVar<T>: SchnorrCS {
    fn alloc_scalar(&mut self, value: T) -> ScalarVar;
}

pub trait AllocPointVar<T>: SchnorrCS {
    fn alloc_point(&mut self, value: T) -> PointVar;
}

pub struct Prover<'a, G> {
    transcript: &'a mut Transcript,
    scalars: Vec<Scalar>,
    blindings: Vec<Scalar>,
    points: Vec<G>,
    constraints: Vec<(PointVar, Vec<(ScalarVar, PointVar)>)>,
}

impl<'a, G> Prover<'a, G>
where
    G: Group<Scalar = Scalar> + GroupEncoding,
{
    pub fn new(label: &[u8], transcript: &'a mut Transcript) -> Self {
        transcript.append_message(b"constraints", label);
        Self {
            transcript,
            scalars: Vec::new(),
            blindings: Vec::new(),
            points: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Random nonce committed to for the given variable. Used to build commitments for relations
    /// that are checked outside of the group, such as pairing equations.
    pub fn blinding(&self, var: ScalarVar) -> Scalar {
        self.blindings[var.0]
    }

    pub fn alloc_scalars<X>(&mut self, values: impl IntoIterator<Item = X>) -> Vec<ScalarVar>
    where
        Self: AllocScalarVar<X>,
    {
        values.into_iter().map(|x| self.alloc_scalar(x)).collect()
    }

    pub fn prove_compact(self) -> CompactProof {
        for (_, linear_combination) in self.constraints.iter() {
            let commitment = linear_combination
                .iter()
                .map(|(x, g)| self.points[g.0] * self.blindings[x.0])
                .sum::<G>();
            self.transcript.append_point(b"commitment", &commitment);
        }
        let challenge = self.transcript.challenge_scalar(b"schnorr");
        let responses = zip_eq(&self.blindings, &self.scalars)
            .map(|(k, x)| k - challenge * x)
            .collect();
        CompactProof {
            challenge,
            responses,
        }
    }
}

impl<G> SchnorrCS for Prover<'_, G> {
    fn constrain(&mut self, lhs: PointVar, linear_combination: Vec<(ScalarVar, PointVar)>) {
        self.constraints.push((lhs, linear_combination));
    }

    fn transcript(&mut self) -> &mut Transcript {
        self.transcript
    }
}

impl<G> AllocScalarVar<(&'static str, Scalar)> for Prover<'_, G> {
    fn alloc_scalar(&mut self, value: (&'static str, Scalar)) -> ScalarVar {
        self.transcript.append_message(b"scalar", value.0.as_bytes());
        self.scalars.push(value.1);
        self.blindings.push(Scalar::random(rand::thread_rng()));
        ScalarVar(self.scalars.len() - 1)
    }
}

impl<G> AllocScalarVar<ScalarVar> for Prover<'_, G> {
    fn alloc_scalar(&mut self, value: ScalarVar) -> ScalarVar {
        value
    }
}

impl<G: GroupEncoding> AllocPointVar<(&'static str, G)> for Prover<'_, G> {
    fn alloc_point(&mut self, value: (&'static str, G)) -> PointVar {
        self.transcript.append_point(value.0.as_bytes(), &value.1);
        self.points.push(value.1);
        PointVar(self.points.len() - 1)
    }
}

impl<G> AllocPointVar<PointVar> for Prover<'_, G> {
    fn alloc_point(&mut self, value: PointVar) -> PointVar {
        value
    }
}

pub struct Verifier<'a, G> {
    transcript: &'a mut Transcript,
    num_scalars: usize,
    points: Vec<G>,
    constraints: Vec<(PointVar, Vec<(ScalarVar, PointVar)>)>,
}

impl<'a, G> Verifier<'a, G>
where
    G: Group<Scalar = Scalar> + GroupEncoding,
{
    pub fn new(label: &[u8], transcript: &'a mut Transcript) -> Self {
        transcript.append_message(b"constraints", label);
        Self {
            transcript,
            num_scalars: 0,
            points: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn alloc_scalars<X>(&mut self, values: impl IntoIterator<Item = X>) -> Vec<ScalarVar>
    where
        Self: AllocScalarVar<X>,
    {
        values.into_iter().map(|x| self.alloc_scalar(x)).collect()
    }

    pub fn verify_compact(self, proof: &CompactProof) -> Result<(), ProofError> {
        if proof.responses.len() != self.num_scalars {
            return Err(ProofError::FormatError);
        }
        for (lhs, linear_combination) in self.constraints.iter() {
            let commitment = linear_combination
                .iter()
                .map(|(x, g)| self.points[g.0] * proof.responses[x.0])
                .sum::<G>()
                + self.points[lhs.0] * proof.challenge;
            self.transcript.append_point(b"commitment", &commitment);
        }
        let challenge = self.transcript.challenge_scalar(b"schnorr");
        match challenge == proof.challenge {
            true => Ok(()),
            false => Err(ProofError::VerificationFailure),
        }
    }
}

impl<G> SchnorrCS for Verifier<'_, G> {
    fn constrain(&mut self, lhs: PointVar, linear_combination: Vec<(ScalarVar, PointVar)>) {
        self.constraints.push((lhs, linear_combination));
    }

    fn transcript(&mut self) -> &mut Transcript {
        self.transcript
    }
}

impl<G> AllocScalarVar<&'static str> for Verifier<'_, G> {
    fn alloc_scalar(&mut self, value: &'static str) -> ScalarVar {
        self.transcript.append_message(b"scalar", value.as_bytes());
        self.num_scalars += 1;
        ScalarVar(self.num_scalars - 1)
    }
}

impl<G> AllocScalarVar<ScalarVar> for Verifier<'_, G> {
    fn alloc_scalar(&mut self, value: ScalarVar) -> ScalarVar {
        value
    }
}

impl<G: GroupEncoding> AllocPointVar<(&'static str, G)> for Verifier<'_, G> {
    fn alloc_point(&mut self, value: (&'static str, G)) -> PointVar {
        self.transcript.append_point(value.0.as_bytes(), &value.1);
        self.points.push(value.1);
        PointVar(self.points.len() - 1)
    }
}

impl<G> AllocPointVar<PointVar> for Verifier<'_, G> {
    fn alloc_point(&mut self, value: PointVar) -> PointVar {
        value
    }
}

#[derive(Default)]
pub struct Constraint {
    pub linear_combination: Vec<(ScalarVar, PointVar)>,
}

impl Constraint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<CS, X, P>(&mut self, cs: &mut CS, x: X, g: P) -> &mut Self
    where
        CS: AllocScalarVar<X> + AllocPointVar<P>,
    {
        let x_var = cs.alloc_scalar(x);
        let g_var = cs.alloc_point(g);
        self.linear_combination.push((x_var, g_var));
        self
    }

    pub fn sum<CS, X, P>(
        &mut self,
        cs: &mut CS,
        xs: impl IntoIterator<Item = X>,
        gs: impl IntoIterator<Item = P>,
    ) -> &mut Self
    where
        CS: AllocScalarVar<X> + AllocPointVar<P>,
    {
        for (x, g) in zip_eq(xs, gs) {
            self.add(cs, x, g);
        }
        self
    }

    pub fn eq<CS, P>(self, cs: &mut CS, lhs: P)
    where
        CS: AllocPointVar<P>,
    {
        let lhs_var = cs.alloc_point(lhs);
        cs.constrain(lhs_var, self.linear_combination);
    }
}

#[cfg(test)]
mod test {
    use bls12_381::{G1Projective, G2Projective, Scalar};
    use ff::Field;
    use group::Group;

    use super::{Constraint, ProofError, Prover, Transcript, Verifier};

    macro_rules! label {
        ($s:literal) => {
            concat!("anoncreds_bls::zkp::test::", $s)
        };
    }

    // Discrete log equality: A = x * G and B = x * H.
    fn prove_dleq<G: Group<Scalar = Scalar> + group::GroupEncoding>(
        x: Scalar,
        g: G,
        h: G,
    ) -> super::CompactProof {
        let mut transcript = Transcript::new(label!("transcript").as_bytes());
        let mut prover = Prover::new(label!("dleq").as_bytes(), &mut transcript);
        let x_var = prover.alloc_scalars([(label!("x"), x)])[0];
        let mut constraint_a = Constraint::new();
        constraint_a.add(&mut prover, x_var, (label!("g"), g));
        constraint_a.eq(&mut prover, (label!("a"), g * x));
        let mut constraint_b = Constraint::new();
        constraint_b.add(&mut prover, x_var, (label!("h"), h));
        constraint_b.eq(&mut prover, (label!("b"), h * x));
        prover.prove_compact()
    }

    fn verify_dleq<G: Group<Scalar = Scalar> + group::GroupEncoding>(
        proof: &super::CompactProof,
        g: G,
        h: G,
        a: G,
        b: G,
    ) -> Result<(), ProofError> {
        let mut transcript = Transcript::new(label!("transcript").as_bytes());
        let mut verifier = Verifier::new(label!("dleq").as_bytes(), &mut transcript);
        let x_var = verifier.alloc_scalars([label!("x")])[0];
        let mut constraint_a = Constraint::new();
        constraint_a.add(&mut verifier, x_var, (label!("g"), g));
        constraint_a.eq(&mut verifier, (label!("a"), a));
        let mut constraint_b = Constraint::new();
        constraint_b.add(&mut verifier, x_var, (label!("h"), h));
        constraint_b.eq(&mut verifier, (label!("b"), b));
        verifier.verify_compact(proof)
    }

    #[test]
    fn dleq_g1_success() {
        let x = Scalar::random(rand::thread_rng());
        let g = G1Projective::generator();
        let h = G1Projective::random(rand::thread_rng());
        let proof = prove_dleq(x, g, h);
        verify_dleq(&proof, g, h, g * x, h * x).unwrap();
    }

    #[test]
    fn dleq_g2_success() {
        let x = Scalar::random(rand::thread_rng());
        let g = G2Projective::generator();
        let h = G2Projective::random(rand::thread_rng());
        let proof = prove_dleq(x, g, h);
        verify_dleq(&proof, g, h, g * x, h * x).unwrap();
    }

    #[test]
    fn dleq_fail_on_unequal_logs() {
        let x = Scalar::random(rand::thread_rng());
        let g = G1Projective::generator();
        let h = G1Projective::random(rand::thread_rng());
        let proof = prove_dleq(x, g, h);
        let Err(ProofError::VerificationFailure) =
            verify_dleq(&proof, g, h, g * x, h * (x + Scalar::ONE))
        else {
            panic!("dleq verified for distinct discrete logs");
        };
    }

    #[test]
    fn challenge_depends_on_transcript_context() {
        let mut a = Transcript::new(label!("transcript").as_bytes());
        let mut b = a.clone();
        a.append_message(b"nonce", b"1");
        b.append_message(b"nonce", b"2");
        let mut a_again = a.clone();
        assert_eq!(a.challenge_scalar(b"c"), a_again.challenge_scalar(b"c"));
        assert_ne!(a.challenge_scalar(b"c"), b.challenge_scalar(b"c"));
    }

    #[test]
    fn proof_does_not_verify_under_another_transcript() {
        let x = Scalar::random(rand::thread_rng());
        let g = G1Projective::generator();
        let h = G1Projective::random(rand::thread_rng());
        let proof = prove_dleq(x, g, h);

        let mut transcript = Transcript::new(label!("transcript").as_bytes());
        transcript.append_message(b"nonce", b"replayed");
        let mut verifier = Verifier::new(label!("dleq").as_bytes(), &mut transcript);
        let x_var = verifier.alloc_scalars([label!("x")])[0];
        let mut constraint_a = Constraint::new();
        constraint_a.add(&mut verifier, x_var, (label!("g"), g));
        constraint_a.eq(&mut verifier, (label!("a"), g * x));
        let mut constraint_b = Constraint::new();
        constraint_b.add(&mut verifier, x_var, (label!("h"), h));
        constraint_b.eq(&mut verifier, (label!("b"), h * x));
        assert_eq!(
            verifier.verify_compact(&proof),
            Err(ProofError::VerificationFailure)
        );
    }

    #[test]
    fn wrong_response_count_is_format_error() {
        let x = Scalar::random(rand::thread_rng());
        let g = G1Projective::generator();
        let h = G1Projective::random(rand::thread_rng());
        let mut proof = prove_dleq(x, g, h);
        proof.responses.push(Scalar::ONE);
        let Err(ProofError::FormatError) = verify_dleq(&proof, g, h, g * x, h * x) else {
            panic!("extra response was not rejected as malformed");
        };
    }
}
