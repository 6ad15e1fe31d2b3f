//! Pedersen commitments to vectors of scalars, with proofs of knowledge of an opening.

use bls12_381::Scalar;
use ff::Field;
use group::{Group, GroupEncoding};
use rand::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;

use crate::zkp::{
    AllocPointVar, AllocScalarVar, CompactProof, Constraint, ProofError, Prover, ScalarVar,
    Transcript, Verifier,
};

macro_rules! label {
    ($s:literal) => {
        concat!("anoncreds_bls::pedersen::PedersenGenerators::", $s)
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PedersenCommitment<G> {
    pub elem: G,
}

/// Generators for a commitment `C = Σ_i m_i * G_i + s * H`.
///
/// The discrete log relationship between the generators must be unknown to the party producing a
/// commitment. Otherwise the commitment is not binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PedersenGenerators<G> {
    pub blind: G,
    pub generators: Vec<G>,
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum PedersenError {
    #[error("verification failed")]
    VerificationError,
    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl<G> PedersenGenerators<G>
where
    G: Group<Scalar = Scalar> + GroupEncoding,
{
    pub fn new(blind: G, generators: impl Into<Vec<G>>) -> Self {
        Self {
            blind,
            generators: generators.into(),
        }
    }

    fn check_len(&self, actual: usize) -> Result<(), PedersenError> {
        match actual == self.generators.len() {
            true => Ok(()),
            false => Err(PedersenError::LengthMismatch {
                expected: self.generators.len(),
                actual,
            }),
        }
    }

    pub fn commit_with_blind(
        &self,
        msg: &[Scalar],
        blind: Scalar,
    ) -> Result<PedersenCommitment<G>, PedersenError> {
        self.check_len(msg.len())?;
        let elem = msg
            .iter()
            .zip(self.generators.iter())
            .map(|(m, g)| *g * m)
            .sum::<G>()
            + self.blind * blind;
        Ok(PedersenCommitment { elem })
    }

    pub fn commit<R>(
        &self,
        msg: &[Scalar],
        rng: &mut R,
    ) -> Result<(PedersenCommitment<G>, Scalar), PedersenError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let blind = Scalar::random(&mut *rng);
        Ok((self.commit_with_blind(msg, blind)?, blind))
    }

    pub fn open(
        &self,
        commit: &PedersenCommitment<G>,
        msg: &[Scalar],
        blind: Scalar,
    ) -> Result<(), PedersenError> {
        let eq = commit
            .elem
            .to_bytes()
            .as_ref()
            .ct_eq(self.commit_with_blind(msg, blind)?.elem.to_bytes().as_ref());
        match eq.into() {
            true => Ok(()),
            false => Err(PedersenError::VerificationError),
        }
    }

    /// Prove knowledge of an opening for the given commitment, binding the proof to anything the
    /// caller has already appended to the transcript.
    ///
    /// This function is paired with [PedersenGenerators::verify_opening].
    pub fn prove_opening(
        &self,
        transcript: &mut Transcript,
        commit: &PedersenCommitment<G>,
        msg: &[Scalar],
        blind: Scalar,
    ) -> Result<CompactProof, PedersenError> {
        self.check_len(msg.len())?;
        let mut prover = Prover::new(label!("opening").as_bytes(), transcript);
        let msg_vars = prover.alloc_scalars(msg.iter().map(|m| (label!("m_i"), *m)));
        self.prove_opening_constraints(&mut prover, commit, &msg_vars, blind);
        Ok(prover.prove_compact())
    }

    /// This function is paired with [PedersenGenerators::prove_opening].
    pub fn verify_opening(
        &self,
        transcript: &mut Transcript,
        commit: &PedersenCommitment<G>,
        proof: &CompactProof,
    ) -> Result<(), ProofError> {
        let mut verifier = Verifier::new(label!("opening").as_bytes(), transcript);
        let msg_vars = verifier.alloc_scalars(self.generators.iter().map(|_| label!("m_i")));
        self.constrain_opening(&mut verifier, commit, &msg_vars);
        verifier.verify_compact(proof)
    }

    /// Adds the constraints for the commitment opening to a [Prover], in order to compose with
    /// other statements being proven.
    ///
    /// This function is paired with [PedersenGenerators::constrain_opening].
    pub fn prove_opening_constraints(
        &self,
        prover: &mut Prover<'_, G>,
        commit: &PedersenCommitment<G>,
        msg_vars: &[ScalarVar],
        blind: Scalar,
    ) -> ScalarVar {
        let blind_var = prover.alloc_scalars([(label!("blind"), blind)])[0];
        self.constrain(prover, commit, msg_vars, blind_var);
        blind_var
    }

    /// Add constraints for knowledge of an opening for the given commitment to a [Verifier].
    ///
    /// This function is paired with [PedersenGenerators::prove_opening_constraints].
    pub fn constrain_opening(
        &self,
        verifier: &mut Verifier<'_, G>,
        commit: &PedersenCommitment<G>,
        msg_vars: &[ScalarVar],
    ) -> ScalarVar {
        let blind_var = verifier.alloc_scalars([label!("blind")])[0];
        self.constrain(verifier, commit, msg_vars, blind_var);
        blind_var
    }

    // Constrain C = Σ_i m_i * G_i + s * H
    fn constrain<CS>(
        &self,
        cs: &mut CS,
        commit: &PedersenCommitment<G>,
        msg_vars: &[ScalarVar],
        blind_var: ScalarVar,
    ) where
        CS: AllocPointVar<(&'static str, G)> + AllocScalarVar<ScalarVar>,
    {
        let mut constraint = Constraint::new();
        constraint.sum(
            cs,
            msg_vars.iter().copied(),
            self.generators.iter().map(|g| (label!("g_i"), *g)),
        );
        constraint.add(cs, blind_var, (label!("blind_gen"), self.blind));
        constraint.eq(cs, (label!("commit"), commit.elem));
    }
}
