//! Pairing-based accumulator over a fixed index space of size `N`.
//!
//! With secret `γ`, the tails are `T_k = γ^k * P2` for `k` in `1..=2N`, with `T_{N+1}` replaced
//! by the identity. Registry index `i` (0-based) is accumulated at position `j = i + 1`, and
//! carries the index element `g_j = γ^j * P1`. For a member set `V`:
//!
//! ```text
//! acc = Σ_{j ∈ V} T_{N+1-j}
//! w_j = Σ_{k ∈ V, k != j} T_{N+1-k+j}
//! e(g_j, acc) - e(P1, w_j) = e(z, P2)    where z = γ^{N+1} * P1
//! ```
//!
//! Accumulators and witnesses are sums of tails, so they can be computed and updated by anyone
//! holding the tails file, and incremental updates agree with computing from scratch.

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use group::Group;
use serde::{Deserialize, Serialize};

use crate::{
    encoding::base58,
    error::{Error, Result},
    tails::TailsReader,
};

#[derive(Clone, Serialize, Deserialize)]
pub struct AccumulatorSecret {
    #[serde(with = "base58")]
    gamma: Scalar,
}

impl core::fmt::Debug for AccumulatorSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccumulatorSecret").finish_non_exhaustive()
    }
}

impl Drop for AccumulatorSecret {
    fn drop(&mut self) {
        self.gamma = Scalar::zero();
    }
}

fn pow(base: Scalar, exp: u64) -> Scalar {
    base.pow_vartime(&[exp, 0, 0, 0])
}

impl AccumulatorSecret {
    pub fn gen<R: rand::RngCore + rand::CryptoRng + ?Sized>(rng: &mut R) -> Self {
        use ff::Field;
        loop {
            let gamma = Scalar::random(&mut *rng);
            if !bool::from(gamma.is_zero()) {
                return Self { gamma };
            }
        }
    }

    /// Public accumulator key `z = γ^{N+1} * P1`.
    pub fn public_key(&self, max_cred_num: u32) -> G1Projective {
        G1Projective::generator() * pow(self.gamma, u64::from(max_cred_num) + 1)
    }

    /// Index element `g_j = γ^j * P1` for the given registry index.
    pub fn index_element(&self, index: u32) -> G1Projective {
        G1Projective::generator() * pow(self.gamma, u64::from(index) + 1)
    }

    /// Tails computed on demand from the secret, without reading the tails file.
    pub fn tails_reader(&self, max_cred_num: u32) -> SecretTails<'_> {
        SecretTails {
            secret: self,
            max_cred_num,
        }
    }

    /// Generate the `2N` tails in position order.
    pub fn tails(&self, max_cred_num: u32) -> impl Iterator<Item = G2Projective> + '_ {
        let n = u64::from(max_cred_num);
        let mut power = Scalar::one();
        (1..=2 * n).map(move |k| {
            power *= self.gamma;
            match k == n + 1 {
                true => G2Projective::identity(),
                false => G2Projective::generator() * power,
            }
        })
    }
}

pub struct SecretTails<'a> {
    secret: &'a AccumulatorSecret,
    max_cred_num: u32,
}

impl TailsReader for SecretTails<'_> {
    fn tail(&mut self, position: u32) -> Result<G2Projective> {
        let n = u64::from(self.max_cred_num);
        let k = u64::from(position);
        match k {
            0 => Err(Error::invalid("tails positions start at 1")),
            k if k > 2 * n => Err(Error::invalid(format!("no tail at position {position}"))),
            k if k == n + 1 => Ok(G2Projective::identity()),
            k => Ok(G2Projective::generator() * pow(self.secret.gamma, k)),
        }
    }
}

fn check_index(index: u32, max_cred_num: u32) -> Result<()> {
    match index < max_cred_num {
        true => Ok(()),
        false => Err(Error::IndexOutOfRange {
            index,
            max: max_cred_num,
        }),
    }
}

// Position of the tail added to the accumulator for a member index.
fn accumulator_tail(index: u32, max_cred_num: u32) -> u32 {
    max_cred_num - index
}

// Position of the tail a member contributes to the witness of `holder`.
fn witness_tail(member: u32, holder: u32, max_cred_num: u32) -> u32 {
    max_cred_num - member + holder + 1
}

/// Accumulate the given member indices from scratch.
pub fn accumulate(
    tails: &mut impl TailsReader,
    max_cred_num: u32,
    members: impl IntoIterator<Item = u32>,
) -> Result<G2Projective> {
    update_accumulator(
        G2Projective::identity(),
        tails,
        max_cred_num,
        members,
        std::iter::empty(),
    )
}

pub fn update_accumulator(
    accum: G2Projective,
    tails: &mut impl TailsReader,
    max_cred_num: u32,
    added: impl IntoIterator<Item = u32>,
    removed: impl IntoIterator<Item = u32>,
) -> Result<G2Projective> {
    let mut accum = accum;
    for index in added {
        check_index(index, max_cred_num)?;
        accum += tails.tail(accumulator_tail(index, max_cred_num))?;
    }
    for index in removed {
        check_index(index, max_cred_num)?;
        accum -= tails.tail(accumulator_tail(index, max_cred_num))?;
    }
    Ok(accum)
}

/// Compute the witness for `holder` against the given member set from scratch.
pub fn witness(
    tails: &mut impl TailsReader,
    max_cred_num: u32,
    holder: u32,
    members: impl IntoIterator<Item = u32>,
) -> Result<G2Projective> {
    update_witness(
        G2Projective::identity(),
        tails,
        max_cred_num,
        holder,
        members,
        std::iter::empty(),
    )
}

/// Apply membership changes to an existing witness. Changes to the holder's own index do not
/// contribute to its witness and are skipped.
pub fn update_witness(
    witness: G2Projective,
    tails: &mut impl TailsReader,
    max_cred_num: u32,
    holder: u32,
    added: impl IntoIterator<Item = u32>,
    removed: impl IntoIterator<Item = u32>,
) -> Result<G2Projective> {
    check_index(holder, max_cred_num)?;
    let mut witness = witness;
    for index in added.into_iter().filter(|i| *i != holder) {
        check_index(index, max_cred_num)?;
        witness += tails.tail(witness_tail(index, holder, max_cred_num))?;
    }
    for index in removed.into_iter().filter(|i| *i != holder) {
        check_index(index, max_cred_num)?;
        witness -= tails.tail(witness_tail(index, holder, max_cred_num))?;
    }
    Ok(witness)
}

/// Check `e(g_j, acc) - e(P1, w_j) = e(z, P2)`.
pub fn verify_membership(
    z: G1Projective,
    index_element: G1Projective,
    accum: G2Projective,
    witness: G2Projective,
) -> bool {
    let lhs = pairing(&G1Affine::from(index_element), &G2Affine::from(accum))
        - pairing(&G1Affine::generator(), &G2Affine::from(witness));
    lhs == pairing(&G1Affine::from(z), &G2Affine::generator())
}
