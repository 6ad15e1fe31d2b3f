use bls12_381::G2Projective;
use serde::{Deserialize, Serialize};

use crate::{
    accumulator,
    encoding::base58,
    error::{Error, Result},
    rev_reg::{RevocationRegistryDefinition, RevocationStatusList},
    tails::{TailsFileReader, TailsReader},
};

/// Witness of a holder's registry index against the accumulator of one status list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationState {
    #[serde(with = "base58")]
    pub witness: G2Projective,
    #[serde(with = "base58")]
    pub accum: G2Projective,
    pub timestamp: u64,
}

/// Compute the revocation state of `registry_index` against `status_list`.
///
/// With a previous state and the status list it was computed against, only the membership changes
/// between the two lists are applied. Otherwise the witness is computed from the tails file at
/// `tails_path`, after checking it against the registry's tails hash.
pub fn create_or_update_revocation_state(
    rev_reg_def: &RevocationRegistryDefinition,
    status_list: &RevocationStatusList,
    registry_index: u32,
    tails_path: &str,
    previous_state: Option<&RevocationState>,
    previous_list: Option<&RevocationStatusList>,
) -> Result<RevocationState> {
    let mut tails = TailsFileReader::new(tails_path);
    match (previous_state, previous_list) {
        (None, None) => tails.verify_hash(&rev_reg_def.value.tails_hash)?,
        (Some(_), Some(_)) => {}
        _ => {
            return Err(Error::invalid(
                "previous revocation state and status list must be given together",
            ))
        }
    }
    revocation_state_with_tails(
        rev_reg_def,
        status_list,
        registry_index,
        &mut tails,
        previous_state.zip(previous_list),
    )
}

/// Like [create_or_update_revocation_state], reading tails from the given source.
pub fn revocation_state_with_tails(
    rev_reg_def: &RevocationRegistryDefinition,
    status_list: &RevocationStatusList,
    registry_index: u32,
    tails: &mut impl TailsReader,
    previous: Option<(&RevocationState, &RevocationStatusList)>,
) -> Result<RevocationState> {
    tracing::trace!(registry_index, timestamp = status_list.timestamp, "revocation_state");
    rev_reg_def.check_index(registry_index)?;
    status_list.check_registry(rev_reg_def)?;
    let max_cred_num = rev_reg_def.max_cred_num();
    if status_list.is_revoked(registry_index) == Some(true) {
        tracing::debug!(registry_index, "registry index is revoked in the status list");
    }

    let witness = match previous {
        None => {
            tracing::debug!(registry_index, "computing witness from tails");
            accumulator::witness(tails, max_cred_num, registry_index, status_list.members())?
        }
        Some((state, list)) => {
            list.check_registry(rev_reg_def)?;
            if state.accum != list.current_accumulator {
                return Err(Error::invalid(
                    "previous revocation state was not computed against the previous list",
                ));
            }
            if list.timestamp > status_list.timestamp {
                return Err(Error::invalid(
                    "previous status list is newer than the current one",
                ));
            }
            let changes = list
                .revocation_list
                .iter()
                .zip(status_list.revocation_list.iter())
                .enumerate()
                .filter(|(_, (before, after))| before != after)
                .map(|(i, (_, after))| (i as u32, *after))
                .collect::<Vec<_>>();
            tracing::debug!(
                registry_index,
                changes = changes.len(),
                "updating witness incrementally"
            );
            let added = changes.iter().filter(|(_, revoked)| !revoked).map(|(i, _)| *i);
            let removed = changes.iter().filter(|(_, revoked)| *revoked).map(|(i, _)| *i);
            accumulator::update_witness(
                state.witness,
                tails,
                max_cred_num,
                registry_index,
                added,
                removed,
            )?
        }
    };

    Ok(RevocationState {
        witness,
        accum: status_list.current_accumulator,
        timestamp: status_list.timestamp,
    })
}
