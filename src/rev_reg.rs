//! Revocation registry definitions and status lists.
//!
//! A registry of capacity `N` tracks indices `0..N`. The status list records which indices are
//! revoked, which have been allocated to a credential, and the accumulator over the unrevoked
//! indices as of its timestamp.

use std::{collections::BTreeSet, str::FromStr};

use bls12_381::{G1Projective, G2Projective};
use group::Group;
use serde::{Deserialize, Serialize};

use crate::{
    accumulator::{self, AccumulatorSecret},
    cred_def::CredentialDefinition,
    encoding::{base58, bit_list},
    error::{Error, Result},
    identifiers::{CredentialDefinitionId, IssuerId, RevocationRegistryDefinitionId},
    tails::{TailsFileReader, TailsReader, TailsWriter},
};

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryType {
    #[default]
    CL_ACCUM,
}

impl FromStr for RegistryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CL_ACCUM" => Ok(RegistryType::CL_ACCUM),
            other => Err(Error::invalid(format!(
                "unsupported revocation registry type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorKey {
    #[serde(with = "base58")]
    pub z: G1Projective,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRegistryPublicKeys {
    pub accum_key: AccumulatorKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRegistryDefinitionValue {
    pub max_cred_num: u32,
    pub public_keys: RevocationRegistryPublicKeys,
    pub tails_location: String,
    pub tails_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRegistryDefinition {
    pub issuer_id: IssuerId,
    pub revoc_def_type: RegistryType,
    pub tag: String,
    pub cred_def_id: CredentialDefinitionId,
    pub value: RevocationRegistryDefinitionValue,
}

impl RevocationRegistryDefinition {
    pub fn id(&self) -> Result<RevocationRegistryDefinitionId> {
        RevocationRegistryDefinitionId::derive(&self.issuer_id, &self.cred_def_id, &self.tag)
    }

    pub fn max_cred_num(&self) -> u32 {
        self.value.max_cred_num
    }

    pub(crate) fn check_index(&self, index: u32) -> Result<()> {
        match index < self.value.max_cred_num {
            true => Ok(()),
            false => Err(Error::IndexOutOfRange {
                index,
                max: self.value.max_cred_num,
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevocationRegistryDefinitionPrivate {
    pub value: AccumulatorSecret,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationStatusList {
    pub rev_reg_def_id: RevocationRegistryDefinitionId,
    pub issuer_id: IssuerId,
    /// `true` where the index is revoked.
    #[serde(with = "bit_list")]
    pub revocation_list: Vec<bool>,
    /// `true` where the index has been assigned to a credential.
    #[serde(with = "bit_list")]
    pub allocation_list: Vec<bool>,
    #[serde(with = "base58")]
    pub current_accumulator: G2Projective,
    pub timestamp: u64,
}

impl RevocationStatusList {
    pub fn is_revoked(&self, index: u32) -> Option<bool> {
        self.revocation_list.get(index as usize).copied()
    }

    pub fn is_allocated(&self, index: u32) -> Option<bool> {
        self.allocation_list.get(index as usize).copied()
    }

    /// Unrevoked indices.
    pub fn members(&self) -> impl Iterator<Item = u32> + '_ {
        self.revocation_list
            .iter()
            .enumerate()
            .filter(|(_, revoked)| !**revoked)
            .map(|(i, _)| i as u32)
    }

    pub(crate) fn check_registry(&self, rev_reg_def: &RevocationRegistryDefinition) -> Result<()> {
        if self.rev_reg_def_id != rev_reg_def.id()? {
            return Err(Error::invalid(format!(
                "status list belongs to registry {}",
                self.rev_reg_def_id
            )));
        }
        let len = rev_reg_def.max_cred_num() as usize;
        if self.revocation_list.len() != len || self.allocation_list.len() != len {
            return Err(Error::invalid(
                "status list length does not match the registry capacity",
            ));
        }
        Ok(())
    }

    /// Assign an index to a new credential and mark it issued, using `tails` to update the
    /// accumulator. Without an explicit index the lowest unallocated one is used.
    pub(crate) fn allocate(
        &mut self,
        index: Option<u32>,
        max_cred_num: u32,
        tails: &mut impl TailsReader,
    ) -> Result<u32> {
        let index = match index {
            Some(index) => {
                if index >= max_cred_num {
                    return Err(Error::IndexOutOfRange {
                        index,
                        max: max_cred_num,
                    });
                }
                if self.allocation_list[index as usize] {
                    return Err(Error::invalid(format!(
                        "registry index {index} is already allocated"
                    )));
                }
                index
            }
            None => self
                .allocation_list
                .iter()
                .position(|allocated| !allocated)
                .map(|i| i as u32)
                .ok_or(Error::RegistryFull)?,
        };
        self.allocation_list[index as usize] = true;
        if self.revocation_list[index as usize] {
            self.revocation_list[index as usize] = false;
            self.current_accumulator = accumulator::update_accumulator(
                self.current_accumulator,
                tails,
                max_cred_num,
                [index],
                std::iter::empty(),
            )?;
        }
        Ok(index)
    }
}

/// Changes between two status lists of the same registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationStatusListDelta {
    pub rev_reg_def_id: RevocationRegistryDefinitionId,
    pub from_timestamp: u64,
    pub to_timestamp: u64,
    pub issued: BTreeSet<u32>,
    pub revoked: BTreeSet<u32>,
    #[serde(with = "base58")]
    pub accum_from: G2Projective,
    #[serde(with = "base58")]
    pub accum_to: G2Projective,
}

pub(crate) fn now() -> Result<u64> {
    u64::try_from(chrono::Utc::now().timestamp())
        .map_err(|_| Error::invalid("system clock is before the unix epoch"))
}

pub fn create_revocation_registry_def<W: TailsWriter + ?Sized>(
    cred_def: &CredentialDefinition,
    issuer_id: IssuerId,
    tag: &str,
    rev_reg_type: &str,
    max_cred_num: u32,
    tails_writer: &mut W,
) -> Result<(
    RevocationRegistryDefinition,
    RevocationRegistryDefinitionPrivate,
)> {
    tracing::trace!(%issuer_id, tag, rev_reg_type, max_cred_num, "create_revocation_registry_def");
    let revoc_def_type = rev_reg_type.parse::<RegistryType>()?;
    if max_cred_num == 0 {
        return Err(Error::invalid("registry capacity must be positive"));
    }
    if !cred_def.supports_revocation() {
        return Err(Error::invalid(
            "credential definition does not support revocation",
        ));
    }
    if tag.is_empty() {
        return Err(Error::invalid("revocation registry tag is empty"));
    }
    let cred_def_id = cred_def.id()?;

    let secret = AccumulatorSecret::gen(&mut rand::thread_rng());
    let (tails_location, tails_hash) = tails_writer.write(&mut secret.tails(max_cred_num))?;
    let rev_reg_def = RevocationRegistryDefinition {
        issuer_id,
        revoc_def_type,
        tag: tag.to_owned(),
        cred_def_id,
        value: RevocationRegistryDefinitionValue {
            max_cred_num,
            public_keys: RevocationRegistryPublicKeys {
                accum_key: AccumulatorKey {
                    z: secret.public_key(max_cred_num),
                },
            },
            tails_location,
            tails_hash,
        },
    };
    tracing::debug!(
        rev_reg_def_id = %rev_reg_def.id()?,
        max_cred_num,
        "created revocation registry"
    );
    Ok((
        rev_reg_def,
        RevocationRegistryDefinitionPrivate { value: secret },
    ))
}

pub fn create_revocation_status_list(
    rev_reg_def_id: &RevocationRegistryDefinitionId,
    rev_reg_def: &RevocationRegistryDefinition,
    issuer_id: IssuerId,
    timestamp: Option<u64>,
    issuance_by_default: bool,
) -> Result<RevocationStatusList> {
    tracing::trace!(
        %rev_reg_def_id,
        ?timestamp,
        issuance_by_default,
        "create_revocation_status_list"
    );
    if *rev_reg_def_id != rev_reg_def.id()? {
        return Err(Error::invalid(format!(
            "{rev_reg_def_id} does not identify the given registry definition"
        )));
    }
    let max_cred_num = rev_reg_def.max_cred_num();
    let current_accumulator = match issuance_by_default {
        true => {
            let mut tails = TailsFileReader::new(&rev_reg_def.value.tails_location);
            accumulator::accumulate(&mut tails, max_cred_num, 0..max_cred_num)?
        }
        false => G2Projective::identity(),
    };
    Ok(RevocationStatusList {
        rev_reg_def_id: rev_reg_def_id.clone(),
        issuer_id,
        revocation_list: vec![!issuance_by_default; max_cred_num as usize],
        allocation_list: vec![false; max_cred_num as usize],
        current_accumulator,
        timestamp: match timestamp {
            Some(timestamp) => timestamp,
            None => now()?,
        },
    })
}

fn check_timestamp(current: &RevocationStatusList, timestamp: Option<u64>) -> Result<u64> {
    match timestamp {
        Some(timestamp) if timestamp < current.timestamp => Err(Error::invalid(format!(
            "timestamp {timestamp} is older than the current list at {}",
            current.timestamp
        ))),
        Some(timestamp) => Ok(timestamp),
        None => Ok(current.timestamp),
    }
}

/// Issue and revoke indices, advancing the accumulator through the registry's tails file.
pub fn update_revocation_status_list(
    issued: Option<&BTreeSet<u32>>,
    revoked: Option<&BTreeSet<u32>>,
    timestamp: Option<u64>,
    rev_reg_def: &RevocationRegistryDefinition,
    current_list: &RevocationStatusList,
) -> Result<(RevocationStatusList, RevocationStatusListDelta)> {
    let mut tails = TailsFileReader::new(&rev_reg_def.value.tails_location);
    update_revocation_status_list_with_tails(
        issued,
        revoked,
        timestamp,
        rev_reg_def,
        current_list,
        &mut tails,
    )
}

/// Like [update_revocation_status_list], reading tails from the given source.
pub fn update_revocation_status_list_with_tails(
    issued: Option<&BTreeSet<u32>>,
    revoked: Option<&BTreeSet<u32>>,
    timestamp: Option<u64>,
    rev_reg_def: &RevocationRegistryDefinition,
    current_list: &RevocationStatusList,
    tails: &mut impl TailsReader,
) -> Result<(RevocationStatusList, RevocationStatusListDelta)> {
    tracing::trace!(?issued, ?revoked, ?timestamp, "update_revocation_status_list");
    let empty = BTreeSet::new();
    let issued = issued.unwrap_or(&empty);
    let revoked = revoked.unwrap_or(&empty);
    if let Some(index) = issued.intersection(revoked).next() {
        return Err(Error::invalid(format!(
            "registry index {index} is both issued and revoked"
        )));
    }
    for index in issued.iter().chain(revoked) {
        rev_reg_def.check_index(*index)?;
    }
    current_list.check_registry(rev_reg_def)?;
    let timestamp = check_timestamp(current_list, timestamp)?;

    let mut list = current_list.clone();
    let mut delta_issued = BTreeSet::new();
    let mut delta_revoked = BTreeSet::new();
    for index in issued {
        let i = *index as usize;
        list.allocation_list[i] = true;
        if list.revocation_list[i] {
            list.revocation_list[i] = false;
            delta_issued.insert(*index);
        }
    }
    for index in revoked {
        let i = *index as usize;
        if !list.revocation_list[i] {
            list.revocation_list[i] = true;
            delta_revoked.insert(*index);
        }
    }
    list.current_accumulator = accumulator::update_accumulator(
        current_list.current_accumulator,
        tails,
        rev_reg_def.max_cred_num(),
        delta_issued.iter().copied(),
        delta_revoked.iter().copied(),
    )?;
    list.timestamp = timestamp;
    tracing::debug!(
        issued = delta_issued.len(),
        revoked = delta_revoked.len(),
        timestamp,
        "updated revocation status list"
    );

    let delta = RevocationStatusListDelta {
        rev_reg_def_id: list.rev_reg_def_id.clone(),
        from_timestamp: current_list.timestamp,
        to_timestamp: timestamp,
        issued: delta_issued,
        revoked: delta_revoked,
        accum_from: current_list.current_accumulator,
        accum_to: list.current_accumulator,
    };
    Ok((list, delta))
}

pub fn update_revocation_status_list_timestamp_only(
    timestamp: u64,
    current_list: &RevocationStatusList,
) -> Result<RevocationStatusList> {
    let timestamp = check_timestamp(current_list, Some(timestamp))?;
    Ok(RevocationStatusList {
        timestamp,
        ..current_list.clone()
    })
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use super::{
        create_revocation_registry_def, create_revocation_status_list,
        update_revocation_status_list, update_revocation_status_list_timestamp_only,
        RevocationRegistryDefinition, RevocationRegistryDefinitionPrivate, RevocationStatusList,
    };
    use crate::{
        accumulator,
        cred_def::{create_credential_definition, CredentialDefinitionConfig},
        encoding::Json,
        error::ErrorKind,
        identifiers::IssuerId,
        schema::create_schema,
        tails::{TailsFileReader, TailsFileWriter},
    };

    const N: u32 = 6;

    fn registry(
        dir: &tempfile::TempDir,
    ) -> (RevocationRegistryDefinition, RevocationRegistryDefinitionPrivate) {
        let issuer = IssuerId::new("did:web:xyz").unwrap();
        let schema = create_schema("s", "1.0", issuer.clone(), &["name"]).unwrap();
        let (cred_def, _, _) = create_credential_definition(
            &schema,
            issuer.clone(),
            "default",
            "BBS",
            CredentialDefinitionConfig::new(true),
        )
        .unwrap();
        let mut writer = TailsFileWriter::new(Some(dir.path().to_path_buf()));
        create_revocation_registry_def(&cred_def, issuer, "reg", "CL_ACCUM", N, &mut writer)
            .unwrap()
    }

    fn status_list(def: &RevocationRegistryDefinition, by_default: bool) -> RevocationStatusList {
        create_revocation_status_list(
            &def.id().unwrap(),
            def,
            def.issuer_id.clone(),
            Some(10),
            by_default,
        )
        .unwrap()
    }

    fn set(indices: &[u32]) -> BTreeSet<u32> {
        indices.iter().copied().collect()
    }

    #[test]
    fn registry_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = IssuerId::new("did:web:xyz").unwrap();
        let schema = create_schema("s", "1.0", issuer.clone(), &["name"]).unwrap();
        let mut writer = TailsFileWriter::new(Some(dir.path().to_path_buf()));
        let (with_rev, _, _) = create_credential_definition(
            &schema,
            issuer.clone(),
            "a",
            "BBS",
            CredentialDefinitionConfig::new(true),
        )
        .unwrap();
        let (without_rev, _, _) = create_credential_definition(
            &schema,
            issuer.clone(),
            "b",
            "BBS",
            CredentialDefinitionConfig::new(false),
        )
        .unwrap();

        for (cred_def, reg_type, max) in [
            (&with_rev, "CL_ACCUM", 0),
            (&with_rev, "ACCUM", 5),
            (&without_rev, "CL_ACCUM", 5),
        ] {
            let err = create_revocation_registry_def(
                cred_def,
                issuer.clone(),
                "reg",
                reg_type,
                max,
                &mut writer,
            )
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn initial_lists() {
        let dir = tempfile::tempdir().unwrap();
        let (def, private) = registry(&dir);
        let mut tails = TailsFileReader::new(&def.value.tails_location);
        tails.verify_hash(&def.value.tails_hash).unwrap();

        let issued = status_list(&def, true);
        assert_eq!(issued.members().count(), N as usize);
        assert_eq!(
            issued.current_accumulator,
            accumulator::accumulate(&mut private.value.tails_reader(N), N, 0..N).unwrap()
        );
        let revoked = status_list(&def, false);
        assert_eq!(revoked.members().count(), 0);
        assert!(revoked.allocation_list.iter().all(|a| !a));

        let parsed = RevocationStatusList::from_json(&issued.to_json().unwrap()).unwrap();
        assert_eq!(parsed, issued);
        let parsed = RevocationRegistryDefinition::from_json(&def.to_json().unwrap()).unwrap();
        assert_eq!(parsed, def);
    }

    #[test]
    fn update_records_only_changes() {
        let dir = tempfile::tempdir().unwrap();
        let (def, private) = registry(&dir);
        let list = status_list(&def, false);

        let (list, delta) =
            update_revocation_status_list(Some(&set(&[0, 1, 2])), None, Some(11), &def, &list)
                .unwrap();
        assert_eq!(delta.issued, set(&[0, 1, 2]));
        assert!(list.is_allocated(1).unwrap());

        let (list, delta) = update_revocation_status_list(
            Some(&set(&[2, 3])),
            Some(&set(&[1, 5])),
            None,
            &def,
            &list,
        )
        .unwrap();
        assert_eq!(delta.issued, set(&[3]));
        assert_eq!(delta.revoked, set(&[1]));
        assert_eq!(delta.from_timestamp, 11);
        assert_eq!(list.timestamp, 11);
        assert_eq!(
            list.current_accumulator,
            accumulator::accumulate(&mut private.value.tails_reader(N), N, [0, 2, 3]).unwrap()
        );
        assert_eq!(delta.accum_to, list.current_accumulator);
    }

    #[test]
    fn update_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let (def, _) = registry(&dir);
        let list = status_list(&def, true);

        let err =
            update_revocation_status_list(Some(&set(&[1, 2])), Some(&set(&[2])), None, &def, &list)
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = update_revocation_status_list(None, Some(&set(&[N])), None, &def, &list)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);

        let err = update_revocation_status_list(None, Some(&set(&[1])), Some(9), &def, &list)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = update_revocation_status_list_timestamp_only(9, &list).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let later = update_revocation_status_list_timestamp_only(20, &list).unwrap();
        assert_eq!(later.timestamp, 20);
        assert_eq!(later.revocation_list, list.revocation_list);
    }

    #[test]
    fn allocation_fills_registry() {
        let dir = tempfile::tempdir().unwrap();
        let (def, private) = registry(&dir);
        let mut list = status_list(&def, false);
        let mut tails = private.value.tails_reader(N);

        assert_eq!(list.allocate(Some(3), N, &mut tails).unwrap(), 3);
        let err = list.allocate(Some(3), N, &mut tails).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = list.allocate(Some(N), N, &mut tails).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);

        let allocated = (0..N - 1)
            .map(|_| list.allocate(None, N, &mut tails).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(allocated, vec![0, 1, 2, 4, 5]);
        let err = list.allocate(None, N, &mut tails).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RegistryFull);
        assert_eq!(
            list.current_accumulator,
            accumulator::accumulate(&mut tails, N, 0..N).unwrap()
        );
    }
}
