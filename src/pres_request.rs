use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    nonce::Nonce,
    restrictions::Query,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationRequest {
    pub nonce: Nonce,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, AttributeInfo>,
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, PredicateInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

/// A requested attribute, or a group of attributes that must come from the same credential.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

impl AttributeInfo {
    /// Requested attribute names, whether given singly or as a group.
    pub fn names(&self) -> Result<Vec<String>> {
        match (&self.name, &self.names) {
            (Some(name), None) => Ok(vec![name.clone()]),
            (None, Some(names)) if !names.is_empty() => Ok(names.clone()),
            _ => Err(Error::invalid(
                "attribute info must have exactly one of name and a non-empty names",
            )),
        }
    }

    pub fn has_restrictions(&self) -> bool {
        self.restrictions.as_ref().is_some_and(|q| !q.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateInfo {
    pub name: String,
    pub p_type: PredicateType,
    pub p_value: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateType {
    #[serde(rename = ">=")]
    GE,
    #[serde(rename = "<=")]
    LE,
    #[serde(rename = ">")]
    GT,
    #[serde(rename = "<")]
    LT,
}

impl fmt::Display for PredicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PredicateType::GE => ">=",
            PredicateType::LE => "<=",
            PredicateType::GT => ">",
            PredicateType::LT => "<",
        })
    }
}

/// Time range over which a credential must not have been revoked. Missing bounds are open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonRevokedInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u64>,
}

impl NonRevokedInterval {
    pub fn new(from: Option<u64>, to: Option<u64>) -> Self {
        Self { from, to }
    }

    /// Narrow to the intersection with `other`: the latest `from` and the earliest `to`.
    pub fn compare_and_set(&mut self, other: &NonRevokedInterval) {
        self.from = match (self.from, other.from) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.to = match (self.to, other.to) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    pub fn is_valid(&self, timestamp: u64) -> bool {
        self.from.map_or(true, |from| from <= timestamp)
            && self.to.map_or(true, |to| timestamp <= to)
    }

    /// Replace `from` with a verifier supplied earlier time, keyed by the requested `from`.
    pub fn update_with_override(&mut self, overrides: &HashMap<u64, u64>) {
        if let Some(from) = self.from {
            if let Some(override_from) = overrides.get(&from) {
                if *override_from < from {
                    self.from = Some(*override_from);
                }
            }
        }
    }
}

impl PresentationRequest {
    pub(crate) fn validate(&self) -> Result<()> {
        for (referent, info) in self.requested_attributes.iter() {
            info.names()
                .map_err(|e| Error::invalid(format!("requested attribute {referent}: {e}")))?;
        }
        if let Some(referent) = self
            .requested_attributes
            .keys()
            .find(|r| self.requested_predicates.contains_key(*r))
        {
            return Err(Error::invalid(format!(
                "referent {referent} is both an attribute and a predicate"
            )));
        }
        Ok(())
    }

    /// The most stringent of the local intervals, or the request-wide interval when no referent
    /// sets its own.
    pub(crate) fn interval_for<'a>(
        &self,
        local: impl IntoIterator<Item = &'a Option<NonRevokedInterval>>,
    ) -> Option<NonRevokedInterval> {
        let mut interval: Option<NonRevokedInterval> = None;
        for local in local.into_iter().flatten() {
            match interval.as_mut() {
                Some(interval) => interval.compare_and_set(local),
                None => interval = Some(*local),
            }
        }
        interval.or(self.non_revoked)
    }
}
