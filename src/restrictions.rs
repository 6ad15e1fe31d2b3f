//! Restriction queries on the credentials that may satisfy a referent.
//!
//! Queries are JSON objects in the wallet query language:
//!
//! ```text
//! {"schema_name": "employee"}                  tag equals value
//! {"issuer_id": {"$neq": "did:web:abc"}}       tag differs from value
//! {"cred_def_id": {"$in": ["...", "..."]}}     tag is one of the values
//! {"$and": [...]}, {"$or": [...]}, {"$not": {...}}
//! ```
//!
//! An object with several keys is the conjunction of each key, and an array of queries is their
//! disjunction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Query {
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
    Eq(String, String),
    Neq(String, String),
    In(String, Vec<String>),
}

/// Tag values of one credential that a [Query] is evaluated against.
#[derive(Clone, Debug, Default)]
pub struct RestrictionTags {
    tags: BTreeMap<String, String>,
}

impl RestrictionTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.tags.insert(tag.into(), value.into());
        self
    }

    /// Record a revealed attribute value, along with its marker tag.
    pub fn insert_attribute(&mut self, name: &str, raw: &str) -> &mut Self {
        let name = crate::attributes::canonical_attr_name(name);
        self.insert(format!("attr::{name}::value"), raw);
        self.insert(format!("attr::{name}::marker"), "1")
    }

    /// Record that the credential has an attribute, without its value.
    pub fn insert_marker(&mut self, name: &str) -> &mut Self {
        let name = crate::attributes::canonical_attr_name(name);
        self.insert(format!("attr::{name}::marker"), "1")
    }

    fn get(&self, tag: &str) -> Option<&str> {
        // Attribute tags are matched on canonical names.
        match tag
            .strip_prefix("attr::")
            .and_then(|rest| rest.rsplit_once("::"))
        {
            Some((name, kind)) => self
                .tags
                .get(&format!(
                    "attr::{}::{kind}",
                    crate::attributes::canonical_attr_name(name)
                ))
                .map(String::as_str),
            None => self.tags.get(tag).map(String::as_str),
        }
    }
}

impl Query {
    pub fn matches(&self, tags: &RestrictionTags) -> bool {
        match self {
            Query::And(queries) => queries.iter().all(|q| q.matches(tags)),
            Query::Or(queries) => queries.iter().any(|q| q.matches(tags)),
            Query::Not(query) => !query.matches(tags),
            Query::Eq(tag, value) => tags.get(tag) == Some(value.as_str()),
            Query::Neq(tag, value) => tags.get(tag) != Some(value.as_str()),
            Query::In(tag, values) => tags
                .get(tag)
                .is_some_and(|v| values.iter().any(|value| value == v)),
        }
    }

    /// True for a query that places no constraint at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Query::And(queries) => queries.iter().all(Query::is_empty),
            _ => false,
        }
    }
}

fn string(value: &Value, context: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::invalid(format!("{context}: expected a string")))
}

fn parse_list(value: Value, op: &str) -> Result<Vec<Query>> {
    match value {
        Value::Array(items) => items.into_iter().map(Query::try_from).collect(),
        _ => Err(Error::invalid(format!("{op}: expected an array"))),
    }
}

fn parse_tag(tag: String, value: Value) -> Result<Query> {
    match value {
        Value::String(v) => Ok(Query::Eq(tag, v)),
        Value::Object(map) if map.len() == 1 => {
            let Some((op, operand)) = map.into_iter().next() else {
                return Err(Error::invalid(format!("{tag}: empty operator")));
            };
            match op.as_str() {
                "$eq" => Ok(Query::Eq(tag, string(&operand, "$eq")?)),
                "$neq" => Ok(Query::Neq(tag, string(&operand, "$neq")?)),
                "$in" => match operand {
                    Value::Array(values) => Ok(Query::In(
                        tag,
                        values
                            .iter()
                            .map(|v| string(v, "$in"))
                            .collect::<Result<_>>()?,
                    )),
                    _ => Err(Error::invalid("$in: expected an array")),
                },
                other => Err(Error::invalid(format!("unsupported operator {other}"))),
            }
        }
        _ => Err(Error::invalid(format!("{tag}: unsupported value"))),
    }
}

impl TryFrom<Value> for Query {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Array(_) => Ok(Query::Or(parse_list(value, "restrictions")?)),
            Value::Object(map) => {
                let mut queries = map
                    .into_iter()
                    .map(|(key, value)| match key.as_str() {
                        "$and" => Ok(Query::And(parse_list(value, "$and")?)),
                        "$or" => Ok(Query::Or(parse_list(value, "$or")?)),
                        "$not" => Ok(Query::Not(Box::new(Query::try_from(value)?))),
                        _ => parse_tag(key, value),
                    })
                    .collect::<Result<Vec<_>>>()?;
                match queries.len() {
                    1 => Ok(queries.remove(0)),
                    _ => Ok(Query::And(queries)),
                }
            }
            _ => Err(Error::invalid("restriction must be an object or array")),
        }
    }
}

impl From<Query> for Value {
    fn from(query: Query) -> Value {
        let mut map = Map::new();
        match query {
            Query::And(queries) => {
                map.insert("$and".into(), queries.into_iter().map(Value::from).collect());
            }
            Query::Or(queries) => {
                map.insert("$or".into(), queries.into_iter().map(Value::from).collect());
            }
            Query::Not(query) => {
                map.insert("$not".into(), Value::from(*query));
            }
            Query::Eq(tag, value) => {
                map.insert(tag, Value::String(value));
            }
            Query::Neq(tag, value) => {
                map.insert(tag, serde_json::json!({ "$neq": value }));
            }
            Query::In(tag, values) => {
                map.insert(tag, serde_json::json!({ "$in": values }));
            }
        }
        Value::Object(map)
    }
}
