//! Resource identity resolution.
//!
//! Every addressable resource has a canonical identity: one field (`id` or
//! `name`) or, for endpoints, the ordered pair `technology` + `resource`.
//! [`instance_key`] renders it, together with the kind, to the string used
//! as a registry key.

use std::fmt;

use ari_protocol::{ResourceKind, UnknownResourceKind};
use percent_encoding::utf8_percent_encode;
use serde_json::Value;

use crate::config::COMPONENT;

/// Separator between the parts of a composite identity key.
const COMPOSITE_SEPARATOR: &str = "/";

/// One named part of a composite identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityPart {
    pub name: String,
    pub value: String,
}

/// Canonical identity of a resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Simple(String),
    Composite(Vec<IdentityPart>),
}

impl Identity {
    /// Deterministic string form used for registry-key equality.
    ///
    /// Composite parts are percent-encoded before joining, so a separator
    /// inside a value cannot make two identities collide.
    pub fn key(&self) -> String {
        match self {
            Identity::Simple(id) => id.clone(),
            Identity::Composite(parts) => parts
                .iter()
                .map(|p| utf8_percent_encode(&p.value, COMPONENT).to_string())
                .collect::<Vec<_>>()
                .join(COMPOSITE_SEPARATOR),
        }
    }

    /// Value of a named part.  A simple identity has no named parts.
    pub fn part(&self, name: &str) -> Option<&str> {
        match self {
            Identity::Simple(_) => None,
            Identity::Composite(parts) => parts
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.value.as_str()),
        }
    }

    /// The values in declaration order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Identity::Simple(id) => vec![id.as_str()],
            Identity::Composite(parts) => parts.iter().map(|p| p.value.as_str()).collect(),
        }
    }
}

/// Plain rendering (`abc`, `PJSIP/100`); not unique for composites.
impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.values().join(COMPOSITE_SEPARATOR))
    }
}

/// Registry key of one instance: kind and identity key (`Channel:abc`).
pub fn instance_key(kind: ResourceKind, identity: &Identity) -> String {
    format!("{}:{}", kind.as_str(), identity.key())
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error(transparent)]
    UnknownType(#[from] UnknownResourceKind),
    #[error("{0} resources have no identity")]
    NotAddressable(ResourceKind),
    #[error("{kind} payload has no usable `{field}` field")]
    MissingField { kind: ResourceKind, field: &'static str },
    #[error("{kind} identity needs {expected} part(s), got {got}")]
    PartCount {
        kind: ResourceKind,
        expected: usize,
        got: usize,
    },
}

/// Resolve the identity of a payload declared with data type `type_name`.
pub fn resolve(type_name: &str, payload: &Value) -> Result<(ResourceKind, Identity), IdentityError> {
    let kind: ResourceKind = type_name.parse()?;
    let identity = resolve_kind(kind, payload)?;
    Ok((kind, identity))
}

/// Resolve the identity of a payload of a known kind.
///
/// Fails when any identity field is absent, `null`, or not a scalar.
pub fn resolve_kind(kind: ResourceKind, payload: &Value) -> Result<Identity, IdentityError> {
    let fields = kind.identity_fields();
    let values = fields
        .iter()
        .map(|field| {
            payload
                .get(*field)
                .and_then(scalar)
                .ok_or(IdentityError::MissingField {
                    kind,
                    field: *field,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    from_values(kind, values)
}

/// Build an identity from caller-supplied values, in
/// [`identity_fields`](ResourceKind::identity_fields) order.
pub fn from_values(kind: ResourceKind, values: Vec<String>) -> Result<Identity, IdentityError> {
    let fields = kind.identity_fields();
    if fields.is_empty() {
        return Err(IdentityError::NotAddressable(kind));
    }
    if fields.len() != values.len() {
        return Err(IdentityError::PartCount {
            kind,
            expected: fields.len(),
            got: values.len(),
        });
    }

    if let [value] = values.as_slice() {
        return Ok(Identity::Simple(value.clone()));
    }

    Ok(Identity::Composite(
        fields
            .iter()
            .zip(values)
            .map(|(name, value)| IdentityPart {
                name: (*name).to_string(),
                value,
            })
            .collect(),
    ))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
