//! Manifest permissions: which contracts and methods a contract may call.

use neo_core::UInt160;
use neo_cryptography::ecc::ECPoint;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The target of a permission entry: anything, one contract hash, or any
/// contract of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDescriptor {
    /// Any contract.
    Wildcard,
    /// The contract with this hash.
    Hash(UInt160),
    /// Any contract carrying this group key.
    Group(ECPoint),
}

impl PermissionDescriptor {
    /// Whether this descriptor covers a contract with `hash` and `groups`.
    pub fn covers(&self, hash: &UInt160, groups: &[ECPoint]) -> bool {
        match self {
            PermissionDescriptor::Wildcard => true,
            PermissionDescriptor::Hash(allowed) => allowed == hash,
            PermissionDescriptor::Group(key) => groups.contains(key),
        }
    }
}

impl Serialize for PermissionDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PermissionDescriptor::Wildcard => serializer.serialize_str("*"),
            PermissionDescriptor::Hash(hash) => serializer.serialize_str(&hash.to_string()),
            PermissionDescriptor::Group(key) => serializer.serialize_str(&key.to_hex()),
        }
    }
}

impl<'de> Deserialize<'de> for PermissionDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text == "*" {
            return Ok(PermissionDescriptor::Wildcard);
        }
        if text.len() == 66 {
            let key = ECPoint::from_hex(&text).map_err(D::Error::custom)?;
            return Ok(PermissionDescriptor::Group(key));
        }
        let hash = UInt160::parse(&text).map_err(D::Error::custom)?;
        Ok(PermissionDescriptor::Hash(hash))
    }
}

/// Methods covered by a permission: all of them or a named list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WildcardMethods {
    /// Every method.
    Wildcard,
    /// Only the listed methods.
    List(Vec<String>),
}

impl WildcardMethods {
    /// Whether the entry covers `method`.
    pub fn covers(&self, method: &str) -> bool {
        match self {
            WildcardMethods::Wildcard => true,
            WildcardMethods::List(names) => names.iter().any(|n| n == method),
        }
    }
}

impl Serialize for WildcardMethods {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WildcardMethods::Wildcard => serializer.serialize_str("*"),
            WildcardMethods::List(names) => names.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for WildcardMethods {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(s) if s == "*" => Ok(WildcardMethods::Wildcard),
            serde_json::Value::Array(items) => {
                let names = items
                    .into_iter()
                    .map(|v| {
                        v.as_str()
                            .map(str::to_owned)
                            .ok_or_else(|| D::Error::custom("method name must be a string"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(WildcardMethods::List(names))
            }
            _ => Err(D::Error::custom("invalid methods wildcard")),
        }
    }
}

/// One permission entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPermission {
    /// The target descriptor.
    pub contract: PermissionDescriptor,
    /// The methods covered.
    pub methods: WildcardMethods,
}

impl ContractPermission {
    /// The default permission: call anything.
    pub fn default_wildcard() -> Self {
        Self {
            contract: PermissionDescriptor::Wildcard,
            methods: WildcardMethods::Wildcard,
        }
    }

    /// Whether this entry allows calling `method` on the target contract.
    pub fn is_allowed(&self, hash: &UInt160, groups: &[ECPoint], method: &str) -> bool {
        self.contract.covers(hash, groups) && self.methods.covers(method)
    }
}
