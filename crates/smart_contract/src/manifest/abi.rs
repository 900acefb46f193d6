//! Contract ABI: methods, events, parameters.

use serde::{Deserialize, Serialize};

/// The declared type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractParameterType {
    /// Anything.
    Any,
    /// A boolean.
    Boolean,
    /// An integer.
    Integer,
    /// A byte array.
    ByteArray,
    /// A UTF-8 string.
    String,
    /// A 160-bit hash.
    Hash160,
    /// A 256-bit hash.
    Hash256,
    /// A public key.
    PublicKey,
    /// A signature.
    Signature,
    /// An array.
    Array,
    /// A map.
    Map,
    /// An interop interface.
    InteropInterface,
    /// No value.
    Void,
}

/// A named, typed parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractParameterDefinition {
    /// The parameter name.
    pub name: String,
    /// The parameter type.
    #[serde(rename = "type")]
    pub parameter_type: ContractParameterType,
}

/// A callable method of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMethodDescriptor {
    /// The method name.
    pub name: String,
    /// The parameters, in call order.
    pub parameters: Vec<ContractParameterDefinition>,
    /// The return type.
    pub return_type: ContractParameterType,
    /// Entry offset into the NEF script.
    pub offset: u32,
    /// Safe methods are callable without side effects or witnesses.
    pub safe: bool,
}

/// An event a contract may emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEventDescriptor {
    /// The event name.
    pub name: String,
    /// The event parameters.
    pub parameters: Vec<ContractParameterDefinition>,
}

/// The ABI: methods and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractAbi {
    /// The callable methods.
    pub methods: Vec<ContractMethodDescriptor>,
    /// The declared events.
    pub events: Vec<ContractEventDescriptor>,
}

impl ContractAbi {
    /// Finds a method by name and parameter count.
    pub fn get_method(&self, name: &str, parameter_count: usize) -> Option<&ContractMethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameters.len() == parameter_count)
    }

    /// Finds a method by name alone, any arity.
    pub fn get_method_any_arity(&self, name: &str) -> Option<&ContractMethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_lookup_by_arity() {
        let abi = ContractAbi {
            methods: vec![
                ContractMethodDescriptor {
                    name: "transfer".into(),
                    parameters: vec![],
                    return_type: ContractParameterType::Boolean,
                    offset: 0,
                    safe: false,
                },
                ContractMethodDescriptor {
                    name: "transfer".into(),
                    parameters: vec![ContractParameterDefinition {
                        name: "to".into(),
                        parameter_type: ContractParameterType::Hash160,
                    }],
                    return_type: ContractParameterType::Boolean,
                    offset: 10,
                    safe: false,
                },
            ],
            events: vec![],
        };
        assert_eq!(abi.get_method("transfer", 1).unwrap().offset, 10);
        assert!(abi.get_method("transfer", 2).is_none());
        assert!(abi.get_method("mint", 0).is_none());
    }
}
