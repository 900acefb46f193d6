//! The system-call registry.
//!
//! Each interop is registered statically with its name-derived id, base
//! price, required call flags and handler. Dispatch cost is charged by
//! the engine before the handler runs.

pub mod contract_calls;
pub mod crypto;
pub mod iterator;
pub mod runtime;
pub mod storage;

use crate::application_engine::ApplicationEngine;
use crate::call_flags::CallFlags;
use crate::ContractResult;
use neo_cryptography::hash::sha256;
use std::collections::HashMap;

/// A system-call handler.
pub type InteropHandler = fn(&mut ApplicationEngine) -> ContractResult<()>;

/// A registered system call.
pub struct InteropDescriptor {
    /// The full dotted name.
    pub name: &'static str,
    /// The id scripts invoke: the first four bytes of the SHA-256 of the
    /// name, little-endian.
    pub hash: u32,
    /// Base price in datoshi, scaled by the exec-fee factor.
    pub price: i64,
    /// Flags the calling context must hold.
    pub required_flags: CallFlags,
    /// The implementation.
    pub handler: InteropHandler,
}

/// Derives the interop id of a dotted name.
pub fn interop_hash(name: &str) -> u32 {
    let digest = sha256(name.as_bytes());
    u32::from_le_bytes(digest[..4].try_into().expect("digest length"))
}

/// The price of one signature check, shared by CheckSig and the
/// per-key cost of CheckMultisig.
pub const CHECK_SIG_PRICE: i64 = 1 << 15;

macro_rules! descriptor {
    ($name:expr, $price:expr, $flags:expr, $handler:path) => {
        InteropDescriptor {
            name: $name,
            hash: interop_hash($name),
            price: $price,
            required_flags: $flags,
            handler: $handler,
        }
    };
}

lazy_static::lazy_static! {
    static ref REGISTRY: HashMap<u32, InteropDescriptor> = {
        let descriptors = vec![
            descriptor!("System.Runtime.Platform", 1 << 3, CallFlags::NONE, runtime::platform),
            descriptor!("System.Runtime.GetNetwork", 1 << 3, CallFlags::NONE, runtime::get_network),
            descriptor!("System.Runtime.GetTrigger", 1 << 3, CallFlags::NONE, runtime::get_trigger),
            descriptor!("System.Runtime.GetTime", 1 << 3, CallFlags::NONE, runtime::get_time),
            descriptor!("System.Runtime.GetScriptContainer", 1 << 3, CallFlags::NONE, runtime::get_script_container),
            descriptor!("System.Runtime.GetExecutingScriptHash", 1 << 4, CallFlags::NONE, runtime::get_executing_script_hash),
            descriptor!("System.Runtime.GetCallingScriptHash", 1 << 4, CallFlags::NONE, runtime::get_calling_script_hash),
            descriptor!("System.Runtime.GetEntryScriptHash", 1 << 4, CallFlags::NONE, runtime::get_entry_script_hash),
            descriptor!("System.Runtime.CheckWitness", 1 << 10, CallFlags::NONE, runtime::check_witness),
            descriptor!("System.Runtime.GasLeft", 1 << 4, CallFlags::NONE, runtime::gas_left),
            descriptor!("System.Runtime.Log", 1 << 15, CallFlags::ALLOW_NOTIFY, runtime::log),
            descriptor!("System.Runtime.Notify", 1 << 15, CallFlags::ALLOW_NOTIFY, runtime::notify),
            descriptor!("System.Runtime.GetNotifications", 1 << 12, CallFlags::NONE, runtime::get_notifications),
            descriptor!("System.Runtime.BurnGas", 1 << 4, CallFlags::NONE, runtime::burn_gas),

            descriptor!("System.Storage.GetContext", 1 << 4, CallFlags::READ_STATES, storage::get_context),
            descriptor!("System.Storage.GetReadOnlyContext", 1 << 4, CallFlags::READ_STATES, storage::get_read_only_context),
            descriptor!("System.Storage.AsReadOnly", 1 << 4, CallFlags::READ_STATES, storage::as_read_only),
            descriptor!("System.Storage.Get", 1 << 15, CallFlags::READ_STATES, storage::get),
            descriptor!("System.Storage.Find", 1 << 15, CallFlags::READ_STATES, storage::find),
            descriptor!("System.Storage.Put", 1 << 15, CallFlags::WRITE_STATES, storage::put),
            descriptor!("System.Storage.Delete", 1 << 15, CallFlags::WRITE_STATES, storage::delete),

            descriptor!("System.Iterator.Next", 1 << 15, CallFlags::NONE, iterator::next),
            descriptor!("System.Iterator.Value", 1 << 4, CallFlags::NONE, iterator::value),

            descriptor!("System.Contract.Call", 1 << 15, CallFlags::READ_STATES | CallFlags::ALLOW_CALL, contract_calls::call),
            descriptor!("System.Contract.CallNative", 0, CallFlags::NONE, contract_calls::call_native),
            descriptor!("System.Contract.GetCallFlags", 1 << 10, CallFlags::NONE, contract_calls::get_call_flags),
            descriptor!("System.Contract.CreateStandardAccount", 1 << 8, CallFlags::NONE, contract_calls::create_standard_account),
            descriptor!("System.Contract.CreateMultisigAccount", 1 << 8, CallFlags::NONE, contract_calls::create_multisig_account),
            descriptor!("System.Contract.NativeOnPersist", 0, CallFlags::STATES, contract_calls::native_on_persist),
            descriptor!("System.Contract.NativePostPersist", 0, CallFlags::STATES, contract_calls::native_post_persist),

            descriptor!("System.Crypto.CheckSig", CHECK_SIG_PRICE, CallFlags::NONE, crypto::check_sig),
            descriptor!("System.Crypto.CheckMultisig", 0, CallFlags::NONE, crypto::check_multisig),
        ];
        descriptors.into_iter().map(|d| (d.hash, d)).collect()
    };
}

/// Looks up a descriptor by id.
pub fn find(hash: u32) -> Option<&'static InteropDescriptor> {
    REGISTRY.get(&hash)
}

/// Looks up a descriptor by name.
pub fn find_by_name(name: &str) -> Option<&'static InteropDescriptor> {
    REGISTRY.get(&interop_hash(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_name_derived() {
        let hash = interop_hash("System.Runtime.Platform");
        let descriptor = find(hash).unwrap();
        assert_eq!(descriptor.name, "System.Runtime.Platform");
    }

    #[test]
    fn test_no_hash_collisions() {
        // The registry would silently drop a colliding descriptor.
        assert!(REGISTRY.len() >= 30);
    }

    #[test]
    fn test_storage_put_requires_write() {
        let descriptor = find_by_name("System.Storage.Put").unwrap();
        assert!(descriptor.required_flags.contains(CallFlags::WRITE_STATES));
    }
}
