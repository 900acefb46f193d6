//! End-to-end engine scenarios: deploy, call, permission enforcement.

use neo_config::ProtocolSettings;
use neo_core::{Signer, Transaction, UInt160, Witness};
use neo_cryptography::ecc::ECPoint;
use neo_persistence::DataCache;
use neo_smart_contract::application_engine::{ApplicationEngine, ScriptContainer};
use neo_smart_contract::contract_state::create_contract_hash;
use neo_smart_contract::interop::interop_hash;
use neo_smart_contract::manifest::{
    ContractAbi, ContractManifest, ContractMethodDescriptor, ContractParameterType,
    ContractPermission, PermissionDescriptor, WildcardMethods,
};
use neo_smart_contract::native;
use neo_smart_contract::nef::NefFile;
use neo_smart_contract::{CallFlags, TriggerType};
use neo_vm::{OpCode, ScriptBuilder, VMState};
use num_bigint::BigInt;
use std::sync::Arc;

const GAS: i64 = 100_000_000;

fn settings() -> ProtocolSettings {
    ProtocolSettings {
        network: 0x4e454f00,
        validators_count: 1,
        standby_committee: vec![ECPoint::from_private_key(&[0x42u8; 32]).unwrap()],
        ..ProtocolSettings::default()
    }
}

fn sender() -> UInt160 {
    UInt160::from([7u8; 20])
}

fn deploy_tx(script: Vec<u8>) -> Transaction {
    Transaction::new(
        1,
        0,
        0,
        1000,
        vec![Signer::global(sender())],
        vec![],
        script,
        vec![Witness::empty()],
    )
}

fn push_args(sb: &mut ScriptBuilder, args: &[Vec<u8>]) {
    for arg in args.iter().rev() {
        sb.emit_push_bytes(arg);
    }
    sb.emit_push_int(args.len() as i64);
    sb.emit(OpCode::Pack);
}

fn call_script(target: &UInt160, method: &str, args: &[Vec<u8>]) -> Vec<u8> {
    let mut sb = ScriptBuilder::new();
    push_args(&mut sb, args);
    sb.emit_push_int(CallFlags::ALL.bits() as i64);
    sb.emit_push_string(method);
    sb.emit_push_bytes(target.as_bytes());
    sb.emit_syscall(interop_hash("System.Contract.Call"));
    sb.into_bytes()
}

/// Deploys a `PUSH1 RET` contract with the given name and manifest,
/// returning its hash.
fn deploy(
    snapshot: &Arc<DataCache>,
    name: &str,
    manifest: ContractManifest,
) -> (UInt160, ApplicationEngine) {
    let nef = NefFile::new("neo-core-v3.0".into(), String::new(), vec![], vec![0x11, 0x40]);
    let expected_hash = create_contract_hash(&sender(), nef.checksum, name);
    let management_hash = native::find_by_id(-1).unwrap().hash();

    let script = call_script(
        &management_hash,
        "deploy",
        &[
            neo_io::Serializable::to_array(&nef),
            manifest.to_json().into_bytes(),
        ],
    );
    let tx = deploy_tx(script.clone());
    let mut engine = ApplicationEngine::new(
        TriggerType::Application,
        Some(ScriptContainer::Transaction(tx)),
        snapshot.clone(),
        None,
        settings(),
        100 * GAS,
    );
    engine.load_script(script, CallFlags::ALL).unwrap();
    let state = engine.execute();
    assert_eq!(state, VMState::HALT, "deploy faulted: {:?}", engine.fault_message());
    (expected_hash, engine)
}

fn simple_manifest(name: &str, methods: &[&str]) -> ContractManifest {
    ContractManifest::new(
        name,
        ContractAbi {
            methods: methods
                .iter()
                .map(|m| ContractMethodDescriptor {
                    name: (*m).into(),
                    parameters: vec![],
                    return_type: ContractParameterType::Any,
                    offset: 0,
                    safe: false,
                })
                .collect(),
            events: vec![],
        },
    )
}

#[test]
fn test_deploy_then_call() {
    let snapshot = Arc::new(DataCache::new());
    let (hash, engine) = deploy(&snapshot, "TestContract", simple_manifest("TestContract", &["test"]));

    // Exactly one Deploy notification from ContractManagement.
    let deploys: Vec<_> = engine
        .notifications()
        .iter()
        .filter(|n| n.event_name == "Deploy")
        .collect();
    assert_eq!(deploys.len(), 1);

    let contract = native::contract_management::get_contract(&snapshot, &hash).unwrap();
    assert_eq!(contract.hash, hash);
    assert_eq!(contract.update_counter, 0);

    // invokefunction(hash, "test") halts with [1].
    let script = call_script(&hash, "test", &[]);
    let mut engine = ApplicationEngine::new(
        TriggerType::Application,
        Some(ScriptContainer::Transaction(deploy_tx(script.clone()))),
        snapshot.clone(),
        None,
        settings(),
        10 * GAS,
    );
    engine.load_script(script, CallFlags::ALL).unwrap();
    assert_eq!(engine.execute(), VMState::HALT);
    assert_eq!(engine.result_stack().len(), 1);
    assert_eq!(
        engine.result_stack().peek(0).unwrap().get_integer().unwrap(),
        BigInt::from(1)
    );
}

#[test]
fn test_deploying_twice_faults() {
    let snapshot = Arc::new(DataCache::new());
    let manifest = simple_manifest("Twice", &["test"]);
    deploy(&snapshot, "Twice", manifest.clone());

    let nef = NefFile::new("neo-core-v3.0".into(), String::new(), vec![], vec![0x11, 0x40]);
    let management_hash = native::find_by_id(-1).unwrap().hash();
    let script = call_script(
        &management_hash,
        "deploy",
        &[
            neo_io::Serializable::to_array(&nef),
            manifest.to_json().into_bytes(),
        ],
    );
    let mut engine = ApplicationEngine::new(
        TriggerType::Application,
        Some(ScriptContainer::Transaction(deploy_tx(script.clone()))),
        snapshot.clone(),
        None,
        settings(),
        100 * GAS,
    );
    engine.load_script(script, CallFlags::ALL).unwrap();
    assert_eq!(engine.execute(), VMState::FAULT);
    assert!(engine.fault_message().unwrap().contains("already exists"));
}

#[test]
fn test_cross_contract_permission_denial() {
    let snapshot = Arc::new(DataCache::new());

    // B declares both methods; A is only permitted to call "test".
    let (b_hash, _) = deploy(
        &snapshot,
        "ContractB",
        simple_manifest("ContractB", &["test", "disallowed"]),
    );

    let mut a_manifest = simple_manifest("ContractA", &["run"]);
    a_manifest.permissions = vec![ContractPermission {
        contract: PermissionDescriptor::Hash(b_hash),
        methods: WildcardMethods::List(vec!["test".into()]),
    }];
    // A's script: call B.disallowed().
    let a_script = {
        let mut sb = ScriptBuilder::new();
        sb.emit(OpCode::NewArray0);
        sb.emit_push_int(CallFlags::ALL.bits() as i64);
        sb.emit_push_string("disallowed");
        sb.emit_push_bytes(b_hash.as_bytes());
        sb.emit_syscall(interop_hash("System.Contract.Call"));
        sb.emit(OpCode::Ret);
        sb.into_bytes()
    };
    let a_nef = NefFile::new("neo-core-v3.0".into(), String::new(), vec![], a_script);
    let management_hash = native::find_by_id(-1).unwrap().hash();
    let deploy_script = call_script(
        &management_hash,
        "deploy",
        &[
            neo_io::Serializable::to_array(&a_nef),
            a_manifest.to_json().into_bytes(),
        ],
    );
    let a_hash = create_contract_hash(&sender(), a_nef.checksum, "ContractA");
    let mut engine = ApplicationEngine::new(
        TriggerType::Application,
        Some(ScriptContainer::Transaction(deploy_tx(deploy_script.clone()))),
        snapshot.clone(),
        None,
        settings(),
        100 * GAS,
    );
    engine.load_script(deploy_script, CallFlags::ALL).unwrap();
    assert_eq!(engine.execute(), VMState::HALT);

    // Invoking A.run() faults on the permission check.
    let script = call_script(&a_hash, "run", &[]);
    let mut engine = ApplicationEngine::new(
        TriggerType::Application,
        Some(ScriptContainer::Transaction(deploy_tx(script.clone()))),
        snapshot.clone(),
        None,
        settings(),
        10 * GAS,
    );
    engine.load_script(script, CallFlags::ALL).unwrap();
    assert_eq!(engine.execute(), VMState::FAULT);
    let message = engine.fault_message().unwrap();
    assert!(
        message.contains(&format!("Cannot Call Method disallowed Of Contract {b_hash}")),
        "unexpected fault message: {message}"
    );

    // Calling the permitted method succeeds.
    let a_run_test = {
        // A direct call to B.test from the entry script is unrestricted.
        call_script(&b_hash, "test", &[])
    };
    let mut engine = ApplicationEngine::new(
        TriggerType::Application,
        Some(ScriptContainer::Transaction(deploy_tx(a_run_test.clone()))),
        snapshot.clone(),
        None,
        settings(),
        10 * GAS,
    );
    engine.load_script(a_run_test, CallFlags::ALL).unwrap();
    assert_eq!(engine.execute(), VMState::HALT);
}

#[test]
fn test_storage_interops_round_trip() {
    // A contract writing and reading its own storage through the
    // syscalls: put(key, value) then get(key).
    let snapshot = Arc::new(DataCache::new());

    let contract_script = {
        let mut sb = ScriptBuilder::new();
        // Storage.Put(ctx, "k", "v")
        sb.emit_syscall(interop_hash("System.Storage.GetContext"));
        sb.emit_push_bytes(b"k");
        sb.emit_push_bytes(b"v");
        // Stack: ctx, "k", "v" -- syscall pops ctx first.
        sb.emit(OpCode::Reverse3);
        sb.emit_syscall(interop_hash("System.Storage.Put"));
        // Storage.Get(ctx, "k")
        sb.emit_syscall(interop_hash("System.Storage.GetContext"));
        sb.emit_push_bytes(b"k");
        sb.emit(OpCode::Swap);
        sb.emit_syscall(interop_hash("System.Storage.Get"));
        sb.emit(OpCode::Ret);
        sb.into_bytes()
    };
    let nef = NefFile::new("neo-core-v3.0".into(), String::new(), vec![], contract_script);
    let manifest = simple_manifest("StorageUser", &["run"]);
    let management_hash = native::find_by_id(-1).unwrap().hash();
    let deploy_script = call_script(
        &management_hash,
        "deploy",
        &[neo_io::Serializable::to_array(&nef), manifest.to_json().into_bytes()],
    );
    let hash = create_contract_hash(&sender(), nef.checksum, "StorageUser");
    let mut engine = ApplicationEngine::new(
        TriggerType::Application,
        Some(ScriptContainer::Transaction(deploy_tx(deploy_script.clone()))),
        snapshot.clone(),
        None,
        settings(),
        100 * GAS,
    );
    engine.load_script(deploy_script, CallFlags::ALL).unwrap();
    assert_eq!(engine.execute(), VMState::HALT);

    let script = call_script(&hash, "run", &[]);
    let mut engine = ApplicationEngine::new(
        TriggerType::Application,
        Some(ScriptContainer::Transaction(deploy_tx(script.clone()))),
        snapshot.clone(),
        None,
        settings(),
        10 * GAS,
    );
    engine.load_script(script, CallFlags::ALL).unwrap();
    assert_eq!(engine.execute(), VMState::HALT, "{:?}", engine.fault_message());
    assert_eq!(
        engine.result_stack().peek(0).unwrap().get_bytes().unwrap(),
        b"v"
    );
}
