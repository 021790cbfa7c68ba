use crate::common::TestEnvironment;
use assert_fs::prelude::*;
use predicates::prelude::*;
use secshell::persistence::{ConversationMemory, Role};

#[test]
fn test_scan_then_done_scenario() {
    let env = TestEnvironment::new().unwrap();
    let manager = env.manager();

    let mut memory = manager.start("alice").unwrap();
    memory.add_message(Role::User, "scan 10.0.0.5", None).unwrap();
    memory.add_message(Role::Assistant, "done", None).unwrap();

    let recent = memory.recent(1);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].content, "done");

    let all = memory.all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].role, Role::User);
    assert_eq!(all[1].role, Role::Assistant);

    let reopened =
        ConversationMemory::open(memory.session_id(), &env.storage.memory_dir, None).unwrap();
    assert_eq!(reopened.all(), all);
}

#[test]
fn test_snapshot_round_trip_preserves_order_and_timestamps() {
    let env = TestEnvironment::new().unwrap();
    let mut memory = ConversationMemory::open("rt", &env.storage.memory_dir, None).unwrap();

    for i in 0..12 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        let mut metadata = serde_json::Map::new();
        metadata.insert("turn".to_string(), serde_json::json!(i));
        memory
            .add_message(role, format!("turn {}", i), Some(metadata))
            .unwrap();
    }

    let reopened = ConversationMemory::open("rt", &env.storage.memory_dir, None).unwrap();
    assert_eq!(reopened.all(), memory.all());
    assert!(reopened
        .all()
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_snapshot_has_only_metadata_and_messages() {
    let env = TestEnvironment::new().unwrap();
    let mut memory = ConversationMemory::open("shape", &env.storage.memory_dir, None).unwrap();
    memory.add_message(Role::User, "hello", None).unwrap();

    let snapshot = env.memory().child("shape_memory.json");
    snapshot.assert(predicate::path::is_file());

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(snapshot.path()).unwrap()).unwrap();
    let mut keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["messages", "metadata"]);
    assert_eq!(value["metadata"]["session_id"], "shape");
}

#[test]
fn test_corrupt_snapshot_starts_empty() {
    let env = TestEnvironment::new().unwrap();
    env.memory().child("broken_memory.json").write_str("{not json").unwrap();

    let memory = ConversationMemory::open("broken", &env.storage.memory_dir, None).unwrap();
    assert!(memory.is_empty());
}
