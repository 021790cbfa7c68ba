use crate::common::TestEnvironment;
use assert_fs::prelude::*;
use predicates::prelude::*;
use secshell::persistence::Role;

#[test]
fn test_list_orders_by_file_stamp() {
    let env = TestEnvironment::new().unwrap();
    env.write_session("a", "20240101T090000", "alice", "first").unwrap();
    env.write_session("c", "20240103T090000", "alice", "third").unwrap();
    env.write_session("b", "20240102T090000", "alice", "second").unwrap();

    let sessions = env.index().list_sessions(2);
    let ids: Vec<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b"]);
}

#[test]
fn test_list_skips_one_bad_file() {
    let env = TestEnvironment::new().unwrap();
    env.write_session("good1", "20240101T090000", "alice", "one").unwrap();
    env.write_session("good2", "20240102T090000", "bob", "two").unwrap();
    env.write_log("cai_bad_20240103T090000_eve.jsonl", &["this is not json"])
        .unwrap();

    let sessions = env.index().list_sessions(10);
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.session_id != "bad"));
}

#[test]
fn test_truncated_tail_keeps_well_formed_events() {
    let env = TestEnvironment::new().unwrap();
    env.write_log(
        "cai_trunc_20240105T120000_alice.jsonl",
        &[
            r#"{"event":"session_start","timestamp":"2024-01-05T12:00:00","session_id":"trunc","user":"alice"}"#,
            r#"{"event":"user_message","timestamp":"2024-01-05T12:00:01","content":"nmap 10.0.0.0/24"}"#,
            r#"{"event":"assistant_message","timestamp":"2024-01-05T12:00:05","content":"3 hosts up"}"#,
            r#"{"event":"user_message","timestamp":"2024-01-05T12:0"#,
        ],
    )
    .unwrap();

    let loaded = env.index().load_session("trunc").unwrap().unwrap();
    assert_eq!(loaded.events.len(), 3);
    assert_eq!(loaded.messages.len(), 2);
    assert_eq!(loaded.messages[1].content, "3 hosts up");
    assert_eq!(loaded.summary.last_message_preview, "nmap 10.0.0.0/24");
}

#[test]
fn test_reconstruction_is_idempotent() {
    let env = TestEnvironment::new().unwrap();
    env.write_session("same", "20240101T090000", "alice", "whois example.org")
        .unwrap();

    let index = env.index();
    let first = index.load_session("same").unwrap().unwrap();
    let second = index.load_session("same").unwrap().unwrap();
    assert_eq!(first.messages, second.messages);
    assert_eq!(first.events, second.events);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn test_last_activity_never_precedes_creation() {
    let env = TestEnvironment::new().unwrap();
    // Event timestamps are older than the stamp in the file name
    env.write_session("old", "20240301T090000", "alice", "ping").unwrap();

    let summary = env.index().list_sessions(1).remove(0);
    assert!(summary.last_activity >= summary.created_at);
    assert_eq!(summary.created_at.format("%Y%m%d").to_string(), "20240301");
}

#[test]
fn test_search_matches_last_request_case_insensitively() {
    let env = TestEnvironment::new().unwrap();
    env.write_session("g1", "20240101T090000", "alice", "whois GOOGLE.com").unwrap();
    env.write_session("e1", "20240102T090000", "alice", "ping example.org").unwrap();
    env.write_log(
        "cai_g2_20240103T090000_bob.jsonl",
        &[
            r#"{"event":"session_start","timestamp":"2024-01-03T09:00:00","session_id":"g2","user":"bob"}"#,
            r#"{"event":"user_message","timestamp":"2024-01-03T09:00:01","content":"resolve google.com"}"#,
            r#"{"event":"user_message","timestamp":"2024-01-03T09:00:02","content":"now trace it"}"#,
            r#"{"event":"assistant_message","timestamp":"2024-01-03T09:00:03","content":"google.com is 3 hops away"}"#,
        ],
    )
    .unwrap();

    let found = env.index().search_sessions("google.com", 10);
    let ids: Vec<&str> = found.iter().map(|s| s.session_id.as_str()).collect();
    assert_eq!(ids, vec!["g1"]);
}

#[test]
fn test_unknown_session_loads_as_none() {
    let env = TestEnvironment::new().unwrap();
    assert!(env.index().load_session("nothing-here").unwrap().is_none());
    assert!(env.index().load_session("").unwrap().is_none());
}

#[test]
fn test_statistics_on_empty_store() {
    let env = TestEnvironment::new().unwrap();
    let stats = env.manager().statistics();
    assert_eq!(stats.total_sessions, 0);
    assert_eq!(stats.average_messages_per_session, 0.0);
}

#[test]
fn test_delete_removes_every_artifact() {
    let env = TestEnvironment::new().unwrap();
    let manager = env.manager();
    let mut memory = manager.start("alice").unwrap();
    memory.add_message(Role::User, "tcpdump -c 5", None).unwrap();
    let id = memory.session_id().to_string();
    let log_name = memory
        .logger()
        .unwrap()
        .log_path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string();
    drop(memory);

    let log = env.logs().child(&log_name);
    let manifest = env.logs().child(format!("{}.manifest.json", id));
    let snapshot = env.memory().child(format!("{}_memory.json", id));
    log.assert(predicate::path::exists());
    manifest.assert(predicate::path::exists());
    snapshot.assert(predicate::path::exists());

    let report = manager.delete(&id).unwrap();
    assert_eq!(report.removed.len(), 3);
    log.assert(predicate::path::missing());
    manifest.assert(predicate::path::missing());
    snapshot.assert(predicate::path::missing());
}

#[test]
fn test_resume_appends_to_existing_log() {
    let env = TestEnvironment::new().unwrap();
    let log = env
        .write_session("r1", "20240101T090000", "alice", "scan 10.0.0.5")
        .unwrap();

    let manager = env.manager();
    let (mut memory, summary) = manager.resume("r1").unwrap();
    assert_eq!(summary.message_count, 2);
    assert_eq!(memory.all()[0].content, "scan 10.0.0.5");

    memory.add_message(Role::User, "now whois it", None).unwrap();
    log.assert(predicate::str::contains("now whois it"));
    log.assert(predicate::str::contains(r#""action":"resume""#));

    let reloaded = manager.load("r1").unwrap();
    assert_eq!(reloaded.messages.len(), 3);
    assert_eq!(reloaded.summary.last_message_preview, "now whois it");
}
