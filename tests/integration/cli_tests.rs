use crate::common::TestEnvironment;
use predicates::prelude::*;

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[tokio::test]
async fn test_sessions_list_on_empty_store() {
    let env = TestEnvironment::new().unwrap();
    let output = env.run_secshell(&["sessions", "list"], "").await.unwrap();
    assert!(output.status.success());
    assert!(predicate::str::contains("No saved sessions").eval(&stdout(&output)));
}

#[tokio::test]
async fn test_sessions_stats_on_empty_store() {
    let env = TestEnvironment::new().unwrap();
    let output = env.run_secshell(&["sessions", "stats"], "").await.unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Sessions: 0"));
    assert!(out.contains("Average per session: 0.0"));
}

#[tokio::test]
async fn test_chat_records_session_visible_to_listing() {
    let env = TestEnvironment::new().unwrap();

    let output = env
        .run_secshell(
            &["chat", "--user", "alice"],
            "look up google.com for me\n/history\n/quit\n",
        )
        .await
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("look up google.com for me"));

    let output = env.run_secshell(&["sessions", "list"], "").await.unwrap();
    let out = stdout(&output);
    assert!(out.contains("alice"));
    assert!(out.contains("look up google.com"));

    let output = env
        .run_secshell(&["sessions", "search", "GOOGLE.COM"], "")
        .await
        .unwrap();
    assert!(stdout(&output).contains("alice"));
}

#[tokio::test]
async fn test_chat_resume_unknown_session_fails() {
    let env = TestEnvironment::new().unwrap();
    let output = env
        .run_secshell(&["chat", "--resume", "does-not-exist"], "/quit\n")
        .await
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[tokio::test]
async fn test_config_show_prints_storage() {
    let env = TestEnvironment::new().unwrap();
    let output = env.run_secshell(&["config", "--show"], "").await.unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("[storage]"));
    assert!(out.contains("logs_dir"));
}

#[tokio::test]
async fn test_chat_resume_keeps_recorded_user() {
    let env = TestEnvironment::new().unwrap();
    env.write_session("s-alice", "20240101T000000", "alice", "whois google.com")
        .unwrap();

    let output = env
        .run_secshell(
            &["chat", "--resume", "s-alice", "--user", "bob"],
            "/info\n/quit\n",
        )
        .await
        .unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Session loaded: s-alice"));
    assert!(predicate::str::contains("User: alice").eval(&out));
    assert!(!out.contains("User: bob"));
}

#[tokio::test]
async fn test_sessions_delete_ambiguous_fragment_removes_nothing() {
    let env = TestEnvironment::new().unwrap();
    env.write_session("s-one", "20240101T000000", "alice", "whois google.com")
        .unwrap();
    env.write_session("s-two", "20240102T000000", "alice", "dig google.com")
        .unwrap();

    let output = env
        .run_secshell(&["sessions", "delete", "cai", "--yes"], "")
        .await
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("matches 2 sessions"));
    assert_eq!(env.index().list_sessions(10).len(), 2);
}
