use assert_cmd::prelude::*;
use futures_util::{SinkExt, StreamExt};
use std::{fs, process::Command};
use tempfile::TempDir;
use tokio_tungstenite::{accept_async, tungstenite::Message};

fn write_env(dir: &TempDir, relay_url: &str, secret: Option<&str>) -> String {
    let env_path = dir.path().join("env");
    let mut content = format!("RELAYS={relay_url}\nQUERY_TIMEOUT_SECS=2\n");
    if let Some(secret) = secret {
        content.push_str(&format!("SECRET_KEY={secret}\n"));
    }
    fs::write(&env_path, content).unwrap();
    env_path.to_str().unwrap().to_string()
}

/// Minimal relay: every REQ gets an immediate EOSE, every EVENT an OK.
async fn spawn_relay() -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(Message::Text(txt))) = ws.next().await {
                    let Ok(v) = serde_json::from_str::<serde_json::Value>(&txt) else {
                        continue;
                    };
                    match v[0].as_str() {
                        Some("REQ") => {
                            let frame = serde_json::json!(["EOSE", v[1]]);
                            let _ = ws.send(Message::Text(frame.to_string())).await;
                        }
                        Some("EVENT") => {
                            let frame = serde_json::json!(["OK", v[1]["id"], true, ""]);
                            let _ = ws.send(Message::Text(frame.to_string())).await;
                        }
                        _ => {}
                    }
                }
            });
        }
    });
    (format!("ws://{}", addr), handle)
}

#[test]
fn cli_help_lists_commands() {
    let output = Command::cargo_bin("badgr")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    for cmd in [
        "define", "award", "browse", "owners", "inbox", "accept", "remove", "request",
        "withdraw", "requests", "deny", "revoke", "grant", "state",
    ] {
        assert!(text.contains(cmd), "missing {cmd} in help output");
    }
}

#[test]
fn define_without_secret_key_fails() {
    let dir = TempDir::new().unwrap();
    let env_path = write_env(&dir, "ws://127.0.0.1:1", None);

    let output = Command::cargo_bin("badgr")
        .unwrap()
        .args(["--env", &env_path, "define", "hero", "Hero"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("secret key"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inbox_is_empty_against_empty_relay() {
    let (relay_url, handle) = spawn_relay().await;
    let dir = TempDir::new().unwrap();
    let env_path = write_env(&dir, &relay_url, None);

    let output = Command::cargo_bin("badgr")
        .unwrap()
        .args(["--env", &env_path, "inbox", "--pubkey", &"ab".repeat(32)])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    handle.abort();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("Pending badges: 0"));
    assert!(text.contains("Accepted badges: 0"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn state_of_missing_request_fails() {
    let (relay_url, handle) = spawn_relay().await;
    let dir = TempDir::new().unwrap();
    let env_path = write_env(&dir, &relay_url, None);

    let output = Command::cargo_bin("badgr")
        .unwrap()
        .args(["--env", &env_path, "state", &"00".repeat(32)])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    handle.abort();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("not found"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn request_publishes_and_reports_quorum() {
    let (relay_url, handle) = spawn_relay().await;
    let dir = TempDir::new().unwrap();
    let env_path = write_env(&dir, &relay_url, Some(&"09".repeat(32)));

    let output = Command::cargo_bin("badgr")
        .unwrap()
        .args([
            "--env",
            &env_path,
            "request",
            "30009:abc123:hero",
            "--message",
            "please",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    handle.abort();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("accepted by 1/1"));
}
