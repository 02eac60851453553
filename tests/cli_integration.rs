//! Integration tests for the `mvm` CLI.
//!
//! Each test starts a canned HTTP server standing in for the task service,
//! writes a settings file pointing at it, runs `mvm` as a subprocess and
//! verifies stdout, the requests the server saw, and the files written.

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn mvm_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mvm"))
}

// ---------------------------------------------------------------------------
// Canned task service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    target: String,
    token: Option<String>,
    body: String,
}

type Responder = fn(&Seen) -> (u16, String);

struct CannedServer {
    port: u16,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl CannedServer {
    fn start(respond: Responder) -> CannedServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                handle(stream, respond, &log);
            }
        });
        CannedServer { port, seen }
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/api", self.port)
    }

    fn requests(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn targets(&self) -> Vec<String> {
        self.requests().into_iter().map(|s| s.target).collect()
    }
}

fn handle(mut stream: TcpStream, respond: Responder, log: &Mutex<Vec<Seen>>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut token = None;
    let mut length = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("x-api-token") {
                token = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("content-length") {
                length = value.parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; length];
    let _ = reader.read_exact(&mut body);

    let seen = Seen {
        method,
        target,
        token,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    let (status, payload) = respond(&seen);
    log.lock().unwrap().push(seen);

    let reason = if status < 300 { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        payload.len(),
        payload
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn marvin(seen: &Seen) -> (u16, String) {
    let body = match seen.target.as_str() {
        "/api/categories" => {
            r#"[
                {"_id": "work", "title": "Work", "type": "category", "parentId": "root", "updatedAt": 1700000000000},
                {"_id": "acme", "title": "Acme", "type": "project", "parentId": "work"},
                {"_id": "home", "title": "Home", "type": "category", "parentId": "root"}
            ]"#
        }
        "/api/children?parentId=work" => {
            r#"[
                {"_id": "acme", "title": "Acme", "type": "project", "parentId": "work"},
                {"_id": "t1", "title": "Plan week", "parentId": "work", "done": false, "dueDate": "2024-01-01"}
            ]"#
        }
        "/api/children?parentId=unassigned" => {
            r#"[{"_id": "i1", "title": "Stray thought", "parentId": "unassigned"}]"#
        }
        "/api/dueItems?date=2024-01-01" => {
            r#"[{"_id": "T1", "title": "Pay rent", "dueDate": "2024-01-01"}]"#
        }
        "/api/todayItems?date=2024-01-01" => {
            r#"[
                {"_id": "T2", "title": "Gym", "day": "2024-01-01"},
                {"_id": "T1", "title": "Pay rent", "dueDate": "2024-01-01"}
            ]"#
        }
        "/api/addTask" => r#"{"_id": "new1", "title": "Buy milk", "done": false}"#,
        "/api/markDone" => "OK",
        target if target.starts_with("/api/children") => "[]",
        _ => return (404, "not found".to_string()),
    };
    (200, body.to_string())
}

fn unavailable(_: &Seen) -> (u16, String) {
    (503, "unavailable".to_string())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_config(dir: &Path, api: &CannedServer, extra: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let vault = dir.join("vault");
    fs::write(
        &path,
        format!(
            "[api]\ntoken = \"secret\"\nbase_url = \"{}\"\n\n[sync]\nvault_dir = '{}'\nbase_dir = \"AM\"\n\n{}",
            api.base_url(),
            vault.display(),
            extra
        ),
    )
    .unwrap();
    path
}

fn run_mvm(config: &Path, args: &[&str]) -> Output {
    Command::new(mvm_bin())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("MVM_API_TOKEN")
        .env_remove("MVM_CONFIG")
        .env_remove("MVM_LOG")
        .output()
        .expect("failed to run mvm")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap_or_else(|e| panic!("reading {}: {}", rel, e))
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

#[test]
fn test_sync_writes_tree() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");

    let output = run_mvm(&config, &["sync"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "3 documents written, 0 skipped, inbox written\n");

    let vault = tmp.path().join("vault");
    let work = read(&vault, "AM/Work/Work.md");
    assert!(work.starts_with("---\n_id: \"work\"\ntitle: \"Work\"\n"));
    assert!(work.contains("# Work [⚓](https://app.amazingmarvin.com/#p=work)\n\n"));
    assert!(work.contains(
        "## Categories and Projects\n\n- [[AM/Work/Acme.md|Acme]] [⚓](https://app.amazingmarvin.com/#p=acme)\n"
    ));
    assert!(work.contains(
        "## Tasks\n\n- [ ] [⚓](https://app.amazingmarvin.com/#t=t1) Due Date:: [[2024-01-01]] Plan week\n"
    ));

    let acme = read(&vault, "AM/Work/Acme.md");
    assert!(acme.contains("Back to [[AM/Work/Work.md|Work]]\n"));
    assert!(vault.join("AM/Home.md").exists());
    assert!(read(&vault, "AM/Inbox.md").contains("Stray thought"));

    let requests = server.requests();
    assert!(requests.iter().all(|r| r.token.as_deref() == Some("secret")));
    assert!(requests.iter().all(|r| r.method == "GET"));
}

#[test]
fn test_sync_twice_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");
    let vault = tmp.path().join("vault");
    let files = ["AM/Work/Work.md", "AM/Work/Acme.md", "AM/Home.md", "AM/Inbox.md"];

    assert!(run_mvm(&config, &["sync"]).status.success());
    let first: Vec<String> = files.iter().map(|f| read(&vault, f)).collect();
    fs::write(vault.join("AM/stale.md"), "left over").unwrap();

    assert!(run_mvm(&config, &["sync"]).status.success());
    let second: Vec<String> = files.iter().map(|f| read(&vault, f)).collect();
    assert_eq!(first, second);
    assert!(!vault.join("AM/stale.md").exists());
}

#[test]
fn test_sync_falls_back_from_local_server() {
    let tmp = TempDir::new().unwrap();
    let remote = CannedServer::start(marvin);
    let local = CannedServer::start(unavailable);
    let extra = format!(
        "[local_server]\nenabled = true\nhost = \"127.0.0.1\"\nport = {}\n",
        local.port
    );
    let config = write_config(tmp.path(), &remote, &extra);

    let output = run_mvm(&config, &["sync"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(local.targets().contains(&"/api/categories".to_string()));
    assert!(remote.targets().contains(&"/api/categories".to_string()));
    assert!(tmp.path().join("vault/AM/Work/Work.md").exists());
}

#[test]
fn test_sync_json_report() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");

    let output = run_mvm(&config, &["--json", "sync"]);
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["written"][0], "AM/Work/Work.md");
    assert_eq!(report["inbox_written"], true);
}

// ---------------------------------------------------------------------------
// Today import
// ---------------------------------------------------------------------------

const TODAY_BLOCK: &str = "\
- [ ] [⚓](https://app.amazingmarvin.com/#t=T1) Due Date:: [[2024-01-01]] Pay rent
- [ ] [⚓](https://app.amazingmarvin.com/#t=T2) Scheduled Date:: [[2024-01-01]] Gym
";

#[test]
fn test_today_prints_each_item_once() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");

    let output = run_mvm(&config, &["today", "--date", "2024-01-01"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), TODAY_BLOCK);
    assert!(!tmp.path().join("vault").exists());
}

#[test]
fn test_today_inserts_at_line() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");
    let daily = tmp.path().join("daily.md");
    fs::write(&daily, "# Daily\n\nnotes\n").unwrap();

    let output = run_mvm(
        &config,
        &["today", "--date", "2024-01-01", "--into", daily.to_str().unwrap(), "--line", "3"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        fs::read_to_string(&daily).unwrap(),
        format!("# Daily\n\n{}notes\n", TODAY_BLOCK)
    );
}

#[test]
fn test_today_show_due_only_skips_scheduled_call() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");

    let output = run_mvm(&config, &["today", "--date", "2024-01-01", "--show", "due"]);
    assert!(stdout(&output).contains("Pay rent"));
    assert!(!stdout(&output).contains("Gym"));
    assert_eq!(server.targets(), vec!["/api/dueItems?date=2024-01-01"]);
}

// ---------------------------------------------------------------------------
// Add task, done, categories
// ---------------------------------------------------------------------------

#[test]
fn test_add_without_category_makes_no_request() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");

    let output = run_mvm(&config, &["add", "Buy", "milk"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no category selected"));
    assert!(server.requests().is_empty());
}

#[test]
fn test_add_to_category_by_title() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");

    let output = run_mvm(&config, &["add", "--category", "home", "Buy", "milk"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "- [ ] [⚓](https://app.amazingmarvin.com/#t=new1) Buy milk\n"
    );

    let add = server
        .requests()
        .into_iter()
        .find(|r| r.target == "/api/addTask")
        .unwrap();
    assert_eq!(add.method, "POST");
    let body: serde_json::Value = serde_json::from_str(&add.body).unwrap();
    assert_eq!(body["title"], "Buy milk");
    assert_eq!(body["parentId"], "home");
    assert!(body["timeZoneOffset"].is_i64());
}

#[test]
fn test_add_to_inbox_sends_no_parent() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");

    let output = run_mvm(&config, &["add", "-c", "inbox", "Buy milk"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(server.targets(), vec!["/api/addTask"]);
    let body: serde_json::Value = serde_json::from_str(&server.requests()[0].body).unwrap();
    assert!(body.get("parentId").is_none());
}

#[test]
fn test_done_failure_points_at_task() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(unavailable);
    let config = write_config(tmp.path(), &server, "");

    let output = run_mvm(&config, &["done", "abc123"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("https://app.amazingmarvin.com/#t=abc123"));
}

#[test]
fn test_done_sends_item_id() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");

    let output = run_mvm(&config, &["done", "abc123"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "done abc123\n");
    let body: serde_json::Value = serde_json::from_str(&server.requests()[0].body).unwrap();
    assert_eq!(body["itemId"], "abc123");
}

#[test]
fn test_categories_picker_order() {
    let tmp = TempDir::new().unwrap();
    let server = CannedServer::start(marvin);
    let config = write_config(tmp.path(), &server, "");

    let output = run_mvm(&config, &["categories"]);
    assert_eq!(
        stdout(&output),
        "inbox\tInbox\nhome\tHome\nwork\tWork\nacme\tAcme in Work\n"
    );
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[test]
fn test_config_set_then_show() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("config.toml");
    fs::write(&config, "# mine\n[api]\ntoken = \"secret\"\n").unwrap();

    let output = run_mvm(&config, &["config", "set", "today.tasks", "due"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(fs::read_to_string(&config).unwrap().starts_with("# mine\n"));

    let shown = stdout(&run_mvm(&config, &["config", "show"]));
    assert!(shown.contains("[today]\ntasks = \"due\""));

    let bad = run_mvm(&config, &["config", "set", "today.tasks", "weekly"]);
    assert!(!bad.status.success());
}

#[test]
fn test_missing_token_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("config.toml");
    fs::write(&config, "[sync]\nvault_dir = \".\"\n").unwrap();

    let output = run_mvm(&config, &["sync"]);
    assert!(!output.status.success());
    assert!(stderr(&output).starts_with("error: no API token configured"));
}
