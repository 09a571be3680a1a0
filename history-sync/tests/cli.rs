use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(base_url: &str, data_dir: &std::path::Path) -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    let yaml = format!(
        "provider:\n  base_url: \"{base_url}\"\nstore:\n  data_dir: \"{}\"\naccount_groups:\n  - id: acme\n    profile_key: \"PK-ACME\"\n    platforms: [instagram]\n",
        data_dir.display()
    );
    write(config.path(), yaml).expect("Writing temp config failed");
    config
}

#[test]
fn sync_cli_fails_for_missing_config() {
    let mut cmd = Command::cargo_bin("history-sync").expect("Binary exists");
    cmd.arg("sync")
        .arg("--config")
        .arg("/no/such/config.yaml")
        .arg("--group")
        .arg("acme")
        .env("PROVIDER_API_KEY", "k");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn sync_cli_fails_without_api_key() {
    let data = TempDir::new().unwrap();
    let config = config_for("http://127.0.0.1:9", data.path());
    let mut cmd = Command::cargo_bin("history-sync").expect("Binary exists");
    cmd.arg("sync")
        .arg("--config")
        .arg(config.path())
        .arg("--group")
        .arg("acme")
        .env_remove("PROVIDER_API_KEY");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("PROVIDER_API_KEY"));
}

#[test]
fn history_cli_rejects_unknown_platform() {
    let mut cmd = Command::cargo_bin("history-sync").expect("Binary exists");
    cmd.args(["history", "--config", "c.yaml", "--profile-key", "PK", "--platform", "myspace"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown platform"));
}

#[tokio::test]
async fn sync_cli_dry_run_prints_report_and_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .and(query_param("platform", "instagram"))
        .and(header("Profile-Key", "PK-ACME"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "IG-1", "post": "first", "created": "2024-04-01T10:00:00Z"},
            {"id": "IG-2", "post": "second", "created": "2024-04-02T10:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let data = TempDir::new().unwrap();
    let config = config_for(&server.uri(), data.path());
    let config_path = config.path().to_path_buf();

    // The mock server lives on this runtime, so the blocking child process runs elsewhere.
    let output = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("history-sync")
            .expect("Binary exists")
            .arg("sync")
            .arg("--config")
            .arg(&config_path)
            .arg("--group")
            .arg("acme")
            .arg("--dry-run")
            .env("PROVIDER_API_KEY", "k")
            .output()
            .expect("command runs")
    })
    .await
    .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(
        predicate::str::contains("\"pending\": 2").eval(&stdout),
        "stdout: {stdout}"
    );
    assert!(stdout.contains("\"groupId\": \"acme\""));
    assert!(!data.path().join("posts.json").exists());
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use history_sync::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Sync {
            config: std::path::PathBuf::from("dummy.yaml"),
            group: "acme".into(),
            platforms: vec![],
            force: false,
            dry_run: false,
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
