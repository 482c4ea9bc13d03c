//! Integration tests for shellcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn shellcache() -> Command {
        cargo_bin_cmd!("shellcache")
    }

    #[test]
    fn help_displays() {
        shellcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline shell cache agent"));
    }

    #[test]
    fn version_displays() {
        shellcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shellcache"));
    }

    #[test]
    fn config_path_follows_flag() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        shellcache()
            .args(["config", "path", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        shellcache()
            .args(["config", "show", "--config"])
            .arg(temp.path().join("missing.toml"))
            .assert()
            .success()
            .stdout(predicate::str::contains("[agent]"))
            .stdout(predicate::str::contains("youtube-pwa-v1"));
    }

    #[test]
    fn config_init_then_set() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        shellcache()
            .args(["config", "init", "--config"])
            .arg(&path)
            .assert()
            .success();
        assert!(path.exists());

        shellcache()
            .args(["config", "set", "network.origin", "https://tube.example", "--config"])
            .arg(&path)
            .assert()
            .success();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("https://tube.example"));
    }

    #[test]
    fn invalid_config_rejected() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[network]\norigin = \"ftp://nope\"\n").unwrap();

        shellcache()
            .args(["cache", "list", "--config"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn message_requires_json() {
        shellcache()
            .args(["message", "SKIP_WAITING"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid JSON"));
    }
}

mod agent_tests {
    use assert_cmd::assert::OutputAssertExt;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Temp dir holding a config that points at `origin` and keeps all
    /// state inside the dir
    struct Workspace {
        dir: TempDir,
        config: PathBuf,
    }

    impl Workspace {
        fn new(origin: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let config = dir.path().join("config.toml");
            let contents = format!(
                "[network]\norigin = \"{}\"\ntimeout_secs = 1\n\n[storage]\ndir = \"{}\"\nregistration = \"{}\"\n",
                origin,
                toml_path(&dir.path().join("caches")),
                toml_path(&dir.path().join("registration.json")),
            );
            std::fs::write(&config, contents).unwrap();
            Self { dir, config }
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("shellcache");
            cmd.env_remove("SHELLCACHE_CONFIG")
                .arg("--config")
                .arg(&self.config);
            cmd
        }

        fn registration(&self) -> PathBuf {
            self.dir.path().join("registration.json")
        }
    }

    fn toml_path(path: &Path) -> String {
        path.display().to_string().replace('\\', "/")
    }

    async fn shell_server() -> MockServer {
        let server = MockServer::start().await;
        for (route, body) in [
            ("/", "<html>root</html>"),
            ("/index.html", "<html>shell</html>"),
            ("/manifest.json", r#"{"name":"tube"}"#),
        ] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;
        }
        server
    }

    /// Routes that never answer within the client timeout
    async fn unreachable(server: &MockServer, routes: &[&str]) {
        for route in routes {
            Mock::given(method("GET"))
                .and(path(*route))
                .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
                .mount(server)
                .await;
        }
    }

    /// Run a blocking CLI invocation off the runtime the mock server uses
    async fn run(mut cmd: Command) -> assert_cmd::assert::Assert {
        tokio::task::spawn_blocking(move || cmd.output().unwrap())
            .await
            .unwrap()
            .assert()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn uncontrolled_fetch_goes_to_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("results"))
            .expect(1)
            .mount(&server)
            .await;
        let ws = Workspace::new(&server.uri());

        let mut cmd = ws.cmd();
        cmd.args(["fetch", "/search?q=cats"]);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("status: 200"))
            .stdout(predicate::str::contains("bytes: 7"));

        let mut cmd = ws.cmd();
        cmd.args(["cache", "list", "--format", "json"]);
        run(cmd).await.success().stdout(predicate::str::contains("[]"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_sends_request_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(header("accept-language", "nl"))
            .respond_with(ResponseTemplate::new(200).set_body_string("voer"))
            .expect(1)
            .mount(&server)
            .await;
        let ws = Workspace::new(&server.uri());

        let mut cmd = ws.cmd();
        cmd.args(["fetch", "/feed", "-H", "Accept-Language: nl"]);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("status: 200"))
            .stdout(predicate::str::contains("bytes: 4"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn install_then_serve_offline() {
        let server = shell_server().await;
        let ws = Workspace::new(&server.uri());

        let mut cmd = ws.cmd();
        cmd.arg("install");
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("Agent active"));
        assert!(ws.registration().exists());

        let mut cmd = ws.cmd();
        cmd.args(["cache", "show", "--format", "plain"]);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("/index.html"))
            .stdout(predicate::str::contains("/manifest.json"));

        unreachable(&server, &["/watch", "/app.js"]).await;

        let out = ws.dir.path().join("watch.html");
        let mut cmd = ws.cmd();
        cmd.args(["fetch", "/watch?v=abc", "--destination", "document", "-o"])
            .arg(&out);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("status: 200"));
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "<html>shell</html>");

        // Subresources have no offline fallback
        let mut cmd = ws.cmd();
        cmd.args(["fetch", "/app.js"]);
        run(cmd)
            .await
            .failure()
            .stderr(predicate::str::contains("Network request failed"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cached_shell_served_without_network() {
        let server = shell_server().await;
        let ws = Workspace::new(&server.uri());

        let mut cmd = ws.cmd();
        cmd.arg("install");
        run(cmd).await.success();
        let after_install = server.received_requests().await.unwrap().len();

        let mut cmd = ws.cmd();
        cmd.args(["fetch", "/manifest.json"]);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("status: 200"));

        assert_eq!(server.received_requests().await.unwrap().len(), after_install);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetched_asset_cached_for_next_run() {
        let server = shell_server().await;
        Mock::given(method("GET"))
            .and(path("/static/app.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
            .expect(1)
            .mount(&server)
            .await;
        let ws = Workspace::new(&server.uri());

        let mut cmd = ws.cmd();
        cmd.arg("install");
        run(cmd).await.success();

        for _ in 0..2 {
            let mut cmd = ws.cmd();
            cmd.args(["fetch", "/static/app.js"]);
            run(cmd)
                .await
                .success()
                .stdout(predicate::str::contains("bytes: 14"));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_install_keeps_no_registration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("root"))
            .mount(&server)
            .await;
        let ws = Workspace::new(&server.uri());

        let mut cmd = ws.cmd();
        cmd.arg("install");
        run(cmd)
            .await
            .failure()
            .stderr(predicate::str::contains("Install aborted"));

        assert!(!ws.registration().exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deferred_install_activates_on_message() {
        let server = shell_server().await;
        let ws = Workspace::new(&server.uri());

        let mut cmd = ws.cmd();
        cmd.args(["install", "--no-activate"]);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("waiting"));

        let mut cmd = ws.cmd();
        cmd.args(["message", r#"{"type":"PING"}"#]);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("agent waiting"));

        let mut cmd = ws.cmd();
        cmd.args(["message", r#"{"type":"SKIP_WAITING"}"#]);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("Agent activated"));

        let registration = std::fs::read_to_string(ws.registration()).unwrap();
        assert!(registration.contains("\"active\""));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn activate_when_active_removes_leftover_generation() {
        let server = shell_server().await;
        let ws = Workspace::new(&server.uri());

        let mut cmd = ws.cmd();
        cmd.arg("install");
        run(cmd).await.success();

        let leftover = ws.dir.path().join("caches").join("youtube-pwa-v0");
        std::fs::create_dir_all(leftover.join("entries")).unwrap();
        std::fs::write(
            leftover.join("bucket.json"),
            r#"{"name":"youtube-pwa-v0","created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let mut cmd = ws.cmd();
        cmd.arg("activate");
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("already active"))
            .stdout(predicate::str::contains("Deleted old cache youtube-pwa-v0"));

        assert!(!leftover.exists());
        assert!(ws.dir.path().join("caches").join("youtube-pwa-v1").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn activate_before_install_fails_with_hint() {
        let server = MockServer::start().await;
        let ws = Workspace::new(&server.uri());

        let mut cmd = ws.cmd();
        cmd.arg("activate");
        run(cmd)
            .await
            .failure()
            .stderr(predicate::str::contains("shellcache install"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cache_clear_requires_yes() {
        let server = shell_server().await;
        let ws = Workspace::new(&server.uri());

        let mut cmd = ws.cmd();
        cmd.arg("install");
        run(cmd).await.success();

        let mut cmd = ws.cmd();
        cmd.args(["cache", "clear"]);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("Nothing deleted"));

        let mut cmd = ws.cmd();
        cmd.args(["cache", "clear", "--yes"]);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::contains("Cleared 1 cache(s)"));

        let mut cmd = ws.cmd();
        cmd.args(["cache", "list", "--format", "plain"]);
        run(cmd)
            .await
            .success()
            .stdout(predicate::str::is_empty());
    }
}
