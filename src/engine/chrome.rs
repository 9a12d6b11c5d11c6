//! Headless Chrome + Lighthouse CLI engine.
//!
//! Each session owns one Chrome process with a throwaway profile and an
//! OS-assigned debugging port. Navigation and the readiness barrier go
//! through the DevTools protocol on a dedicated tab; audits shell out to
//! `lighthouse --port=<port>` so Lighthouse reuses the same browser.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::cdp::{CdpConnection, is_lifecycle_event};
use super::{AuditEngine, AuditSession};
use crate::errors::EngineError;

/// Lifecycle milestone used as the page-ready barrier: at most two open
/// network connections for 500ms.
const READY_EVENT: &str = "networkAlmostIdle";

const PORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on the DevTools close handshake before the browser is killed.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub chrome_cmd: String,
    pub lighthouse_cmd: String,
    pub chrome_flags: Vec<String>,
    pub launch_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chrome_cmd: "chromium".to_string(),
            lighthouse_cmd: "lighthouse".to_string(),
            chrome_flags: vec![
                "--headless=new".to_string(),
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
            ],
            launch_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ChromeEngine {
    settings: EngineSettings,
    http: reqwest::Client,
}

impl ChromeEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    fn spawn_chrome(&self, profile: &Path) -> Result<Child, EngineError> {
        Command::new(&self.settings.chrome_cmd)
            .args(&self.settings.chrome_flags)
            .arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", profile.display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                command: self.settings.chrome_cmd.clone(),
                source,
            })
    }

    async fn open_tab(&self, port: u16) -> anyhow::Result<String> {
        let target: Value = self
            .http
            .put(format!("http://127.0.0.1:{}/json/new?about:blank", port))
            .send()
            .await
            .context("DevTools /json/new request failed")?
            .error_for_status()?
            .json()
            .await
            .context("DevTools /json/new returned invalid JSON")?;
        let ws_url = target
            .get("webSocketDebuggerUrl")
            .and_then(Value::as_str)
            .context("new target has no webSocketDebuggerUrl")?;
        Ok(ws_url.to_string())
    }

    /// Port discovery, tab creation and protocol setup for a fresh browser.
    async fn attach(
        &self,
        profile: &Path,
        child: &mut Child,
    ) -> Result<(u16, CdpConnection), EngineError> {
        let port = wait_for_debugging_port(profile, child).await?;
        let ws_url = self.open_tab(port).await?;
        let mut cdp = CdpConnection::connect(&ws_url).await?;
        cdp.call("Page.enable", json!({})).await?;
        cdp.call("Page.setLifecycleEventsEnabled", json!({"enabled": true}))
            .await?;
        Ok((port, cdp))
    }
}

#[async_trait]
impl AuditEngine for ChromeEngine {
    async fn launch(&self) -> Result<Box<dyn AuditSession>, EngineError> {
        let profile = tempfile::Builder::new()
            .prefix("sitelens-chrome-")
            .tempdir()
            .context("failed to create Chrome profile directory")?;

        // Dropping `child` on any early return kills the browser.
        let mut child = self.spawn_chrome(profile.path())?;

        // One deadline covers port discovery through protocol setup.
        let secs = self.settings.launch_timeout.as_secs();
        let (port, cdp) = tokio::time::timeout(
            self.settings.launch_timeout,
            self.attach(profile.path(), &mut child),
        )
        .await
        .map_err(|_| EngineError::LaunchTimeout { secs })??;

        info!(port, pid = ?child.id(), "launched headless Chrome");
        Ok(Box::new(ChromeSession {
            child,
            _profile: profile,
            port,
            cdp,
            lighthouse_cmd: self.settings.lighthouse_cmd.clone(),
        }))
    }
}

/// Chrome writes the chosen port to `<profile>/DevToolsActivePort` once the
/// DevTools server is listening.
async fn wait_for_debugging_port(profile: &Path, child: &mut Child) -> Result<u16, EngineError> {
    let port_file: PathBuf = profile.join("DevToolsActivePort");
    loop {
        if let Ok(contents) = tokio::fs::read_to_string(&port_file).await
            && let Some(port) = parse_devtools_port(&contents)
        {
            return Ok(port);
        }
        if let Ok(Some(status)) = child.try_wait() {
            return Err(EngineError::Protocol(format!(
                "browser exited during startup with {}",
                status
            )));
        }
        tokio::time::sleep(PORT_POLL_INTERVAL).await;
    }
}

pub fn parse_devtools_port(contents: &str) -> Option<u16> {
    contents.lines().next()?.trim().parse().ok().filter(|p| *p != 0)
}

struct ChromeSession {
    child: Child,
    _profile: TempDir,
    port: u16,
    cdp: CdpConnection,
    lighthouse_cmd: String,
}

#[async_trait]
impl AuditSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        self.cdp.clear_events();
        let result = self.cdp.call("Page.navigate", json!({"url": url})).await?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            bail!("{}", error_text);
        }
        // Same-document navigations carry no loaderId and need no wait.
        let Some(loader_id) = result.get("loaderId").and_then(Value::as_str) else {
            return Ok(());
        };
        let loader_id = loader_id.to_string();
        loop {
            let event = self.cdp.next_event().await?;
            if is_lifecycle_event(&event, READY_EVENT, &loader_id) {
                debug!(url, "page reached {}", READY_EVENT);
                return Ok(());
            }
        }
    }

    async fn audit(&mut self, url: &str) -> anyhow::Result<Value> {
        let output = Command::new(&self.lighthouse_cmd)
            .arg(url)
            .arg(format!("--port={}", self.port))
            .args([
                "--output=json",
                "--output-path=stdout",
                "--quiet",
                "--only-categories=performance,accessibility,best-practices,seo",
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.lighthouse_cmd))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            bail!(
                "{} exited with {}: {}",
                self.lighthouse_cmd,
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            );
        }

        serde_json::from_slice(&output.stdout).context("Lighthouse printed invalid JSON")
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        let ChromeSession {
            mut child,
            _profile: profile,
            port,
            cdp,
            ..
        } = *self;
        // Killing the browser reclaims the tab, so there is no /json/close.
        if tokio::time::timeout(CLOSE_GRACE, cdp.close()).await.is_err() {
            debug!(port, "DevTools close handshake timed out");
        }
        if let Err(e) = child.kill().await {
            warn!(error = %e, "failed to kill Chrome");
            return Err(EngineError::Other(e.into()));
        }
        drop(profile);
        info!(port, "closed headless Chrome");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devtools_port() {
        assert_eq!(parse_devtools_port("9222\n/devtools/browser/abc\n"), Some(9222));
        assert_eq!(parse_devtools_port(" 41234 \n"), Some(41234));
        assert_eq!(parse_devtools_port(""), None);
        assert_eq!(parse_devtools_port("0\n"), None);
        assert_eq!(parse_devtools_port("not-a-port"), None);
    }

    #[test]
    fn test_engine_settings_default() {
        let settings = EngineSettings::default();
        assert_eq!(settings.chrome_cmd, "chromium");
        assert_eq!(settings.lighthouse_cmd, "lighthouse");
        assert!(settings.chrome_flags.iter().any(|f| f.starts_with("--headless")));
        assert_eq!(settings.launch_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_launch_missing_binary_is_spawn_error() {
        let engine = ChromeEngine::new(EngineSettings {
            chrome_cmd: "/nonexistent/sitelens-chrome".to_string(),
            ..EngineSettings::default()
        });
        match engine.launch().await {
            Err(EngineError::Spawn { command, .. }) => {
                assert_eq!(command, "/nonexistent/sitelens-chrome");
            }
            Err(other) => panic!("Expected Spawn error, got {:?}", other),
            Ok(_) => panic!("launch should fail without a browser"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_browser_exiting_early_is_reported() {
        let engine = ChromeEngine::new(EngineSettings {
            chrome_cmd: "false".to_string(),
            chrome_flags: vec![],
            launch_timeout: Duration::from_secs(5),
            ..EngineSettings::default()
        });
        match engine.launch().await {
            Err(EngineError::Protocol(msg)) => assert!(msg.contains("exited during startup")),
            Err(other) => panic!("Expected Protocol error, got {:?}", other),
            Ok(_) => panic!("launch should fail"),
        }
    }

    /// Accepts connections on a local port and never answers them.
    #[cfg(unix)]
    async fn silent_listener() -> (tokio::net::TcpListener, u16) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_against_unresponsive_devtools_times_out() {
        let (listener, port) = silent_listener().await;
        let held = tokio::spawn(async move {
            let mut conns = Vec::new();
            while let Ok((conn, _)) = listener.accept().await {
                conns.push(conn);
            }
        });
        // Stands in for a browser: advertise the port, then hang.
        let script = format!(
            r#"dir="${{1#--user-data-dir=}}"; echo {} > "$dir/DevToolsActivePort"; exec sleep 30"#,
            port
        );
        let engine = ChromeEngine::new(EngineSettings {
            chrome_cmd: "sh".to_string(),
            chrome_flags: vec!["-c".to_string(), script],
            launch_timeout: Duration::from_secs(1),
            ..EngineSettings::default()
        });

        let started = std::time::Instant::now();
        match engine.launch().await {
            Err(EngineError::LaunchTimeout { secs }) => assert_eq!(secs, 1),
            Err(other) => panic!("Expected LaunchTimeout, got {:?}", other),
            Ok(_) => panic!("launch should not succeed"),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
        held.abort();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_returns_when_devtools_stops_answering() {
        // WebSocket peer that completes the handshake, then goes silent.
        let ws_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_addr = ws_listener.local_addr().unwrap();
        let peer = tokio::spawn(async move {
            let (stream, _) = ws_listener.accept().await.unwrap();
            let _socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let (_devtools, port) = silent_listener().await;

        let cdp = CdpConnection::connect(&format!("ws://{}", ws_addr)).await.unwrap();
        let child = Command::new("sleep").arg("30").kill_on_drop(true).spawn().unwrap();
        let session: Box<dyn AuditSession> = Box::new(ChromeSession {
            child,
            _profile: tempfile::TempDir::new().unwrap(),
            port,
            cdp,
            lighthouse_cmd: "lighthouse".to_string(),
        });

        let closed = tokio::time::timeout(Duration::from_secs(10), session.close())
            .await
            .expect("close() did not return");
        assert!(closed.is_ok());
        peer.abort();
    }
}
