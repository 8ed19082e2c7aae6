//! End-to-end runs against fake agent scripts.
#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ccg_bridge::bridge::{AgentKind, Bridge, BridgeError, InvocationSpec, RunResult};
use ccg_bridge::config::AgentConfig;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const ETXTBSY: i32 = 26;

/// Write an executable shell script named `agent` into `dir`.
fn fake_agent(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("agent");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Run the bridge, retrying while another test's fork still holds the
/// freshly written script open.
async fn run<W: Write>(bridge: &Bridge, sink: &mut W) -> Result<RunResult, BridgeError> {
    for _ in 0..20 {
        match bridge.run(&mut *sink).await {
            Err(BridgeError::Io(e)) if e.raw_os_error() == Some(ETXTBSY) => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            other => return other,
        }
    }
    bridge.run(sink).await
}

#[tokio::test]
async fn codex_run_collects_session_and_messages() {
    let dir = TempDir::new().unwrap();
    let script = fake_agent(
        dir.path(),
        r#"echo '{"type":"session.start","id":"sess-42"}'
echo '{"type":"agent_message","text":"done"}'
echo ''"#,
    );
    let bridge = Bridge::new(InvocationSpec::new(AgentKind::Codex, "hi"), &AgentConfig::default())
        .with_binary(&script);

    let mut sink = Vec::new();
    let result = run(&bridge, &mut sink).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.session_id.as_deref(), Some("sess-42"));
    assert_eq!(result.message_count, 1);
    assert_eq!(result.messages[0]["text"], "done");
    assert!(result.stderr.is_none());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn failing_agent_reports_exit_code_and_stderr() {
    let dir = TempDir::new().unwrap();
    let script = fake_agent(dir.path(), "echo 'rate limited' >&2\nexit 1");
    let bridge = Bridge::new(InvocationSpec::new(AgentKind::Codex, "hi"), &AgentConfig::default())
        .with_binary(&script);

    let result = run(&bridge, &mut Vec::new()).await.unwrap();

    assert_eq!(result.exit_code, 1);
    assert!(result.session_id.is_none());
    assert_eq!(result.message_count, 0);
    assert_eq!(result.stderr.as_deref(), Some("rate limited"));
}

#[tokio::test]
async fn large_stderr_does_not_block_stdout() {
    let dir = TempDir::new().unwrap();
    let script = fake_agent(
        dir.path(),
        r#"head -c 200000 /dev/zero | tr '\0' 'e' >&2
echo '{"type":"agent_message","text":"still here"}'"#,
    );
    let bridge = Bridge::new(InvocationSpec::new(AgentKind::Codex, "hi"), &AgentConfig::default())
        .with_binary(&script);

    let result = tokio::time::timeout(Duration::from_secs(30), run(&bridge, &mut Vec::new()))
        .await
        .expect("run should not deadlock")
        .unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.message_count, 1);
    assert_eq!(result.stderr.map(|s| s.len()), Some(200_000));
}

#[tokio::test]
async fn overlay_and_workdir_reach_the_agent() {
    let dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let script = fake_agent(
        dir.path(),
        r#"printf '{"type":"agent_message","text":"%s|%s|%s"}\n' "$CCG_CODEX_KEY" "$OPENAI_BASE_URL" "$(pwd -P)""#,
    );
    let config = AgentConfig {
        base_url: "https://example.test/openai".to_string(),
        api_key: "cr_test".to_string(),
        model: String::new(),
    };
    let spec = InvocationSpec::new(AgentKind::Codex, "hi").workdir(work.path());
    let bridge = Bridge::new(spec, &config).with_binary(&script);

    let result = run(&bridge, &mut Vec::new()).await.unwrap();

    let expected_dir = std::fs::canonicalize(work.path()).unwrap();
    assert_eq!(
        result.messages[0]["text"],
        format!("cr_test|https://example.test/openai|{}", expected_dir.display())
    );
}

#[tokio::test]
async fn relative_workdir_is_not_applied_twice() {
    let dir = TempDir::new().unwrap();
    // Integration tests run from the package root.
    let work = TempDir::new_in(".").unwrap();
    let relative = PathBuf::from(work.path().file_name().unwrap());
    let script = fake_agent(
        dir.path(),
        r#"while [ $# -gt 0 ]; do
  if [ "$1" = "--cd" ]; then cd "$2" || exit 3; fi
  shift
done
printf '{"type":"agent_message","text":"%s"}\n' "$(pwd -P)""#,
    );
    let spec = InvocationSpec::new(AgentKind::Codex, "hi").workdir(&relative);
    let bridge = Bridge::new(spec, &AgentConfig::default()).with_binary(&script);

    let result = run(&bridge, &mut Vec::new()).await.unwrap();

    assert_eq!(result.exit_code, 0, "stderr: {:?}", result.stderr);
    let expected_dir = std::fs::canonicalize(work.path()).unwrap();
    assert_eq!(
        result.messages[0]["text"],
        expected_dir.display().to_string()
    );
}

/// Sink that cancels the run when the closing newline is written.
struct CancelOnLineEnd {
    cancel: CancellationToken,
}

impl Write for CancelOnLineEnd {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf == b"\n" {
            self.cancel.cancel();
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn cancellation_after_agent_exit_is_interrupted() {
    let dir = TempDir::new().unwrap();
    let script = fake_agent(
        dir.path(),
        r#"echo '{"type":"textDelta","text":"partial"}'"#,
    );
    let cancel = CancellationToken::new();
    let spec = InvocationSpec::new(AgentKind::Gemini, "hi").stream(true);
    let bridge = Bridge::new(spec, &AgentConfig::default())
        .with_binary(&script)
        .with_cancellation(cancel.clone());

    let mut sink = CancelOnLineEnd {
        cancel: cancel.clone(),
    };
    let err = run(&bridge, &mut sink).await.unwrap_err();

    assert!(cancel.is_cancelled());
    assert!(matches!(err, BridgeError::Interrupted));
}

#[tokio::test]
async fn streaming_writes_text_to_sink() {
    let dir = TempDir::new().unwrap();
    let script = fake_agent(
        dir.path(),
        r#"echo '{"type":"init","session_id":"g-7"}'
echo '{"type":"textDelta","text":"Hel"}'
echo 'not json'
echo '{"type":"textDelta","text":"lo"}'"#,
    );
    let spec = InvocationSpec::new(AgentKind::Gemini, "hi").stream(true);
    let bridge = Bridge::new(spec, &AgentConfig::default()).with_binary(&script);

    let mut sink = Vec::new();
    let result = run(&bridge, &mut sink).await.unwrap();

    assert_eq!(result.session_id.as_deref(), Some("g-7"));
    assert_eq!(String::from_utf8(sink).unwrap(), "Hello\n");
}

#[tokio::test]
async fn signal_death_maps_to_shell_exit_code() {
    let dir = TempDir::new().unwrap();
    let script = fake_agent(dir.path(), "kill -9 $$");
    let bridge = Bridge::new(InvocationSpec::new(AgentKind::Codex, "hi"), &AgentConfig::default())
        .with_binary(&script);

    let result = run(&bridge, &mut Vec::new()).await.unwrap();
    assert_eq!(result.exit_code, 137);
}

#[tokio::test]
async fn cancellation_interrupts_a_hanging_agent() {
    let dir = TempDir::new().unwrap();
    let script = fake_agent(
        dir.path(),
        r#"echo '{"type":"thread.started","thread_id":"t"}'
exec sleep 30"#,
    );
    let cancel = CancellationToken::new();
    let bridge = Bridge::new(InvocationSpec::new(AgentKind::Codex, "hi"), &AgentConfig::default())
        .with_binary(&script)
        .with_cancellation(cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = run(&bridge, &mut Vec::new()).await.unwrap_err();

    assert!(matches!(err, BridgeError::Interrupted));
    assert_eq!(err.exit_code(), 130);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn missing_executable_is_reported() {
    let bridge = Bridge::new(InvocationSpec::new(AgentKind::Gemini, "hi"), &AgentConfig::default())
        .with_binary("/nonexistent/bin/gemini-xyz");

    let err = bridge.run(Vec::new()).await.unwrap_err();

    assert!(matches!(
        err,
        BridgeError::ExecutableNotFound {
            agent: AgentKind::Gemini
        }
    ));
    assert_eq!(err.exit_code(), 127);
    assert!(err.payload()["error"]
        .as_str()
        .unwrap()
        .contains("gemini command not found"));
}

#[tokio::test]
async fn non_executable_file_is_permission_denied() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("agent");
    std::fs::write(&path, "#!/bin/sh\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

    let bridge = Bridge::new(InvocationSpec::new(AgentKind::Codex, "hi"), &AgentConfig::default())
        .with_binary(&path);
    let err = bridge.run(Vec::new()).await.unwrap_err();

    assert_eq!(err.exit_code(), 126);
}
