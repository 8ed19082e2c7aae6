//! Tests for argument vectors, environment overlays and spawning.

use std::path::PathBuf;

use ccg_bridge::bridge::{
    AgentInvocation, AgentKind, AgentProcess, InvocationSpec, SandboxMode, SpawnError,
};
use ccg_bridge::config::AgentConfig;

fn config(api_key: &str, base_url: &str, model: &str) -> AgentConfig {
    AgentConfig {
        base_url: base_url.to_string(),
        api_key: api_key.to_string(),
        model: model.to_string(),
    }
}

#[test]
fn codex_full_argument_vector() {
    let spec = InvocationSpec::new(AgentKind::Codex, "Review code")
        .sandbox(SandboxMode::WorkspaceWrite)
        .workdir("/src/project")
        .model("o3")
        .auto_approve(true)
        .attach("a.png")
        .attach("b.png")
        .resume("0199a213-81c0");
    let invocation = AgentInvocation::new(&spec, &AgentConfig::default());

    assert_eq!(
        invocation.args(),
        [
            "exec",
            "--sandbox",
            "workspace-write",
            "--cd",
            "/src/project",
            "--model",
            "o3",
            "--full-auto",
            "--image",
            "a.png",
            "--image",
            "b.png",
            "--json",
            "resume",
            "0199a213-81c0",
            "--",
            "Review code",
        ]
    );
    assert_eq!(invocation.workdir(), Some(PathBuf::from("/src/project").as_path()));
}

#[test]
fn relative_workdir_is_made_absolute() {
    let spec = InvocationSpec::new(AgentKind::Codex, "task").workdir("sub/dir");
    let invocation = AgentInvocation::new(&spec, &AgentConfig::default());
    let expected = std::env::current_dir().unwrap().join("sub/dir");

    let args = invocation.args();
    let cd = args.iter().position(|a| a == "--cd").unwrap();
    assert_eq!(PathBuf::from(&args[cd + 1]), expected);
    assert_eq!(invocation.workdir(), Some(expected.as_path()));
}

#[test]
fn codex_resume_last() {
    for token in ["last", "latest"] {
        let spec = InvocationSpec::new(AgentKind::Codex, "Continue").resume(token);
        let args = AgentInvocation::new(&spec, &AgentConfig::default())
            .args()
            .to_vec();
        let resume = args.iter().position(|a| a == "resume").unwrap();
        assert_eq!(args[resume + 1], "--last");
    }
}

#[test]
fn prompt_starting_with_dash_stays_positional_for_codex() {
    let spec = InvocationSpec::new(AgentKind::Codex, "--help me");
    let invocation = AgentInvocation::new(&spec, &AgentConfig::default());
    let args = invocation.args();

    assert_eq!(args[args.len() - 2], "--");
    assert_eq!(args[args.len() - 1], "--help me");
}

#[test]
fn gemini_full_argument_vector() {
    let spec = InvocationSpec::new(AgentKind::Gemini, "Refactor utils")
        .sandbox(SandboxMode::ReadOnly)
        .auto_approve(true)
        .resume("latest")
        .workdir("/src/project");
    let invocation = AgentInvocation::new(&spec, &config("", "", "gemini-3-pro-preview"));

    assert_eq!(
        invocation.args(),
        [
            "--sandbox",
            "--yolo",
            "--model",
            "gemini-3-pro-preview",
            "--resume",
            "latest",
            "-o",
            "stream-json",
            "Refactor utils",
        ]
    );
    // gemini gets its directory as the process cwd only
    assert!(!invocation.args().iter().any(|a| a == "/src/project"));
    assert!(invocation.workdir().is_some());
}

#[test]
fn gemini_ignores_attachments() {
    let spec = InvocationSpec::new(AgentKind::Gemini, "task").attach("shot.png");
    let invocation = AgentInvocation::new(&spec, &AgentConfig::default());
    assert!(!invocation.args().iter().any(|a| a.contains("shot.png")));
}

#[test]
fn model_override_beats_config() {
    let spec = InvocationSpec::new(AgentKind::Gemini, "task").model("gemini-flash");
    let invocation = AgentInvocation::new(&spec, &config("", "", "gemini-3-pro-preview"));

    let args = invocation.args();
    let model = args.iter().position(|a| a == "--model").unwrap();
    assert_eq!(args[model + 1], "gemini-flash");
    assert_eq!(args.iter().filter(|a| *a == "--model").count(), 1);
}

#[test]
fn gemini_overlay() {
    let spec = InvocationSpec::new(AgentKind::Gemini, "task");
    let invocation = AgentInvocation::new(
        &spec,
        &config("AIza-key", "https://example.test/gemini", ""),
    );
    let env = invocation.env_overlay();

    assert_eq!(env.len(), 2);
    assert_eq!(env["GEMINI_API_KEY"], "AIza-key");
    assert_eq!(env["GOOGLE_GEMINI_BASE_URL"], "https://example.test/gemini");
}

#[test]
fn empty_config_values_are_not_injected() {
    let spec = InvocationSpec::new(AgentKind::Codex, "task");
    let invocation = AgentInvocation::new(&spec, &config("", "https://example.test", ""));
    let env = invocation.env_overlay();

    assert!(!env.contains_key("CCG_CODEX_KEY"));
    assert!(env.contains_key("OPENAI_BASE_URL"));
}

#[test]
fn overlay_does_not_touch_parent_environment() {
    let spec = InvocationSpec::new(AgentKind::Codex, "task");
    let _invocation = AgentInvocation::new(&spec, &config("cr_overlay_only", "", ""));

    assert_ne!(
        std::env::var("CCG_CODEX_KEY").ok().as_deref(),
        Some("cr_overlay_only")
    );
}

#[test]
fn spawn_missing_binary_is_not_found() {
    let spec = InvocationSpec::new(AgentKind::Codex, "task");
    let invocation = AgentInvocation::new(&spec, &AgentConfig::default());

    let result = AgentProcess::spawn_with_binary("/nonexistent/bin/codex-xyz", &invocation);
    assert!(matches!(result, Err(SpawnError::NotFound)));
}

#[cfg(unix)]
#[tokio::test]
async fn spawn_echo_and_wait() {
    use tokio::io::AsyncReadExt;

    let spec = InvocationSpec::new(AgentKind::Gemini, "hello");
    let invocation = AgentInvocation::new(&spec, &AgentConfig::default());
    let mut process = AgentProcess::spawn_with_binary("echo", &invocation).unwrap();

    assert!(process.id().is_some());

    let mut stdout = process.take_stdout().unwrap();
    let mut output = String::new();
    stdout.read_to_string(&mut output).await.unwrap();
    let status = process.wait().await.unwrap();

    assert!(status.success());
    assert_eq!(output, "-o stream-json hello\n");
    assert!(process.take_stdout().is_none());
}
