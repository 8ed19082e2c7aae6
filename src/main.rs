//! ccg-bridge - run Codex or Gemini and normalize their JSON event streams.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ccg_bridge::bridge::{AgentKind, Bridge, BridgeError, InvocationSpec, SandboxMode};
use ccg_bridge::commands::{Configurator, SetupRequest};
use ccg_bridge::config::{AgentConfig, ConfigError, ConfigStore};

#[derive(Parser)]
#[command(
    name = "ccg-bridge",
    about = "Run the Codex or Gemini CLI and normalize its JSON output",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of ~/.ccg/config.json
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Task prompt to send to the agent.
    #[arg(short, long)]
    prompt: String,
    /// Working directory for the agent.
    #[arg(short = 'C', long)]
    workdir: Option<PathBuf>,
    /// Model to use instead of the configured one.
    #[arg(short, long)]
    model: Option<String>,
    /// Stream agent messages to stdout in real time.
    #[arg(long)]
    stream: bool,
    /// Ignore the config file and run with the agent's own settings.
    #[arg(long)]
    no_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a task via the Codex agent.
    Codex {
        #[command(flatten)]
        common: CommonArgs,
        /// Sandbox mode (default: codex default).
        #[arg(short, long, value_enum)]
        sandbox: Option<SandboxMode>,
        /// Workspace-write sandbox with automatic approval.
        #[arg(long)]
        full_auto: bool,
        /// Image file(s) to attach (can be repeated).
        #[arg(short, long)]
        image: Vec<PathBuf>,
        /// Resume a previous session by ID ("last" for the most recent).
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Execute a task via the Gemini agent.
    Gemini {
        #[command(flatten)]
        common: CommonArgs,
        /// Enable sandbox mode.
        #[arg(short, long)]
        sandbox: bool,
        /// Auto-approve all actions.
        #[arg(short, long)]
        yolo: bool,
        /// Resume a previous session ("latest" or session index).
        #[arg(short, long)]
        resume: Option<String>,
    },
    /// Check, show or set up the bridge configuration.
    Config {
        /// Check if configured (JSON output).
        #[arg(long, conflicts_with_all = ["show", "setup"])]
        check: bool,
        /// Show current config (keys masked).
        #[arg(long, conflicts_with = "setup")]
        show: bool,
        /// Set up or update the configuration.
        #[arg(long)]
        setup: bool,
        #[arg(long)]
        codex_url: Option<String>,
        #[arg(long)]
        codex_key: Option<String>,
        #[arg(long)]
        codex_model: Option<String>,
        #[arg(long)]
        gemini_url: Option<String>,
        #[arg(long)]
        gemini_key: Option<String>,
        #[arg(long)]
        gemini_model: Option<String>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn open_store(path: Option<PathBuf>) -> Result<ConfigStore, ConfigError> {
    path.map_or_else(ConfigStore::new, |p| Ok(ConfigStore::with_path(p)))
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => tracing::error!(error = %e, "Failed to render JSON"),
    }
}

/// Report a failure on stderr as a structured object and return its exit code.
fn fail(agent: Option<AgentKind>, err: &BridgeError) -> i32 {
    if matches!(err, BridgeError::Interrupted) {
        let tag = agent.map_or("ccg_bridge", AgentKind::tag);
        eprintln!("\n[{tag}] Interrupted.");
    } else {
        eprintln!("{}", err.payload());
    }
    err.exit_code()
}

async fn run_agent(
    spec: InvocationSpec,
    store: Option<PathBuf>,
    no_config: bool,
) -> Result<i32, BridgeError> {
    let agent = spec.agent();
    let config = if no_config {
        AgentConfig::default()
    } else {
        open_store(store)?.resolve(agent)?
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let streaming = spec.is_streaming();
    let bridge = Bridge::new(spec, &config).with_cancellation(cancel);
    let result = bridge.run(std::io::stdout()).await?;

    tracing::info!(
        agent = %agent,
        exit_code = result.exit_code,
        messages = result.message_count,
        "Run finished"
    );

    if !streaming {
        match result.to_json() {
            Ok(text) => println!("{text}"),
            Err(e) => tracing::error!(error = %e, "Failed to render result"),
        }
    }
    Ok(result.exit_code)
}

fn run_config(store: Option<PathBuf>, command: Commands) -> Result<i32, BridgeError> {
    let Commands::Config {
        check,
        show,
        setup,
        codex_url,
        codex_key,
        codex_model,
        gemini_url,
        gemini_key,
        gemini_model,
    } = command
    else {
        return Ok(2);
    };
    let configurator = Configurator::new(open_store(store)?);

    if check {
        let report = configurator.check()?;
        print_json(&report.report);
        return Ok(i32::from(!report.configured));
    }
    if show {
        print_json(&configurator.show()?);
        return Ok(0);
    }
    if setup {
        let request = SetupRequest {
            codex_url,
            codex_key,
            codex_model,
            gemini_url,
            gemini_key,
            gemini_model,
        };
        print_json(&configurator.setup(&request)?);
        return Ok(0);
    }

    eprintln!("Nothing to do: pass --check, --show or --setup.");
    Ok(2)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let verbose = cli.verbose > 0;

    let (agent, outcome) = match cli.command {
        Commands::Codex {
            common,
            sandbox,
            full_auto,
            image,
            session_id,
        } => {
            let mut spec = InvocationSpec::new(AgentKind::Codex, common.prompt)
                .auto_approve(full_auto)
                .stream(common.stream)
                .verbose(verbose);
            if let Some(dir) = common.workdir {
                spec = spec.workdir(dir);
            }
            if let Some(mode) = sandbox {
                spec = spec.sandbox(mode);
            }
            if let Some(model) = common.model {
                spec = spec.model(model);
            }
            if let Some(token) = session_id {
                spec = spec.resume(token);
            }
            for path in image {
                spec = spec.attach(path);
            }
            let outcome = run_agent(spec, cli.config, common.no_config).await;
            (Some(AgentKind::Codex), outcome)
        }
        Commands::Gemini {
            common,
            sandbox,
            yolo,
            resume,
        } => {
            let mut spec = InvocationSpec::new(AgentKind::Gemini, common.prompt)
                .auto_approve(yolo)
                .stream(common.stream)
                .verbose(verbose);
            if let Some(dir) = common.workdir {
                spec = spec.workdir(dir);
            }
            if sandbox {
                spec = spec.sandbox(SandboxMode::WorkspaceWrite);
            }
            if let Some(model) = common.model {
                spec = spec.model(model);
            }
            if let Some(token) = resume {
                spec = spec.resume(token);
            }
            let outcome = run_agent(spec, cli.config, common.no_config).await;
            (Some(AgentKind::Gemini), outcome)
        }
        command @ Commands::Config { .. } => (None, run_config(cli.config, command)),
    };

    let code = outcome.unwrap_or_else(|err| fail(agent, &err));
    std::process::exit(code);
}
