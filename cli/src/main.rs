//! CLI entrypoint for consensus-engine
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use consensus_application::{
    DiscussionStore, NoProgress, ProgressSink, RunDiscussionError, RunDiscussionUseCase,
};
use consensus_domain::{
    ConfigIssue, DiscussionId, DiscussionOutcome, OutputFormat as Format, StageSettings,
    StageType,
};
use consensus_infrastructure::{
    AgentFactory, ConfigLoader, FileAgentConfig, FileConfig, FileStorageConfig,
    InMemoryDiscussionStore, JsonlDiscussionStore, check_credentials,
};
use consensus_presentation::{
    Cli, Command, ConsoleFormatter, OutputFormat, ProgressReporter, SimpleProgress,
};
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status after Ctrl-C, as shells report SIGINT
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting consensus-engine");

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };

    if cli.no_color || !config.output.color {
        ConsoleFormatter::disable_color();
    }

    match cli.command {
        Command::Discuss {
            prompt,
            output,
            no_store,
        } => discuss(&config, prompt, output, no_store, cli.quiet).await,
        Command::Show { id, output } => show(&config, id, output)
            .await
            .map(|()| ExitCode::SUCCESS),
        Command::List => list(&config).await.map(|()| ExitCode::SUCCESS),
        Command::Config => {
            show_config(&config, cli.config.as_deref());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initialize logging from the verbosity level, or `RUST_LOG` when no `-v`
/// is given. The returned guard flushes the log file on drop.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .with_context(|| format!("invalid log file path: {}", path.display()))?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)
        .with_context(|| format!("could not create log directory {}", directory.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

/// Print issues; fail if any of them is an error
fn check_issues(issues: &[ConfigIssue]) -> Result<()> {
    if issues.is_empty() {
        return Ok(());
    }
    eprint!("{}", ConsoleFormatter::format_issues(issues));
    let errors = issues.iter().filter(|i| i.is_error()).count();
    if errors > 0 {
        bail!("configuration has {} error(s)", errors);
    }
    Ok(())
}

fn api_key(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Agents that take part, in configuration order
fn participants(config: &FileConfig) -> Vec<FileAgentConfig> {
    let mut agents = config.effective_agents();
    agents.truncate(config.engine.max_agents);
    agents
}

fn open_store(storage: &FileStorageConfig, no_store: bool) -> Result<Arc<dyn DiscussionStore>> {
    if no_store || !storage.enabled {
        info!("Discussion storage disabled, keeping records in memory");
        return Ok(Arc::new(InMemoryDiscussionStore::new()));
    }
    open_persistent_store(storage)
}

fn open_persistent_store(storage: &FileStorageConfig) -> Result<Arc<dyn DiscussionStore>> {
    if !storage.enabled {
        bail!("discussion storage is disabled ([storage] enabled = false)");
    }
    let directory = storage
        .resolved_directory()
        .context("could not determine a data directory; set [storage] directory")?;
    info!("Using discussion store at {}", directory.display());
    Ok(Arc::new(JsonlDiscussionStore::new(&directory)?))
}

async fn discuss(
    config: &FileConfig,
    prompt: String,
    output: Option<OutputFormat>,
    no_store: bool,
    quiet: bool,
) -> Result<ExitCode> {
    let prompt = if prompt == "-" {
        std::io::read_to_string(std::io::stdin()).context("failed to read prompt from stdin")?
    } else {
        prompt
    };

    let agent_configs = participants(config);
    let mut issues = config.validate();
    issues.extend(check_credentials(&agent_configs, api_key));
    check_issues(&issues)?;

    let (protocol, _) = config.protocol.to_protocol_config();
    let agents = AgentFactory::build(&agent_configs, api_key)?;
    let store = open_store(&config.storage, no_store)?;

    // Ctrl-C cancels the discussion; it is closed without consensus
    let cancellation = CancellationToken::new();
    let token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling discussion");
            token.cancel();
        }
    });

    let use_case = RunDiscussionUseCase::new(agents, Arc::clone(&store), Arc::new(protocol))
        .with_params(config.engine.to_engine_params())
        .with_cancellation(cancellation);

    let progress: Arc<dyn ProgressSink> = if quiet {
        Arc::new(NoProgress)
    } else if std::io::stderr().is_terminal() {
        Arc::new(ProgressReporter::new())
    } else {
        Arc::new(SimpleProgress)
    };

    let result = use_case.execute_with_progress(&prompt, progress).await;
    let Some(outcome) = unless_cancelled(result)? else {
        eprintln!("Discussion cancelled.");
        return Ok(ExitCode::from(EXIT_CANCELLED));
    };

    let format: Format = output
        .map(Into::into)
        .or(config.output.format)
        .unwrap_or_default();

    let transcript = if format == Format::Full {
        match store.load_discussion(outcome.discussion_id).await {
            Ok(transcript) => Some(transcript),
            Err(e) => {
                warn!("Could not load transcript: {}", e);
                None
            }
        }
    } else {
        None
    };

    println!(
        "{}",
        ConsoleFormatter::format(&outcome, transcript.as_ref(), &prompt, format)
    );
    Ok(ExitCode::SUCCESS)
}

/// `None` when the run was cancelled; other failures stay errors
fn unless_cancelled(
    result: Result<DiscussionOutcome, RunDiscussionError>,
) -> Result<Option<DiscussionOutcome>> {
    match result {
        Ok(outcome) => Ok(Some(outcome)),
        Err(RunDiscussionError::Cancelled) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn show(config: &FileConfig, id: DiscussionId, output: Option<OutputFormat>) -> Result<()> {
    let store = open_persistent_store(&config.storage)?;
    let transcript = store.load_discussion(id).await?;
    let text = match output {
        Some(OutputFormat::Json) => ConsoleFormatter::format_transcript_json(&transcript),
        _ => ConsoleFormatter::format_transcript(&transcript),
    };
    println!("{}", text);
    Ok(())
}

async fn list(config: &FileConfig) -> Result<()> {
    let store = open_persistent_store(&config.storage)?;
    let discussions = store.list_discussions().await?;
    print!("{}", ConsoleFormatter::format_list(&discussions));
    Ok(())
}

fn stage_line(settings: &StageSettings) -> String {
    format!(
        "{:<24} confidence >= {:.2}, max {}s, {}+ agents{}",
        settings.name(),
        settings.required_confidence,
        settings.max_duration.as_secs(),
        settings.min_participants,
        if settings.evidence_required {
            ", evidence expected"
        } else {
            ""
        }
    )
}

fn show_config(config: &FileConfig, explicit: Option<&Path>) {
    println!("Configuration sources (highest priority first):");
    for line in ConfigLoader::describe_sources(explicit) {
        println!("  {}", line);
    }

    let (protocol, _) = config.protocol.to_protocol_config();
    println!();
    println!(
        "Protocol: similarity threshold {:.2}",
        protocol.similarity_threshold()
    );
    for stage in StageType::ALL {
        println!("  {}", stage_line(protocol.stage(stage)));
    }

    println!();
    println!(
        "Agents ({} to {} take part):",
        config.engine.min_agents, config.engine.max_agents
    );
    for agent in config.effective_agents() {
        let key = if api_key(agent.api_key_env()).is_some_and(|k| !k.trim().is_empty()) {
            "set"
        } else {
            "missing"
        };
        println!(
            "  {:<12} {:<10} {:<28} {} ({})",
            agent.name,
            agent.provider,
            agent.model(),
            agent.api_key_env(),
            key
        );
    }

    match config.storage.resolved_directory() {
        Some(dir) if config.storage.enabled => println!("\nStorage: {}", dir.display()),
        _ => println!("\nStorage: disabled"),
    }

    let issues = config.validate();
    if !issues.is_empty() {
        println!();
        print!("{}", ConsoleFormatter::format_issues(&issues));
    }
}
