use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tripwise_agents::{
    DialogueOrchestrator, GatewayConfig, HttpModelClient, ModelGateway, ModelRuntimeConfig,
};
use tripwise_core::extraction::parse_json_object;
use tripwise_core::{
    detect_trivial_intent, ChatMessage, ClarificationState, OutputValidator, SecurityFilter,
    TurnInput, TurnOutcome, TurnOutput, UserProfile,
};
use tripwise_observability::{init_tracing, AppMetrics};

const RECENT_MESSAGES_KEPT: usize = 16;

#[derive(Debug, Parser)]
#[command(name = "tripwise")]
#[command(about = "Tripwise conversational trip planner")]
struct Cli {
    /// Print the metrics snapshot on exit.
    #[arg(long, global = true)]
    stats: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat {
        #[arg(long, env = "TRIPWISE_PROFILE")]
        profile: Option<PathBuf>,
    },
    /// Submit a filled form (ClarificationState JSON) and generate straight away.
    Plan {
        #[arg(long)]
        form: PathBuf,
        #[arg(long, env = "TRIPWISE_PROFILE")]
        profile: Option<PathBuf>,
    },
    /// Validate and sanitize an itinerary document offline.
    Validate {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        duration: Option<String>,
    },
    /// Run the security and filler detectors on a message. No model call.
    Check { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("tripwise_cli");
    let cli = Cli::parse();
    let metrics = AppMetrics::shared();

    match cli.command {
        Command::Chat { profile } => {
            let orchestrator = build_orchestrator(metrics.clone())?;
            let profile = load_profile(profile.as_deref())?;
            run_chat(&orchestrator, profile).await?;
        }
        Command::Plan { form, profile } => {
            let orchestrator = build_orchestrator(metrics.clone())?;
            let raw = fs::read_to_string(&form)
                .with_context(|| format!("failed reading form {}", form.display()))?;
            let state: ClarificationState =
                serde_json::from_str(&raw).context("form is not a valid trip state")?;

            let output = orchestrator
                .handle_turn(TurnInput {
                    free_text_input: String::new(),
                    current_state: state,
                    recent_messages: Vec::new(),
                    user_profile: load_profile(profile.as_deref())?,
                })
                .await;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Validate { file, duration } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed reading {}", file.display()))?;
            let document = parse_json_object(&raw).ok().map(Value::Object);
            let state = ClarificationState {
                duration,
                ..Default::default()
            };

            let report = OutputValidator::new().validate(&raw, document.as_ref(), &state);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Check { text } => {
            let hit = SecurityFilter::new().check_input(&text);
            let report = json!({
                "adversarial": hit.is_some(),
                "pattern": hit.map(|hit| hit.pattern),
                "trivialIntent": detect_trivial_intent(&text),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if cli.stats {
        eprintln!("{}", serde_json::to_string_pretty(&metrics.snapshot())?);
    }

    Ok(())
}

fn build_orchestrator(metrics: Arc<AppMetrics>) -> Result<DialogueOrchestrator> {
    let runtime = ModelRuntimeConfig::from_env()
        .context("TRIPWISE_MODEL_API_KEY must be set to talk to the model")?;
    let client = HttpModelClient::new(runtime)?;
    let gateway = Arc::new(ModelGateway::new(
        Arc::new(client),
        GatewayConfig::from_env(),
        metrics.clone(),
    ));
    Ok(DialogueOrchestrator::new(gateway, metrics))
}

fn load_profile(path: Option<&Path>) -> Result<Option<UserProfile>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading profile {}", path.display()))?;
    let blob: Value = serde_json::from_str(&raw).context("profile is not valid JSON")?;
    Ok(Some(UserProfile::from_blob(&blob)))
}

async fn run_chat(orchestrator: &DialogueOrchestrator, profile: Option<UserProfile>) -> Result<()> {
    let mut state = ClarificationState::default();
    let mut recent_messages: Vec<ChatMessage> = Vec::new();

    println!("Tripwise chat mode. Empty line submits what you have so far, 'exit' quits.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        let output = orchestrator
            .handle_turn(TurnInput {
                free_text_input: message.to_string(),
                current_state: state.clone(),
                recent_messages: recent_messages.clone(),
                user_profile: profile.clone(),
            })
            .await;

        print_reply(&output);

        let reply = output.next_prompt.clone().unwrap_or_default();
        if !message.is_empty() {
            recent_messages.push(ChatMessage::user(message));
        }
        recent_messages.push(ChatMessage::assistant(reply));
        let overflow = recent_messages.len().saturating_sub(RECENT_MESSAGES_KEPT);
        recent_messages.drain(..overflow);

        state = output.updated_state;
    }

    Ok(())
}

fn print_reply(output: &TurnOutput) {
    let Some(prompt) = output.next_prompt.as_deref() else {
        return;
    };

    println!("\n{prompt}\n");
    if output.outcome == TurnOutcome::Itinerary {
        if let Some(report) = &output.validation {
            println!(
                "validation: valid={} errors={} warnings={}\n",
                report.is_valid,
                report.error_count(),
                report.warning_count()
            );
        }
    }
}
