//! `narrator` command line
//!
//! - `script`: compile a reply into stages and print them
//! - `chat`: interactive narrated chat against the narrator service
//! - `usage`: print the service's usage snapshot

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use narr_core::{
    next_event, AudioError, FallbackVoice, FileAudioSink, HttpBackend, Narrator, NarratorConfig,
    NarratorError, NarratorEvent, VoiceMode,
};
use narr_graph::{GraphController, GraphSnapshot, InMemoryGraphView};
use narr_script::ScriptCompiler;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");

    Command::new("narrator")
        .version(narr_core::VERSION)
        .about("Narrated chat over a knowledge graph")
        .subcommand_required(true)
        .subcommand(
            Command::new("script")
                .about("Compile an assistant reply into stages")
                .arg(
                    Arg::new("answer")
                        .long("answer")
                        .required(true)
                        .help("File holding the reply, or - for stdin"),
                )
                .arg(
                    Arg::new("graph")
                        .long("graph")
                        .value_parser(value_parser!(PathBuf))
                        .help("Graph JSON used for entity auto-linking"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                )
                .arg(config_arg.clone()),
        )
        .subcommand(
            Command::new("chat")
                .about("Interactive narrated chat")
                .arg(
                    Arg::new("graph")
                        .long("graph")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Graph JSON to discuss"),
                )
                .arg(Arg::new("job-id").long("job-id").help("Job id sent with each request"))
                .arg(
                    Arg::new("voice")
                        .long("voice")
                        .value_parser(["none", "local", "premium"])
                        .help("Voice mode"),
                )
                .arg(
                    Arg::new("audio-dir")
                        .long("audio-dir")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory that receives synthesized clips"),
                )
                .arg(config_arg.clone()),
        )
        .subcommand(
            Command::new("usage")
                .about("Print the usage snapshot")
                .arg(config_arg),
        )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("narrator=info,narr_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &ArgMatches) -> anyhow::Result<NarratorConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => NarratorConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(NarratorConfig::default()),
    }
}

fn load_graph(path: &Path) -> anyhow::Result<GraphSnapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading graph {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing graph {}", path.display()))
}

fn read_answer(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(source).with_context(|| format!("reading answer {source}"))
}

fn run_script(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let source = args
        .get_one::<String>("answer")
        .context("--answer is required")?;
    let answer = read_answer(source)?;
    let entities = match args.get_one::<PathBuf>("graph") {
        Some(path) => load_graph(path)?.graph.elements.entity_labels(),
        None => Vec::new(),
    };

    let script = ScriptCompiler::new(config.linker).compile(&answer, &entities);

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&script.stages)?);
        return Ok(());
    }

    println!("{}", script.display);
    println!();
    for (index, stage) in script.stages.iter().enumerate() {
        match &stage.command {
            Some(command) => println!("{index:>3}  {:<48} -> {command}", stage.text),
            None => println!("{index:>3}  {}", stage.text),
        }
    }
    if !script.linked_ids.is_empty() {
        println!();
        println!("auto-linked: {}", script.linked_ids.join(", "));
    }
    Ok(())
}

/// Prints what would have been spoken
struct ConsoleVoice;

#[async_trait]
impl FallbackVoice for ConsoleVoice {
    async fn speak(&self, text: &str) -> Result<(), AudioError> {
        println!("  ~ {text}");
        Ok(())
    }

    fn cancel(&self) {}
}

/// Print narrator events until the narrator is dropped
async fn print_events(mut events: broadcast::Receiver<NarratorEvent>) {
    while let Some(event) = next_event(&mut events).await {
        match event {
            NarratorEvent::ReplyReceived { display, .. } => println!("\n{display}\n"),
            NarratorEvent::FocusApplied {
                directive, applied, ..
            } => {
                let mark = if applied { "" } else { " (not in graph)" };
                println!("  [{directive}]{mark}");
            }
            NarratorEvent::TurnFailed { message, .. } => println!("\n{message}\n"),
            NarratorEvent::Cancelled { .. } => println!("  [stopping narration]"),
            _ => {}
        }
    }
}

async fn run_chat(args: &ArgMatches) -> anyhow::Result<()> {
    let mut config = load_config(args)?;
    if let Some(job_id) = args.get_one::<String>("job-id") {
        config.backend.job_id = Some(job_id.clone());
    }
    if let Some(voice) = args.get_one::<String>("voice") {
        config.playback.voice_mode = voice.parse::<VoiceMode>().map_err(anyhow::Error::msg)?;
    }
    let graph_path = args
        .get_one::<PathBuf>("graph")
        .context("--graph is required")?;
    let snapshot = load_graph(graph_path)?;

    let graph = GraphController::new(InMemoryGraphView::default());
    let mut narrator =
        Narrator::connect(graph, &config)?.with_fallback_voice(Arc::new(ConsoleVoice));
    if let Some(dir) = args.get_one::<PathBuf>("audio-dir") {
        narrator = narrator.with_audio_sink(Arc::new(FileAudioSink::new(dir)));
    }
    narrator.load_graph(snapshot)?;
    let narrator = Arc::new(narrator);

    let events = narrator.subscribe();
    tokio::spawn(print_events(events));

    println!("voice: {}  (/stop, /usage, /quit)", narrator.voice_mode());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "/quit" => break,
            "/stop" => {
                if !narrator.cancel() {
                    println!("  nothing to stop");
                }
            }
            "/usage" => match narrator.refresh_usage().await {
                Ok(stats) => println!(
                    "  total ${:.4}  saved ${:.4}  messages {}  session ${:.4}",
                    stats.total_usd,
                    stats.estimated_savings_usd,
                    stats.messages_count,
                    narrator.usage().session_cost_usd
                ),
                Err(e) => println!("  usage unavailable: {e}"),
            },
            text => {
                let narrator = Arc::clone(&narrator);
                let text = text.to_string();
                tokio::spawn(async move {
                    match narrator.send(text).await {
                        Ok(_) => {}
                        Err(NarratorError::TurnInFlight) => {
                            println!("  still narrating, /stop first");
                        }
                        Err(e) => println!("  {e}"),
                    }
                });
            }
        }
    }

    narrator.cancel();
    Ok(())
}

async fn run_usage(args: &ArgMatches) -> anyhow::Result<()> {
    use narr_core::NarratorBackend;

    let config = load_config(args)?;
    let backend = HttpBackend::new(config.backend)?;
    let stats = backend.usage().await.context("fetching usage")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("script", args)) => run_script(args),
        Some(("chat", args)) => run_chat(args).await,
        Some(("usage", args)) => run_usage(args).await,
        Some((other, _)) => bail!("unknown command: {other}"),
        None => bail!("no command given"),
    }
}
