//! Arena CLI - live AI debate arena.
//!
//! Renders the debate feed in the terminal and forwards director intents
//! (pause, interrupt, interventions, user messages) to the scheduler.

use arena_core::scheduler::ArenaEvent;
use arena_core::{
    ArenaHandle, CatalogTactics, DebateScheduler, DebateStatus, Gateway, HttpTransport,
    Intervention, KokoroSpeech, NullSpeech, Persona, SessionConfig, Side, Speaker, SpeechSink,
    default_config,
};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "arena",
    version,
    about = "AI Arena - watch two AI personas debate live",
    long_about = "Runs a self-perpetuating debate between two AI personas with live \
                  director controls. Generation goes through the arena-relay endpoint."
)]
struct Cli {
    /// The topic to debate
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// Debate language
    #[arg(long, default_value = "English")]
    language: String,

    /// Name for side A (red)
    #[arg(long, default_value = "Nova")]
    name_a: String,
    /// Stance/role for side A
    #[arg(long, default_value = "Pro")]
    role_a: String,
    /// Tone for side A
    #[arg(long, default_value = "confident")]
    tone_a: String,
    /// Comma-separated traits for side A
    #[arg(long, default_value = "witty, sharp-tongued")]
    traits_a: String,

    /// Name for side B (blue)
    #[arg(long, default_value = "Rex")]
    name_b: String,
    /// Stance/role for side B
    #[arg(long, default_value = "Contra")]
    role_b: String,
    /// Tone for side B
    #[arg(long, default_value = "gruff")]
    tone_b: String,
    /// Comma-separated traits for side B
    #[arg(long, default_value = "blunt, sarcastic")]
    traits_b: String,

    /// Cosmetic model badge shown next to side A
    #[arg(long, default_value = "Quantum-9")]
    model_label_a: String,
    /// Cosmetic model badge shown next to side B
    #[arg(long, default_value = "Deep-Mind-X")]
    model_label_b: String,

    /// Override the relay endpoint from the config
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Path to a TOML config file (embedded defaults otherwise)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Synthesize speech for each utterance (WAV files in --audio-dir)
    #[arg(long)]
    speak: bool,

    /// Output directory for synthesized audio
    #[arg(long, default_value = "arena-audio")]
    audio_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => arena_core::Config::load(path)?,
        None => default_config(),
    };
    let endpoint = cli
        .endpoint
        .clone()
        .unwrap_or_else(|| config.generation.endpoint.clone());

    let session = SessionConfig {
        topic: cli.topic.clone(),
        language: cli.language.clone(),
        persona_a: Persona::new(&cli.name_a, &cli.role_a, &cli.tone_a, &cli.traits_a)
            .with_accent_color("red"),
        persona_b: Persona::new(&cli.name_b, &cli.role_b, &cli.tone_b, &cli.traits_b)
            .with_accent_color("blue"),
        model_label_a: cli.model_label_a.clone(),
        model_label_b: cli.model_label_b.clone(),
    };

    print_header(&cli, &session);

    let transport = Arc::new(HttpTransport::new(endpoint)?);
    let gateway = Arc::new(Gateway::new(
        transport,
        config.generation.model.clone(),
        config.content.fallbacks.clone(),
    ));
    let tactics = Arc::new(CatalogTactics::new(config.content.tactics.clone()));
    let speech: Arc<dyn SpeechSink> = if cli.speak {
        println!(
            "{}",
            format!("  Audio will be written to {}", cli.audio_dir.display()).dimmed()
        );
        Arc::new(KokoroSpeech::new(config.voices.clone(), cli.audio_dir.clone()).await?)
    } else {
        Arc::new(NullSpeech)
    };

    let (scheduler, handle) = DebateScheduler::new(session, gateway, tactics, speech);
    let scheduler = scheduler.with_callback(create_console_callback(
        cli.name_a.clone(),
        cli.name_b.clone(),
    ));
    let run_task = tokio::spawn(scheduler.run());

    let winner = command_loop(&handle, &cli).await;
    drop(handle);

    let transcript = run_task.await?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    match winner {
        Some(name) => println!("{}", format!("  🏆 Winner: {}", name).bright_green().bold()),
        None => println!("{}", "  Debate concluded.".bright_green().bold()),
    }
    println!(
        "{}",
        format!("  {} entries in the transcript.", transcript.len()).dimmed()
    );
    println!("{}", "═".repeat(70).bright_blue());
    Ok(())
}

/// Read director intents from stdin until quit; returns the selected
/// winner's name, if the show went through winner selection.
async fn command_loop(handle: &ArenaHandle, cli: &Cli) -> Option<String> {
    println!(
        "{}",
        "  Commands: pause · resume · interrupt · enrage · confuse · chaos · say <text> · end · quit"
            .dimmed()
    );
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut awaiting_winner = false;

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();

        if awaiting_winner {
            return match line.to_lowercase().as_str() {
                "a" => Some(cli.name_a.clone()),
                "b" => Some(cli.name_b.clone()),
                "draw" => None,
                _ => {
                    println!("{}", "  Pick one of: a, b, draw".yellow());
                    continue;
                }
            };
        }

        match line.split_once(' ') {
            Some(("say", text)) => handle.say(text),
            _ => match line.as_str() {
                "" => {}
                "pause" => handle.pause(),
                "resume" => handle.resume(),
                "interrupt" => handle.interrupt(),
                "enrage" => handle.intervene(Intervention::Enrage),
                "confuse" => handle.intervene(Intervention::Confuse),
                "chaos" => handle.intervene(Intervention::Chaos),
                "end" => {
                    handle.end();
                    awaiting_winner = true;
                    println!();
                    println!(
                        "{}",
                        format!("  Who won? [a] {} · [b] {} · draw", cli.name_a, cli.name_b).bold()
                    );
                }
                "quit" | "exit" => break,
                other => println!("{}", format!("  Unknown command: {}", other).yellow()),
            },
        }
    }

    None
}

fn print_header(cli: &Cli, session: &SessionConfig) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - live debate", "AI Arena".bold())
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), session.topic.bright_white());
    println!("{} {}", "Language:".bold(), session.language);
    println!();
    println!(
        "  {} ({}) - {}",
        session.persona_b.name.bright_blue(),
        session.persona_b.role.yellow(),
        cli.model_label_b.dimmed()
    );
    println!("  {}", "vs".dimmed());
    println!(
        "  {} ({}) - {}",
        session.persona_a.name.bright_red(),
        session.persona_a.role.yellow(),
        cli.model_label_a.dimmed()
    );
    println!();
    println!("{}", "─".repeat(70).dimmed());
}

/// Create a callback that prints arena events to the console.
fn create_console_callback(
    name_a: String,
    name_b: String,
) -> Box<dyn Fn(ArenaEvent) + Send + Sync> {
    Box::new(move |event| match event {
        ArenaEvent::EntryPending { entry } => {
            println!(
                "{}",
                format!("  {} is thinking...", entry.display_name).dimmed()
            );
        }
        ArenaEvent::EntryFinalized { entry } => {
            let label = match entry.speaker {
                Speaker::Side(Side::A) => format!("▶ {}", name_a).bright_red().bold(),
                Speaker::Side(Side::B) => format!("▶ {}", name_b).bright_blue().bold(),
                Speaker::User => format!("▶ {}", entry.display_name).bright_green().bold(),
                Speaker::System => format!("📢 {}", entry.display_name).bright_magenta().bold(),
            };
            println!("{}", label);
            for line in textwrap(&entry.text, 66).lines() {
                println!("  {}", line);
            }
            println!();
        }
        ArenaEvent::EntryRemoved { .. } => {
            println!("{}", "  (turn discarded)".dimmed());
        }
        ArenaEvent::StatusChanged { status } => {
            let notice = match status {
                DebateStatus::Running => "▶ running".bright_green(),
                DebateStatus::Paused => "⏸ paused".yellow(),
                DebateStatus::Stopped => "🛑 show over".bright_red(),
            };
            println!("  {}", notice.bold());
        }
        ArenaEvent::SpeakerChanged { .. } => {}
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
