//! `leafmate-cli` – terminal shell for the leafmate companion.
//!
//! 1. Checks for `~/.leafmate/config.toml`; runs a **First-Run Wizard** when
//!    the file is absent.
//! 2. Probes the local Ollama instance and reports available models.
//! 3. Opens the memory store and restores the saved capability choices.
//! 4. Drops the user into the **REPL**.  **Ctrl-C** interrupts a streaming
//!    reply; at the prompt it exits.

mod config;
mod ollama;
mod repl;

use colored::Colorize;
use std::sync::atomic::Ordering;
use tracing::warn;

fn main() {
    // Logs go to stderr; RUST_LOG / LEAFMATE_LOG_FORMAT / OTEL_EXPORTER_OTLP_ENDPOINT apply.
    let _telemetry = leafmate_runtime::init_tracing("leafmate");

    print_banner();

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── Ollama discovery ──────────────────────────────────────────────────
    print!("\n  Probing Ollama at {} … ", cfg.ollama_url.dimmed());
    match ollama::fetch_models(&cfg.ollama_url) {
        Ok(models) => {
            println!("{} ({} model(s) available)", "online".green(), models.len());
            if !models.iter().any(|m| m.name == cfg.active_model) {
                println!(
                    "  {} Model {} is not pulled yet. Run `{}`.",
                    "!".yellow().bold(),
                    cfg.active_model.bold(),
                    format!("ollama pull {}", cfg.active_model).bold()
                );
            }
        }
        Err(_) => {
            println!("{}", "offline".yellow());
            println!(
                "  {}  Run `{}` before chatting.",
                "No Ollama instance detected.".dimmed(),
                "ollama serve".bold()
            );
        }
    }

    // ── Memory + capabilities ─────────────────────────────────────────────
    let shell = match repl::Shell::open(cfg) {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("{}: {}", "Startup failed".red().bold(), e);
            std::process::exit(1);
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (busy, cancel) = shell.interrupt_flags();
    if let Err(e) = ctrlc::set_handler(move || {
        if busy.load(Ordering::SeqCst) {
            cancel.cancel();
        } else {
            println!();
            println!("{}", "Goodbye.".green());
            std::process::exit(0);
        }
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; replies cannot be interrupted");
    }

    println!();
    println!("  Type {} for a list of commands, or just say hello.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(shell);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().green());
    println!("{}", "  ║      Leafmate First-Run Wizard       ║".bold().green());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().green());
    println!();
    println!("  No configuration found.  Let's set up leafmate.\n");

    let mut cfg = config::Config::default();

    cfg.ollama_url = repl::prompt_str(
        &format!("  Ollama URL [{}]: ", cfg.ollama_url),
        &cfg.ollama_url,
    );
    cfg.active_model = repl::prompt_str(
        &format!("  Model [{}]: ", cfg.active_model),
        &cfg.active_model,
    );
    let speech = repl::prompt_str(
        &format!("  Text-to-speech command, or 'none' [{}]: ", cfg.speech_command),
        &cfg.speech_command,
    );
    cfg.speech_command = if speech.eq_ignore_ascii_case("none") {
        String::new()
    } else {
        speech
    };

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __            ____                 __     "#.bold().green());
    println!("{}", r#"  / /  ___ ___ _/ _/_ _  ___ _/ /____ "#.bold().green());
    println!("{}", r#" / /__/ -_) _ `/ _/  ' \/ _ `/ __/ -_)"#.bold().green());
    println!("{}", r#"/____/\__/\_,_/_//_/_/_/\_,_/\__/\__/ "#.bold().green());
    println!();
    println!(
        "  {} {}",
        "Leafmate".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  A companion that listens");
    println!();
}
