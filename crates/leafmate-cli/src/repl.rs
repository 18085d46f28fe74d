//! REPL – Read-Eval-Print Loop for the leafmate companion shell.
//!
//! Any line that does not start with `/` is said to the companion.
//! Supported slash-commands:
//!   /help                      – show this list
//!   /apis                      – list every capability slot and its entries
//!   /use <slot> <name>         – switch a slot and remember the choice
//!   /models                    – list / switch the active Ollama model
//!   /memory                    – show what the companion remembers
//!   /export [dir]              – write memory to a timestamped JSON file
//!   /reset                     – erase all memory (asks for confirmation)
//!   /history                   – show the current conversation
//!   /clear                     – delete the current conversation
//!   /avatar                    – show the active Live2D figure
//!   /quit | /exit              – leave the shell

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use leafmate_memory::{MemoryBook, MemoryStore, RESET_CONFIRMATION};
use leafmate_registry::ApiRegistry;
use leafmate_runtime::apis::{CHAT_OLLAMA, ollama_from};
use leafmate_runtime::{
    CancelHandle, ChatSession, apply_saved_defaults, default_registry, select_and_persist,
};
use leafmate_types::{CapabilityKind, LongTermMemory, Role, ShortTermMemory};
use tracing::warn;

use crate::config::{self, Config};
use crate::ollama;

/// Element id the avatar is mounted into.
const AVATAR_MOUNT: &str = "leafmate-live2d";

// ─────────────────────────────────────────────────────────────────────────────
// Command parsing
// ─────────────────────────────────────────────────────────────────────────────

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    Apis,
    /// `name` is everything after the slot, so it may contain spaces.
    Use { slot: &'a str, name: &'a str },
    Models,
    Memory,
    Export(Option<&'a str>),
    Reset,
    History,
    Clear,
    Avatar,
    Quit,
    Say(&'a str),
    Unknown(&'a str),
}

/// Parse a trimmed, non-empty input line.
pub fn parse_command(line: &str) -> Command<'_> {
    if !line.starts_with('/') {
        return Command::Say(line);
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    match head {
        "/help" => Command::Help,
        "/apis" => Command::Apis,
        "/use" => {
            let (slot, name) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Command::Use {
                slot,
                name: name.trim(),
            }
        }
        "/models" => Command::Models,
        "/memory" => Command::Memory,
        "/export" => Command::Export((!rest.is_empty()).then_some(rest)),
        "/reset" => Command::Reset,
        "/history" => Command::History,
        "/clear" => Command::Clear,
        "/avatar" => Command::Avatar,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(line),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shell state
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the REPL operates on.
pub struct Shell {
    cfg: Config,
    registry: ApiRegistry,
    book: MemoryBook,
    session: ChatSession,
    /// Set while a reply is streaming.
    busy: Arc<AtomicBool>,
    rt: tokio::runtime::Runtime,
}

impl Shell {
    /// Open the memory store under the configured data directory and build
    /// the registry, restoring the saved per-slot choices.
    pub fn open(cfg: Config) -> Result<Self, String> {
        let data_dir = cfg.data_dir();
        let store = MemoryStore::open_in(&data_dir)
            .map_err(|e| format!("Failed to open memory at {}: {}", data_dir.display(), e))?;
        let store = Arc::new(store);

        let mut registry = default_registry(&cfg.api_config(), Arc::clone(&store));
        if let Err(e) = apply_saved_defaults(&mut registry, &store) {
            warn!(error = %e, "saved defaults could not be read; using built-in defaults");
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to start async runtime: {}", e))?;

        Ok(Self {
            cfg,
            registry,
            book: MemoryBook::new(store),
            session: ChatSession::new(),
            busy: Arc::new(AtomicBool::new(false)),
            rt,
        })
    }

    /// Busy flag and cancel handle for the Ctrl-C handler.
    pub fn interrupt_flags(&self) -> (Arc<AtomicBool>, CancelHandle) {
        (Arc::clone(&self.busy), self.session.cancel_handle())
    }

    fn companion_name(&self) -> &str {
        self.registry.current_name(CapabilityKind::AvatarLoader)
    }
}

/// Entry point for the interactive REPL.
///
/// Returns on `/quit`, `/exit` or end of input.
pub fn run(mut shell: Shell) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", "you>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match parse_command(input) {
            Command::Help => cmd_help(),
            Command::Apis => shell.cmd_apis(),
            Command::Use { slot, name } => shell.cmd_use(slot, name),
            Command::Models => shell.cmd_models(),
            Command::Memory => shell.cmd_memory(),
            Command::Export(dir) => shell.cmd_export(dir),
            Command::Reset => shell.cmd_reset(),
            Command::History => shell.cmd_history(),
            Command::Clear => shell.cmd_clear(),
            Command::Avatar => shell.cmd_avatar(),
            Command::Say(text) => shell.say(text),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Command::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Leafmate Commands".bold().underline());
    println!("  {}             – list capability slots and entries", "/apis".bold().cyan());
    println!("  {} – switch a slot (chat, speak, store, live2d)", "/use <slot> <name>".bold().cyan());
    println!("  {}           – list and switch Ollama models", "/models".bold().cyan());
    println!("  {}           – show remembered facts and summaries", "/memory".bold().cyan());
    println!("  {}     – export memory to a JSON file", "/export [dir]".bold().cyan());
    println!("  {}            – erase all memory", "/reset".bold().cyan());
    println!("  {}          – show this conversation", "/history".bold().cyan());
    println!("  {}            – delete this conversation", "/clear".bold().cyan());
    println!("  {}           – show the active Live2D figure", "/avatar".bold().cyan());
    println!("  {}      – exit", "/quit  /exit".bold().cyan());
    println!("  Anything else is said to the companion. Ctrl-C interrupts a reply.");
    println!();
}

impl Shell {
    fn say(&mut self, text: &str) {
        print!("{} ", format!("{}>", self.companion_name()).bold().green());
        io::stdout().flush().ok();

        self.busy.store(true, Ordering::SeqCst);
        let result = self.rt.block_on(self.session.converse(&self.registry, text, |fragment| {
            print!("{fragment}");
            io::stdout().flush().ok();
        }));
        self.busy.store(false, Ordering::SeqCst);
        println!();

        match result {
            Ok(outcome) if outcome.cancelled => println!("{}", "  (interrupted)".dimmed()),
            Ok(_) => {}
            Err(e) => {
                println!("{}: {}", "Reply failed".red(), e);
                println!("  Your message was kept; try again when the backend is back.");
            }
        }
    }

    fn cmd_apis(&self) {
        println!("{}", "Capabilities".bold().underline());
        for kind in CapabilityKind::ALL {
            let active = self.registry.current_name(kind);
            println!("  {}", kind.to_string().bold());
            for name in self.registry.list_names(kind) {
                let marker = if name == active { "▶" } else { " " };
                println!("    {} {}", marker.green(), name);
            }
        }
    }

    fn cmd_use(&mut self, slot: &str, name: &str) {
        let kind: CapabilityKind = match slot.parse() {
            Ok(kind) => kind,
            Err(e) => {
                println!("{}: {}", "Error".red(), e);
                println!("  Usage: /use <chat|speak|store|live2d> <name>");
                return;
            }
        };
        if name.is_empty() {
            println!("  Usage: /use {} <name>", kind);
            return;
        }
        let store = Arc::clone(self.book.store());
        match select_and_persist(&mut self.registry, &store, kind, name) {
            Ok(true) => println!("{} {} → {}", "✓".green().bold(), kind, name.bold()),
            Ok(false) => println!(
                "{} '{}' for {}. Try /apis.",
                "Unknown entry".red(),
                name.yellow(),
                kind
            ),
            Err(e) => println!("{}: {}", "Selected, but could not be saved".yellow(), e),
        }
    }

    fn cmd_models(&mut self) {
        println!("{}", "AI Models".bold().underline());
        println!("  Active model : {}", self.cfg.active_model.yellow());
        print!("  Probing Ollama at {} … ", self.cfg.ollama_url.dimmed());
        io::stdout().flush().ok();

        let models = match ollama::fetch_models(&self.cfg.ollama_url) {
            Ok(models) if models.is_empty() => {
                println!("{}", "no models found".yellow());
                println!("  Run `ollama pull {}` to download a model.", self.cfg.active_model);
                return;
            }
            Ok(models) => models,
            Err(e) => {
                println!("{}", "offline".red());
                println!("  {}", e.dimmed());
                println!("  Is Ollama running?  Try: ollama serve");
                return;
            }
        };

        println!("{}", "online".green());
        println!("  Available local models:");
        for m in &models {
            let marker = if m.name == self.cfg.active_model { "▶" } else { " " };
            println!("    {} {}", marker.green(), m.name.bold());
        }

        let current = self.cfg.active_model.clone();
        let new_model = prompt_str(&format!("  Switch to model [{}]: ", current), &current);
        if new_model == current {
            return;
        }
        if !models.iter().any(|m| m.name == new_model) {
            println!("{} '{}'", "Unknown model:".red(), new_model.yellow());
            return;
        }

        self.cfg.active_model = new_model.clone();
        self.registry
            .register_chat(CHAT_OLLAMA, Arc::new(ollama_from(&self.cfg.api_config())));
        match config::save(&self.cfg) {
            Ok(()) => println!("{} {}", "✓ Active model set to".green(), new_model.bold()),
            Err(e) => println!("{}: {}", "Model switched but not saved".yellow(), e),
        }
    }

    fn cmd_memory(&self) {
        let snapshot = match self.book.snapshot() {
            Ok(s) => s,
            Err(e) => {
                println!("{}: {}", "Error reading memory".red(), e);
                return;
            }
        };

        println!("{}", "Memory".bold().underline());
        if snapshot.is_empty() {
            println!("  {}", "Nothing remembered yet.".dimmed());
            return;
        }
        println!("  {}", "About me".bold());
        println!("    {}", snapshot.memory_about_self.as_deref().unwrap_or("–"));
        println!("  {}", "About you".bold());
        println!("    {}", snapshot.memory_about_user.as_deref().unwrap_or("–"));
        println!("  {}", "Earlier conversations".bold());
        if snapshot.long_term_memory.is_empty() {
            println!("    –");
        }
        for memory in &snapshot.long_term_memory {
            print_long_term(memory);
        }
    }

    fn cmd_export(&self, dir: Option<&str>) {
        let dir = dir.map(PathBuf::from).unwrap_or_else(|| self.cfg.export_dir());
        match self.book.export_all(&dir) {
            Ok(path) => println!(
                "{} {}",
                "✓ Memory exported to".green(),
                path.display().to_string().bold()
            ),
            Err(e) => println!("{}: {}", "Export failed".red(), e),
        }
    }

    fn cmd_reset(&self) {
        println!(
            "{}",
            "This erases everything the companion remembers about you and itself.".yellow().bold()
        );
        println!("  Type {} to confirm, anything else to cancel.", RESET_CONFIRMATION.bold());
        let answer = prompt_raw("  > ");
        match self.book.reset_all(&answer) {
            Ok(()) => println!("{}", "✓ All memory erased.".green()),
            Err(leafmate_memory::MemoryError::ConfirmationMismatch) => {
                println!("  {}", "Cancelled; nothing was erased.".dimmed())
            }
            Err(e) => println!("{}: {}", "Reset failed".red(), e),
        }
    }

    fn cmd_history(&self) {
        let storage = self.registry.chat_storage();
        let log = match self.rt.block_on(storage.load_chat()) {
            Ok(log) => log,
            Err(e) => {
                println!("{}: {}", "Error loading conversation".red(), e);
                return;
            }
        };
        if log.is_empty() {
            println!("  {}", "No conversation yet.".dimmed());
            return;
        }
        for turn in &log {
            print_turn(turn, self.companion_name());
        }
    }

    fn cmd_clear(&self) {
        let storage = self.registry.chat_storage();
        match self.rt.block_on(storage.delete_chat()) {
            Ok(()) => println!("{}", "✓ Conversation cleared.".green()),
            Err(e) => println!("{}: {}", "Clear failed".red(), e),
        }
    }

    fn cmd_avatar(&self) {
        match self.registry.avatar().load(AVATAR_MOUNT) {
            Ok(model) => {
                println!("{}", self.companion_name().bold().underline());
                println!("  model    : {}", model.model_path);
                println!("  scale    : {}", model.scale);
                println!("  offset   : ({}, {})", model.position.0, model.position.1);
                println!("  docked   : {:?}", model.docked);
                println!("  mobile   : {}", model.mobile_display);
            }
            Err(e) => println!("{}: {}", "Avatar failed to load".red(), e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn print_long_term(memory: &LongTermMemory) {
    println!("    {}  {}", memory.label().dimmed(), memory.summary);
}

fn print_turn(turn: &ShortTermMemory, companion: &str) {
    let time = chrono::DateTime::from_timestamp_millis(turn.timestamp)
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_default();
    let who = match turn.role {
        Role::User => "you".cyan(),
        Role::Assistant => companion.green(),
        Role::System => "system".dimmed(),
    };
    println!("  {} {}: {}", time.dimmed(), who.bold(), turn.content);
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_str(msg: &str, default: &str) -> String {
    let raw = prompt_raw(msg);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Prompt for a line, stripping only the line terminator.
fn prompt_raw(msg: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => line.trim_end_matches(['\r', '\n']).to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_said() {
        assert_eq!(parse_command("今天好累"), Command::Say("今天好累"));
    }

    #[test]
    fn use_keeps_spaces_in_entry_name() {
        assert_eq!(
            parse_command("/use speak Command TTS"),
            Command::Use {
                slot: "speak",
                name: "Command TTS"
            }
        );
        assert_eq!(
            parse_command("/use live2d"),
            Command::Use {
                slot: "live2d",
                name: ""
            }
        );
    }

    #[test]
    fn export_directory_is_optional() {
        assert_eq!(parse_command("/export"), Command::Export(None));
        assert_eq!(parse_command("/export /tmp/out"), Command::Export(Some("/tmp/out")));
    }

    #[test]
    fn simple_commands_parse() {
        assert_eq!(parse_command("/help"), Command::Help);
        assert_eq!(parse_command("/apis"), Command::Apis);
        assert_eq!(parse_command("/models"), Command::Models);
        assert_eq!(parse_command("/memory"), Command::Memory);
        assert_eq!(parse_command("/reset"), Command::Reset);
        assert_eq!(parse_command("/history"), Command::History);
        assert_eq!(parse_command("/clear"), Command::Clear);
        assert_eq!(parse_command("/avatar"), Command::Avatar);
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("/exit"), Command::Quit);
    }

    #[test]
    fn unknown_slash_command_is_reported() {
        assert_eq!(parse_command("/dance now"), Command::Unknown("/dance now"));
    }

    #[test]
    fn shell_opens_store_under_data_dir() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let cfg = Config {
            data_dir: Some(dir.path().join("data")),
            ..Config::default()
        };
        let shell = Shell::open(cfg).expect("open");
        assert_eq!(shell.companion_name(), "小叶子");
        assert_eq!(
            shell.registry.current_name(CapabilityKind::SpeechSynthesis),
            leafmate_registry::SPEECH_OFF
        );
    }
}
