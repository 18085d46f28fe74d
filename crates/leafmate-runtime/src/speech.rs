//! [`CommandSpeaker`] – speech output through an external TTS program.
//!
//! The reply text is written to the program's stdin (`espeak` and most
//! `say`-style tools read it from there) and the call resolves once the
//! program exits.

use std::process::Stdio;

use async_trait::async_trait;
use leafmate_registry::Speaker;
use leafmate_types::LeafError;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Speaks by piping text into a command-line synthesiser.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    /// Parse a command line such as `"espeak -v zh"` into program and args.
    /// Returns `None` for a blank command.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    #[instrument(skip(self, text), fields(program = %self.program, chars = text.chars().count()))]
    async fn speak(&self, text: &str) -> Result<(), LeafError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LeafError::Speech(format!("cannot start '{}': {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| LeafError::Speech(format!("cannot feed '{}': {e}", self.program)))?;
            // Dropping stdin closes the pipe so the program sees EOF.
        }

        let status = child
            .wait()
            .await
            .map_err(|e| LeafError::Speech(e.to_string()))?;
        if !status.success() {
            return Err(LeafError::Speech(format!(
                "'{}' exited with {status}",
                self.program
            )));
        }
        debug!("utterance finished");
        Ok(())
    }
}
