//! Lock Gate
//!
//! A running game holds [`SESSION_LOCK`] inside the save directory. The file
//! is an advisory signal only: its content is never read, and the gate asks
//! a [`Confirmer`] before letting a write go ahead while it is present.

use crate::error::{Result, WorldError};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Session marker file directly inside a save directory
pub const SESSION_LOCK: &str = "session.lock";

/// Source of yes/no answers for prompts
///
/// Implemented for any `Fn(&str) -> bool` closure.
pub trait Confirmer: Send + Sync {
    /// Return `true` to proceed
    fn confirm(&self, message: &str) -> bool;
}

impl<F> Confirmer for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

/// Prints the prompt and reads one line from standard input
///
/// Only `y` or `yes` (any case) is affirmative; end of input or a read
/// error counts as no.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, message: &str) -> bool {
        print!("{}", message);
        let _ = io::stdout().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&line),
        }
    }
}

/// Answers yes to everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _message: &str) -> bool {
        true
    }
}

/// Answers no to everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeNo;

impl Confirmer for AssumeNo {
    fn confirm(&self, _message: &str) -> bool {
        false
    }
}

pub(crate) fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Whether the session marker exists directly inside `save_path`
pub fn is_locked(save_path: &Path) -> bool {
    save_path.join(SESSION_LOCK).exists()
}

/// Ask `confirmer` before touching a locked save
///
/// Unlocked saves pass without a prompt. A declined prompt fails with
/// [`WorldError::Aborted`].
pub fn gate(save_path: &Path, confirmer: &dyn Confirmer) -> Result<()> {
    if !is_locked(save_path) {
        debug!("No session marker in {:?}", save_path);
        return Ok(());
    }

    let message = format!(
        "Warning: {} exists in {}. The world may be open in the game or a server; \
         writing now can corrupt it or be overwritten. Continue anyway? [y/N]: ",
        SESSION_LOCK,
        save_path.display()
    );
    if confirmer.confirm(&message) {
        warn!("Proceeding on locked world {:?}", save_path);
        Ok(())
    } else {
        Err(WorldError::aborted(format!(
            "World at {} is in use ({} present)",
            save_path.display(),
            SESSION_LOCK
        )))
    }
}
