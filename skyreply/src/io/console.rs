//! Blocking human interaction.

use std::io::{self, BufRead, Write};

use tracing::debug;

/// Line-oriented prompt used at every human decision point.
///
/// `ask` never fails: end of input and read errors yield an empty answer,
/// which every decision point treats as a refusal.
pub trait Prompter {
    fn ask(&self, prompt: &str) -> String;
    fn say(&self, line: &str);
}

/// Prompter over the process stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioPrompter;

impl Prompter for StdioPrompter {
    fn ask(&self, prompt: &str) -> String {
        let mut stdout = io::stdout().lock();
        if write!(stdout, "{prompt}").and_then(|()| stdout.flush()).is_err() {
            debug!("stdout unavailable while prompting");
        }
        drop(stdout);

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => {
                debug!("stdin closed");
                String::new()
            }
            Ok(_) => line.trim_end_matches(['\r', '\n']).to_string(),
            Err(err) => {
                debug!(err = %err, "stdin read failed");
                String::new()
            }
        }
    }

    fn say(&self, line: &str) {
        println!("{line}");
    }
}
