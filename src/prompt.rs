//! Confirmation prompts.
//!
//! The core never talks to the terminal itself; it asks a [`Prompt`].
//! [`TermPrompt`] is the interactive implementation, [`ScriptedPrompt`]
//! replays canned answers.

use anyhow::{bail, Context, Result};
use console::{style, Term};
use std::collections::VecDeque;

/// Invalid answers tolerated before giving up, so closed input cannot loop forever.
const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    /// Parse a typed answer: `y`, `yes`, `n`, `no` in any case.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(Self::Yes),
            "n" | "no" => Some(Self::No),
            _ => None,
        }
    }
}

/// Blocking yes/no questions put to the listener.
pub trait Prompt {
    /// Did the user recently listen to `album` by `artist`?
    fn ask_listened_recently(&mut self, album: &str, artist: &str) -> Result<Answer>;

    /// Has the user finished the current `album`?
    fn ask_finished_current(&mut self, album: &str) -> Result<Answer>;
}

/// Prompts on the controlling terminal.
pub struct TermPrompt {
    term: Term,
}

impl Default for TermPrompt {
    fn default() -> Self {
        Self { term: Term::stdout() }
    }
}

impl TermPrompt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ask(&self, question: &str) -> Result<Answer> {
        for _ in 0..MAX_ATTEMPTS {
            self.term
                .write_str(&format!("{} {} ", question, style("[y/n]").dim()))
                .context("Failed to write prompt")?;
            let line = self.term.read_line().context("Failed to read answer")?;
            if let Some(answer) = Answer::parse(&line) {
                return Ok(answer);
            }
            self.term
                .write_line(&format!("{}", style("Please answer y or n.").yellow()))
                .context("Failed to write prompt")?;
        }
        bail!("No valid answer after {MAX_ATTEMPTS} attempts")
    }

    /// Show a numbered menu and return the chosen index, or `None` on empty
    /// input.
    pub fn menu(&self, title: &str, items: &[&str]) -> Result<Option<usize>> {
        self.term
            .write_line(&format!("\n{}", style(title).bold()))
            .context("Failed to write menu")?;
        for (i, item) in items.iter().enumerate() {
            self.term
                .write_line(&format!("  {} {item}", style(format!("{}.", i + 1)).cyan()))
                .context("Failed to write menu")?;
        }

        for _ in 0..MAX_ATTEMPTS {
            self.term.write_str("> ").context("Failed to write menu")?;
            let line = self.term.read_line().context("Failed to read choice")?;
            let line = line.trim();
            if line.is_empty() {
                return Ok(None);
            }
            match line.parse::<usize>() {
                Ok(n) if (1..=items.len()).contains(&n) => return Ok(Some(n - 1)),
                _ => self
                    .term
                    .write_line(&format!("{}", style(format!("Choose 1-{}.", items.len())).yellow()))
                    .context("Failed to write menu")?,
            }
        }
        bail!("No valid choice after {MAX_ATTEMPTS} attempts")
    }
}

impl Prompt for TermPrompt {
    fn ask_listened_recently(&mut self, album: &str, artist: &str) -> Result<Answer> {
        self.ask(&format!(
            "Have you listened to {} by {} recently?",
            style(album).green().bold(),
            style(artist).green()
        ))
    }

    fn ask_finished_current(&mut self, album: &str) -> Result<Answer> {
        self.ask(&format!("Have you finished {}?", style(album).green().bold()))
    }
}

/// Replays a fixed sequence of answers and records every question.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<Answer>,
    /// Questions asked so far, as `listened:<album>:<artist>` or `finished:<album>`.
    pub asked: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    fn next(&mut self, question: String) -> Result<Answer> {
        let answer = self
            .answers
            .pop_front()
            .with_context(|| format!("No scripted answer left for {question}"))?;
        self.asked.push(question);
        Ok(answer)
    }
}

impl Prompt for ScriptedPrompt {
    fn ask_listened_recently(&mut self, album: &str, artist: &str) -> Result<Answer> {
        self.next(format!("listened:{album}:{artist}"))
    }

    fn ask_finished_current(&mut self, album: &str) -> Result<Answer> {
        self.next(format!("finished:{album}"))
    }
}
