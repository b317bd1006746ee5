//! Console output sink
//!
//! Operator-facing lines go through [`Console`]; diagnostics go to `tracing`.

use std::sync::Mutex;

use colored::Colorize;

/// Color tag for a console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleColor {
    Cyan,
    Red,
    Yellow,
}

/// Fire-and-forget sink for operator-facing lines
pub trait Console: Send + Sync {
    fn write(&self, message: &str, color: Option<ConsoleColor>);

    fn info(&self, message: &str) {
        self.write(&format!("INFO: {}", message), None);
    }

    fn warn(&self, message: &str) {
        self.write(&format!("WARN: {}", message), Some(ConsoleColor::Yellow));
    }

    fn error(&self, message: &str) {
        self.write(&format!("ERROR: {}", message), Some(ConsoleColor::Red));
    }
}

/// Wrap `text` in the terminal escape codes for `color`
pub fn colored_text(text: &str, color: ConsoleColor) -> String {
    match color {
        ConsoleColor::Cyan => text.cyan().to_string(),
        ConsoleColor::Red => text.red().to_string(),
        ConsoleColor::Yellow => text.yellow().to_string(),
    }
}

/// Prints to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn write(&self, message: &str, color: Option<ConsoleColor>) {
        match color {
            Some(color) => println!("{}", colored_text(message, color)),
            None => println!("{}", message),
        }
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct BufferConsole {
    lines: Mutex<Vec<(String, Option<ConsoleColor>)>>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages written so far, without colors
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().map(|(line, _)| line.clone()).collect(),
            Err(poisoned) => poisoned.into_inner().iter().map(|(line, _)| line.clone()).collect(),
        }
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl Console for BufferConsole {
    fn write(&self, message: &str, color: Option<ConsoleColor>) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push((message.to_string(), color));
    }
}
