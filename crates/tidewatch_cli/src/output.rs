use owo_colors::OwoColorize;

/// Terminal output helpers for command results.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn section(&self, title: &str) {
        println!("{}", title.bold().bright_cyan());
    }

    pub fn print(&self, line: &str) {
        println!("{}", line);
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".bright_green(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", "!".bright_yellow(), message.yellow());
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".bright_red(), message.red());
    }

    pub fn kv(&self, key: &str, value: &str) {
        let label = format!("{:<18}", format!("{}:", key));
        println!("  {} {}", label.dimmed(), value);
    }

    pub fn status(&self, message: &str) {
        println!("  {}", message.dimmed());
    }
}
