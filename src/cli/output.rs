//! Output formatting module for azure-webapp
//!
//! Provides colored output and the JSON/YAML renderings of results.

use super::OutputFormat;
use azure_webapp::modules::{ModuleOutput, ModuleStatus};
use colored::Colorize;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Colored status word for a module result
pub fn status_word(status: ModuleStatus) -> String {
    match status {
        ModuleStatus::Ok => "ok".green().to_string(),
        ModuleStatus::Changed => "changed".yellow().to_string(),
        ModuleStatus::Failed => "failed".red().bold().to_string(),
    }
}

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    format: OutputFormat,
    /// Verbosity level
    verbosity: u8,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, format: OutputFormat, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            format,
            verbosity,
            start_time: Instant::now(),
        }
    }

    /// Whether only machine-readable output goes to stdout
    fn structured(&self) -> bool {
        matches!(self.format, OutputFormat::Json | OutputFormat::Yaml)
    }

    fn quiet(&self) -> bool {
        self.structured() || self.format == OutputFormat::Minimal
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.quiet() {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{}", line);
            println!("  {}  ", title);
            println!("{}\n", line);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.quiet() {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print any serializable value as JSON or YAML
    pub fn emit<T: Serialize>(&self, value: &T) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(value).unwrap_or_default())
            }
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value).unwrap_or_default()),
            OutputFormat::Human | OutputFormat::Minimal => {}
        }
    }

    /// Print the result of a module run
    pub fn module_result(&self, module: &str, output: &ModuleOutput) {
        if self.structured() {
            self.emit(output);
            return;
        }
        if self.format == OutputFormat::Minimal {
            if output.status == ModuleStatus::Failed {
                self.error(&output.msg);
            }
            return;
        }

        let status = if self.use_color {
            status_word(output.status)
        } else {
            output.status.to_string()
        };
        let module = if self.use_color {
            module.bright_white().bold().to_string()
        } else {
            module.to_string()
        };
        println!("{}: [{}] => {}", status, module, output.msg);

        let mut keys: Vec<&String> = output.data.keys().collect();
        keys.sort();
        for key in keys {
            let value = match &output.data[key] {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => continue,
                other => other.to_string(),
            };
            if self.use_color {
                println!("    {}: {}", key.bright_black(), value);
            } else {
                println!("    {}: {}", key, value);
            }
        }

        if let Some(diff) = &output.diff {
            self.diff(&diff.before, &diff.after);
        }

        let duration = format_duration(self.start_time.elapsed());
        if self.use_color {
            println!("\n{} {}", "Run took".bright_black(), duration.bright_white());
        } else {
            println!("\nRun took {}", duration);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.structured() {
            let err = serde_json::json!({
                "type": "error",
                "message": message
            });
            eprintln!("{}", err);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.structured() {
            let warn = serde_json::json!({
                "type": "warning",
                "message": message
            });
            eprintln!("{}", warn);
            return;
        }
        if self.format == OutputFormat::Minimal {
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.quiet() {
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    /// Print a debug message (requires higher verbosity)
    pub fn debug(&self, message: &str) {
        if self.verbosity < 2 || self.quiet() {
            return;
        }

        if self.use_color {
            println!("{} {}", "DEBUG:".magenta(), message);
        } else {
            println!("DEBUG: {}", message);
        }
    }

    /// Print a diff output
    pub fn diff(&self, old: &str, new: &str) {
        println!();
        for line in old.lines() {
            if self.use_color {
                println!("{}", format!("- {}", line).red());
            } else {
                println!("- {}", line);
            }
        }
        for line in new.lines() {
            if self.use_color {
                println!("{}", format!("+ {}", line).green());
            } else {
                println!("+ {}", line);
            }
        }
        println!();
    }

    /// Print a table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if self.quiet() {
            return;
        }

        // Calculate column widths
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let header_line = render_row(headers, &widths);
        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        if self.use_color {
            println!("{}", header_line.bright_white().bold());
            println!("{}", sep.join("-+-").bright_black());
        } else {
            println!("{}", header_line);
            println!("{}", sep.join("-+-"));
        }

        for row in rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            println!("{}", render_row(&cells, &widths));
        }
    }
}

fn render_row(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Format a duration as a human-readable string
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;
        format!("{}h {}m {}s", hours, mins, secs)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}
