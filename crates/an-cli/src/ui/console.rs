//! Crossterm-styled implementation of the core `Reporter` trait.

use std::io::{self, Write};

use crossterm::style::Stylize;

use an_core::Reporter;
use an_schema::{FormulaName, Version};

/// Console reporter used by all interactive commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        println!();
        println!("  {}", title.white().bold());
    }

    fn downloading(&self, name: &FormulaName, version: &Version, current: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => {
                let pct = (current as f64 / total as f64 * 100.0).min(100.0);
                print!(
                    "\r  {} {} {} / {} ({pct:.0}%)",
                    name.as_str().white(),
                    version.as_str().dark_grey(),
                    format_size(current),
                    format_size(total),
                );
            }
            _ => {
                print!(
                    "\r  {} {} {}",
                    name.as_str().white(),
                    version.as_str().dark_grey(),
                    format_size(current),
                );
            }
        }
        io::stdout().flush().ok();
        if total.is_some_and(|t| current >= t && t > 0) {
            println!();
        }
    }

    fn installing(&self, name: &FormulaName, version: &Version) {
        println!(
            "  {} {} running install script...",
            name.as_str().white(),
            version.as_str().dark_grey()
        );
    }

    fn verifying(&self, name: &FormulaName, version: &Version) {
        println!(
            "  {} {} running smoke test...",
            name.as_str().white(),
            version.as_str().dark_grey()
        );
    }

    fn removing(&self, name: &FormulaName, version: &Version) {
        println!(
            "  removing {} {}",
            name.as_str().white(),
            version.as_str().dark_grey()
        );
    }

    fn done(&self, name: &FormulaName, version: &Version, detail: &str) {
        println!(
            "  {} {} {} {}",
            "✓".green(),
            name.as_str().white().bold(),
            version.as_str().dark_grey(),
            detail
        );
    }

    fn failed(&self, name: &FormulaName, version: &Version, reason: &str) {
        println!();
        eprintln!(
            "  {} {} {} {}",
            "✗".red(),
            name.as_str().white().bold(),
            version.as_str().dark_grey(),
            reason.red()
        );
    }

    fn info(&self, msg: &str) {
        println!("  {msg}");
    }

    fn success(&self, msg: &str) {
        println!("  {} {}", "✓".green(), msg.green());
    }

    fn warning(&self, msg: &str) {
        eprintln!("  {} {}", "Warning:".yellow(), msg);
    }

    fn error(&self, msg: &str) {
        eprintln!("  {} {}", "Error:".red(), msg);
    }

    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        println!();
        println!("{action} COMPLETE {count}, elapsed {elapsed_secs:.2}s");
    }
}

/// Human-readable byte size (B / KB / MB / GB).
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes_f = bytes as f64;
    if bytes_f >= GB {
        format!("{:.1} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.1} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.1} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Interactive yes/no prompt, defaulting to no.
pub fn confirm(message: &str) -> io::Result<bool> {
    print!("{message} [y/N]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_picks_unit() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
