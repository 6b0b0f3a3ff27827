//! Output formatting utilities

use colored::{ColoredString, Colorize};

/// Colorize one response line for the terminal.
///
/// `OK`/`ERR` prefixes are highlighted; `status` program lines get
/// their replica ratio colored by health.
pub fn format_line(line: &str) -> String {
    if let Some(rest) = line.strip_prefix("OK") {
        return format!("{}{}", "OK".green().bold(), rest);
    }
    if let Some(rest) = line.strip_prefix("ERR") {
        return format!("{}{}", "ERR".red().bold(), rest);
    }

    // "<name> RUNNING <running>/<desired>"
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() == 3 && fields[1] == "RUNNING" {
        return format!(
            "{} {} {}",
            fields[0].bold(),
            fields[1],
            format_ratio(fields[2])
        );
    }
    line.to_string()
}

fn format_ratio(ratio: &str) -> ColoredString {
    match ratio.split_once('/') {
        Some((running, desired)) if running == desired && running != "0" => ratio.green(),
        Some(_) => ratio.yellow(),
        None => ratio.normal(),
    }
}
