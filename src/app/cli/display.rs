//! CLI display utilities for formatting output

use crate::app::cli::args::OutputFormat;
use crate::command::api::{CommandDescriptor, CommandResult};
use crate::core::styles::StyleRole;
use crate::plugin::api::{LoadReport, PluginState, PluginStatus};
use prettytable::{format, Cell, Row, Table};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Text form of a command's return value. `None` for `null`.
pub fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        _ => Some(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())),
    }
}

/// Write a result: the value to `out`, errors and hook warnings to `err`
pub fn write_result(
    result: &CommandResult,
    output: OutputFormat,
    color: bool,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<()> {
    if output == OutputFormat::Json {
        let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
        return writeln!(out, "{json}");
    }

    if let Some(error) = &result.error {
        writeln!(err, "{} {}", StyleRole::Failure.paint("error:", color), error.message)?;
        if let Some(cause) = error.cause.as_deref().filter(|c| !error.message.contains(*c)) {
            writeln!(err, "  {} {}", StyleRole::Dim.paint("cause:", color), cause)?;
        }
    } else if let Some(text) = render_value(&result.value) {
        writeln!(out, "{text}")?;
    }

    for hook_error in &result.hook_errors {
        writeln!(err, "{} {}", StyleRole::Warning.paint("warning:", color), hook_error)?;
    }
    Ok(())
}

fn state_role(state: PluginState) -> StyleRole {
    match state {
        PluginState::Active => StyleRole::Success,
        PluginState::Failed => StyleRole::Failure,
        PluginState::BlockedByDependency => StyleRole::Warning,
        _ => StyleRole::Dim,
    }
}

fn styled_cell(text: &str, role: StyleRole, color: bool) -> Cell {
    let cell = Cell::new(text);
    match role.to_prettytable_spec() {
        Some(spec) if color => cell.style_spec(spec),
        _ => cell,
    }
}

/// One row per plugin, in registration order
pub fn plugin_table(statuses: &[PluginStatus], color: bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(Row::new(
        ["Plugin", "Version", "State", "Commands", "Notes"]
            .iter()
            .map(|title| styled_cell(title, StyleRole::Header, color))
            .collect(),
    ));

    for status in statuses {
        let notes = match (&status.failure, &status.blocked_by) {
            (Some(failure), _) => failure.clone(),
            (None, Some(dependency)) => format!("waiting for '{dependency}'"),
            (None, None) if !status.dependencies.is_empty() => {
                format!("needs {}", status.dependencies.join(", "))
            }
            _ => String::new(),
        };
        table.add_row(Row::new(vec![
            styled_cell(&status.name, StyleRole::Key, color),
            Cell::new(&status.version),
            styled_cell(&status.state.to_string(), state_role(status.state), color),
            Cell::new(&status.commands.join(", ")),
            Cell::new(&notes),
        ]));
    }
    table
}

/// Print the plugin listing to stdout
pub fn print_plugins(statuses: &[PluginStatus], output: OutputFormat, color: bool) -> io::Result<()> {
    if output == OutputFormat::Json {
        let json = serde_json::to_string_pretty(statuses).map_err(io::Error::other)?;
        println!("{json}");
        return Ok(());
    }
    if statuses.is_empty() {
        eprintln!("No plugins registered.");
        return Ok(());
    }

    let table = plugin_table(statuses, color);
    if color {
        table.print_tty(true)?;
    } else {
        table.print(&mut io::stdout())?;
    }
    Ok(())
}

/// Usage lines for every command, grouped under their plugin
pub fn command_listing(commands: &BTreeMap<String, CommandDescriptor>, color: bool) -> String {
    let mut by_plugin: BTreeMap<&str, Vec<&CommandDescriptor>> = BTreeMap::new();
    for descriptor in commands.values() {
        by_plugin.entry(descriptor.plugin.as_str()).or_default().push(descriptor);
    }

    let mut listing = String::new();
    for (plugin, descriptors) in by_plugin {
        listing.push_str(&StyleRole::Header.paint(&format!("{plugin}:"), color));
        listing.push('\n');
        for descriptor in descriptors {
            listing.push_str(&format!(
                "  {}\n      {}\n",
                StyleRole::Literal.paint(&descriptor.usage(), color),
                descriptor.description
            ));
        }
    }
    listing
}

/// Warning lines for plugins that did not come up
pub fn load_report_warnings(report: &LoadReport) -> Vec<String> {
    let failed = report
        .failed
        .iter()
        .map(|failure| format!("plugin '{}' failed: {}", failure.plugin, failure.message));
    let blocked = report.blocked.iter().map(|blocked| {
        format!(
            "plugin '{}' not loaded: dependency '{}' is unavailable",
            blocked.plugin, blocked.dependency
        )
    });
    failed.chain(blocked).collect()
}
