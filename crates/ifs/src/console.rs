//! Colored console output for solver runs.
//!
//! Installs a `tracing` registry with an [`EnvFilter`] (default
//! `ifs_solver=info`, overridable through `RUST_LOG`) and a layer that
//! prints the solver's lifecycle events.

use std::io::{self, Write};
use std::sync::OnceLock;

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();

/// Initializes console output. Only the first call has an effect.
pub fn init() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy()
            .add_directive("ifs_solver=info".parse().unwrap_or_else(|_| LevelFilter::INFO.into()));

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(SolverConsoleLayer)
            .try_init();
        if let Err(e) = installed {
            report_init_error(&e, tracing::dispatcher::has_been_set());
        }
    });
}

/// Reports a failed install unless another global subscriber already owns
/// the output. Returns whether the error was reported.
fn report_init_error(error: &dyn std::fmt::Display, subscriber_present: bool) -> bool {
    if subscriber_present {
        return false;
    }
    let _ = writeln!(io::stderr(), "ifs: unable to install console output: {error}");
    true
}

/// Formats `solve_start`, `solve_end` and parallel run events.
pub struct SolverConsoleLayer;

impl<S: Subscriber> Layer<S> for SolverConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !event.metadata().target().starts_with("ifs") {
            return;
        }
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        let output = format_event(&visitor);
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{output}");
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    event: Option<String>,
    selection: Option<String>,
    index: Option<u64>,
    variables: Option<u64>,
    constraints: Option<u64>,
    nr_solvers: Option<u64>,
    winner: Option<u64>,
    iterations: Option<u64>,
    duration_ms: Option<u64>,
    unassigned: Option<u64>,
    improvements: Option<u64>,
    value: Option<f64>,
    mpp: Option<bool>,
    stopped: Option<bool>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{value:?}");
        match field.name() {
            "event" => self.event = Some(s.trim_matches('"').to_string()),
            "selection" => self.selection = Some(s.trim_matches('"').to_string()),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "event" => self.event = Some(value.to_string()),
            "selection" => self.selection = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "index" => self.index = Some(value),
            "variables" => self.variables = Some(value),
            "constraints" => self.constraints = Some(value),
            "nr_solvers" => self.nr_solvers = Some(value),
            "winner" => self.winner = Some(value),
            "iterations" => self.iterations = Some(value),
            "duration_ms" => self.duration_ms = Some(value),
            "unassigned" => self.unassigned = Some(value),
            "improvements" => self.improvements = Some(value),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if let Ok(value) = u64::try_from(value) {
            self.record_u64(field, value);
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if field.name() == "value" {
            self.value = Some(value);
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        match field.name() {
            "mpp" => self.mpp = Some(value),
            "stopped" => self.stopped = Some(value),
            _ => {}
        }
    }
}

fn count(n: Option<u64>) -> String {
    n.unwrap_or(0).to_formatted_string(&Locale::en)
}

fn format_event(v: &EventVisitor) -> String {
    match v.event.as_deref() {
        Some("solve_start") => format_solve_start(v),
        Some("solve_end") => format_solve_end(v),
        Some("parallel_solve_start") => format!(
            "{} Parallel solving │ {} workers │ {} variables",
            "▶".bright_green().bold(),
            count(v.nr_solvers).bright_yellow(),
            count(v.variables).bright_yellow()
        ),
        Some("parallel_solve_end") => format!(
            "{} Parallel solving complete │ winner #{} │ {} unassigned │ value {:.2}",
            "■".bright_cyan().bold(),
            count(v.winner),
            count(v.unassigned).bright_yellow(),
            v.value.unwrap_or(0.0)
        ),
        _ => String::new(),
    }
}

fn format_solve_start(v: &EventVisitor) -> String {
    let mut output = format!(
        "{} Solving #{} │ {} variables │ {} constraints │ {}",
        "▶".bright_green().bold(),
        count(v.index),
        count(v.variables).bright_yellow(),
        count(v.constraints).bright_yellow(),
        v.selection.as_deref().unwrap_or("?").bright_magenta()
    );
    if v.mpp == Some(true) {
        output.push_str(" │ MPP");
    }
    output
}

fn format_solve_end(v: &EventVisitor) -> String {
    let unassigned = v.unassigned.unwrap_or(0);
    let status = if unassigned == 0 {
        "COMPLETE".bright_green().bold().to_string()
    } else {
        format!("{} UNASSIGNED", count(Some(unassigned)))
            .bright_red()
            .bold()
            .to_string()
    };
    let mut output = format!(
        "{} Solving #{} complete │ {} │ value {:.2} │ {} iterations │ {} improvements │ {:.3}s",
        "■".bright_cyan().bold(),
        count(v.index),
        status,
        v.value.unwrap_or(0.0),
        count(v.iterations).bright_yellow(),
        count(v.improvements),
        v.duration_ms.unwrap_or(0) as f64 / 1000.0
    );
    if v.stopped == Some(true) {
        output.push_str(" │ stopped");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_solve_end() {
        let visitor = EventVisitor {
            event: Some("solve_end".to_string()),
            index: Some(0),
            iterations: Some(12_345),
            unassigned: Some(0),
            improvements: Some(3),
            value: Some(4.5),
            duration_ms: Some(1500),
            ..EventVisitor::default()
        };
        let output = format_event(&visitor);
        assert!(output.contains("COMPLETE"));
        assert!(output.contains("12,345"));
        assert!(output.contains("1.500s"));
    }

    #[test]
    fn test_init_error_reporting() {
        assert!(!report_init_error(&"already set", true));
        assert!(report_init_error(&"logger rejected", false));
    }

    #[test]
    fn test_init_with_existing_subscriber() {
        let _ = tracing_subscriber::registry().try_init();
        init();
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn test_unknown_events_are_silent() {
        let visitor = EventVisitor {
            event: Some("step".to_string()),
            ..EventVisitor::default()
        };
        assert!(format_event(&visitor).is_empty());
    }
}
