use colored::Colorize;
use spinrelay_core::{BonusEnd, SessionEvent, SessionNotifier};

/// Prints colourised progress lines for an operator watching the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier {
    /// Also print a line for every plain spin, not just bonuses and warnings.
    pub verbose: bool,
}

impl ConsoleNotifier {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// The line printed for `event`, or `None` when it stays quiet.
    pub fn render(&self, event: &SessionEvent) -> Option<String> {
        let line = match event {
            SessionEvent::Started { mode, config } => format!(
                "{} {mode} loop (delay {}-{} ms, max iterations {}, stop on loss {})",
                "▶ started".bright_cyan().bold(),
                config.min_delay_ms,
                config.max_delay_ms,
                config.max_iterations,
                config.stop_on_loss
            ),
            SessionEvent::Progress(report) => {
                let noteworthy = report.highlights.is_some() || !report.bonuses.is_empty();
                if !self.verbose && !noteworthy {
                    return None;
                }
                let win = if report.last_win > 0 {
                    report.last_win.to_string().green()
                } else {
                    report.last_win.to_string().normal()
                };
                let mut line = format!(
                    "[{}] #{} win {win} balance {} profit {}",
                    report.mode,
                    report.iteration,
                    report.ledger.current_balance,
                    signed(report.ledger.profit())
                );
                if let Some(highlights) = &report.highlights {
                    let features = format!(" ({})", highlights.features.join(", "));
                    line.push_str(&features.yellow().to_string());
                }
                if let Some(wheel) = &report.ledger.wheel {
                    line.push_str(&format!(
                        " level {} {}%",
                        wheel.level, wheel.progress_percent
                    ));
                }
                line
            }
            SessionEvent::BonusPlayed { mode, outcome } => {
                let status = match outcome.ended_by {
                    BonusEnd::Exhausted => "🎰 bonus".bright_magenta().bold(),
                    _ => "⚠ bonus".yellow().bold(),
                };
                format!(
                    "{status} [{mode}] {} ({}): {} spins, won {}, {} chained, ended {:?}",
                    outcome.kind,
                    outcome.category,
                    outcome.spins_played,
                    outcome.total_win.to_string().green(),
                    outcome.chain_switches,
                    outcome.ended_by
                )
            }
            SessionEvent::LevelUp {
                mode,
                old_level,
                new_level,
            } => format!(
                "{} [{mode}] {old_level} → {new_level}",
                "⬆ wheel level".bright_green().bold()
            ),
            SessionEvent::Warning {
                mode,
                message,
                consecutive_errors,
            } => format!(
                "{} [{mode}] {message} ({consecutive_errors} in a row)",
                "⚠".yellow().bold()
            ),
            SessionEvent::Stopped {
                mode,
                reason,
                ledger,
            } => format!(
                "{} [{mode}] {reason} after {} iterations, profit {}",
                "■ stopped".bright_cyan().bold(),
                ledger.iterations,
                signed(ledger.profit())
            ),
        };
        Some(line)
    }
}

fn signed(value: i64) -> String {
    if value < 0 {
        value.to_string().red().to_string()
    } else {
        format!("+{value}").green().to_string()
    }
}

impl SessionNotifier for ConsoleNotifier {
    fn notify(&self, event: SessionEvent) {
        if let Some(line) = self.render(&event) {
            println!("{line}");
        }
    }
}
