use std::io::Write;

use anyhow::Result;
use colored::Colorize;
use spinrelay_core::{BonusCategory, GameMode, HistoryRecord, LedgerSnapshot};

pub fn write_console_history(
    out: &mut dyn Write,
    mode: GameMode,
    records: &[HistoryRecord],
) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{}",
        format!("📜 {mode} session history").bright_cyan().bold()
    )?;
    writeln!(out, "{}", "========================".cyan())?;

    if records.is_empty() {
        writeln!(out, "No sessions recorded")?;
        return Ok(());
    }

    let total_profit: i64 = records.iter().map(|r| r.profit).sum();
    writeln!(out, "Sessions: {}", records.len())?;
    writeln!(out, "Combined profit: {}", colored_profit(total_profit))?;
    writeln!(out)?;

    for record in records {
        writeln!(
            out,
            "{} {} ({})",
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().bold(),
            record.reason,
            format_duration(record.duration_ms)
        )?;
        writeln!(
            out,
            "   Iterations: {}  Balance: {} → {}  Profit: {}",
            record.iterations,
            record.start_balance,
            record.end_balance,
            colored_profit(record.profit)
        )?;
        for category in BonusCategory::ALL {
            let spins = record.per_category_spins.get(&category).copied().unwrap_or(0);
            if spins == 0 {
                continue;
            }
            let win = record.per_category_win.get(&category).copied().unwrap_or(0);
            writeln!(out, "   • {category}: {spins} spins, won {win}")?;
        }
    }
    Ok(())
}

pub fn write_json_history(out: &mut dyn Write, records: &[HistoryRecord]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, records)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_markdown_history(
    out: &mut dyn Write,
    mode: GameMode,
    records: &[HistoryRecord],
) -> Result<()> {
    writeln!(out, "# Spinrelay {mode} history\n")?;
    if records.is_empty() {
        writeln!(out, "_No sessions recorded._")?;
        return Ok(());
    }

    writeln!(
        out,
        "| Ended | Reason | Iterations | Start | End | Profit | Duration |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|---|")?;
    for record in records {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.reason,
            record.iterations,
            record.start_balance,
            record.end_balance,
            record.profit,
            format_duration(record.duration_ms)
        )?;
    }
    Ok(())
}

/// Final stats printed when a run ends.
pub fn write_session_summary(
    out: &mut dyn Write,
    mode: GameMode,
    ledger: &LedgerSnapshot,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", format!("📊 {mode} session summary").bright_cyan().bold())?;
    writeln!(out, "{}", "=======================".cyan())?;
    writeln!(out, "Iterations: {}", ledger.iterations)?;
    writeln!(
        out,
        "Balance: {} → {}",
        ledger.start_balance, ledger.current_balance
    )?;
    writeln!(out, "Profit: {}", colored_profit(ledger.profit()))?;
    writeln!(out, "Total won: {}", ledger.total_win_amount)?;
    for (category, stats) in &ledger.categories {
        if stats.trigger_count == 0 {
            continue;
        }
        writeln!(
            out,
            "   • {category}: {} triggers, {} spins, won {}",
            stats.trigger_count, stats.sub_spins_played, stats.win_amount
        )?;
    }
    if let Some(wheel) = &ledger.wheel {
        writeln!(
            out,
            "Wheel: level {} ({}%), {} bones, {}/{} points",
            wheel.level, wheel.progress_percent, wheel.bones, wheel.points, wheel.points_total
        )?;
    }
    Ok(())
}

fn colored_profit(profit: i64) -> String {
    if profit < 0 {
        profit.to_string().red().to_string()
    } else {
        format!("+{profit}").green().to_string()
    }
}

fn format_duration(ms: i64) -> String {
    let secs = ms / 1000;
    format!("{}m {:02}s", secs / 60, secs % 60)
}
