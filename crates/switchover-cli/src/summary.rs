//! End-of-run summary tables

use switchover_engine::{format_duration, RunResult};

/// Render rows as a column-aligned table with headers
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:<width$}", cell, width = w)
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers.to_vec());
    for row in rows {
        out.push('\n');
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

/// One row per cycle: number, roles, result, duration, error
pub fn cycle_rows(result: &RunResult) -> Vec<Vec<String>> {
    result
        .cycles
        .iter()
        .map(|c| {
            vec![
                c.cycle_num.to_string(),
                c.primary_context.clone(),
                c.secondary_context.clone(),
                if c.success { "OK" } else { "FAILED" }.to_string(),
                format_duration(c.total_duration_seconds()),
                c.error.clone().unwrap_or_default(),
            ]
        })
        .collect()
}

/// One row per phase with its timing across the run
pub fn phase_rows(result: &RunResult) -> Vec<Vec<String>> {
    result
        .phase_statistics()
        .into_iter()
        .map(|(name, stats)| {
            vec![
                name,
                format!("{}/{}", stats.successes, stats.count),
                format!("{:.1}s", stats.avg_seconds),
                format!("{:.1}s", stats.min_seconds),
                format!("{:.1}s", stats.max_seconds),
            ]
        })
        .collect()
}

/// Full summary of a run
pub fn render_summary(result: &RunResult) -> String {
    let mut out = format!(
        "Run {}\n{} succeeded, {} failed ({:.1}%) in {}\n\n",
        result.run_id,
        result.success_count,
        result.failure_count,
        result.success_rate(),
        format_duration(result.total_duration_seconds())
    );
    out.push_str(&render_table(
        &["CYCLE", "PRIMARY", "SECONDARY", "RESULT", "DURATION", "ERROR"],
        &cycle_rows(result),
    ));

    let phases = phase_rows(result);
    if !phases.is_empty() {
        out.push_str("\n\n");
        out.push_str(&render_table(&["PHASE", "OK", "AVG", "MIN", "MAX"], &phases));
    }
    out
}
