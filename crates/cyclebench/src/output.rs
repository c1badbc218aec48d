use comfy_table::presets::{ASCII_FULL, UTF8_FULL};
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};
use libcyclebench_core::config::format_cycles;
use libcyclebench_core::{BenchConfig, BenchError, BenchReport, Status};

use crate::cli::Cli;

/// Print the run header
pub fn print_banner(config: &BenchConfig, workload: &str) {
    println!("cyclebench {}", env!("CARGO_PKG_VERSION"));
    println!("  workload:      {}", workload);
    if let Some(ref url) = config.url {
        println!("  server url:    {}", url);
    }
    println!("  cycles:        {}", format_cycles(&config.cycles));
    println!("  duration:      {:.1}s", config.duration.as_secs_f64());
    println!("  startup delay: {:.2}s", config.startup_delay.as_secs_f64());
    println!(
        "  think time:    {:.2}s..{:.2}s",
        config.sleep_time_min.as_secs_f64(),
        config.sleep_time_max.as_secs_f64()
    );
    for target in &config.monitors {
        println!("  monitor:       {} ({})", target, target.description);
    }
    println!("  run log:       {}", config.log_xml.display());
    println!();
}

/// Render the per-cycle summary table
pub fn summary_table(report: &BenchReport, color: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(if color { UTF8_FULL } else { ASCII_FULL })
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Cycle", "CVUs", "Success", "Failure", "Error", "Success %", "Status",
        ]);
    if !color {
        table.force_no_tty();
    }

    for cycle in &report.cycles {
        table.add_row(vec![
            Cell::new(cycle.index).set_alignment(CellAlignment::Right),
            Cell::new(cycle.concurrency).set_alignment(CellAlignment::Right),
            Cell::new(cycle.success).set_alignment(CellAlignment::Right),
            Cell::new(cycle.failure).set_alignment(CellAlignment::Right),
            Cell::new(cycle.error).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1}", cycle.success_rate())).set_alignment(CellAlignment::Right),
            status_cell(cycle.status, color),
        ]);
    }
    table
}

fn status_cell(status: Status, color: bool) -> Cell {
    let cell = Cell::new(status.as_str());
    if !color {
        return cell;
    }
    match status {
        Status::Successful => cell.fg(Color::Green),
        Status::Failure => cell.fg(Color::Yellow),
        Status::Error => cell.fg(Color::Red),
    }
}

/// Print the summary table and the overall verdict
pub fn print_summary(cli: &Cli, report: &BenchReport) {
    let color = !cli.no_color;
    println!("{}", summary_table(report, color));
    println!(
        "Total: {} success, {} failure, {} error in {:.1}s",
        report.success,
        report.failure,
        report.error,
        report.elapsed.as_secs_f64()
    );
    if report.interrupted {
        println!("Run interrupted after {} cycle(s)", report.cycles.len());
    }
    println!("Bench status: {}", report.status);
}

/// Output an error
pub fn output_error(err: &BenchError) {
    eprintln!("error: {}", err);
    let suggestions = err.suggestions();
    if !suggestions.is_empty() {
        eprintln!();
        eprintln!("Suggestions:");
        for suggestion in suggestions {
            eprintln!("  - {}", suggestion);
        }
    }
}
