use std::path::Path;

use console::Style;
use flowsort_core::config::SortConfig;
use flowsort_core::controller::{Maintenance, MaintenanceReport, RunSummary};
use flowsort_core::record::Direction;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn rule(s: &Styles, width: usize) -> String {
    s.title.apply_to("\u{2550}".repeat(width)).to_string()
}

pub fn print_run_header(config: &SortConfig, replay: &Path, run_dir: &Path) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Flowsort"));
    println!("  {}", rule(&s, 8));
    println!();

    println!("  {:<14}{}", s.label.apply_to("Replay"), s.path.apply_to(replay.display()));
    println!("  {:<14}{}", s.label.apply_to("Run dir"), s.path.apply_to(run_dir.display()));
    println!();

    println!("  {}", s.header.apply_to("Classifier"));
    println!("    {:<12}{}", s.label.apply_to("Method"), s.method.apply_to(&config.classifier));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Calibration"),
        s.method.apply_to(&config.calibration.mode)
    );
    if !config.calibration.is_fixed() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Samples"),
            s.value.apply_to(config.calibration.sample_count)
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Cutoffs"),
            s.value.apply_to(format!(
                "p{} / p{}",
                config.calibration.lower_percentile, config.calibration.upper_percentile
            ))
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Size"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Range"),
        s.value.apply_to(format!("{}..={} px", config.size.min, config.size.max))
    );
    if config.size.recheck_after_imaging {
        println!("    {:<12}{}", s.label.apply_to("Re-check"), s.method.apply_to("after imaging"));
    } else {
        println!("    {:<12}{}", s.label.apply_to("Re-check"), s.disabled.apply_to("disabled"));
    }
    println!();

    match config.geometry.queue {
        Some(_) => println!(
            "  {:<14}{}",
            s.header.apply_to("Loading"),
            s.method.apply_to(format!("queue push (max {} ms)", config.watchdog.max_push_ms))
        ),
        None => println!("  {:<14}{}", s.header.apply_to("Loading"), s.method.apply_to("direct")),
    }
    if config.refresh_interval == 0 {
        println!("  {:<14}{}", s.header.apply_to("Refresh"), s.disabled.apply_to("disabled"));
    } else {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Refresh"),
            s.value.apply_to(format!("every {} specimens", config.refresh_interval))
        );
    }
    println!();
}

pub fn print_run_summary(summary: &RunSummary, run_dir: &Path) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Run Summary"));
    println!("  {}", rule(&s, 11));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Run time"),
        s.value.apply_to(format!("{:.1} s", summary.run_time.as_secs_f64()))
    );
    println!("  {:<14}{}", s.label.apply_to("Specimens"), s.value.apply_to(summary.specimens));
    for direction in [Direction::Up, Direction::Straight, Direction::Down] {
        println!(
            "    {:<12}{}",
            s.label.apply_to(direction),
            s.value.apply_to(summary.count(direction))
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Outcomes"));
    println!("    {:<12}{}", s.label.apply_to("Calibration"), s.value.apply_to(summary.calibration));
    if summary.rejected.is_empty() {
        println!("    {:<12}{}", s.label.apply_to("Rejected"), s.disabled.apply_to("none"));
    }
    for (reason, n) in &summary.rejected {
        println!("    {:<12}{}", s.label.apply_to(reason), s.value.apply_to(n));
    }
    println!("    {:<12}{}", s.label.apply_to("Lost"), s.value.apply_to(summary.lost));
    println!("    {:<12}{}", s.label.apply_to("Stuck"), s.value.apply_to(summary.stuck_resets));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Refreshes"),
        s.value.apply_to(summary.background_refreshes)
    );
    println!();

    if let Some(t) = summary.thresholds {
        println!("  {}", s.header.apply_to("Thresholds"));
        println!("    {:<12}{}", s.label.apply_to("Lower"), s.value.apply_to(format!("{:.2}", t.lower)));
        println!("    {:<12}{}", s.label.apply_to("Upper"), s.value.apply_to(format!("{:.2}", t.upper)));
        println!();
    }
    if let Some(d) = summary.mean_interval {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Interval"),
            s.value.apply_to(format!("{:.2} s", d.as_secs_f64()))
        );
    }
    if let Some(d) = summary.mean_positioning {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Positioning"),
            s.value.apply_to(format!("{:.2} s", d.as_secs_f64()))
        );
    }
    println!();
    println!("  Records saved to {}", s.path.apply_to(run_dir.display()));
}

pub fn print_maintenance_report(task: &Maintenance, report: &MaintenanceReport) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Maintenance"));
    println!("  {}", rule(&s, 11));
    println!();
    println!("  {:<14}{}", s.label.apply_to("Task"), s.method.apply_to(task.name()));
    if let Maintenance::ClearBubbles { .. } = task {
        println!("  {:<14}{}", s.label.apply_to("Cycles"), s.value.apply_to(report.cycles));
    }
    if report.interrupted {
        println!("  {:<14}{}", s.label.apply_to("Ended"), s.disabled.apply_to("interrupted"));
    } else {
        println!("  {:<14}{}", s.label.apply_to("Ended"), s.value.apply_to("completed"));
    }
    println!("  {:<14}{}", s.label.apply_to("Valves"), s.value.apply_to("safe"));
    println!();
}
