//! Plain-text rendering of the scheduler report

use std::fmt::Write;

use crate::dashboard::data::SchedulerReport;

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn render_report(report: &SchedulerReport) -> String {
    let mut out = String::new();

    let _ = write!(
        out,
        r#"
================ RuVector Scheduler Report ================

State:                  {}
Active:                 {}
Total predictions:      {:>8}
Successful predictions: {:>8}
Model accuracy:         {:>8}
Anomalies detected:     {:>8}

-------------------------- Profiles -------------------------
"#,
        report.state,
        yes_no(report.active),
        report.total_predictions,
        report.successful_predictions,
        report.model_accuracy,
        report.anomalies_detected,
    );

    let _ = writeln!(
        out,
        "{:>7}  {:<18} {:>6} {:>9} {:>5} {:>5} {:>9}  {:>5} {:>4}  {}",
        "PID", "CLASS", "CPU%", "MEM(MB)", "SCORE", "ROGUE", "PROTECTED", "PRED", "UNIT", "NAME"
    );
    for row in &report.profiles {
        let unit = row.placement.map(|u| u.to_string()).unwrap_or_else(|| "-".into());
        let _ = writeln!(
            out,
            "{:>7}  {:<18} {:>6.1} {:>9.1} {:>5} {:>5} {:>9}  {:>5.2} {:>4}  {}",
            row.pid,
            row.classification.as_str(),
            row.cpu_percent,
            row.memory_mb,
            row.anomaly_score,
            yes_no(row.rogue),
            yes_no(row.protected),
            row.predicted_intensity,
            unit,
            row.name
        );
    }

    let _ = write!(
        out,
        r#"
Total: {} profiles, {} protected, {} rogue

----------------------- Compute Units -----------------------
"#,
        report.totals.profiles, report.totals.protected, report.totals.rogue
    );
    for unit in &report.compute_units {
        let _ = writeln!(
            out,
            "unit {:>3}  {:<12} {:>5.1}% busy  {} assigned",
            unit.id,
            unit.category.as_str(),
            unit.utilization,
            unit.assigned
        );
    }

    let _ = writeln!(
        out,
        "\nGenerated: {}\n=============================================================",
        report.generated_at.to_rfc3339()
    );
    out
}
