use std::io::{self, IsTerminal};
use std::sync::Arc;

use clap::Args;
use owo_colors::OwoColorize;
use serde_json::{Value, json};

use crate::checks::{CheckId, CheckReport, CheckStatus, LiveChecks};
use crate::config;
use crate::egress::health::ProxyHealthTracker;

#[derive(Debug, Args, Clone)]
pub struct CheckArgs {
    /// Run only these checks (comma separated). Default: all.
    #[arg(long, value_enum, value_delimiter = ',')]
    only: Vec<CheckId>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

pub async fn run(args: CheckArgs) -> Result<(), String> {
    let settings = config::load_settings()?;
    let suite = LiveChecks::new(settings, Arc::new(ProxyHealthTracker::new()));
    let reports = suite.run(&args.only).await;

    if args.json {
        let body = report_json(&reports);
        let text = serde_json::to_string_pretty(&body)
            .map_err(|err| format!("Failed to serialize report: {err}"))?;
        println!("{text}");
    } else {
        let colored = io::stdout().is_terminal();
        for report in &reports {
            println!("{}", report_line(report, colored));
        }
    }

    let failed = reports
        .iter()
        .filter(|report| report.status.is_failure())
        .count();
    if failed > 0 {
        return Err(format!("{failed} live check(s) failed"));
    }
    Ok(())
}

fn report_json(reports: &[CheckReport]) -> Value {
    let failed = reports
        .iter()
        .filter(|report| report.status.is_failure())
        .count();
    json!({
        "checks": reports.iter().map(CheckReport::to_json).collect::<Vec<_>>(),
        "failed": failed,
    })
}

fn report_line(report: &CheckReport, colored: bool) -> String {
    let tag = match &report.status {
        CheckStatus::Passed(_) => "PASS",
        CheckStatus::Skipped(_) => "SKIP",
        CheckStatus::Failed(_) => "FAIL",
    };
    let tag = if colored {
        match &report.status {
            CheckStatus::Passed(_) => tag.green().to_string(),
            CheckStatus::Skipped(_) => tag.yellow().to_string(),
            CheckStatus::Failed(_) => tag.red().bold().to_string(),
        }
    } else {
        tag.to_string()
    };
    format!(
        "{tag} {:<16} {} ({} ms)",
        report.id.as_str(),
        report.detail(),
        report.elapsed.as_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::{report_json, report_line};
    use crate::checks::{CheckId, CheckReport, CheckStatus};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn plain_line_is_aligned_and_uncolored() {
        let report = CheckReport {
            id: CheckId::ScraperapiHtml,
            status: CheckStatus::Skipped("SCRAPERAPI_KEY is required for this live check".into()),
            elapsed: Duration::from_millis(0),
        };
        assert_eq!(
            report_line(&report, false),
            "SKIP scraperapi-html  SCRAPERAPI_KEY is required for this live check (0 ms)"
        );
    }

    #[test]
    fn json_report_counts_failures() {
        let reports = vec![
            CheckReport {
                id: CheckId::ProxyProbe,
                status: CheckStatus::Passed("ip=203.0.113.7 via direct".into()),
                elapsed: Duration::from_millis(40),
            },
            CheckReport {
                id: CheckId::ZenrowsHtml,
                status: CheckStatus::Skipped("ZENROWS_KEY is required".into()),
                elapsed: Duration::ZERO,
            },
        ];
        let body = report_json(&reports);
        assert_eq!(body["failed"], json!(0));
        assert_eq!(body["checks"][0]["status"], json!("passed"));
        assert_eq!(body["checks"][1]["check"], json!("zenrows-html"));
    }
}
