use quotedesk_core::config::{AppConfig, LoadOptions};
use quotedesk_core::CatalogGateway;
use serde::Serialize;

use crate::bootstrap::open_catalog;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn passed(&self) -> bool {
        self.overall_status == CheckStatus::Pass
    }
}

/// Returns the report and whether every check passed.
pub fn run(options: LoadOptions, json_output: bool) -> (String, bool) {
    let report = build_report(options);
    let passed = report.passed();

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return (output, passed);
    }

    (render_human(&report), passed)
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.extend(check_catalog(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.push(DoctorCheck::skipped("catalog_connectivity", "configuration did not load"));
            checks.push(DoctorCheck::skipped("discount_tiers", "configuration did not load"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_catalog(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "catalog_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("discount_tiers", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let gateway = match open_catalog(config).await {
            Ok(gateway) => gateway,
            Err(error) => {
                return vec![
                    DoctorCheck::fail("catalog_connectivity", error.to_string()),
                    DoctorCheck::skipped("discount_tiers", "the catalog could not be opened"),
                ];
            }
        };

        let connectivity = match gateway.count_products().await {
            Ok(count) => DoctorCheck::pass(
                "catalog_connectivity",
                format!("{:?} catalog reachable with {count} products", config.catalog.backend),
            ),
            Err(error) => DoctorCheck::fail("catalog_connectivity", error.to_string()),
        };

        let tiers = match gateway.list_discounts().await {
            Ok(tiers) if tiers.is_empty() => {
                DoctorCheck::fail("discount_tiers", "catalog has no discount tiers")
            }
            Ok(tiers) => DoctorCheck::pass(
                "discount_tiers",
                format!("{} tiers decoded (first: {})", tiers.len(), tiers[0].label()),
            ),
            Err(error) => DoctorCheck::fail("discount_tiers", error.to_string()),
        };

        vec![connectivity, tiers]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
