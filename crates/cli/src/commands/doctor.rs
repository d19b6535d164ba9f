use serde::Serialize;
use stayledger_core::config::{AppConfig, LoadOptions};
use stayledger_db::connect_with_settings;

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

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: format!(
                    "configuration loaded; ledger currency {}, default markup {}%",
                    config.ledger.currency, config.ledger.default_markup_percent
                ),
            });
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Skipped,
                details: "skipped because configuration failed to load".to_string(),
            });
        }
    }

    let failed = checks.iter().filter(|check| check.status == CheckStatus::Fail).count();
    let overall_status = if failed == 0 { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if failed == 0 {
        "all checks passed".to_string()
    } else {
        format!("{failed} check(s) failed")
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let outcome = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;
        pool.close().await;
        Ok::<(), String>(())
    });

    match outcome {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Fail,
            details: error,
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::with_capacity(report.checks.len() + 2);
    lines.push(format!("doctor: {}", report.summary));
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("  [{marker}] {} - {}", check.name, check.details));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn human_rendering_marks_failed_checks() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "1 check(s) failed".to_string(),
            checks: vec![
                DoctorCheck {
                    name: "config_validation",
                    status: CheckStatus::Pass,
                    details: "configuration loaded".to_string(),
                },
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: "pool timed out".to_string(),
                },
            ],
        };

        let rendered = render_human(&report);
        assert!(rendered.contains("doctor: 1 check(s) failed"));
        assert!(rendered.contains("[FAIL] database_connectivity"));
        assert!(rendered.contains("[ok] config_validation"));
    }
}
