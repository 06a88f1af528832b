use cartstore_core::config::{AppConfig, LoadOptions};
use cartstore_db::connect_with_config;
use cartstore_inventory::HttpInventoryClient;
use serde::Serialize;

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
                escape_json(&error.to_string())
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
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(run_connectivity_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["storage_connectivity", "inventory_reachability"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
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

fn run_connectivity_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let details = format!("failed to initialize async runtime: {error}");
            return vec![
                DoctorCheck {
                    name: "storage_connectivity",
                    status: CheckStatus::Fail,
                    details: details.clone(),
                },
                DoctorCheck { name: "inventory_reachability", status: CheckStatus::Fail, details },
            ];
        }
    };

    runtime.block_on(async {
        vec![check_storage_connectivity(config).await, check_inventory_reachability(config).await]
    })
}

async fn check_storage_connectivity(config: &AppConfig) -> DoctorCheck {
    let result = async {
        let pool = connect_with_config(&config.storage)
            .await
            .map_err(|error| format!("failed to connect to storage: {error}"))?;
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|error| format!("storage query failed: {error}"))?;
        pool.close().await;
        Ok::<(), String>(())
    }
    .await;

    match result {
        Ok(()) => DoctorCheck {
            name: "storage_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.storage.url),
        },
        Err(error) => {
            DoctorCheck { name: "storage_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

async fn check_inventory_reachability(config: &AppConfig) -> DoctorCheck {
    let result = match HttpInventoryClient::new(&config.inventory) {
        Ok(client) => client.probe().await,
        Err(error) => Err(error),
    };

    match result {
        Ok(status) => DoctorCheck {
            name: "inventory_reachability",
            status: CheckStatus::Pass,
            details: format!("`{}` answered with HTTP {status}", config.inventory.base_url),
        },
        Err(error) => DoctorCheck {
            name: "inventory_reachability",
            status: CheckStatus::Fail,
            details: format!("`{}` is unreachable: {error}", config.inventory.base_url),
        },
    }
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
