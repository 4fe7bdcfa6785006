//! Parameter tuning command

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::Tabled;
use tracing::debug;
use tuner_lib::detector::process_env;
use tuner_lib::postprocess::{cap_connections, overrides};
use tuner_lib::{PostProcessors, ResourceDetector, StructuredLogger, TunedParameters, TuningConfig};

use crate::config::Settings;
use crate::output::{print_json, print_success, print_table, print_warning, OutputFormat};

/// Row for the parameter table
#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "Parameter")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Build the post-processing pipeline from settings
///
/// The connection cap is applied to `config` here, ahead of calculation;
/// its step runs before the overrides so an explicit max_connections pin
/// still wins.
pub fn pipeline(settings: &Settings, config: &mut TuningConfig) -> Result<PostProcessors> {
    let mut steps = PostProcessors::new();

    if let Some(cap) = settings.cap_connections {
        steps = steps.then("cap_connections", cap_connections(config, cap));
    }

    if !settings.overrides.is_empty() {
        let pinned = overrides(&settings.overrides).context("Invalid parameter override")?;
        steps = steps.then("overrides", pinned);
    }

    Ok(steps)
}

/// Resolve inputs, calculate and print the tuned parameters
pub async fn run(settings: Settings, format: OutputFormat) -> Result<TunedParameters> {
    let snapshot = if settings.needs_detection() {
        Some(ResourceDetector::new().detect_async().await)
    } else {
        debug!("Memory and CPUs given, skipping detection");
        None
    };

    let mut config = settings
        .resolve(snapshot.as_ref(), process_env)
        .context("Invalid tuning input")?;
    let steps = pipeline(&settings, &mut config)?;
    let params = steps.run(&config);

    StructuredLogger::new("cli").log_tuning(&config, &params);

    match format {
        OutputFormat::Json => print_json(&params)?,
        OutputFormat::Table => print_parameters(&config, &params),
    }

    Ok(params)
}

fn print_parameters(config: &TuningConfig, params: &TunedParameters) {
    println!("{}", "Tuned Parameters".bold());
    println!("{}", "=".repeat(50));
    println!(
        "Basis:                  {} memory, {} CPUs, {} on {} ({})",
        tuner_lib::units::format_size(config.memory).cyan(),
        config.cpus.to_string().cyan(),
        format!("PostgreSQL {}", config.pg_version).cyan(),
        config.os,
        config.disk_type
    );
    println!("Workload:               {}", config.workload.to_string().cyan());
    println!();

    let rows: Vec<ParameterRow> = params
        .values()
        .into_iter()
        .map(|(spec, value)| ParameterRow {
            name: spec.name,
            value: value.to_string(),
        })
        .collect();
    print_table(&rows);

    if params.warnings.is_empty() {
        print_success("No advisories");
    } else {
        println!();
        for warning in &params.warnings {
            print_warning(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tuner_lib::units::GIB;
    use tuner_lib::{calculate, DiskType, OsFamily, WorkloadType};

    fn config() -> TuningConfig {
        TuningConfig {
            memory: 16 * GIB,
            cpus: 8,
            os: OsFamily::Linux,
            disk_type: DiskType::Ssd,
            pg_version: 17,
            workload: WorkloadType::Oltp,
            max_connections: None,
        }
    }

    #[test]
    fn test_pipeline_order() {
        let settings = Settings {
            cap_connections: Some(50),
            overrides: BTreeMap::from([("work_mem".to_string(), "8MB".to_string())]),
            ..Default::default()
        };
        let steps = pipeline(&settings, &mut config()).unwrap();
        assert_eq!(steps.names(), vec!["cap_connections", "overrides"]);
    }

    #[test]
    fn test_cap_is_applied_before_calculation() {
        let settings = Settings {
            cap_connections: Some(50),
            ..Default::default()
        };
        let mut capped = config();
        let params = pipeline(&settings, &mut capped).unwrap().run(&capped);

        let direct = calculate(&TuningConfig {
            max_connections: Some(50),
            ..config()
        });
        assert_eq!(params.max_connections, 50);
        assert_eq!(params.work_mem, direct.work_mem);
    }

    #[test]
    fn test_pinned_connections_win_over_cap() {
        let settings = Settings {
            cap_connections: Some(50),
            overrides: BTreeMap::from([("max_connections".to_string(), "120".to_string())]),
            ..Default::default()
        };
        let mut capped = config();
        let params = pipeline(&settings, &mut capped).unwrap().run(&capped);
        assert_eq!(params.max_connections, 120);
    }

    #[test]
    fn test_pipeline_rejects_unknown_parameter() {
        let settings = Settings {
            overrides: BTreeMap::from([("fsync".to_string(), "off".to_string())]),
            ..Default::default()
        };
        assert!(pipeline(&settings, &mut config()).is_err());
    }

    #[test]
    fn test_empty_pipeline() {
        assert!(pipeline(&Settings::default(), &mut config()).unwrap().is_empty());
    }
}
