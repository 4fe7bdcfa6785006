//! Explicit post-processing of calculated parameters
//!
//! Callers build a [`PostProcessors`] list at the call site and run it
//! together with the calculator. Each step is a pure function of the input
//! config and the parameters produced by the previous step; steps run in
//! insertion order.

use crate::calculator::calculate;
use crate::error::{Result, TuneError};
use crate::models::{TunedParameters, TuningConfig};
use crate::schema::{lookup, ParamValue};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A single transformation step
pub type PostProcessor = Box<dyn Fn(&TuningConfig, TunedParameters) -> TunedParameters + Send + Sync>;

/// Ordered list of post-processing steps
#[derive(Default)]
pub struct PostProcessors {
    steps: Vec<(String, PostProcessor)>,
}

impl PostProcessors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn then<F>(mut self, name: impl Into<String>, step: F) -> Self
    where
        F: Fn(&TuningConfig, TunedParameters) -> TunedParameters + Send + Sync + 'static,
    {
        self.steps.push((name.into(), Box::new(step)));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Apply every step to already calculated parameters
    pub fn apply(&self, config: &TuningConfig, mut params: TunedParameters) -> TunedParameters {
        for (name, step) in &self.steps {
            debug!(step = %name, "Running post-processor");
            params = step(config, params);
        }
        params
    }

    /// Calculate and post-process in one call
    pub fn run(&self, config: &TuningConfig) -> TunedParameters {
        self.apply(config, calculate(config))
    }
}

/// Pin parameters to user-supplied values
///
/// Names and values are validated here. A value the parameter set still
/// rejects is left alone and reported in the warnings.
pub fn overrides(
    pinned: &BTreeMap<String, String>,
) -> Result<impl Fn(&TuningConfig, TunedParameters) -> TunedParameters + Send + Sync + 'static>
{
    let mut parsed = Vec::with_capacity(pinned.len());
    for (name, text) in pinned {
        let spec = lookup(name).ok_or_else(|| TuneError::UnknownParameter(name.clone()))?;
        parsed.push((spec.name, ParamValue::parse(spec, text)?));
    }

    Ok(move |_: &TuningConfig, mut params: TunedParameters| {
        for (name, value) in &parsed {
            match params.set(name, value.clone()) {
                Ok(()) => params
                    .warnings
                    .push(format!("{} pinned to {} by override", name, value)),
                Err(e) => {
                    warn!(parameter = %name, error = %e, "Override not applied");
                    params
                        .warnings
                        .push(format!("{} override not applied: {}", name, e));
                }
            }
        }
        params
    })
}

/// Clamp the connection count in `config` to at most `cap`
///
/// work_mem is divided by the connection count, so the clamp has to land
/// in the config before [`crate::calculate`] runs. The returned step notes the
/// change in the warnings.
pub fn cap_connections(
    config: &mut TuningConfig,
    cap: u32,
) -> impl Fn(&TuningConfig, TunedParameters) -> TunedParameters + Send + Sync + 'static {
    let requested = config.resolved_max_connections();
    if requested > cap {
        config.max_connections = Some(cap);
    }

    move |_: &TuningConfig, mut params: TunedParameters| {
        if requested > cap {
            params.warnings.push(format!(
                "max_connections lowered from {} to {}",
                requested, cap
            ));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiskType, OsFamily, WorkloadType};
    use crate::units::GIB;

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
    fn test_empty_pipeline_matches_calculator() {
        let cfg = config();
        assert_eq!(PostProcessors::new().run(&cfg), calculate(&cfg));
    }

    #[test]
    fn test_steps_run_in_order() {
        let pipeline = PostProcessors::new()
            .then("double", |_: &TuningConfig, mut p: TunedParameters| {
                p.max_connections *= 2;
                p
            })
            .then("plus-one", |_: &TuningConfig, mut p: TunedParameters| {
                p.max_connections += 1;
                p
            });

        assert_eq!(pipeline.names(), vec!["double", "plus-one"]);
        assert_eq!(pipeline.run(&config()).max_connections, 601);
    }

    #[test]
    fn test_overrides_pin_values() {
        let mut pinned = BTreeMap::new();
        pinned.insert("shared_buffers".to_string(), "2GB".to_string());
        pinned.insert("huge_pages".to_string(), "try".to_string());

        let pipeline = PostProcessors::new().then("overrides", overrides(&pinned).unwrap());
        let params = pipeline.run(&config());

        assert_eq!(params.shared_buffers, 2 * GIB);
        assert_eq!(params.huge_pages, crate::models::HugePages::Try);
        assert_eq!(params.warnings.len(), 2);
    }

    #[test]
    fn test_overrides_reject_unknown_parameter() {
        let mut pinned = BTreeMap::new();
        pinned.insert("shared_bufers".to_string(), "2GB".to_string());

        assert!(matches!(
            overrides(&pinned),
            Err(TuneError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_overrides_reject_bad_value() {
        let mut pinned = BTreeMap::new();
        pinned.insert("work_mem".to_string(), "lots".to_string());

        assert!(matches!(overrides(&pinned), Err(TuneError::InvalidSize(_))));
    }

    #[test]
    fn test_cap_connections() {
        let mut cfg = config();
        let step = cap_connections(&mut cfg, 100);
        assert_eq!(cfg.max_connections, Some(100));

        let params = PostProcessors::new().then("cap", step).run(&cfg);

        assert_eq!(params.max_connections, 100);
        assert_eq!(params.warnings, vec!["max_connections lowered from 300 to 100"]);
    }

    #[test]
    fn test_capped_work_mem_matches_direct_calculation() {
        let mut cfg = config();
        let step = cap_connections(&mut cfg, 50);
        let capped = PostProcessors::new().then("cap", step).run(&cfg);

        let direct = calculate(&TuningConfig {
            max_connections: Some(50),
            ..config()
        });

        assert_eq!(capped.max_connections, 50);
        assert_eq!(capped.work_mem, direct.work_mem);
        assert!(capped.work_mem > calculate(&config()).work_mem);
    }

    #[test]
    fn test_cap_connections_noop_when_below() {
        let mut cfg = config();
        let step = cap_connections(&mut cfg, 1000);
        assert_eq!(cfg.max_connections, None);

        let params = PostProcessors::new().then("cap", step).run(&cfg);

        assert_eq!(params.max_connections, 300);
        assert!(params.warnings.is_empty());
    }

    #[test]
    fn test_cap_connections_respects_pinned_count() {
        let mut cfg = TuningConfig {
            max_connections: Some(80),
            ..config()
        };
        let step = cap_connections(&mut cfg, 100);
        let params = PostProcessors::new().then("cap", step).run(&cfg);

        assert_eq!(params.max_connections, 80);
        assert!(params.warnings.is_empty());
    }
}
