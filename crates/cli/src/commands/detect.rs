//! Resource detection command

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;
use tuner_lib::{ResourceDetector, ResourceSnapshot, Resources};

use crate::output::{color_flag, format_cpu, format_limit, print_info, print_json, print_table, OutputFormat};

/// Row for the resources table
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Scope")]
    scope: &'static str,
    #[tabled(rename = "CPUs")]
    cpus: String,
    #[tabled(rename = "CPU quota")]
    quota: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

impl ResourceRow {
    fn new(scope: &'static str, resources: &Resources) -> Self {
        Self {
            scope,
            cpus: if resources.cpus == 0 {
                format_cpu(0)
            } else {
                resources.cpus.to_string()
            },
            quota: format_cpu(resources.millis),
            memory: format_limit(resources.memory),
        }
    }
}

/// Detect and print the resource snapshot
pub async fn show_resources(format: OutputFormat) -> Result<ResourceSnapshot> {
    let snapshot = ResourceDetector::new().detect_async().await;

    match format {
        OutputFormat::Json => print_json(&snapshot)?,
        OutputFormat::Table => {
            println!("{}", "Detected Resources".bold());
            println!("{}", "=".repeat(50));

            let rows = vec![
                ResourceRow::new("host", &snapshot.host),
                ResourceRow::new("container", &snapshot.container),
                ResourceRow::new("effective", &snapshot.effective()),
            ];
            print_table(&rows);
            println!();

            println!("In container:           {}", color_flag(snapshot.in_container));
            println!("Disk type:              {}", snapshot.disk_type.to_string().cyan());
            println!("OS family:              {}", snapshot.os.to_string().cyan());

            if !snapshot.in_container && snapshot.container.memory == 0 && snapshot.container.millis == 0 {
                print_info("No container limits found, tuning would use host resources");
            }
        }
    }

    Ok(snapshot)
}
