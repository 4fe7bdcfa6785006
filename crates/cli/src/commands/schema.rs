//! Parameter schema command

use anyhow::Result;
use tabled::Tabled;
use tuner_lib::schema::{json_schema, ParamKind, PARAMETERS};

use crate::output::{print_json, print_table, OutputFormat};

/// Row for the parameter table
#[derive(Tabled)]
struct SchemaRow {
    #[tabled(rename = "Parameter")]
    name: &'static str,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Optional")]
    optional: bool,
    #[tabled(rename = "Description")]
    description: &'static str,
}

/// Print every tunable parameter
pub fn show_schema(format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json_schema())?,
        OutputFormat::Table => {
            let rows: Vec<SchemaRow> = PARAMETERS
                .iter()
                .map(|spec| SchemaRow {
                    name: spec.name,
                    kind: match spec.kind {
                        ParamKind::Bytes => "bytes".to_string(),
                        ParamKind::Float => "float".to_string(),
                        ParamKind::Integer => "integer".to_string(),
                        ParamKind::Enum => spec.values.join(" | "),
                    },
                    optional: spec.optional,
                    description: spec.description,
                })
                .collect();
            print_table(&rows);
        }
    }
    Ok(())
}
