use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use svcwire_frame::{Message, Value};
use svcwire_session::ServiceInfo;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FieldOutput {
    #[serde(rename = "type")]
    type_name: &'static str,
    value: serde_json::Value,
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    service: &'a str,
    signature: &'a str,
    fields: Vec<FieldOutput>,
}

#[derive(Serialize)]
struct ServiceOutput<'a> {
    name: &'a str,
    service_id: u32,
    machine_id: &'a str,
    endpoints: &'a [String],
}

pub fn print_reply(service: &str, signature: &str, reply: &Message, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                service,
                signature,
                fields: reply
                    .iter()
                    .map(|value| FieldOutput {
                        type_name: value.tag().name(),
                        value: json_value(value),
                    })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "TYPE", "VALUE"]);
            for (index, value) in reply.iter().enumerate() {
                table.add_row(vec![
                    index.to_string(),
                    value.tag().name().to_string(),
                    value.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{service} {signature} -> {} field(s)", reply.len());
            for (index, value) in reply.iter().enumerate() {
                println!("  [{index}] {}: {value}", value.tag().name());
            }
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            for value in reply.iter() {
                let _ = match value {
                    Value::Raw(bytes) => out.write_all(bytes),
                    other => writeln!(out, "{other}"),
                };
            }
            let _ = out.flush();
        }
    }
}

pub fn print_service(info: &ServiceInfo, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ServiceOutput {
                name: &info.name,
                service_id: info.service_id,
                machine_id: &info.machine_id,
                endpoints: &info.endpoints,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "ID", "MACHINE", "ENDPOINTS"])
                .add_row(vec![
                    info.name.clone(),
                    info.service_id.to_string(),
                    info.machine_id.clone(),
                    info.endpoints.join("\n"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Service:");
            println!("  Name:       {}", info.name);
            println!("  Service ID: {}", info.service_id);
            println!("  Machine ID: {}", info.machine_id);
            println!("  Endpoints:  {}", info.endpoints.join(", "));
        }
        OutputFormat::Raw => {
            for endpoint in &info.endpoints {
                println!("{endpoint}");
            }
        }
    }
}

/// Directory listing; `raw` prints one service name per line.
pub fn print_services(services: &[ServiceInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<ServiceOutput<'_>> = services
                .iter()
                .map(|info| ServiceOutput {
                    name: &info.name,
                    service_id: info.service_id,
                    machine_id: &info.machine_id,
                    endpoints: &info.endpoints,
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "ID", "MACHINE", "ENDPOINTS"]);
            for info in services {
                table.add_row(vec![
                    info.name.clone(),
                    info.service_id.to_string(),
                    info.machine_id.clone(),
                    info.endpoints.join("\n"),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if services.is_empty() {
                println!("No services registered.");
            }
            for info in services {
                println!(
                    "{} (#{}) {}",
                    info.name,
                    info.service_id,
                    info.endpoints.join(", ")
                );
            }
        }
        OutputFormat::Raw => {
            for info in services {
                println!("{}", info.name);
            }
        }
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Bool(v) => (*v).into(),
        Value::Int8(v) => (*v).into(),
        Value::UInt8(v) => (*v).into(),
        Value::Int16(v) => (*v).into(),
        Value::UInt16(v) => (*v).into(),
        Value::Int32(v) => (*v).into(),
        Value::UInt32(v) => (*v).into(),
        Value::Int64(v) => (*v).into(),
        Value::UInt64(v) => (*v).into(),
        Value::Float(v) => (*v).into(),
        Value::Double(v) => (*v).into(),
        Value::String(v) => v.as_str().into(),
        Value::Raw(bytes) => bytes
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>()
            .into(),
    }
}
