use clap::{Parser, Subcommand, ValueEnum};
use recordkit::{filters, schema, Fetch, FetchResponse, Recordset, SortColumn};
use serde_json::{json, Value};
use std::path::Path;
use std::process;

/// recordkit CLI: page, validate and describe JSON rows against a YAML field set
#[derive(Parser)]
#[command(name = "recordkit", version, about)]
struct Cli {
    /// Path to the YAML field-set definition
    #[arg(long)]
    schema: String,

    /// Path to a JSON file holding an array of rows or a {data, totalCount} page
    #[arg(long)]
    data: String,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Print one page of the sorted, filtered rows
    Page {
        /// Rows per page
        #[arg(long, default_value_t = 10)]
        size: usize,
        /// One-based page number
        #[arg(long, default_value_t = 1)]
        number: usize,
        /// Sort column, optionally descending (e.g. --sort amount:desc)
        #[arg(long = "sort")]
        sort: Vec<String>,
        /// Keep rows whose field contains the text (e.g. --contains name=ali)
        #[arg(long = "contains", value_parser = parse_key_value)]
        contains: Vec<(String, String)>,
    },

    /// Report every record's validation errors
    Validate,

    /// Show each field's descriptions and resolved input type
    Describe,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn parse_sort(s: &str) -> SortColumn {
    match s.rsplit_once(':') {
        Some((field, "desc")) => SortColumn::descending(field),
        Some((field, "asc")) => SortColumn::ascending(field),
        _ => SortColumn::ascending(s),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let field_types = schema::parse_fieldset(Path::new(&cli.schema))?.field_types()?;
    let content = std::fs::read_to_string(&cli.data)
        .map_err(|e| format!("Failed to read data file '{}': {e}", cli.data))?;
    let response: FetchResponse = serde_json::from_str(&content)?;
    log::debug!("Loaded field set '{}' and data '{}'", cli.schema, cli.data);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let recordset = Recordset::new(field_types, Fetch::data(response));

        match &cli.command {
            Command::Page {
                size,
                number,
                sort,
                contains,
            } => {
                recordset.set_initial_page_size(*size);
                recordset.request_update().await;

                if !sort.is_empty() {
                    recordset.set_sort_columns(sort.iter().map(|s| parse_sort(s)).collect());
                }
                if !contains.is_empty() {
                    recordset.set_filter(filters::and(
                        contains
                            .iter()
                            .map(|(field, text)| filters::contains(field.as_str(), text.as_str()))
                            .collect(),
                    ));
                }
                recordset.set_page_number(*number);
                recordset.request_update().await;

                let rows: Vec<Value> = recordset.current_page().iter().map(|r| r.values()).collect();
                print_output(
                    &json!({
                        "page": recordset.page_number(),
                        "page_count": recordset.page_count(),
                        "total_count": recordset.total_count(),
                        "filtered_count": recordset.filtered_count(),
                        "first": recordset.first_record_number_on_page(),
                        "last": recordset.last_record_number_on_page(),
                        "rows": rows,
                    }),
                    &cli.format,
                )?;
            }

            Command::Validate => {
                recordset.request_update().await;
                let records = recordset.all_records();
                let report: Vec<Value> = records
                    .iter()
                    .enumerate()
                    .filter(|(_, record)| !record.is_valid())
                    .map(|(index, record)| {
                        json!({ "index": index, "errors": record.readable_record_errors() })
                    })
                    .collect();
                print_output(
                    &json!({
                        "valid": recordset.is_valid(),
                        "records": records.len(),
                        "invalid_records": recordset.invalid_record_count(),
                        "errors": report,
                    }),
                    &cli.format,
                )?;
            }

            Command::Describe => {
                let fields: serde_json::Map<String, Value> = recordset
                    .field_types()
                    .iter()
                    .map(|(name, field_type)| {
                        let input_type = match field_type.input_type() {
                            Ok(input_type) => json!(input_type),
                            Err(e) => json!({ "error": e.to_string() }),
                        };
                        let description = json!({
                            "label": field_type.label(None),
                            "input_type": input_type,
                            "descriptions": field_type.info(),
                            "sortable": field_type.sortable(),
                            "has_options": field_type.has_options(),
                        });
                        (name.clone(), description)
                    })
                    .collect();
                print_output(&Value::Object(fields), &cli.format)?;
            }
        }

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn print_output(value: &Value, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
