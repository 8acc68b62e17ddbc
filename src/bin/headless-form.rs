//! Headless Form CLI
//!
//! Command-line interface for compiling form schemas, validating values
//! against them, and applying schema modifications.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use headless_form::{
    create_headless_form, load_schema, load_schema_str, modify, FormConfig, ModifyConfig,
    ValidateError,
};
use serde_json::json;

#[derive(Parser)]
#[command(name = "headless-form")]
#[command(about = "Compile and validate JSON-Schema-driven forms")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the compiled field tree of a form schema
    Fields {
        /// Schema file
        schema: PathBuf,

        /// Initial values file used to seed visibility computation
        #[arg(long)]
        initial_values: Option<PathBuf>,

        /// Allow fields without an explicit inputType annotation
        #[arg(long)]
        lenient: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a values file against a form schema
    Validate {
        /// Schema file
        schema: PathBuf,

        /// Values file to validate
        values: PathBuf,

        /// Allow fields without an explicit inputType annotation
        #[arg(long)]
        lenient: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Apply field overrides to a schema and print the result
    Modify {
        /// Schema file
        schema: PathBuf,

        /// Override in the form dotted.path='{"title": "..."}' (repeatable)
        #[arg(long = "set", value_name = "PATH=JSON")]
        sets: Vec<String>,

        /// Keep only these top-level properties (repeatable)
        #[arg(long = "pluck", value_name = "NAME")]
        plucks: Vec<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fields {
            schema,
            initial_values,
            lenient,
            pretty,
        } => run_fields(&schema, initial_values.as_deref(), lenient, pretty),

        Commands::Validate {
            schema,
            values,
            lenient,
            json,
        } => run_validate(&schema, &values, lenient, json),

        Commands::Modify {
            schema,
            sets,
            plucks,
            pretty,
        } => run_modify(&schema, &sets, plucks, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load(path: &std::path::Path) -> Result<serde_json::Value, u8> {
    load_schema(path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn build_form(
    schema: &serde_json::Value,
    lenient: bool,
    initial_values: Option<serde_json::Value>,
) -> Result<headless_form::HeadlessForm, u8> {
    let mut config = FormConfig::new();
    if lenient {
        config = config.lenient_input_type();
    }
    if let Some(values) = initial_values {
        config = config.initial_values(values);
    }

    let form = create_headless_form(schema, config);
    if form.is_error {
        match &form.error {
            Some(e) => {
                eprintln!("Error: {}", e);
                return Err(e.exit_code() as u8);
            }
            None => {
                eprintln!("Error: form creation failed");
                return Err(2);
            }
        }
    }
    Ok(form)
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<(), u8> {
    let out = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", out);
    Ok(())
}

fn run_fields(
    schema_path: &std::path::Path,
    initial_values: Option<&std::path::Path>,
    lenient: bool,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load(schema_path)?;
    let initial = initial_values.map(load).transpose()?;
    let form = build_form(&schema, lenient, initial)?;

    let fields = serde_json::to_value(&form.fields).map_err(|e| {
        eprintln!("Error serializing fields: {}", e);
        2u8
    })?;
    print_json(&fields, pretty)
}

fn run_validate(
    schema_path: &std::path::Path,
    values_path: &std::path::Path,
    lenient: bool,
    json_output: bool,
) -> Result<(), u8> {
    let schema = load(schema_path)?;
    let values = load(values_path)?;
    let mut form = build_form(&schema, lenient, None)?;

    let result = form.handle_validation(&values);

    if json_output {
        let report = json!({
            "valid": result.is_valid(),
            "formErrors": result.form_errors,
            "normalizedValues": result.normalized_values,
        });
        print_json(&report, true)?;
    } else if let Some(errors) = &result.form_errors {
        eprintln!("Validation failed:");
        for raw in &result.raw_errors {
            eprintln!("  {}", raw);
        }
        if result.raw_errors.is_empty() {
            eprintln!("  {}", errors);
        }
    } else {
        println!("Valid");
    }

    if result.is_valid() {
        Ok(())
    } else {
        let e = ValidateError::Invalid {
            errors: result.raw_errors,
        };
        Err(e.exit_code() as u8)
    }
}

fn run_modify(
    schema_path: &std::path::Path,
    sets: &[String],
    plucks: Vec<String>,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load(schema_path)?;

    let mut config = ModifyConfig::new();
    for set in sets {
        let Some((path, attrs_json)) = set.split_once('=') else {
            eprintln!("Error: --set expects PATH=JSON, got \"{}\"", set);
            return Err(2);
        };
        let attrs = load_schema_str(attrs_json).map_err(|e| {
            eprintln!("Error in --set {}: {}", path, e);
            2u8
        })?;
        config = config.field(path, attrs);
    }
    if !plucks.is_empty() {
        config = config.pluck(plucks);
    }

    let result = modify(&schema, &config);
    for warning in &result.warnings {
        eprintln!("Warning: {}", warning);
    }
    print_json(&result.schema, pretty)
}
