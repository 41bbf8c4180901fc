use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use tracing::debug;

use linkgraph_records::{FieldDef, GraphConfig, RecordGraph, Schema};

use crate::cli::*;
use crate::output::print_report;
use crate::script::{self, ScriptRunner};

const BUILTIN_SCHEMA: &str = include_str!("../assets/rea.toml");
const DEMO_SCRIPT: &str = include_str!("../assets/demo.json");

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args, cli.format),
        Command::Schema(args) => cmd_schema(args, cli.format),
        Command::Demo => run_script(builtin_config()?, DEMO_SCRIPT, cli.format),
    }
}

fn builtin_config() -> anyhow::Result<GraphConfig> {
    GraphConfig::from_toml_str(BUILTIN_SCHEMA).context("built-in schema")
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GraphConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading schema");
            GraphConfig::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => builtin_config(),
    }
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.schema.as_deref())?;
    let text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading {}", args.script.display()))?;
    run_script(config, &text, format)
}

fn run_script(config: GraphConfig, text: &str, format: OutputFormat) -> anyhow::Result<()> {
    let steps = script::parse(text)?;
    let graph = RecordGraph::new(config)?;
    let mut runner = ScriptRunner::new(&graph);

    for (i, step) in steps.iter().enumerate() {
        let report = runner.run_step(i + 1, step)?;
        print_report(&graph, &report, format);
    }

    if format == OutputFormat::Text {
        let index = graph.manager().index().read()?;
        println!(
            "\n{} {} step(s); index holds {} entries, {} memberships",
            "✓".green().bold(),
            steps.len(),
            index.len(),
            index.memberships()
        );
    }
    Ok(())
}

fn cmd_schema(args: SchemaArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.path.as_deref())?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config.schema)?),
        OutputFormat::Text => print_schema(&config.schema),
    }
    Ok(())
}

fn print_schema(schema: &Schema) {
    for (name, entity) in &schema.entities {
        match &entity.id_prefix {
            Some(prefix) => println!("{} {}", name.to_string().bold(), format!("(id prefix: {prefix})").dimmed()),
            None => println!("{}", name.to_string().bold()),
        }
        for (field, def) in &entity.fields {
            let required = if def.is_required() { " required" } else { "" };
            match def {
                FieldDef::Data { .. } => println!("  {field:<24} data{required}"),
                FieldDef::Link { target, .. } | FieldDef::LinkSet { target, .. } => {
                    let arrow = if matches!(def, FieldDef::LinkSet { .. }) { "->>" } else { "->" };
                    let reciprocal = def
                        .reciprocal()
                        .map(|r| format!("  (reciprocal {target}.{r})"))
                        .unwrap_or_default();
                    println!(
                        "  {field:<24} {} {}{required}{}",
                        arrow.cyan(),
                        target.to_string().cyan(),
                        reciprocal.dimmed()
                    );
                }
            }
        }
    }
}
