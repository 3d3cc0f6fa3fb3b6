use anyhow::{Context, Result};
use colored::Colorize;
use medgate_authz::{AuthzConfig, PredicateLibrary};
use serde_json::json;

use crate::cli::OutputFormat;
use crate::output::{print_json, print_success};

/// Compile the configured policy and report what it contains.
pub fn check(config: &AuthzConfig, format: OutputFormat) -> Result<()> {
    let source = policy_source(config);
    let engine = config
        .build_engine(PredicateLibrary::builtin())
        .with_context(|| format!("{source} is invalid"))?;
    let table = engine.table();
    let summary = table.summary();

    match format {
        OutputFormat::Json => print_json(&json!({
            "source": source,
            "valid": true,
            "summary": summary,
            "modules": table.modules(),
            "predicates": engine.predicates().names(),
        }))?,
        OutputFormat::Table => {
            print_success(&format!("{source} is valid"));
            println!("{}: {}", "Modules".cyan(), table.modules().join(", "));
            println!("{}: {}", "Rules".cyan(), summary.rules);
            println!("{}: {}", "Own-scoped rules".cyan(), summary.own_scoped_rules);
            println!(
                "{}: {}",
                "Predicate references".cyan(),
                summary.predicate_references
            );
        }
    }
    Ok(())
}

pub fn policy_source(config: &AuthzConfig) -> String {
    config
        .policy_path
        .as_ref()
        .map_or_else(|| "built-in policy".to_string(), |p| p.display().to_string())
}
