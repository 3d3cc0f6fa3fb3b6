use anyhow::{Result, bail};
use medgate_authz::{Action, AuthzConfig, PolicyTable, PredicateLibrary, Role, Rule};
use serde::Serialize;

use crate::cli::{MatrixArgs, OutputFormat};
use crate::output::{print_json, print_table};

#[derive(Debug, Serialize)]
pub struct MatrixEntry {
    pub module: String,
    pub role: Role,
    pub create: String,
    pub read: String,
    pub update: String,
    pub delete: String,
    pub predicates: Vec<String>,
}

/// Print the configured scope of every role on every module.
pub fn matrix(config: &AuthzConfig, args: &MatrixArgs, format: OutputFormat) -> Result<()> {
    let engine = config.build_engine(PredicateLibrary::builtin())?;
    let entries = build_matrix(engine.table(), args.module.as_deref(), args.role.as_deref())?;

    match format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = entries
                .into_iter()
                .map(|e| {
                    vec![
                        e.module,
                        e.role.to_string(),
                        e.create,
                        e.read,
                        e.update,
                        e.delete,
                        e.predicates.join(", "),
                    ]
                })
                .collect();
            print_table(
                &["Module", "Role", "Create", "Read", "Update", "Delete", "Predicates"],
                &rows,
            );
        }
    }
    Ok(())
}

pub fn build_matrix(
    table: &PolicyTable,
    module: Option<&str>,
    role: Option<&str>,
) -> Result<Vec<MatrixEntry>> {
    let modules: Vec<&str> = match module {
        Some(m) if table.contains_module(m) => vec![m],
        Some(m) => bail!("module `{m}` is not in the policy"),
        None => table.modules(),
    };
    let roles: Vec<Role> = match role {
        Some(r) => vec![r.parse()?],
        None => Role::ALL.to_vec(),
    };

    let mut entries = Vec::new();
    for module in modules {
        for &role in &roles {
            let Some(rule) = table.lookup(module, role) else {
                continue;
            };
            entries.push(MatrixEntry {
                module: module.to_string(),
                role,
                create: rule.create.to_string(),
                read: rule.read.to_string(),
                update: rule.update.to_string(),
                delete: rule.delete.to_string(),
                predicates: predicate_labels(rule),
            });
        }
    }
    Ok(entries)
}

/// Rule-wide predicates by name, per-action ones as `name (action)`.
fn predicate_labels(rule: &Rule) -> Vec<String> {
    let mut labels: Vec<String> = rule.predicates.clone();
    for action in Action::ALL {
        labels.extend(
            rule.on
                .for_action(action)
                .iter()
                .map(|name| format!("{name} ({action})")),
        );
    }
    labels
}
