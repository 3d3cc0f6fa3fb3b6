use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use medgate_authz::{
    AccessContext, AccessDecision, AuthzConfig, JsonRow, PredicateLibrary, RowAttributes,
};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::cli::{DecideArgs, OutputFormat};
use crate::output::{print_denied, print_json, print_success};

/// Evaluate one request against the configured policy.
pub fn decide(config: &AuthzConfig, args: &DecideArgs, format: OutputFormat) -> Result<()> {
    let engine = config.build_engine(PredicateLibrary::builtin())?;
    let context = build_context(config, args)?;
    let row = args
        .row
        .as_deref()
        .map(read_json)
        .transpose()?
        .map(JsonRow::new);

    let decision = engine.evaluate_for(
        &args.role,
        &args.module,
        args.action,
        &context,
        row.as_ref().map(|r| r as &dyn RowAttributes),
    );

    match format {
        OutputFormat::Json => print_json(&json!({
            "role": args.role,
            "module": args.module,
            "action": args.action,
            "allowed": decision.is_allowed(),
            "reason": decision.deny_reason(),
        }))?,
        OutputFormat::Table => {
            let request = format!("{} {} {}", args.role, args.action, args.module);
            match &decision {
                AccessDecision::Allow => print_success(&format!("{request}: {}", "allowed".green())),
                AccessDecision::Deny(reason) => {
                    print_denied(&format!("{request}: {}", "denied".red()));
                    if args.explain {
                        println!("  {}: {}", "code".cyan(), reason.code);
                        println!("  {}: {}", "reason".cyan(), reason.message);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Context from `--context`, or from the identity flags, with the configured
/// rule parameters underneath.
pub fn build_context(config: &AuthzConfig, args: &DecideArgs) -> Result<AccessContext> {
    let builder = match &args.context {
        Some(path) => {
            let context: AccessContext = serde_json::from_value(read_json(path)?)
                .with_context(|| format!("{} is not a valid context", path.display()))?;
            let rules = config.rules.clone().merged_with(context.rules());
            context.to_builder().with_rules(rules)
        }
        None => {
            let mut builder = AccessContext::builder(args.user_id).with_rules(config.rules.clone());
            if let Some(id) = args.patient_id {
                builder = builder.with_patient_id(id);
            }
            if let Some(id) = args.doctor_id {
                builder = builder.with_doctor_id(id);
            }
            if let Some(id) = args.staff_id {
                builder = builder.with_staff_id(id);
            }
            builder
        }
    };

    let builder = match &args.at {
        Some(at) => {
            let at = OffsetDateTime::parse(at, &Rfc3339)
                .with_context(|| format!("--at `{at}` is not an RFC 3339 timestamp"))?;
            builder.with_request_time(at)
        }
        None => builder,
    };
    Ok(builder.build())
}

fn read_json(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use medgate_authz::Action;
    use medgate_authz::context::PATIENT_CANCEL_BEFORE_HOURS;
    use time::macros::datetime;

    fn args() -> DecideArgs {
        DecideArgs {
            role: "patient".to_string(),
            module: "appointments".to_string(),
            action: Action::Update,
            user_id: 12,
            patient_id: Some(7),
            doctor_id: None,
            staff_id: None,
            context: None,
            row: None,
            at: Some("2026-05-04T10:00:00Z".to_string()),
            explain: false,
        }
    }

    #[test]
    fn test_context_from_flags() {
        let context = build_context(&AuthzConfig::default(), &args()).unwrap();
        assert_eq!(context.user_id(), 12);
        assert_eq!(context.patient_id(), Some(7));
        assert_eq!(context.request_time(), datetime!(2026-05-04 10:00 UTC));
        assert_eq!(context.rules().get_i64(PATIENT_CANCEL_BEFORE_HOURS), Some(4));
    }

    #[test]
    fn test_context_file_overrides_config_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        std::fs::write(
            &path,
            r#"{ "userId": 3, "doctorId": 9, "rules": { "patientCancelBeforeHours": 24 } }"#,
        )
        .unwrap();

        let args = DecideArgs {
            context: Some(path),
            patient_id: None,
            ..args()
        };
        let context = build_context(&AuthzConfig::default(), &args).unwrap();
        assert_eq!(context.user_id(), 3);
        assert_eq!(context.doctor_id(), Some(9));
        assert_eq!(context.rules().get_i64(PATIENT_CANCEL_BEFORE_HOURS), Some(24));
        assert_eq!(context.request_time(), datetime!(2026-05-04 10:00 UTC));
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let args = DecideArgs {
            at: Some("next tuesday".to_string()),
            ..args()
        };
        assert!(build_context(&AuthzConfig::default(), &args).is_err());
    }
}
