//! `runwire validate` — Check names against the event name grammar.

use runwire_core::{InvalidNameError, Namespace, validate_name};

/// Check every name, keeping the result for each.
pub fn check_names(names: &[String]) -> Vec<(&str, Result<(), InvalidNameError>)> {
    names
        .iter()
        .map(|name| (name.as_str(), validate_name(name)))
        .collect()
}

pub async fn run(names: &[String], namespace: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    if names.is_empty() && namespace.is_none() {
        return Err("Nothing to validate: pass event names and/or --namespace".into());
    }

    let mut failures = 0;

    if let Some(path) = namespace {
        match Namespace::parse(path) {
            Ok(ns) => println!("  ✅ namespace {path} ({} segments)", ns.len()),
            Err(e) => {
                println!("  ❌ namespace {path}: {e}");
                failures += 1;
            }
        }
    }

    for (name, result) in check_names(names) {
        match result {
            Ok(()) => println!("  ✅ {name}"),
            Err(e) => {
                println!("  ❌ {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} invalid name(s)").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_names_reports_each() {
        let names = vec!["update".to_string(), "new-token".to_string()];
        let results = check_names(&names);
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0, "new-token");
        assert!(results[1].1.is_err());
    }

    #[tokio::test]
    async fn run_fails_on_invalid_namespace() {
        assert!(run(&[], Some("agent.re act")).await.is_err());
        assert!(run(&[], Some("agent.react")).await.is_ok());
    }

    #[tokio::test]
    async fn run_requires_input() {
        assert!(run(&[], None).await.is_err());
    }
}
