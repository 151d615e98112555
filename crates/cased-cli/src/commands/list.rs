//! List command implementation.

use anyhow::{anyhow, Result};
use cased_client::{CasedClient, ListParams, ResultsList, DEFAULT_PAGE_SIZE};
use clap::Args;
use serde_json::{Map, Value};
use tracing::info;

use super::ConnectionArgs;

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Page size
    #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub limit: u32,

    /// Only events performed by this actor
    #[arg(long, conflicts_with_all = ["action", "phrase"])]
    pub actor: Option<String>,

    /// Only events with this action
    #[arg(long, conflicts_with = "phrase")]
    pub action: Option<String>,

    /// Raw search phrase, e.g. `(actor:jill AND action:user.login)`
    #[arg(long)]
    pub phrase: Option<String>,

    /// Variable filter as `key=value` (repeatable)
    #[arg(long = "var", value_parser = parse_variable)]
    pub variables: Vec<(String, String)>,

    /// Named policy key to list with
    #[arg(long)]
    pub policy: Option<String>,

    /// Policy key to use instead of the configured one
    #[arg(long, hide_env_values = true)]
    pub key: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Runs the list command.
///
/// # Errors
///
/// Returns an error if no policy key is available or the request fails.
pub fn run(args: &ListArgs) -> Result<()> {
    let client = CasedClient::new(args.connection.config()?)?;
    let events = client.events();
    let params = params(args);
    let key = args.key.as_deref();

    info!(limit = args.limit, "Listing events");

    let page = match (&args.actor, &args.action) {
        (Some(actor), _) => events.list_by_actor(actor, params, key)?,
        (None, Some(action)) => events.list_by_action(action, params, key)?,
        (None, None) => events.list(&params, key)?,
    };

    print_page(&page)
}

/// Builds list parameters, without the actor or action phrase.
fn params(args: &ListArgs) -> ListParams {
    let mut params = ListParams::new().with_limit(args.limit);
    if let Some(phrase) = &args.phrase {
        params = params.with_search(phrase.as_str());
    }
    if !args.variables.is_empty() {
        let variables: Map<String, Value> = args
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        params = params.with_variables(Value::Object(variables));
    }
    if let Some(policy) = &args.policy {
        params = params.with_policy(policy.as_str());
    }
    params
}

fn print_page(page: &ResultsList) -> Result<()> {
    for event in &page.results {
        println!("{}", serde_json::to_string(event)?);
    }

    match page.total_count {
        Some(total) => eprintln!("Showing {} of {total} events", page.len()),
        None => eprintln!("Showing {} events", page.len()),
    }
    if let Some(next) = &page.next_page_url {
        eprintln!("Next page: {next}");
    }
    Ok(())
}

/// Parses a `key=value` variable filter.
fn parse_variable(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(anyhow!("variable name is empty in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;
    use serde_json::json;

    fn parse(argv: &[&str]) -> ListArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        let Commands::List(args) = cli.command else {
            panic!("expected list");
        };
        args
    }

    #[test]
    fn test_parse_variable() {
        assert_eq!(
            parse_variable("team=team_1").unwrap(),
            ("team".to_string(), "team_1".to_string())
        );
        assert_eq!(
            parse_variable("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert!(parse_variable("team").is_err());
        assert!(parse_variable("=x").is_err());
    }

    #[test]
    fn test_default_params() {
        let args = parse(&["cased", "list"]);
        assert_eq!(params(&args), ListParams::new());
    }

    #[test]
    fn test_params_from_flags() {
        let args = parse(&[
            "cased", "list", "--limit", "10", "--phrase", "(actor:jill)", "--var",
            "team=team_1", "--var", "organization=org_1", "--policy", "organization",
        ]);

        let params = params(&args);
        assert_eq!(params.limit, 10);
        assert_eq!(params.search.as_deref(), Some("(actor:jill)"));
        assert_eq!(
            params.variables,
            Some(json!({"team": "team_1", "organization": "org_1"}))
        );
        assert_eq!(params.policy.as_deref(), Some("organization"));
    }

    #[test]
    fn test_actor_conflicts_with_phrase() {
        let result = Cli::try_parse_from(["cased", "list", "--actor", "jill", "--phrase", "x"]);
        assert!(result.is_err());
    }
}
