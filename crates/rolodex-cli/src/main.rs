use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "rolodex", version, about = "Rolodex CLI - contacts management")]
struct Cli {
    /// Server URL
    #[arg(long, env = "ROLODEX_URL", default_value = "http://localhost:8000")]
    server: String,

    /// Access token (see `rolodex login`)
    #[arg(long, env = "ROLODEX_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print an access token
    Login { username: String, password: String },
    /// Show the current user
    Me,
    /// List contacts
    Contacts {
        /// Maximum number of contacts to show
        #[arg(long, default_value = "10")]
        limit: i64,
        #[arg(long, default_value = "0")]
        skip: i64,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Contacts with a birthday in the coming week
    Birthdays {
        /// First day of the week (YYYY-MM-DD, default: today on the server)
        #[arg(long)]
        date: Option<String>,
    },
    /// Check the server and database are up
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = Client::new();
    let server = cli.server.trim_end_matches('/');

    match cli.command {
        Commands::Login { username, password } => {
            let req = client
                .post(format!("{}/api/auth/login", server))
                .form(&[("username", username), ("password", password)]);
            let body = send(req).await?;
            let token = body
                .get("access_token")
                .and_then(|v| v.as_str())
                .context("Response has no access_token")?;
            println!("{}", token);
        }
        Commands::Me => {
            let req = authorized(client.get(format!("{}/api/users/me", server)), &cli.token)?;
            print_json(&send(req).await?)?;
        }
        Commands::Contacts {
            limit,
            skip,
            first_name,
            last_name,
            email,
        } => {
            let query = contact_query(limit, skip, first_name, last_name, email);
            let req = authorized(
                client.get(format!("{}/api/contacts", server)).query(&query),
                &cli.token,
            )?;
            print_json(&send(req).await?)?;
        }
        Commands::Birthdays { date } => {
            let mut req = client.get(format!("{}/api/contacts/weekly-birthday", server));
            if let Some(date) = date {
                req = req.query(&[("birthday_date", date)]);
            }
            print_json(&send(authorized(req, &cli.token)?).await?)?;
        }
        Commands::Health => {
            let body = send(client.get(format!("{}/api/healthchecker", server))).await?;
            println!(
                "{}",
                body.get("message").and_then(|v| v.as_str()).unwrap_or("-")
            );
        }
    }

    Ok(())
}

fn authorized(req: RequestBuilder, token: &Option<String>) -> Result<RequestBuilder> {
    let token = token
        .as_deref()
        .context("An access token is required: pass --token or set ROLODEX_TOKEN")?;
    Ok(req.bearer_auth(token))
}

fn contact_query(
    limit: i64,
    skip: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
) -> Vec<(&'static str, String)> {
    let mut query = vec![("limit", limit.to_string()), ("skip", skip.to_string())];
    let filters = [
        ("first_name", first_name),
        ("last_name", last_name),
        ("email", email),
    ];
    for (key, value) in filters {
        if let Some(value) = value {
            query.push((key, value));
        }
    }
    query
}

async fn send(req: RequestBuilder) -> Result<Value> {
    let resp = req.send().await.context("Failed to connect to server")?;
    let status = resp.status();
    let text = resp.text().await.context("Failed to read response")?;
    parse_response(status, &text)
}

fn parse_response(status: StatusCode, text: &str) -> Result<Value> {
    if !status.is_success() {
        anyhow::bail!("Server returned {}: {}", status, error_message(text));
    }
    serde_json::from_str(text).context("Failed to parse response")
}

/// The `error` field of a JSON error body, or the raw body otherwise.
fn error_message(text: &str) -> String {
    let from_json = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| body.get("error").and_then(|v| v.as_str()).map(str::to_string));
    match from_json {
        Some(message) => message,
        None if text.trim().is_empty() => "Unknown error".to_string(),
        None => text.trim().to_string(),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
