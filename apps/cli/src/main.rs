//! mcphost - start capability servers and call their tools

mod bootstrap;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mcphost_core::CredentialInput;
use mcphost_runtime::{ServerConfig, ServerManager};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "mcphost")]
#[command(about = "Capability server host - start servers, manage credentials, call tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// User the servers and credentials belong to
    #[arg(long, global = true, env = "MCPHOST_USER", default_value = "default")]
    user: String,

    /// Print lifecycle events to stderr
    #[arg(long, global = true)]
    events: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List startable servers with their status
    List,

    /// Show the status of one server
    Status {
        server: String,
    },

    /// Start a server and print its capabilities
    Start {
        server: String,

        /// Environment for local servers (NAME=VALUE, repeatable)
        #[arg(long = "env", value_parser = parse_env)]
        env: Vec<(String, String)>,
    },

    /// Start a server and call one of its tools
    Call {
        server: String,
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,

        #[arg(long = "env", value_parser = parse_env)]
        env: Vec<(String, String)>,
    },

    /// Start a server and read a resource
    Read {
        server: String,
        uri: String,
    },

    /// Start a server and render a prompt
    Prompt {
        server: String,
        name: String,

        /// Prompt arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
    },

    /// Manage stored credentials
    Creds {
        #[command(subcommand)]
        action: CredsAction,
    },

    /// Start the given servers and report their health
    Health {
        servers: Vec<String>,
    },
}

#[derive(Subcommand)]
enum CredsAction {
    /// Store credentials, e.g. --json '{"type":"bearer","token":"..."}'
    Set {
        server: String,

        #[arg(long)]
        json: String,
    },

    /// Whether valid credentials exist
    Check {
        server: String,
    },

    /// Which credential fields a server needs
    Requirements {
        server: String,
    },

    /// Delete stored credentials
    Delete {
        server: String,
    },
}

fn parse_env(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

fn parse_object(raw: &str, what: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).with_context(|| format!("{what} is not valid JSON"))? {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("{what} must be a JSON object")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn server_config(env: Vec<(String, String)>) -> ServerConfig {
    ServerConfig {
        env: env.into_iter().collect(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = bootstrap::bootstrap().await?;

    if cli.events {
        let mut rx = app.events.subscribe_user(cli.user.clone());
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Ok(line) = serde_json::to_string(&event) {
                    eprintln!("{line}");
                }
            }
        });
    }

    let result = run(&app.manager, &cli.user, cli.command).await;

    // Connections never outlive the process; sessions stay persisted
    app.manager.stop_all().await;
    result
}

async fn run(manager: &ServerManager, user: &str, command: Commands) -> Result<()> {
    match command {
        Commands::List => print_json(&manager.list_available(user)),
        Commands::Status { server } => {
            let status = manager.get_status(&server, user)?;
            print_json(&json!({
                "server": server,
                "status": status,
                "lastError": manager.last_error(&server, user),
            }))
        }
        Commands::Start { server, env } => {
            let outcome = manager.start(&server, user, server_config(env)).await?;
            print_json(&outcome)
        }
        Commands::Call {
            server,
            tool,
            params,
            env,
        } => {
            let params = Value::Object(parse_object(&params, "--params")?);
            manager.start(&server, user, server_config(env)).await?;
            let outcome = manager.execute_tool(&server, user, &tool, params).await;
            print_json(&outcome)
        }
        Commands::Read { server, uri } => {
            manager.start(&server, user, ServerConfig::default()).await?;
            print_json(&manager.read_resource(&server, user, &uri).await?)
        }
        Commands::Prompt { server, name, args } => {
            let args = args
                .as_deref()
                .map(|raw| parse_object(raw, "--args"))
                .transpose()?;
            manager.start(&server, user, ServerConfig::default()).await?;
            print_json(&manager.get_prompt(&server, user, &name, args).await?)
        }
        Commands::Creds { action } => match action {
            CredsAction::Set { server, json } => {
                let value: Value =
                    serde_json::from_str(&json).context("--json is not valid JSON")?;
                let input = CredentialInput::from_json(&value)?;
                manager.store_credentials(&server, user, input).await?;
                print_json(&json!({ "server": server, "stored": true }))
            }
            CredsAction::Check { server } => {
                let valid = manager.has_valid_credentials(&server, user).await;
                let status = manager.get_auth_status(&server, user).await?;
                print_json(&json!({ "server": server, "valid": valid, "auth": status }))
            }
            CredsAction::Requirements { server } => {
                print_json(&manager.get_credential_requirements(&server)?)
            }
            CredsAction::Delete { server } => {
                let deleted = manager.delete_credentials(&server, user).await?;
                print_json(&json!({ "server": server, "deleted": deleted }))
            }
        },
        Commands::Health { servers } => {
            for server in &servers {
                if let Err(e) = manager.start(server, user, ServerConfig::default()).await {
                    eprintln!("{server}: {e}");
                }
            }
            print_json(&manager.health_check().await)
        }
    }
}
