// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! mcp-console entry point - CLI over the tool manager.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use mcp_console::config::{self, CliOptions, ResolvedConfig};
use mcp_console::mcp::{
    official_catalog, search_catalog, to_chat_tools, ConnectorId, ConnectorRecord,
    ConnectorStatus, InstallOptions, ToolManager,
};
use mcp_console::telemetry::{init_telemetry, TelemetryConfig};
use mcp_console::VERSION;

/// mcp-console - install and run MCP tool connectors.
#[derive(Parser)]
#[command(name = "mcp-console")]
#[command(author, version, about = "Install and run MCP tool connectors", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.mcp-console/config.*
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the registry, document and tool directories
    #[arg(long, global = true, env = "MCP_CONSOLE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// GitHub token for API requests
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Seconds to wait for a connector to answer a probe
    #[arg(long, global = true)]
    probe_timeout: Option<u64>,

    /// Keep the registry and document in memory only
    #[arg(long, global = true)]
    no_persist: bool,

    /// Show verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Show debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Status values accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Active,
    Inactive,
    Error,
}

impl From<StatusArg> for ConnectorStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Active => ConnectorStatus::Active,
            StatusArg::Inactive => ConnectorStatus::Inactive,
            StatusArg::Error => ConnectorStatus::Error,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List installed connectors
    List {
        /// Only connectors assigned to this space
        #[arg(short, long)]
        space: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one connector with its config masked
    Show { id: ConnectorId },

    /// Install a connector from a GitHub URL or local path
    Install {
        source: String,

        /// Display name override
        #[arg(short, long)]
        name: Option<String>,

        /// Space to assign (repeatable)
        #[arg(short, long = "space")]
        spaces: Vec<String>,

        /// Config entry as KEY=VALUE, passed to the process environment (repeatable)
        #[arg(short, long = "env", value_parser = parse_key_value)]
        env: Vec<(String, String)>,
    },

    /// Stop and remove a connector
    Uninstall { id: ConnectorId },

    /// Set a connector's status, starting or stopping it
    Status {
        id: ConnectorId,
        #[arg(value_enum)]
        status: StatusArg,
    },

    /// Merge config entries into a connector, restarting it if active
    Configure {
        id: ConnectorId,

        /// Entries as KEY=VALUE
        #[arg(required = true, value_parser = parse_key_value)]
        entries: Vec<(String, String)>,
    },

    /// Replace a connector's spaces
    Spaces { id: ConnectorId, spaces: Vec<String> },

    /// Probe every active connector
    Health,

    /// List the tools active connectors offer
    #[command(group(ArgGroup::new("target").required(true).args(["space", "id"])))]
    Tools {
        /// Active connectors assigned to this space
        #[arg(short, long)]
        space: Option<String>,

        /// A single connector
        #[arg(long)]
        id: Option<ConnectorId>,

        /// Print the chat API tool format as JSON
        #[arg(long)]
        json: bool,
    },

    /// Browse installable connectors
    Catalog {
        /// Search community connectors instead of listing official ones
        #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
        search: Option<String>,
    },

    /// Print the MCP configuration document
    Render {
        /// Print one shell launch line per connector
        #[arg(long)]
        shell: bool,
    },

    /// Start active connectors and keep them running until interrupted
    Run,

    /// Show or create configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the resolved configuration
    Show,

    /// Write an example config file
    Init {
        /// Target path, defaults to ~/.mcp-console/config.json
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = init_telemetry(&TelemetryConfig::from_flags(cli.verbose, cli.debug))?;

    let cli_options = CliOptions {
        data_dir: cli.data_dir,
        github_token: cli.github_token,
        probe_timeout_sec: cli.probe_timeout,
        autostart: None,
        persist: if cli.no_persist { Some(false) } else { None },
    };

    match cli.command {
        Commands::Version => {
            println!("mcp-console {}", VERSION);
            Ok(())
        }
        Commands::Config { action } => handle_config(action, cli.config, cli_options),
        command => {
            let config = config::load_config(cli.config.as_deref(), cli_options)?;
            let manager = ToolManager::from_config(&config)?;
            handle_command(&manager, &config, command).await
        }
    }
}

fn handle_config(
    action: Option<ConfigAction>,
    config_file: Option<PathBuf>,
    cli_options: CliOptions,
) -> anyhow::Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let config = config::load_config(config_file.as_deref(), cli_options)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Some(ConfigAction::Init { path }) => {
            let path = match path {
                Some(path) => path,
                None => config::get_global_config_path()
                    .ok_or_else(|| anyhow!("could not determine home directory"))?,
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let path = config::init_config(&path)?;
            println!("Created config file: {}", path.display());
        }
    }
    Ok(())
}

async fn handle_command(
    manager: &ToolManager,
    config: &ResolvedConfig,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::List { space, json } => {
            let records = match &space {
                Some(space) => manager.tools_for_space(space).await,
                None => manager.list().await,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("{}", "No connectors installed".dimmed());
            } else {
                for record in &records {
                    print_record_line(record);
                }
            }
        }
        Commands::Show { id } => {
            let record = manager.get(id).await?;
            let state = manager.process_state(id).await?;
            print_record_line(&record);
            if !record.description.is_empty() {
                println!("  {}", record.description);
            }
            println!("  Source:  {} ({})", record.source_url, record.source);
            println!("  Process: {}", state);
            if let Some(process) = &record.process {
                // Protocol sessions launch their own transport child; this is the host's process.
                let pid = process.pid.map_or_else(|| "unknown".to_string(), |pid| pid.to_string());
                println!("  Host pid: {} (since {})", pid, process.started_at.format("%Y-%m-%d %H:%M:%S"));
            }
            if let Some(client_id) = &record.client_id {
                println!("  Client:  {}", client_id);
            }
            if !record.spaces.is_empty() {
                println!("  Spaces:  {}", record.spaces.join(", "));
            }
            for (key, value) in record.masked_config() {
                println!("  {} = {}", key.bright_white(), value);
            }
        }
        Commands::Install {
            source,
            name,
            spaces,
            env,
        } => {
            let mut options = InstallOptions::new().with_spaces(spaces).with_config(env);
            if let Some(name) = name {
                options = options.with_name(name);
            }

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
            spinner.set_message(format!("Installing {}", source));
            spinner.enable_steady_tick(Duration::from_millis(100));
            let result = manager.install(&source, options).await;
            spinner.finish_and_clear();

            let record = result?;
            println!("{} Installed {} [{}]", "✓".green(), record.name.bright_white(), record.id);
            print_document_hint(config);
        }
        Commands::Uninstall { id } => {
            let record = manager.uninstall(id).await?;
            println!("{} Uninstalled {} [{}]", "✓".green(), record.name, record.id);
        }
        Commands::Status { id, status } => {
            let record = manager.update_status(id, status.into()).await?;
            print_record_line(&record);
        }
        Commands::Configure { id, entries } => {
            let partial: BTreeMap<String, String> = entries.into_iter().collect();
            let record = manager.update_config(id, partial).await?;
            print_record_line(&record);
        }
        Commands::Spaces { id, spaces } => {
            let record = manager.update_spaces(id, spaces).await?;
            print_record_line(&record);
        }
        Commands::Health => {
            let reports = manager.health_check_all().await;
            if reports.is_empty() {
                println!("{}", "No connectors installed".dimmed());
            }
            for report in reports {
                let marker = match report.healthy {
                    Some(true) => "healthy".green(),
                    Some(false) => "unhealthy".red(),
                    None => "skipped".dimmed(),
                };
                let detail = report.detail.unwrap_or_default();
                println!("{} [{}] {} {}", report.name.bright_white(), report.id, marker, detail.dimmed());
            }
        }
        Commands::Tools { space, id, json } => {
            let listings = match (id, space) {
                (Some(id), _) => vec![manager.list_tools(id).await?],
                (None, Some(space)) => manager.tool_listings_for_space(&space).await,
                (None, None) => Vec::new(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&to_chat_tools(&listings))?);
            } else if listings.is_empty() {
                println!("{}", "No tools available".dimmed());
            } else {
                for listing in &listings {
                    println!("{} [{}]", listing.name.bright_white(), listing.id);
                    for tool in &listing.tools {
                        let description = tool.description.as_deref().unwrap_or_default();
                        println!("  {} {}", tool.name, description.dimmed());
                    }
                }
            }
        }
        Commands::Catalog { search } => match search {
            Some(query) => {
                let repos = search_catalog(manager.source(), Some(query.as_str())).await?;
                println!("{}", "Community connectors".bright_blue().bold());
                for repo in repos {
                    println!(
                        "  {} ({}) ★{} - {}",
                        repo.name.bright_white(),
                        repo.owner,
                        repo.stars,
                        repo.description
                    );
                    println!("    {}", repo.url.dimmed());
                }
            }
            None => {
                println!("{}", "Official connectors".bright_blue().bold());
                for entry in official_catalog(manager.source()).await {
                    println!(
                        "  {} [{}] - {}",
                        entry.name.bright_white(),
                        entry.category,
                        entry.description
                    );
                    println!("    {}", entry.source_url.dimmed());
                }
            }
        },
        Commands::Render { shell } => {
            let document = manager.render_document().await;
            if shell {
                for (client_id, spec) in &document.mcp_servers {
                    println!("# {}", client_id);
                    println!("{}", spec.shell_command());
                }
            } else {
                println!("{}", document.to_json()?);
            }
        }
        Commands::Run => {
            let results = manager.init().await;
            for result in &results {
                match result {
                    Ok(record) => println!("{} Started {} [{}]", "✓".green(), record.name, record.id),
                    Err(e) => eprintln!("{} {}", "✗".red(), e),
                }
            }
            println!("{}", "Running; press Ctrl-C to stop".dimmed());
            tokio::signal::ctrl_c().await?;
            manager.shutdown().await;
        }
        Commands::Config { .. } | Commands::Version => {}
    }
    Ok(())
}

fn print_record_line(record: &ConnectorRecord) {
    let status = match record.status {
        ConnectorStatus::Active => record.status.to_string().green(),
        ConnectorStatus::Inactive => record.status.to_string().yellow(),
        ConnectorStatus::Error => record.status.to_string().red(),
    };
    let running = if record.is_running() { " (running)" } else { "" };
    println!("{} [{}] {}{}", record.name.bright_white(), record.id, status, running);
}

fn print_document_hint(config: &ResolvedConfig) {
    if config.persist {
        println!("{}", format!("Config written to {}", config.document_path.display()).dimmed());
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("API_KEY=abc=def").unwrap(),
            ("API_KEY".to_string(), "abc=def".to_string())
        );
        assert_eq!(parse_key_value("EMPTY=").unwrap().1, "");
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn test_parse_install_args() {
        let cli = Cli::try_parse_from([
            "mcp-console",
            "install",
            "https://github.com/acme/search-tool",
            "--space",
            "Eng",
            "-e",
            "TOKEN=x",
        ])
        .unwrap();
        match cli.command {
            Commands::Install { spaces, env, .. } => {
                assert_eq!(spaces, vec!["Eng"]);
                assert_eq!(env, vec![("TOKEN".to_string(), "x".to_string())]);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_parse_tools_args() {
        assert!(Cli::try_parse_from(["mcp-console", "tools"]).is_err());
        assert!(Cli::try_parse_from(["mcp-console", "tools", "--space", "Eng", "--id", "7"]).is_err());

        let cli = Cli::try_parse_from(["mcp-console", "tools", "-s", "Eng", "--json"]).unwrap();
        match cli.command {
            Commands::Tools { space, id, json } => {
                assert_eq!(space.as_deref(), Some("Eng"));
                assert!(id.is_none());
                assert!(json);
            }
            _ => panic!("expected tools"),
        }
    }
}
