use env_mcp::config::Config;
use env_mcp::server::McpServer;
use env_mcp::tools::dispatch_tool;

use clap::Parser;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Env MCP - diagnostic and remediation tools for agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: $ENV_MCP_CONFIG or ~/.config/env-mcp/config.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the tools over MCP stdio (default)
    Serve,
    /// Print the last lines of a log file
    Tail {
        path: String,
        /// Number of trailing lines
        #[arg(short = 'n', long)]
        lines: Option<usize>,
        /// Scan backward until exactly N lines are found
        #[arg(long)]
        exact: bool,
    },
    /// Preview a command, or run it with --run
    Exec {
        /// Actually execute instead of a dry run
        #[arg(long)]
        run: bool,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Show the shell and its recent history
    History {
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },
    /// Print the runtime health report
    Runtime,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_mcp::init_logging();

    let args = Cli::parse();
    let config = Config::discover(args.config)?;

    let (tool, tool_args) = match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            return McpServer::new(config).serve_stdio().await;
        }
        Commands::Tail { path, lines, exact } => {
            let mut tool_args = json!({ "file_path": path, "exact": exact });
            if let Some(lines) = lines {
                tool_args["max_lines"] = json!(lines);
            }
            ("read_error_file", tool_args)
        }
        Commands::Exec { run, command } => (
            "secure_shell_executor",
            json!({ "command": command.join(" "), "dry_run": !run }),
        ),
        Commands::History { lines } => {
            let mut tool_args = json!({});
            if let Some(lines) = lines {
                tool_args["lines"] = json!(lines);
            }
            ("capture_terminal_state", tool_args)
        }
        Commands::Runtime => ("introspect_runtime", Value::Null),
    };

    let result = dispatch_tool(tool, &tool_args, &config).await;
    if result.is_error {
        eprintln!("{}", result.output);
        std::process::exit(1);
    }
    println!("{}", result.output);
    Ok(())
}
