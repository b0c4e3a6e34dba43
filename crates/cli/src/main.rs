mod app;
mod flows_commands;
mod run_command;
mod sessions_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "keyflow", about = "Keyflow: keyword-routed conversation flows")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./keyflow.toml and the user config dir).
    #[arg(long, global = true, env = "KEYFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Flow file (overrides `[flows] path`).
    #[arg(long, global = true, env = "KEYFLOW_FLOWS")]
    flows: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot on the console (default when no subcommand is provided).
    ///
    /// Each stdin line is one inbound message: `<conversation>: <text>`, or
    /// plain text for the `console` conversation.
    Run,
    /// Flow file tools.
    Flows {
        #[command(subcommand)]
        action: flows_commands::FlowsAction,
    },
    /// Show which flow a message would trigger, without running it.
    Route {
        conversation: String,
        text: String,
    },
    /// Inspect or modify stored sessions.
    Sessions {
        #[command(subcommand)]
        action: sessions_commands::SessionsAction,
    },
}

/// Initialise tracing. Logs go to stderr so console transport output on
/// stdout stays readable.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "keyflow starting");

    let config = app::load_config(cli.config.as_deref())?;
    let flows = cli.flows.as_deref();

    match cli.command {
        None | Some(Commands::Run) => run_command::run(&config, flows).await,
        Some(Commands::Flows { action }) => {
            flows_commands::handle_flows(action, &config, flows).await
        },
        Some(Commands::Route { conversation, text }) => {
            flows_commands::route(&config, flows, &conversation, &text).await
        },
        Some(Commands::Sessions { action }) => {
            sessions_commands::handle_sessions(action, &config).await
        },
    }
}
