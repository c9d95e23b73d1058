use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use taskmate_client::{ApiClient, AuthFlow, HttpTransport, TaskCollection};

mod auth;
mod config;
mod state;
mod tasks_cmd;

use tasks_cmd::TasksCommand;

#[derive(Parser, Debug)]
#[command(
    name = "taskmate",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TASKMATE_BUILD_SHA"), ")"),
    about = "Personal task manager client"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,

        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Task commands
    Tasks {
        #[command(subcommand)]
        command: TasksCommand,
    },

    /// Manage ~/.taskmate/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,

    /// Print the current config
    Show,
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    init_tracing(&cfg.log.filter);

    if let Command::Config { command } = &cli.command {
        return match command {
            ConfigCommand::Init => config::init_config(),
            ConfigCommand::Show => config::show_config(),
        };
    }

    let base_url = cfg.base_url();
    tracing::debug!(%base_url, "using task API");
    let transport = HttpTransport::new(&base_url, cfg.timeout()).context("create HTTP client")?;
    let api = ApiClient::new(transport, state::open_session()?);
    let mut flow = AuthFlow::new(api.clone());

    match cli.command {
        Command::Register {
            name,
            email,
            password,
        } => auth::register(&mut flow, name, email, password).await?,

        Command::Login { email, password } => auth::login(&mut flow, email, password).await?,

        Command::Logout => auth::logout(&mut flow)?,

        Command::Whoami => auth::whoami(&mut flow).await?,

        Command::Tasks { command } => {
            let tasks = TaskCollection::new(api);
            tasks_cmd::run(command, &mut flow, &tasks).await?;
        }

        // handled before the client is built
        Command::Config { .. } => {}
    }

    Ok(())
}
