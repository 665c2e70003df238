use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use agentchat_core::backends::agent_engine::{DEFAULT_LOCATION, DEFAULT_TOKEN_COMMAND};
use agentchat_core::backends::{
    connect, AgentEngineConfig, BackendConfig, LocalRestConfig, LocalRestTransport, TransportOptions,
};
use agentchat_core::{Diagnostics, SessionOrchestrator};
use clap::{ArgAction, Args, Parser, Subcommand};

mod render;
mod repl;

#[derive(Parser, Debug)]
#[command(name = "agentchat")]
#[command(version, about = "Chat with a deployed agent from the terminal", long_about = None)]
struct Cli {
    /// User the sessions belong to
    #[arg(long, env = "AGENTCHAT_USER", default_value = "test_user", global = true)]
    user: String,

    /// Overall limit for non-streaming calls, in seconds
    #[arg(long, default_value_t = 60, global = true)]
    timeout_secs: u64,

    #[arg(long, default_value_t = 10, global = true)]
    connect_timeout_secs: u64,

    /// Idle time allowed while waiting for the next streamed line, in seconds
    #[arg(long, default_value_t = 300, global = true)]
    read_timeout_secs: u64,

    /// Write a wire log per streamed reply into this directory
    #[arg(long, env = "AGENTCHAT_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    backend: Backend,
}

#[derive(Subcommand, Debug)]
enum Backend {
    /// Agent server running locally
    Local(LocalArgs),
    /// Agent deployed on the managed cloud engine
    Engine(EngineArgs),
}

#[derive(Args, Debug)]
struct LocalArgs {
    #[arg(long, env = "LOCAL_AGENT_URL", default_value = "http://127.0.0.1:8000")]
    url: String,

    #[arg(long, env = "LOCAL_APP_NAME", default_value = "greeting_agent")]
    app: String,
}

#[derive(Args, Debug)]
struct EngineArgs {
    #[arg(long, env = "PROJECT_ID")]
    project: Option<String>,

    #[arg(long, env = "LOCATION", default_value = DEFAULT_LOCATION)]
    location: String,

    /// Bare engine id or full `projects/.../reasoningEngines/{id}` name
    #[arg(long, env = "RESOURCE_ID")]
    resource: String,

    /// Override the regional API endpoint
    #[arg(long)]
    endpoint: Option<String>,

    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Command printing an access token, used when no token is given
    #[arg(long, default_value = DEFAULT_TOKEN_COMMAND)]
    token_command: String,
}

impl Cli {
    fn options(&self) -> TransportOptions {
        TransportOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            call_timeout: Duration::from_secs(self.timeout_secs),
            log_dir: self.log_dir.clone(),
        }
    }

    fn backend_config(&self) -> BackendConfig {
        match &self.backend {
            Backend::Local(args) => BackendConfig::LocalRest(LocalRestConfig {
                base_url: args.url.clone(),
                app_name: args.app.clone(),
            }),
            Backend::Engine(args) => BackendConfig::AgentEngine(AgentEngineConfig {
                project_id: args.project.clone(),
                location: args.location.clone(),
                resource_id: args.resource.clone(),
                endpoint: args.endpoint.clone(),
                access_token: args.access_token.clone(),
                token_command: args.token_command.clone(),
            }),
        }
    }
}

/// Diagnostics are printed by the loop itself, so their log records are
/// only shown once verbose output was asked for.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn,agentchat_core::diagnostics=off",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let diagnostics = Arc::new(Diagnostics::new());
    let subscription = diagnostics.subscribe();
    let options = cli.options();
    let config = cli.backend_config();

    let local = match &config {
        BackendConfig::LocalRest(local) => Some(LocalRestTransport::new(
            local.clone(),
            options.clone(),
            Arc::clone(&diagnostics),
        )),
        BackendConfig::AgentEngine(_) => None,
    };

    let transport = match connect(config, options, Arc::clone(&diagnostics)) {
        Ok(transport) => transport,
        Err(err) => {
            eprintln!("{}", render::error(&err));
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = SessionOrchestrator::new(transport, diagnostics, cli.user);
    let mut repl = repl::Repl::new(orchestrator, subscription, local, io::stdout());
    match repl.run(io::stdin().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("Terminal I/O failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
