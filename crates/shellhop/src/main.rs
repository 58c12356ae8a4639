//! hop
//!
//! Opens an interactive shell on a configured alias, or hands everything
//! else to the system `ssh`.

use std::process::{Command, ExitCode};
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use shellhop::backend::ssh::SshConnector;
use shellhop::config::env::EnvConfig;
use shellhop::config::file::{load_store, store_path};
use shellhop::config::AliasStore;
use shellhop::path::PathResolver;
use shellhop::session::{Session, StdTerminal};
use shellhop::{Error, logging};
use shellhop_term::InterruptSignals;

/// How long to wait for blocking tasks (the stdin reader) at exit.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(100);

/// Exit code for configuration errors.
const EXIT_CONFIG: u8 = 2;

/// Exit code for any other failure.
const EXIT_FAILURE: u8 = 1;

/// hop - interactive SSH sessions for configured aliases.
///
/// With a single known alias, connects to it. Any other arguments are passed
/// to the system `ssh` unchanged.
#[derive(Parser, Debug)]
#[command(name = "hop")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,

    /// Alias to connect to, or arguments for `ssh`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ALIAS | SSH ARGS")]
    args: Vec<String>,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// List configured aliases
    Ls {
        /// Only show aliases whose name, host or user contains this
        pattern: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let env = EnvConfig::default();

    if let Err(e) = logging::init(&env.logging()) {
        eprintln!("hop: logging disabled: {e}");
    }

    match cli.command {
        Some(Commands::Ls { pattern }) => list(&env, pattern.as_deref()),
        None if cli.args.is_empty() => {
            if let Err(e) = Cli::command().print_help() {
                eprintln!("hop: {e}");
                return ExitCode::from(EXIT_FAILURE);
            }
            ExitCode::SUCCESS
        }
        None => connect_or_pass_through(&env, &cli.args),
    }
}

fn load(env: &EnvConfig) -> shellhop::Result<AliasStore> {
    let path = store_path(&PathResolver::from_env(), env.store_path().as_deref())?;
    load_store(&path)
}

fn fail(e: &Error) -> ExitCode {
    eprintln!("hop: {e}");
    ExitCode::from(if e.is_config() { EXIT_CONFIG } else { EXIT_FAILURE })
}

fn list(env: &EnvConfig, pattern: Option<&str>) -> ExitCode {
    let store = match load(env) {
        Ok(store) => store,
        Err(e) => return fail(&e),
    };
    for (alias, server) in store.matching(pattern.unwrap_or_default()) {
        println!("[{alias}] {}", server.summary());
    }
    ExitCode::SUCCESS
}

fn connect_or_pass_through(env: &EnvConfig, args: &[String]) -> ExitCode {
    let [alias] = args else {
        return pass_through(args);
    };

    let store = match load(env) {
        Ok(store) => store,
        Err(e) => return fail(&e),
    };
    match store.get(alias) {
        Some(server) => {
            tracing::debug!(alias = %alias, "Using configured alias");
            match server.validate() {
                Ok(profile) => connect(env, &profile, store.global.as_ref()),
                Err(e) => fail(&e),
            }
        }
        None => pass_through(args),
    }
}

fn connect(
    env: &EnvConfig,
    profile: &shellhop::ServerProfile,
    global: Option<&shellhop::GlobalConfig>,
) -> ExitCode {
    let options = match env.session_options() {
        Ok(options) => options,
        Err(e) => return fail(&e),
    };
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("hop: failed to start runtime: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let exit_status = options.exit_status;
    let connector = SshConnector::new(options.clone(), PathResolver::from_env());
    let session = Session::new(connector, StdTerminal::new(), options);

    let result = runtime.block_on(async {
        // Registered before connecting so a signal during establishment
        // still unwinds the session.
        let signals = InterruptSignals::new()
            .inspect_err(|e| tracing::warn!(error = %e, "Termination signals not handled"))
            .ok();
        let interrupt = async move {
            if let Some(mut signals) = signals {
                if let Some(interrupt) = signals.recv().await {
                    tracing::info!(signal = interrupt.name(), "Interrupted");
                    return;
                }
            }
            std::future::pending::<()>().await;
        };
        session.run(profile, global, interrupt).await
    });

    // The stdin reader is parked in a blocking read that cannot be
    // cancelled.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    match result {
        Ok(exit) => {
            tracing::debug!(?exit, "Session ended");
            ExitCode::from(exit_status.code_for(&exit))
        }
        Err(e) => fail(&e),
    }
}

fn pass_through(args: &[String]) -> ExitCode {
    tracing::debug!(?args, "Passing arguments to ssh");
    match Command::new("ssh").args(args).status() {
        Ok(status) => match status.code() {
            Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(EXIT_FAILURE)),
            None => ExitCode::from(EXIT_FAILURE),
        },
        Err(e) => {
            eprintln!("hop: failed to run ssh: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
