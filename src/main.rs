//! kube-lock: a pane of glass between you and your cluster.
//!
//! `kube-lock kubectl <args>` checks the command against the context's
//! status before handing it to kubectl. The other subcommands manage that
//! status: lock, unlock, put under a profile, and configure unlock timeouts.
//!
//! Exit code: kubectl's own for allowed commands, 1 for any denial or error.

use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::time::Duration;

use kube_lock::config::Config;
use kube_lock::discovery::cache::cache_key;
use kube_lock::discovery::{CachedDiscovery, KubectlDiscovery};
use kube_lock::eval::Guard;
use kube_lock::logging::{self, LogMode};
use kube_lock::parse::split_command;
use kube_lock::state::{FileStore, LockState, Status};
use kube_lock::{GuardError, Result, exec, target};

#[derive(Parser)]
#[command(
    name = "kube-lock",
    version,
    about = "A kubectl wrapper that locks contexts and restricts what reaches the cluster"
)]
struct Cli {
    /// Verbose logging
    #[arg(short, long)]
    debug: bool,

    /// Lock document to use (default: ~/.kube-lock.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<String>,

    /// The kubectl context to address (default: the kubeconfig current context)
    #[arg(long, value_name = "NAME")]
    context: Option<String>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run a kubectl command if the context's status allows it
    #[command(disable_help_flag = true)]
    Kubectl {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    #[command(flatten)]
    Manage(Manage),
}

/// Commands that change or show the lock document.
#[derive(Subcommand)]
enum Manage {
    /// Set the context's status to 'locked'
    Lock,
    /// Set the context's status to 'unlocked'
    Unlock {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Put the context under a profile from the lock document
    Set { profile: String },
    /// Set the unlock timeout (e.g. '10s', '10m', '1h30m')
    SetTimeout { duration: String },
    /// Disable unlock timeouts and clear every unlock timestamp
    DisableTimeout,
    /// Show the context's status
    Status,
}

fn main() {
    let cli = Cli::parse();
    let mode = match cli.command {
        Cmd::Kubectl { .. } => LogMode::PassThrough,
        Cmd::Manage(_) => LogMode::Native,
    };
    logging::init(cli.debug, mode);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            1
        }
    };
    std::process::exit(code);
}

fn store_for(path: Option<&str>) -> Result<FileStore> {
    match path {
        Some(path) => Ok(FileStore::new(shellexpand::tilde(path).into_owned())),
        None => FileStore::default_path()
            .map(FileStore::new)
            .ok_or_else(|| GuardError::ConfigRead {
                path: "~/.kube-lock.toml".into(),
                reason: "HOME is not set".into(),
            }),
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = Config::load();
    let store = store_for(cli.config.as_deref())?;
    let kubectl = split_command(&config.settings.kubectl);

    match cli.command {
        Cmd::Kubectl { args } => {
            guard_kubectl(&config, &store, &kubectl, cli.context.as_deref(), args)
        }
        Cmd::Manage(command) => {
            let mut state = LockState::load(&store, &config)?;
            manage(command, &mut state, cli.context.as_deref(), &kubectl)
        }
    }
}

fn manage(
    command: Manage,
    state: &mut LockState<'_>,
    explicit: Option<&str>,
    kubectl: &[String],
) -> Result<i32> {
    match command {
        Manage::Lock => {
            let context = target::resolve(explicit, &[], kubectl)?;
            lock(state, &context)?;
        }
        Manage::Unlock { yes } => {
            let context = target::resolve(explicit, &[], kubectl)?;
            state.resolve_status(&context)?;
            if !yes && !confirm("Warning: Are you sure you would like to unlock your context?") {
                log::error!("Answered 'No', exiting...");
                return Ok(1);
            }
            log::info!("Unlocking context '{context}'.");
            state.unlock(&context)?;
        }
        Manage::Set { profile } => {
            let context = target::resolve(explicit, &[], kubectl)?;
            state.resolve_status(&context)?;
            log::info!("Setting status '{profile}' for context '{context}'.");
            let profile = state.set_profile(&context, &profile)?;
            let exceptions: Vec<String> = profile
                .delete_exceptions
                .iter()
                .map(ToString::to_string)
                .collect();
            log::info!("\nProfile rules:");
            log::info!("Blocked verbs: '{}'", profile.blocked_verbs.join("', '"));
            log::info!("Delete exceptions: {}", exceptions.join(", "));
        }
        Manage::SetTimeout { duration } => {
            log::info!("Setting new unlock timeout period to '{duration}'...");
            state.set_timeout(&duration)?;
        }
        Manage::DisableTimeout => {
            log::info!("Disabling unlock timeouts...");
            state.disable_timeout()?;
        }
        Manage::Status => {
            let context = target::resolve(explicit, &[], kubectl)?;
            show_status(state, &context)?;
        }
    }
    Ok(0)
}

fn guard_kubectl(
    config: &Config,
    store: &FileStore,
    kubectl: &[String],
    explicit: Option<&str>,
    args: Vec<String>,
) -> Result<i32> {
    let args = match explicit {
        Some(context) => {
            if let Some(inline) = target::context_from_args(&args)
                && inline != context
            {
                log::warn!("using --context '{inline}' from the kubectl arguments, not '{context}'");
            }
            exec::pin_context(&args, context)
        }
        None => args,
    };
    let context = target::resolve(None, &args, kubectl)?;

    let discovery = CachedDiscovery::new(
        KubectlDiscovery::new(kubectl.to_vec(), config.discovery.request_timeout()?)
            .with_context(&context),
        config.discovery.cache_dir().join(cache_key(&context)),
        config.discovery.cache_ttl()?,
    );

    let result = Guard::new(store, &discovery, config).evaluate(&context, &args)?;
    logging::log_decision(&context, &args, &result);

    if !result.is_allowed() {
        log::error!("Halt! {}. Exiting...", result.reason);
        return Ok(1);
    }
    log::debug!("{}. Proceeding...", result.reason);
    exec::run(kubectl, &args)
}

fn lock(state: &mut LockState<'_>, context: &str) -> Result<()> {
    match state.resolve_status(context) {
        Ok(_) => {}
        // Already saved as locked
        Err(GuardError::UnsafeState(_)) => return Ok(()),
        Err(e) => return Err(e),
    }
    log::info!("Locking context '{context}'.");
    state.transition(context, Status::Locked)
}

fn show_status(state: &mut LockState<'_>, context: &str) -> Result<()> {
    let resolved = state.resolve_status(context)?;
    match resolved.status {
        Status::Unlocked => match state.remaining(resolved.unlock_timestamp.as_deref())? {
            Some(left) if left.is_zero() => log::info!(
                "Context '{context}' is unlocked, but the unlock has expired and will be locked on the next kubectl command."
            ),
            Some(left) => log::info!(
                "Context '{context}' is unlocked ({} remaining).",
                humantime::format_duration(Duration::from_secs(left.as_secs()))
            ),
            None => log::info!("Context '{context}' is unlocked."),
        },
        Status::Locked => log::info!("Context '{context}' is locked."),
        Status::Profile(name) => log::info!("Context '{context}' has status '{name}'."),
    }
    Ok(())
}

/// Yes/No prompt on stderr. Anything but yes, including a read failure, is no.
fn confirm(prompt: &str) -> bool {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{prompt} [y/N] ");
    let _ = stderr.flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
