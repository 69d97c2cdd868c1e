use log::{Level, LevelFilter, Log, Metadata, Record};
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use std::io::Write;

use crate::eval::RuleMatch;
use crate::parse::join_args;

/// How process log lines are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Management commands (`lock`, `unlock`, ...): bare messages.
    Native,
    /// Guarded kubectl invocations: messages prefixed so they stand out
    /// from kubectl's own output.
    PassThrough,
}

impl LogMode {
    fn prefix(self) -> &'static str {
        match self {
            LogMode::Native => "",
            LogMode::PassThrough => "KUBE-LOCK: ",
        }
    }
}

/// Info-level stderr logger with no timestamps or levels.
struct PlainLogger {
    mode: LogMode,
}

impl Log for PlainLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(std::io::stderr(), "{}{}", self.mode.prefix(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the process logger. `debug` switches to a full simplelog terminal
/// logger at debug level.
pub fn init(debug: bool, mode: LogMode) {
    let result = if debug {
        TermLogger::init(
            LevelFilter::Debug,
            simplelog::Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        )
        .map(|_| log::info!("Debug logs enabled"))
    } else {
        log::set_boxed_logger(Box::new(PlainLogger { mode }))
            .map(|_| log::set_max_level(LevelFilter::Info))
    };
    if let Err(e) = result {
        eprintln!("kube-lock: logger already initialized: {e}");
    }
}

/// Append a decision record to ~/.local/share/kube-lock/decisions.log.
/// Best-effort: failures are silently ignored (logging must never block the guard).
pub fn log_decision(target: &str, args: &[String], result: &RuleMatch) {
    let Some(home) = std::env::var_os("HOME") else {
        return;
    };
    let log_dir = std::path::Path::new(&home).join(".local/share/kube-lock");
    let _ = std::fs::create_dir_all(&log_dir);

    let log_path = log_dir.join("decisions.log");
    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    else {
        return;
    };

    let _ = writeln!(file, "{}", decision_line(target, args, result));
}

/// One tab-separated decision record.
fn decision_line(target: &str, args: &[String], result: &RuleMatch) -> String {
    // Compact single-line reason for the log (replace newlines with "; ")
    let reason_oneline = result.reason.replace('\n', "; ");
    let cmd_truncated: String = join_args(args).chars().take(200).collect();
    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    format!(
        "{ts}\t{decision}\t{target}\t{cmd}\t{reason}",
        decision = result.decision.as_str(),
        cmd = cmd_truncated,
        reason = reason_oneline,
    )
}
