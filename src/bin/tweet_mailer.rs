use clap::Parser;
use clap::error::ErrorKind;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use tweet_mailer::auth::SessionStore;
use tweet_mailer::config::{Paths, default_config_path, load_config};
use tweet_mailer::error::{Error, FeedError};
use tweet_mailer::feed::TwitterClient;
use tweet_mailer::mail::SmtpClient;
use tweet_mailer::runner::notifier::Notifier;
use tweet_mailer::runner::{RunConfig, RunSummary, run_once};
use tweet_mailer::store::SqliteLedger;

#[derive(Parser)]
#[command(name = "tweet_mailer")]
#[command(about = "Mail new tweets of one account to a fixed list of recipients", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(long)]
    debug: bool,

    /// Config file (default: <config dir>/tweet_mailer/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Twitter handle to poll
    handle: String,
}

/// Parse the command line; on failure clap's output has already been printed
/// and the caller exits with the returned status.
fn parse_args<I, T>(args: I) -> Result<Cli, u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(|e| {
        // Nothing sensible to do if stderr is gone.
        e.print().ok();
        match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => 1,
        }
    })
}

fn main() -> ExitCode {
    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(code) => return ExitCode::from(code),
    };

    tweet_mailer::logging::init(cli.debug);

    match run(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tweet_mailer: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<RunSummary, Error> {
    let config_path = match cli.config {
        Some(p) => p,
        None => default_config_path()?,
    };
    let cfg = load_config(&config_path)?;
    let notification = cfg.notification()?;
    let paths = Paths::resolve(&config_path, &cfg)?;

    log::debug!("mail server: {}", notification.server);
    log::debug!("mail from: {}", notification.from);
    log::debug!(
        "mail to: {}",
        notification
            .to
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    log::debug!("db path: {}", paths.ledger.display());
    log::debug!("cookies path: {}", paths.cookies_json.display());

    let ledger = SqliteLedger::open(&paths.ledger)?;
    let sessions = SessionStore::from_paths(&paths);
    let transport = SmtpClient::new(&notification.server);
    let notifier = Notifier::new(notification, Box::new(transport));
    let mut feed = TwitterClient::new().map_err(|e| FeedError::Request(format!("{e:#}")))?;

    run_once(
        &ledger,
        &mut feed,
        &sessions,
        &notifier,
        RunConfig::new(cli.handle, cfg.credentials()),
    )
}
