#![recursion_limit = "1024"]

#[macro_use]
extern crate error_chain;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

mod credentials;
mod errors;
mod github;
mod macros;
mod opts;
mod scanner;

use credentials::{ConfigFile, CredentialSource};
use errors::*;
use github::{GitHubClient, RepoSlug};
use opts::Opts;
use scanner::ScanRange;

fn main() {
    let args = Opts::parse();

    init_tracing(args.debug);

    if let Err(err) = run(args) {
        if err.is_fatal_precondition() {
            die!(err);
        }

        let mut message = format!("Error: {}", err);
        for cause in err.iter().skip(1) {
            message.push_str(&format!("\n  caused by: {}", cause));
        }
        die!(message);
    }
}

fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    // Debug output belongs on stdout next to the changelog.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stdout).with_target(false))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    debug!("Tracing initialized with level: {}", level);
}

fn run(args: Opts) -> Result<()> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => ConfigFile::default_path()?,
    };

    run_with(&ConfigFile::new(path), args)
}

fn run_with<S: CredentialSource>(source: &S, args: Opts) -> Result<()> {
    let credentials = credentials::resolve(source, args.user, args.token, args.init)?;
    let username = credentials.username.clone();
    let client = GitHubClient::new(credentials, args.api_url)?;

    if args.init {
        return Ok(());
    }

    let repo = args
        .repo
        .ok_or(ErrorKind::MissingArgument("--repo", "repository name"))?;
    let start = args
        .start
        .ok_or(ErrorKind::MissingArgument("--start", "issue start number"))?;

    let repo = RepoSlug::parse(&repo, &username)?;
    let range = ScanRange {
        start,
        stop: args.stop,
    };
    debug!("Scanning {} for pull requests in {:?}", repo, range);

    let changes = scanner::scan(&client, &repo, range)?;
    println!("{}", scanner::render(&changes));

    Ok(())
}
