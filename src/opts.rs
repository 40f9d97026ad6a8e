use clap::Parser;
use std::path::PathBuf;
use url::Url;

use crate::github::API_BASE_URL;

/// Generate a change log based on closed pull requests.
#[derive(Parser, Debug)]
#[command(name = "gitchangelog", author, version, about, long_about = None)]
pub struct Opts {
    #[arg(short, long, help = "Debug mode")]
    pub debug: bool,

    #[arg(
        short,
        long,
        help = "Initialize the authentication settings ONLY, without scanning a repository's pull requests"
    )]
    pub init: bool,

    #[arg(
        short,
        long,
        help = "GitHub username; prompted for and saved if not provided. For an organization, use the org username"
    )]
    pub user: Option<String>,

    #[arg(short, long, help = "Personal access token; prompted for and saved if not provided")]
    pub token: Option<String>,

    #[arg(short, long, help = "Repository to run the changelog for, as `name` or `owner/name`")]
    pub repo: Option<String>,

    #[arg(
        short,
        long,
        help = "Pull request number to start after, e.g. the last merge from develop to master. 0 means from the first"
    )]
    pub start: Option<u64>,

    #[arg(
        short = 'x',
        long,
        help = "Pull request number to stop at (inclusive); defaults to every pull request after --start. 0 is a real bound"
    )]
    pub stop: Option<u64>,

    #[arg(long, env = "GITCHANGELOG_CONFIG", help = "Credentials file [default: ~/.config/gitchangelog]")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "GITHUB_API_URL", default_value = API_BASE_URL, help = "GitHub API base URL")]
    pub api_url: Url,
}
