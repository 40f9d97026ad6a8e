use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::errors::*;
use crate::github::{PullRequestApi, RepoSlug};

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]\n]+?)\]\(([^)\n]+?)\)").expect("Failed to compile markdown link regex")
});

/// Pull request numbers to report: above `start`, and up to `stop` if set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub start: u64,
    pub stop: Option<u64>,
}

impl ScanRange {
    pub fn contains(&self, number: u64) -> bool {
        if self.stop.is_some_and(|stop| number > stop) {
            return false;
        }
        number > self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangelogEntry {
    Pull {
        number: u64,
        title: String,
        author: String,
    },
    Link(MarkdownLink),
}

impl fmt::Display for ChangelogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangelogEntry::Pull {
                number,
                title,
                author,
            } => write!(f, "* #{} - {} - @{}", number, title, author),
            ChangelogEntry::Link(link) => write!(f, "  * [{}]({})", link.label, link.url),
        }
    }
}

/// Every `[label](url)` in `body`, left to right.
pub fn extract_links(body: &str) -> Vec<MarkdownLink> {
    MARKDOWN_LINK
        .captures_iter(body)
        .map(|caps| MarkdownLink {
            label: caps[1].to_string(),
            url: caps[2].to_string(),
        })
        .collect()
}

/// Walks the closed pull requests of `repo` and collects a summary line for
/// each one in `range`, followed by the links found in its comments.
pub fn scan<A: PullRequestApi>(api: &A, repo: &RepoSlug, range: ScanRange) -> Result<Vec<ChangelogEntry>> {
    println!("-- Scanning pull requests... --");

    let mut changes = Vec::new();

    for pull in api.list_closed_pull_requests(repo)? {
        if !range.contains(pull.number) {
            continue;
        }

        let entry = ChangelogEntry::Pull {
            number: pull.number,
            title: pull.title,
            author: pull.user.login,
        };
        debug!("Found closed pull request: {}", entry);
        changes.push(entry);

        let comments = api
            .list_issue_comments(repo, pull.number)
            .chain_err(|| format!("Couldn't fetch comments for #{}", pull.number))?;

        for comment in comments {
            for link in extract_links(&comment.body) {
                let entry = ChangelogEntry::Link(link);
                debug!("Found link in comment: {}", entry);
                changes.push(entry);
            }
        }
    }

    Ok(changes)
}

/// The text printed at the end of a run.
pub fn render(changes: &[ChangelogEntry]) -> String {
    let lines = changes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");

    format!("\nChanges:\n\n{}", lines)
}
