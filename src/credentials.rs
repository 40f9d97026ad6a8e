//! Username and personal access token handling.
//!
//! Credentials come from explicit arguments, the cached config file, or an
//! interactive prompt, in that order. Anything obtained from a prompt is
//! written back to the config file.

use std::fs;
use std::path::{Path, PathBuf};

use dialoguer::{Input, Password};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::*;

const CONFIG_FILE_NAME: &str = "gitchangelog";

const TOKEN_HELP: &str = "This app will require a personal access token for
your GitHub account. Visit the URL below and create
a personal access token, and then paste that token
at the prompt below:
https://github.com/settings/tokens
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

/// On-disk shape of the config file. Either key may be missing.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub user: Option<String>,
    pub token: Option<String>,
}

pub trait CredentialSource {
    fn load(&self) -> Result<StoredCredentials>;
    fn prompt_user(&self) -> Result<String>;
    fn prompt_token(&self) -> Result<String>;
    fn save(&self, credentials: &Credentials) -> Result<()>;

    /// Where saved credentials end up, for the confirmation message.
    fn location(&self) -> String;
}

/// JSON config file plus terminal prompts.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `~/.config/gitchangelog` or the platform equivalent.
    pub fn default_path() -> Result<PathBuf> {
        let base_dirs = BaseDirs::new().ok_or(ErrorKind::NoConfigDir)?;
        Ok(base_dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialSource for ConfigFile {
    fn load(&self) -> Result<StoredCredentials> {
        if !self.path.is_file() {
            debug!("No config file at {}", self.path.display());
            return Ok(StoredCredentials::default());
        }

        let contents = fs::read_to_string(&self.path)
            .chain_err(|| format!("Couldn't read {}", self.path.display()))?;
        let stored = serde_json::from_str(&contents)
            .chain_err(|| format!("Couldn't parse {}", self.path.display()))?;

        Ok(stored)
    }

    fn prompt_user(&self) -> Result<String> {
        let user: String = Input::new()
            .with_prompt("GitHub username")
            .allow_empty(true)
            .interact_text()?;
        Ok(user)
    }

    fn prompt_token(&self) -> Result<String> {
        println!("{}", TOKEN_HELP);
        let token = Password::new()
            .with_prompt("Personal access token")
            .allow_empty_password(true)
            .interact()?;
        Ok(token)
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                debug!("Creating config directory: {}", parent.display());
                fs::create_dir_all(parent)
                    .chain_err(|| format!("Couldn't create {}", parent.display()))?;
            }
        }

        let stored = StoredCredentials {
            user: Some(credentials.username.clone()),
            token: Some(credentials.token.clone()),
        };
        let data = serde_json::to_string(&stored)?;

        fs::write(&self.path, data)
            .chain_err(|| format!("Couldn't write to {}", self.path.display()))?;

        Ok(())
    }

    fn location(&self) -> String {
        self.path().display().to_string()
    }
}

/// Fill in whatever `user` and `token` don't provide.
///
/// The config file is only consulted when an argument is missing, and only
/// prompted values trigger a save. With `reset` every value is prompted for
/// again.
pub fn resolve<S: CredentialSource>(
    source: &S,
    user: Option<String>,
    token: Option<String>,
    reset: bool,
) -> Result<Credentials> {
    debug!("Authentication begin");

    let (mut user, mut token) = if reset {
        (None, None)
    } else {
        (provided(user), provided(token))
    };

    if !reset && (user.is_none() || token.is_none()) {
        let stored = source.load()?;
        user = user.or_else(|| provided(stored.user));
        token = token.or_else(|| provided(stored.token));
    }

    let mut prompted = false;

    let username = match user {
        Some(user) => user,
        None => {
            prompted = true;
            trimmed(source.prompt_user()?).ok_or(ErrorKind::MissingCredential("Username"))?
        }
    };

    let token = match token {
        Some(token) => token,
        None => {
            prompted = true;
            trimmed(source.prompt_token()?).ok_or(ErrorKind::MissingCredential("Token"))?
        }
    };

    let credentials = Credentials { username, token };

    if prompted {
        source.save(&credentials)?;
        println!("Settings saved to {}", source.location());
    }

    Ok(credentials)
}

/// Explicit and stored values are used verbatim; only empty counts as missing.
fn provided(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn trimmed(answer: String) -> Option<String> {
    let answer = answer.trim();
    (!answer.is_empty()).then(|| answer.to_string())
}
