error_chain! {
    foreign_links {
        Io(std::io::Error);
        Json(serde_json::Error);
        Http(reqwest::Error);
        Url(url::ParseError);
        Prompt(dialoguer::Error);
    }

    errors {
        MissingCredential(field: &'static str) {
            description("missing credential")
            display("{} is required for GitHub authentication.", field)
        }

        MissingArgument(flag: &'static str, what: &'static str) {
            description("missing required argument")
            display("The {} ({}) is required to continue.", what, flag)
        }

        InvalidRepo(repo: String) {
            description("invalid repository name")
            display("Invalid repository `{}`; expected `name` or `owner/name`", repo)
        }

        NoConfigDir {
            description("no configuration directory")
            display("Could not determine the user configuration directory")
        }

        Unauthorized(url: String) {
            description("authentication failed")
            display("Authentication failed for {}. Please check your GitHub credentials.", url)
        }

        NotFound(url: String) {
            description("resource not found")
            display("Not found: {}", url)
        }

        UnexpectedStatus(url: String, status: u16, body: String) {
            description("unexpected HTTP status")
            display("Unexpected error from {}: HTTP {} - {}", url, status, body)
        }
    }
}

impl Error {
    /// Preconditions the user has to fix before anything can run.
    pub fn is_fatal_precondition(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MissingCredential(_) | ErrorKind::MissingArgument(..)
        )
    }
}
