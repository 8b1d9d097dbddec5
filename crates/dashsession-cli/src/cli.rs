use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "dashsession", version, about = "Admin dashboard client session tool")]
pub struct Cli {
    /// Also write logs to daily files in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Override the API base URL from config and environment
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the returned token pair
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Show whether a session is stored (no network)
    Status,
    /// Validate the stored token, refreshing it if the server rejects it
    Check,
    /// Force a token refresh
    Refresh,
    /// Clear the stored session
    Logout,
    /// Send an authenticated request and print the response body
    Call {
        /// HTTP method, e.g. GET or POST
        method: String,
        /// Path relative to the API base URL, or an absolute URL
        path: String,
        /// JSON request body
        #[arg(short = 'd', long)]
        data: Option<String>,
        /// Extra header as `Name: Value`; may be repeated
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
}

/// Split a `Name: Value` header argument.
pub fn parse_header(raw: &str) -> Option<(&str, &str)> {
    let (name, value) = raw.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header("X-Trace: abc"), Some(("X-Trace", "abc")));
        assert_eq!(parse_header("Accept:text/csv"), Some(("Accept", "text/csv")));
        assert_eq!(parse_header("Host: a:8080"), Some(("Host", "a:8080")));
        assert_eq!(parse_header("novalue"), None);
        assert_eq!(parse_header(": v"), None);
    }

    #[test]
    fn test_parse_call_command() {
        let cli = Cli::try_parse_from([
            "dashsession",
            "call",
            "post",
            "/api/orders/",
            "-d",
            r#"{"id":1}"#,
            "-H",
            "X-A: 1",
            "-H",
            "X-B: 2",
        ])
        .unwrap();
        match cli.command {
            Command::Call {
                method,
                path,
                data,
                headers,
            } => {
                assert_eq!(method, "post");
                assert_eq!(path, "/api/orders/");
                assert_eq!(data.as_deref(), Some(r#"{"id":1}"#));
                assert_eq!(headers, vec!["X-A: 1", "X-B: 2"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["dashsession", "status", "--api-url", "https://x"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("https://x"));
        assert!(matches!(cli.command, Command::Status));
    }
}
