//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Query the Socket security-analysis API.
#[derive(Parser, Debug)]
#[command(name = "socket")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Socket API token
    #[arg(long, env = "SOCKET_API_TOKEN", hide_env_values = true, global = true)]
    pub api_token: Option<String>,

    /// API base URL
    #[arg(long, env = "SOCKET_API_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds (5000-300000)
    #[arg(long, default_value_t = 30_000, value_parser = clap::value_parser!(u64).range(5_000..=300_000), global = true)]
    pub timeout_ms: u64,

    /// Retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(0..=10), global = true)]
    pub retries: u32,

    /// Base delay between retries in milliseconds, doubled per attempt
    #[arg(long, default_value_t = 1_000, value_parser = clap::value_parser!(u64).range(0..=60_000), global = true)]
    pub retry_delay_ms: u64,

    /// Cache GET responses for the lifetime of the process
    #[arg(long, global = true)]
    pub cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the remaining API quota
    Quota,

    /// List organizations the token can access
    Orgs,

    /// Analyze package URLs (e.g. pkg:npm/lodash@4.17.21)
    Purl {
        /// Package URLs to analyze
        #[arg(required = true)]
        purls: Vec<String>,

        /// Package URLs per request
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u16).range(1..=1000))]
        chunk_size: u16,

        /// Concurrent requests (1-100)
        #[arg(short = 'c', long, default_value_t = 10, value_parser = clap::value_parser!(u8).range(1..=100))]
        concurrency: u8,

        /// Include alerts in the analysis
        #[arg(long)]
        alerts: bool,
    },

    /// Upload manifest files as a full scan
    Scan {
        /// Organization slug
        org: String,

        /// Manifest files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Repository slug the scan belongs to
        #[arg(long)]
        repo: String,

        /// Branch name
        #[arg(long)]
        branch: Option<String>,

        /// Directory file names are made relative to (defaults to the current directory)
        #[arg(long)]
        base_path: Option<PathBuf>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_quota_parses_with_defaults() {
        let args = Args::try_parse_from(["socket", "quota"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.timeout_ms, 30_000);
        assert_eq!(args.retries, 3);
        assert_eq!(args.retry_delay_ms, 1_000);
        assert!(!args.cache);
        assert!(matches!(args.command, Command::Quota));
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["socket", "-vv", "orgs"]).unwrap();
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["socket", "orgs", "--verbose"]).unwrap();
        assert_eq!(args.verbose, 1);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["socket", "-q", "quota"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["socket", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_missing_subcommand_rejected() {
        let err = Args::try_parse_from(["socket"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn test_cli_api_token_flag() {
        let args = Args::try_parse_from(["socket", "--api-token", "abc", "quota"]).unwrap();
        assert_eq!(args.api_token.as_deref(), Some("abc"));
    }

    // ==================== Timeout Tests ====================

    #[test]
    fn test_cli_timeout_bounds() {
        let args = Args::try_parse_from(["socket", "--timeout-ms", "5000", "quota"]).unwrap();
        assert_eq!(args.timeout_ms, 5_000);

        let err = Args::try_parse_from(["socket", "--timeout-ms", "4999", "quota"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err =
            Args::try_parse_from(["socket", "--timeout-ms", "300001", "quota"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_retries_over_max_rejected() {
        let err = Args::try_parse_from(["socket", "-r", "11", "quota"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Subcommand Tests ====================

    #[test]
    fn test_cli_purl_collects_components() {
        let args = Args::try_parse_from([
            "socket",
            "purl",
            "pkg:npm/lodash@4.17.21",
            "pkg:npm/express@4.19.2",
            "-c",
            "4",
            "--alerts",
        ])
        .unwrap();
        match args.command {
            Command::Purl {
                purls,
                chunk_size,
                concurrency,
                alerts,
            } => {
                assert_eq!(purls.len(), 2);
                assert_eq!(chunk_size, 100);
                assert_eq!(concurrency, 4);
                assert!(alerts);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_purl_requires_components() {
        let err = Args::try_parse_from(["socket", "purl"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_purl_zero_concurrency_rejected() {
        let err = Args::try_parse_from(["socket", "purl", "pkg:npm/a@1", "-c", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_scan_requires_repo() {
        let err = Args::try_parse_from(["socket", "scan", "acme", "package.json"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let args = Args::try_parse_from([
            "socket",
            "scan",
            "acme",
            "package.json",
            "package-lock.json",
            "--repo",
            "web",
        ])
        .unwrap();
        match args.command {
            Command::Scan {
                org, files, repo, ..
            } => {
                assert_eq!(org, "acme");
                assert_eq!(files.len(), 2);
                assert_eq!(repo, "web");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
