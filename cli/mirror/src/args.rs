//! CLI argument definitions for s3-mirror.

use anyhow::{Result, bail};
use clap::Parser;
use sm_cli_common::LogLevel;
use sm_types::{DEFAULT_MULTIPART_THRESHOLD, DEFAULT_PART_SIZE, GB, KB, MB, StorageClass, TB};
use std::fmt;

/// Mirror one S3 location into another with server-side copies.
///
/// Keys missing from the destination, or whose size/ETag differ, are
/// copied. Everything else is left alone.
///
/// ## Examples
///
/// Mirror a bucket:
///   s3-mirror s3://source-bucket s3://backup-bucket
///
/// Mirror a prefix into another prefix, pruning removed keys:
///   s3-mirror s3://source-bucket/logs/ s3://backup-bucket/archive/logs/ --delete-removed
///
/// Move objects older than 30 days:
///   s3-mirror s3://hot-bucket s3://cold-bucket --move --ctime 30d --older-than
///
/// Delete objects modified in the last day (dry run):
///   s3-mirror s3://scratch-bucket --delete --ctime 1d --dry-run
#[derive(Parser, Debug)]
#[command(name = "s3-mirror")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Source location, `s3://bucket[/prefix]`
    #[arg(value_name = "SOURCE", value_parser = parse_s3_location)]
    pub source: S3Location,

    /// Destination location, `s3://bucket[/prefix]` (optional with --delete)
    #[arg(
        value_name = "DESTINATION",
        value_parser = parse_s3_location,
        required_unless_present = "delete"
    )]
    pub destination: Option<S3Location>,

    // === Key Selection ===
    /// Only mirror keys under this source prefix
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Destination prefix replacing the source prefix in copied keys
    #[arg(short, long)]
    pub dest_prefix: Option<String>,

    /// Only act on objects on one side of this age (7d, 24h, 2024-01-15, ...)
    #[arg(short = 'c', long)]
    pub ctime: Option<String>,

    /// With --ctime, act on objects older than the cutoff instead of younger
    #[arg(long, requires = "ctime")]
    pub older_than: bool,

    // === Mode ===
    /// Log what would be done without copying or deleting anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Delete each source object after it has been copied
    #[arg(short = 'm', long = "move", conflicts_with = "delete")]
    pub move_objects: bool,

    /// Delete destination objects that no longer exist in the source
    #[arg(short = 'X', long, conflicts_with = "move_objects")]
    pub delete_removed: bool,

    /// Delete source objects instead of copying them
    #[arg(long)]
    pub delete: bool,

    /// Compare objects by size only, ignoring ETags
    #[arg(short = 's', long)]
    pub size_only: bool,

    // === Copy Options ===
    /// Storage class for copied objects
    #[arg(long, default_value = "STANDARD", value_parser = parse_storage_class)]
    pub storage_class: StorageClass,

    /// Request AES-256 server-side encryption for copied objects
    #[arg(short = 'S', long)]
    pub server_side_encryption: bool,

    /// Grant the destination bucket owner full control instead of copying ACLs
    #[arg(short = 'C', long)]
    pub cross_account_copy: bool,

    /// Objects above this size use multipart copy (e.g. 5G, 500M)
    #[arg(long, default_value_t = DEFAULT_MULTIPART_THRESHOLD, value_parser = parse_size)]
    pub multipart_threshold: u64,

    /// Part size for multipart copies (e.g. 4G, 100M)
    #[arg(long, default_value_t = DEFAULT_PART_SIZE, value_parser = parse_size)]
    pub part_size: u64,

    // === Parallelism Options ===
    /// Number of concurrent copy/delete workers (must be >= 1)
    #[arg(short = 't', long, default_value = "100", value_parser = parse_positive_usize)]
    pub max_threads: usize,

    /// Attempts per copy or delete before giving up (must be >= 1)
    #[arg(short = 'r', long, default_value = "5", value_parser = parse_positive_u32)]
    pub max_retries: u32,

    /// Work queue capacity (default: sized from available memory)
    #[arg(long, value_parser = parse_positive_usize)]
    pub queue_capacity: Option<usize>,

    // === S3 Configuration ===
    /// Custom S3 endpoint URL (for LocalStack)
    #[arg(short, long, env = "S3_MIRROR_ENDPOINT")]
    pub endpoint: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// AWS access key ID
    #[arg(long, env = "AWS_ACCESS_KEY_ID", requires = "secret_key")]
    pub access_key: Option<String>,

    /// AWS secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// AWS profile name
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "900", value_parser = parse_positive_u64)]
    pub timeout: u64,

    // === Output Options ===
    /// Print periodic progress to stderr
    #[arg(long)]
    pub progress: bool,

    /// Progress reporting interval in seconds
    #[arg(long, default_value = "10", value_parser = parse_positive_u64)]
    pub progress_interval: u64,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Verbose output (same as --log-level debug)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Log level after applying `--verbose`.
    pub fn effective_log_level(&self) -> LogLevel {
        match self.log_level {
            LogLevel::Info | LogLevel::Warn | LogLevel::Error if self.verbose => LogLevel::Debug,
            level => level,
        }
    }

    /// Source prefix from `--prefix` or the SOURCE location, never both.
    pub fn source_prefix(&self) -> Result<Option<String>> {
        merge_prefix("--prefix", self.prefix.as_deref(), self.source.prefix.as_deref())
    }

    /// Destination prefix from `--dest-prefix` or the DESTINATION location,
    /// never both.
    pub fn dest_prefix(&self) -> Result<Option<String>> {
        let inline = self.destination.as_ref().and_then(|d| d.prefix.as_deref());
        merge_prefix("--dest-prefix", self.dest_prefix.as_deref(), inline)
    }
}

fn merge_prefix(flag: &str, option: Option<&str>, inline: Option<&str>) -> Result<Option<String>> {
    match (option, inline) {
        (Some(_), Some(_)) => bail!("Cannot use {flag} when the location already has a prefix"),
        (Some(prefix), None) | (None, Some(prefix)) => Ok(Some(prefix.to_string())),
        (None, None) => Ok(None),
    }
}

/// A bucket plus optional key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub prefix: Option<String>,
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "s3://{}/{}", self.bucket, prefix),
            None => write!(f, "s3://{}", self.bucket),
        }
    }
}

/// Parse `s3://bucket[/prefix]`. The scheme is optional.
pub fn parse_s3_location(s: &str) -> Result<S3Location, String> {
    let path = s.strip_prefix("s3://").unwrap_or(s);

    let (bucket, prefix) = match path.split_once('/') {
        Some((bucket, prefix)) => (bucket, Some(prefix)),
        None => (path, None),
    };

    if bucket.is_empty() {
        return Err(format!("'{s}' has no bucket name"));
    }

    Ok(S3Location {
        bucket: bucket.to_string(),
        prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
    })
}

fn parse_storage_class(s: &str) -> Result<StorageClass, String> {
    s.parse()
}

/// Parse a byte size: a plain number or one with a K/M/G/T suffix.
fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    let digits = upper.trim_end_matches('B');

    let (number, unit) = match digits.chars().last() {
        Some('K') => (&digits[..digits.len() - 1], KB),
        Some('M') => (&digits[..digits.len() - 1], MB),
        Some('G') => (&digits[..digits.len() - 1], GB),
        Some('T') => (&digits[..digits.len() - 1], TB),
        _ => (digits, 1),
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a valid size"))?;

    value
        .checked_mul(unit)
        .ok_or_else(|| format!("'{s}' is too large"))
}

/// Parse a positive usize (>= 1).
fn parse_positive_usize(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if value < 1 {
        return Err(format!("{} is not in 1..", value));
    }
    Ok(value)
}

fn parse_positive_u32(s: &str) -> Result<u32, String> {
    let value = parse_positive_usize(s)?;
    u32::try_from(value).map_err(|_| format!("{} is too large", value))
}

fn parse_positive_u64(s: &str) -> Result<u64, String> {
    let value: u64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if value < 1 {
        return Err(format!("{} is not in 1..", value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "s3://from-bucket";
    const DESTINATION: &str = "s3://to-bucket";

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["s3-mirror"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_basic_args() {
        let cli = parse(&[SOURCE, DESTINATION]);

        assert!(!cli.dry_run);
        assert_eq!(cli.source.bucket, "from-bucket");
        assert_eq!(cli.destination.as_ref().unwrap().bucket, "to-bucket");
        assert_eq!(cli.max_threads, 100);
        assert_eq!(cli.max_retries, 5);
        assert_eq!(cli.storage_class, StorageClass::Standard);
        assert_eq!(cli.multipart_threshold, DEFAULT_MULTIPART_THRESHOLD);
        assert_eq!(cli.source_prefix().unwrap(), None);
        assert_eq!(cli.dest_prefix().unwrap(), None);
    }

    #[test]
    fn test_dry_run_and_threads() {
        let cli = parse(&["--dry-run", "--max-threads", "42", SOURCE, DESTINATION]);

        assert!(cli.dry_run);
        assert_eq!(cli.max_threads, 42);
    }

    #[test]
    fn test_inline_prefixes() {
        let cli = parse(&["s3://from-bucket/foo", "s3://to-bucket/bar"]);

        assert_eq!(cli.source_prefix().unwrap().as_deref(), Some("foo"));
        assert_eq!(cli.dest_prefix().unwrap().as_deref(), Some("bar"));
    }

    #[test]
    fn test_inline_source_prefix_and_prefix_option() {
        let cli = parse(&["--prefix", "foo", "s3://from-bucket/foo", DESTINATION]);
        assert!(cli.source_prefix().is_err());
    }

    #[test]
    fn test_inline_dest_prefix_and_dest_prefix_option() {
        let cli = parse(&["--dest-prefix", "foo", SOURCE, "s3://to-bucket/foo"]);
        assert!(cli.dest_prefix().is_err());
    }

    #[test]
    fn test_prefix_option() {
        let cli = parse(&["--prefix", "logs/", "--dest-prefix", "archive/", SOURCE, DESTINATION]);

        assert_eq!(cli.source_prefix().unwrap().as_deref(), Some("logs/"));
        assert_eq!(cli.dest_prefix().unwrap().as_deref(), Some("archive/"));
    }

    #[test]
    fn test_destination_required_unless_delete() {
        assert!(Cli::try_parse_from(["s3-mirror", SOURCE]).is_err());

        let cli = parse(&["--delete", SOURCE]);
        assert!(cli.delete);
        assert!(cli.destination.is_none());
    }

    #[test]
    fn test_move_conflicts_with_delete() {
        assert!(Cli::try_parse_from(["s3-mirror", "--move", "--delete", SOURCE, DESTINATION]).is_err());
    }

    #[test]
    fn test_move_conflicts_with_delete_removed() {
        assert!(
            Cli::try_parse_from(["s3-mirror", "--move", "--delete-removed", SOURCE, DESTINATION])
                .is_err()
        );
    }

    #[test]
    fn test_older_than_requires_ctime() {
        assert!(Cli::try_parse_from(["s3-mirror", "--older-than", SOURCE, DESTINATION]).is_err());

        let cli = parse(&["--ctime", "7d", "--older-than", SOURCE, DESTINATION]);
        assert_eq!(cli.ctime.as_deref(), Some("7d"));
        assert!(cli.older_than);
    }

    #[test]
    fn test_verbose_maps_to_debug() {
        let cli = parse(&["-v", SOURCE, DESTINATION]);
        assert_eq!(cli.effective_log_level(), LogLevel::Debug);

        let cli = parse(&["-v", "--log-level", "trace", SOURCE, DESTINATION]);
        assert_eq!(cli.effective_log_level(), LogLevel::Trace);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Cli::try_parse_from(["s3-mirror", "--max-threads", "0", SOURCE, DESTINATION]).is_err());
        assert!(Cli::try_parse_from(["s3-mirror", "--storage-class", "cheap", SOURCE, DESTINATION]).is_err());
    }

    #[test]
    fn test_parse_s3_location() {
        assert_eq!(
            parse_s3_location("s3://bucket/a/b/").unwrap(),
            S3Location {
                bucket: "bucket".to_string(),
                prefix: Some("a/b/".to_string()),
            }
        );
        assert_eq!(parse_s3_location("bucket").unwrap().prefix, None);
        assert_eq!(parse_s3_location("s3://bucket/").unwrap().prefix, None);
        assert!(parse_s3_location("s3://").is_err());
        assert!(parse_s3_location("/prefix").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("100M").unwrap(), 100 * MB);
        assert_eq!(parse_size("5GB").unwrap(), 5 * GB);
        assert_eq!(parse_size("2k").unwrap(), 2 * KB);
        assert!(parse_size("lots").is_err());
    }
}
