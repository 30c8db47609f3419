//! Command-line arguments for the demo binary

use clap::Parser;
use std::path::PathBuf;

/// Upsert, read and delete sample JSON and Hash records on a MemoryDB cluster
#[derive(Parser, Debug, Clone)]
#[command(name = "memorydb-demo")]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Properties file with the cluster and client settings
    #[arg(short = 'c', long = "config", env = "CONFIG_FILE_NAME")]
    pub config_file: PathBuf,

    /// Let MEMORYDB_* environment variables override the file
    #[arg(long = "env-overrides")]
    pub env_overrides: bool,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse from the process arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_flag() {
        let args = CliArgs::try_parse_from(["memorydb-demo", "--config", "demo.properties", "-v"])
            .unwrap();
        assert_eq!(args.config_file, PathBuf::from("demo.properties"));
        assert!(args.verbose);
        assert!(!args.env_overrides);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        let result =
            CliArgs::try_parse_from(["memorydb-demo", "-c", "demo.properties", "-v", "-q"]);
        assert!(result.is_err());
    }
}
