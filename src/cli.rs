use clap::Parser;
use std::path::PathBuf;

/// Monitors web endpoints and alerts when they respond slowly or not at all.
#[derive(Parser, Debug)]
#[command(name = "webmon", version, about)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print a sample configuration file and exit
    #[arg(short, long)]
    pub generate_config: bool,

    /// Send a test mail to the configured recipients and exit
    #[arg(short = 'm', long)]
    pub test_mail: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from(["webmon", "-c", "/etc/webmon.toml", "-v"]);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/etc/webmon.toml")));
        assert!(cli.verbose);
        assert!(!cli.generate_config);
        assert!(!cli.test_mail);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["webmon"]);
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }
}
