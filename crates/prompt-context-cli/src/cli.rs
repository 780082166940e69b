use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Assemble prompt context from files, notes and git diffs
#[derive(Parser, Debug)]
#[command(name = "pctx", author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: ./pctx.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Repository directory for git and relative paths (overrides PCTX_WORKING_DIR)
    #[arg(long, global = true)]
    pub working_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Interactive command loop (default)
    Repl,

    /// Render a JSON array of context items to markdown
    Render {
        /// Items file, or `-` for stdin
        input: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_repl() {
        let cli = Cli::try_parse_from(["pctx"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_render_with_global_flags() {
        let cli = Cli::try_parse_from(["pctx", "render", "-", "--working-dir", "/repo"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Render {
                input: "-".to_string()
            })
        );
        assert_eq!(cli.working_dir, Some(PathBuf::from("/repo")));
    }

    #[test]
    fn test_verify_command() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
