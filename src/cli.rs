use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labseed")]
#[command(version)]
#[command(about = "Seed and tear down GitLab accounts, groups and projects", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage accounts and what they own
    #[command(subcommand)]
    User(UserCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Connection flags shared by every command that talks to GitLab.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// GitLab base URL
    #[arg(long, env = "GITLAB_URL", hide_env_values = true)]
    pub host: Option<String>,

    /// Admin personal access token
    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

// ============================================================================
// User Commands
// ============================================================================

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create accounts, tokens, groups and projects from a spec file
    Create {
        /// Spec file
        #[arg(short = 'f', long = "file")]
        file: PathBuf,

        /// Write the result document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render the result through this Tera template
        #[arg(short, long)]
        template: Option<PathBuf>,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Delete the accounts in a spec file together with their groups and projects
    #[command(after_help = "\
Only accounts created more than --days-old days ago are deleted (default 2).
Use --days-old 0 to delete every listed account regardless of age.")]
    Cleanup {
        /// Spec file
        #[arg(short = 'f', long = "file")]
        file: PathBuf,

        /// Minimum account age in days (0 disables the check)
        #[arg(long, default_value_t = 2)]
        days_old: u32,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Delete accounts by username
    Delete {
        /// Usernames, comma separated
        #[arg(long = "username", required = true, value_delimiter = ',')]
        usernames: Vec<String>,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// List accounts
    List {
        /// Only accounts whose username starts with this
        #[arg(long)]
        prefix: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Delete every account whose username starts with a prefix
    DeleteByPrefix {
        /// Username prefix
        #[arg(long)]
        prefix: String,

        /// Show what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,

        /// Minimum account age in days (0 disables the check)
        #[arg(long, default_value_t = 2)]
        days_old: u32,

        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "labseed", "user", "create", "-f", "spec.yaml", "-o", "out.yaml", "--host",
            "https://gitlab.example.com", "--token", "glpat-x",
        ])
        .unwrap();
        match cli.command {
            Command::User(UserCommand::Create {
                file,
                output,
                template,
                connection,
            }) => {
                assert_eq!(file, PathBuf::from("spec.yaml"));
                assert_eq!(output, Some(PathBuf::from("out.yaml")));
                assert!(template.is_none());
                assert_eq!(connection.host.as_deref(), Some("https://gitlab.example.com"));
            }
            _ => panic!("expected user create"),
        }
    }

    #[test]
    fn test_parse_delete_splits_usernames() {
        let cli = Cli::try_parse_from(["labseed", "user", "delete", "--username", "a,b,c"]).unwrap();
        match cli.command {
            Command::User(UserCommand::Delete { usernames, .. }) => {
                assert_eq!(usernames, vec!["a", "b", "c"]);
            }
            _ => panic!("expected user delete"),
        }
    }

    #[test]
    fn test_days_old_defaults_to_two() {
        let cli = Cli::try_parse_from(["labseed", "user", "delete-by-prefix", "--prefix", "qa-"])
            .unwrap();
        match cli.command {
            Command::User(UserCommand::DeleteByPrefix {
                prefix,
                dry_run,
                days_old,
                ..
            }) => {
                assert_eq!(prefix, "qa-");
                assert!(!dry_run);
                assert_eq!(days_old, 2);
            }
            _ => panic!("expected user delete-by-prefix"),
        }
    }

    #[test]
    fn test_delete_requires_username() {
        assert!(Cli::try_parse_from(["labseed", "user", "delete"]).is_err());
    }
}
