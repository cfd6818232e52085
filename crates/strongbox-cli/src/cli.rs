use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use strongbox_core::Accessibility;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "strongbox",
    about = "Scoped secret storage encrypted under a key in the OS keyring",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Service scope to operate on (overrides the config file).
    #[arg(long, global = true)]
    pub service: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store a string secret, replacing any existing value.
    Set {
        key: String,
        value: String,
        /// When the secret may be read.
        #[arg(long, value_enum)]
        accessibility: Option<AccessibilityArg>,
        /// Allow the secret to synchronize across devices
        /// (`--synchronizable=false` overrides the config default).
        #[arg(
            long,
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "true"
        )]
        synchronizable: Option<bool>,
    },
    /// Print a stored secret.
    Get { key: String },
    /// Remove a secret (succeeds if it does not exist).
    Remove { key: String },
    /// List keys stored in the service scope.
    Keys,
    /// Remove every secret in the service scope.
    Clear,
    /// Round-trip a check secret through a dedicated health scope.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

/// Accessibility policy as spelled on the command line and in config.
#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AccessibilityArg {
    WhenPasscodeSetThisDeviceOnly,
    WhenUnlockedThisDeviceOnly,
    AfterFirstUnlockThisDeviceOnly,
    WhenUnlocked,
    AfterFirstUnlock,
}

impl AccessibilityArg {
    pub fn is_device_only(self) -> bool {
        matches!(
            self,
            AccessibilityArg::WhenPasscodeSetThisDeviceOnly
                | AccessibilityArg::WhenUnlockedThisDeviceOnly
                | AccessibilityArg::AfterFirstUnlockThisDeviceOnly
        )
    }

    /// Combine with the synchronizable flag; device-only policies refuse it.
    pub fn resolve(self, synchronizable: bool) -> Result<Accessibility> {
        let policy = match self {
            AccessibilityArg::WhenPasscodeSetThisDeviceOnly => {
                Accessibility::WhenPasscodeSetThisDeviceOnly
            }
            AccessibilityArg::WhenUnlockedThisDeviceOnly => {
                Accessibility::WhenUnlockedThisDeviceOnly
            }
            AccessibilityArg::AfterFirstUnlockThisDeviceOnly => {
                Accessibility::AfterFirstUnlockThisDeviceOnly
            }
            AccessibilityArg::WhenUnlocked => Accessibility::WhenUnlocked { synchronizable },
            AccessibilityArg::AfterFirstUnlock => Accessibility::AfterFirstUnlock { synchronizable },
        };
        if synchronizable && policy.synchronizable().is_none() {
            color_eyre::eyre::bail!("{self:?} items cannot be synchronizable");
        }
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_with_policy() {
        let cli = Cli::try_parse_from([
            "strongbox",
            "set",
            "api-token",
            "s3cret",
            "--accessibility",
            "after-first-unlock",
            "--synchronizable",
        ])
        .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Command::Set {
                key: "api-token".into(),
                value: "s3cret".into(),
                accessibility: Some(AccessibilityArg::AfterFirstUnlock),
                synchronizable: Some(true),
            }
        );
    }

    #[test]
    fn synchronizable_accepts_explicit_values() {
        let parse = |args: &[&str]| match Cli::try_parse_from(args)
            .expect("parse should succeed")
            .command
        {
            Command::Set { synchronizable, .. } => synchronizable,
            other => panic!("unexpected command {other:?}"),
        };
        assert_eq!(parse(&["strongbox", "set", "k", "v"]), None);
        assert_eq!(
            parse(&["strongbox", "set", "k", "v", "--synchronizable=false"]),
            Some(false)
        );
        assert_eq!(
            parse(&["strongbox", "set", "--synchronizable", "k", "v"]),
            Some(true)
        );
    }

    #[test]
    fn parses_global_service_flag() {
        let cli = Cli::try_parse_from(["strongbox", "keys", "--service", "svc"])
            .expect("parse should succeed");
        assert_eq!(cli.service.as_deref(), Some("svc"));
        assert_eq!(cli.command, Command::Keys);
    }

    #[test]
    fn parses_config_init_subcommand() {
        let cli = Cli::try_parse_from(["strongbox", "config", "init"])
            .expect("parse should succeed");
        assert_eq!(cli.command, Command::Config(ConfigCommand::Init));
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Cli::try_parse_from(["strongbox"]).is_err());
    }

    #[test]
    fn device_only_policy_rejects_sync() {
        assert!(AccessibilityArg::WhenUnlockedThisDeviceOnly
            .resolve(true)
            .is_err());
        assert_eq!(
            AccessibilityArg::WhenUnlocked.resolve(true).unwrap(),
            Accessibility::WhenUnlocked {
                synchronizable: true
            }
        );
        assert_eq!(
            AccessibilityArg::AfterFirstUnlockThisDeviceOnly
                .resolve(false)
                .unwrap(),
            Accessibility::AfterFirstUnlockThisDeviceOnly
        );
    }
}
