use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tally - inspect a catalog store and run ledger transactions
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version)]
#[command(about = "Catalog queries and ledger transactions over SQLite stores", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short = 'c', long = "config", env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog store path (overrides config)
    #[arg(long = "catalog")]
    pub catalog: Option<PathBuf>,

    /// Ledger store path (overrides config)
    #[arg(long = "ledger")]
    pub ledger: Option<PathBuf>,

    /// Emit JSON instead of plain text
    #[arg(long = "json")]
    pub json: bool,

    /// Emit logs as JSON lines
    #[arg(long = "log-json")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show the discovered catalog table and column roles
    Schema,
    /// List every catalog record
    List,
    /// Records whose ordering value is strictly greater than THRESHOLD
    After { threshold: i64 },
    /// Number of catalog records
    Count,
    /// Secondary text (author) for an exact primary text (title)
    Author { title: String },
    /// Set the quantity of one record
    SetQuantity { id: i64, quantity: i64 },
    /// Insert a catalog record
    Add {
        title: String,
        author: String,
        ordering: i64,
        quantity: i64,
    },
    /// Delete a catalog record by id
    Delete { id: i64 },
    /// Mean of the ordering column
    Average,
    /// Create the ledger store and its accounts table
    LedgerInit,
    /// Load accounts given as OWNER=BALANCE pairs in one batch
    LedgerLoad {
        #[arg(required = true, value_parser = parse_account)]
        accounts: Vec<(String, f64)>,
    },
    /// List ledger accounts
    Accounts,
    /// Move AMOUNT from one account to another
    Transfer { from: i64, to: i64, amount: f64 },
    /// Delete an account inside a transaction, roll back, and report presence
    Probe { id: i64 },
}

fn parse_account(raw: &str) -> Result<(String, f64), String> {
    let (owner, balance) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected OWNER=BALANCE, got '{raw}'"))?;
    if owner.trim().is_empty() {
        return Err("owner must not be empty".to_string());
    }
    let balance: f64 = balance
        .trim()
        .parse()
        .map_err(|_| format!("invalid balance '{balance}'"))?;
    Ok((owner.trim().to_string(), balance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account() {
        assert_eq!(
            parse_account("Alice=1000.5").unwrap(),
            ("Alice".to_string(), 1000.5)
        );
        assert!(parse_account("Alice").is_err());
        assert!(parse_account("=5").is_err());
        assert!(parse_account("Bob=lots").is_err());
    }

    #[test]
    fn test_parse_transfer_command() {
        let cli = Cli::try_parse_from(["tally", "--json", "transfer", "1", "2", "100.0"]).unwrap();
        assert!(cli.json);
        assert_eq!(
            cli.command,
            Command::Transfer {
                from: 1,
                to: 2,
                amount: 100.0
            }
        );
    }

    #[test]
    fn test_parse_ledger_load() {
        let cli = Cli::try_parse_from(["tally", "ledger-load", "Alice=1000", "Bob=500"]).unwrap();
        match cli.command {
            Command::LedgerLoad { accounts } => {
                assert_eq!(accounts.len(), 2);
                assert_eq!(accounts[1], ("Bob".to_string(), 500.0));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_ledger_load_requires_accounts() {
        assert!(Cli::try_parse_from(["tally", "ledger-load"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
