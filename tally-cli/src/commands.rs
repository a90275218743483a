//! Subcommand execution.

use serde::Serialize;
use std::io::Write;
use tally_core::{NewAccount, NewRecord, Record, TallyConfig};
use tally_storage::{
    LedgerStore, RecordStore, RollbackSandbox, SqliteRecordRepository, TransferEngine,
};

use crate::args::{Cli, Command};
use crate::error::CliResult;

/// Resolve configuration: file (if any), environment, then command-line flags.
pub fn load_config(cli: &Cli) -> CliResult<TallyConfig> {
    let mut config = TallyConfig::load(cli.config.as_deref())?;
    if let Some(path) = &cli.catalog {
        config.catalog_path = path.clone();
    }
    if let Some(path) = &cli.ledger {
        config.ledger_path = path.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Run one command, writing its result to `out`.
pub fn execute<W: Write>(
    command: &Command,
    config: &TallyConfig,
    json: bool,
    out: &mut W,
) -> CliResult<()> {
    match command {
        Command::Schema => {
            let repo = SqliteRecordRepository::from_config(config)?;
            let schema = repo.schema();
            emit(out, json, schema, |out| {
                writeln!(out, "table: {}", schema.table)?;
                for column in &schema.columns {
                    writeln!(out, "  {} {}", column.name, column.declared_type)?;
                }
                let roles = &schema.roles;
                writeln!(out, "identity: {}", roles.identity)?;
                writeln!(out, "primary_text: {}", roles.primary_text)?;
                writeln!(out, "secondary_text: {}", roles.secondary_text)?;
                writeln!(out, "ordering: {}", roles.ordering)?;
                writeln!(out, "quantity: {}", roles.quantity)
            })
        }
        Command::List => {
            let records = SqliteRecordRepository::from_config(config)?.list_all()?;
            emit_records(out, json, &records)
        }
        Command::After { threshold } => {
            let records = SqliteRecordRepository::from_config(config)?
                .find_by_ordering_greater_than(*threshold)?;
            emit_records(out, json, &records)
        }
        Command::Count => {
            let count = SqliteRecordRepository::from_config(config)?.count()?;
            emit(out, json, &count, |out| writeln!(out, "{count}"))
        }
        Command::Author { title } => {
            let author =
                SqliteRecordRepository::from_config(config)?.find_attribute_by_primary_text(title)?;
            emit(out, json, &author, |out| match &author {
                Some(author) => writeln!(out, "{author}"),
                None => writeln!(out, "not found"),
            })
        }
        Command::SetQuantity { id, quantity } => {
            let changed =
                SqliteRecordRepository::from_config(config)?.update_quantity(*id, *quantity)?;
            emit(out, json, &Changed { changed }, |out| {
                writeln!(out, "{changed} row(s) updated")
            })
        }
        Command::Add {
            title,
            author,
            ordering,
            quantity,
        } => {
            let record = NewRecord::new(title.as_str(), author.as_str(), *ordering, *quantity);
            let id = SqliteRecordRepository::from_config(config)?.insert(&record)?;
            emit(out, json, &Inserted { id }, |out| writeln!(out, "inserted {id}"))
        }
        Command::Delete { id } => {
            let changed = SqliteRecordRepository::from_config(config)?.delete_by_id(*id)?;
            emit(out, json, &Changed { changed }, |out| {
                writeln!(out, "{changed} row(s) deleted")
            })
        }
        Command::Average => {
            let average = SqliteRecordRepository::from_config(config)?.average_ordering()?;
            emit(out, json, &average, |out| writeln!(out, "{average}"))
        }
        Command::LedgerInit => {
            LedgerStore::from_config(config).create_schema()?;
            emit(out, json, &"created", |out| {
                writeln!(out, "created {}", config.ledger_path.display())
            })
        }
        Command::LedgerLoad { accounts } => {
            let accounts: Vec<NewAccount> = accounts
                .iter()
                .map(|(owner, balance)| NewAccount::new(owner.as_str(), *balance))
                .collect();
            let ids = LedgerStore::from_config(config).bulk_insert(accounts)?;
            emit(out, json, &ids, |out| {
                for id in &ids {
                    writeln!(out, "{id}")?;
                }
                Ok(())
            })
        }
        Command::Accounts => {
            let accounts = LedgerStore::from_config(config).list()?;
            emit(out, json, &accounts, |out| {
                for account in &accounts {
                    writeln!(out, "{}\t{}\t{:.2}", account.id, account.owner, account.balance)?;
                }
                Ok(())
            })
        }
        Command::Transfer { from, to, amount } => {
            let engine = TransferEngine::new(LedgerStore::from_config(config));
            let outcome = engine.try_transfer(*from, *to, *amount)?;
            emit(out, json, &outcome, |out| writeln!(out, "{outcome:?}"))
        }
        Command::Probe { id } => {
            let sandbox = RollbackSandbox::new(LedgerStore::from_config(config));
            let report = sandbox.probe(*id)?;
            emit(out, json, &report, |out| {
                writeln!(out, "present after rollback: {}", report.present_after)
            })
        }
    }
}

#[derive(Serialize)]
struct Changed {
    changed: usize,
}

#[derive(Serialize)]
struct Inserted {
    id: i64,
}

fn emit<W, T, F>(out: &mut W, json: bool, value: &T, text: F) -> CliResult<()>
where
    W: Write,
    T: Serialize + ?Sized,
    F: FnOnce(&mut W) -> std::io::Result<()>,
{
    if json {
        serde_json::to_writer(&mut *out, value)?;
        writeln!(out)?;
    } else {
        text(out)?;
    }
    Ok(())
}

fn emit_records<W: Write>(out: &mut W, json: bool, records: &[Record]) -> CliResult<()> {
    emit(out, json, records, |out| {
        for r in records {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                r.id,
                r.primary_text.as_deref().unwrap_or(""),
                r.secondary_text.as_deref().unwrap_or(""),
                blank_if_null(r.ordering),
                blank_if_null(r.quantity)
            )?;
        }
        Ok(())
    })
}

fn blank_if_null(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_test_utils::{catalog_from_sql, library_catalog, test_config};
    use tempfile::TempDir;

    fn run(command: Command, config: &TallyConfig, json: bool) -> String {
        let mut out = Vec::new();
        execute(&command, config, json, &mut out).expect("command should succeed");
        String::from_utf8(out).expect("utf-8 output")
    }

    #[test]
    fn test_catalog_commands_against_fixture() {
        let fixture = library_catalog();
        let mut config = test_config(fixture.dir.path());
        config.catalog_path = fixture.path.clone();

        assert_eq!(run(Command::Count, &config, false), "5\n");
        assert_eq!(run(Command::Average, &config, true), "1542.0\n");
        assert_eq!(
            run(Command::Author { title: "Book2".to_string() }, &config, false),
            "Author2\n"
        );
        assert_eq!(
            run(Command::Author { title: "Nope".to_string() }, &config, true),
            "null\n"
        );
        let after = run(Command::After { threshold: 1548 }, &config, false);
        assert_eq!(after.lines().count(), 3);
    }

    #[test]
    fn test_list_prints_null_columns_blank() {
        let fixture = catalog_from_sql(
            "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT, author TEXT, year INTEGER, stock INTEGER)",
            "INSERT INTO books VALUES (1, 'Book1', 'Author1', 1500, NULL);",
        );
        let mut config = test_config(fixture.dir.path());
        config.catalog_path = fixture.path.clone();

        let text = run(Command::List, &config, false);
        assert!(text.lines().any(|line| line == "1\tBook1\tAuthor1\t1500\t"));

        let json = run(Command::List, &config, true);
        let rows: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(rows[0]["quantity"].is_null());
    }

    #[test]
    fn test_ledger_commands_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());

        run(Command::LedgerInit, &config, false);
        let ids = run(
            Command::LedgerLoad {
                accounts: vec![("Alice".to_string(), 1000.0), ("Bob".to_string(), 500.0)],
            },
            &config,
            true,
        );
        assert_eq!(ids, "[1,2]\n");

        let outcome = run(
            Command::Transfer {
                from: 1,
                to: 2,
                amount: 100.0,
            },
            &config,
            true,
        );
        assert_eq!(outcome, "\"applied\"\n");

        let accounts = run(Command::Accounts, &config, false);
        assert_eq!(accounts, "1\tAlice\t900.00\n2\tBob\t600.00\n");

        let probe = run(Command::Probe { id: 1 }, &config, false);
        assert_eq!(probe, "present after rollback: true\n");
    }

    #[test]
    fn test_ledger_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        run(Command::LedgerInit, &config, false);

        let mut out = Vec::new();
        assert!(execute(&Command::LedgerInit, &config, false, &mut out).is_err());
    }
}
