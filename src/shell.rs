//! The `db > ` REPL: a tiny statement grammar (`insert`/`select`) plus
//! dot meta-commands, layered over [`storage::Table`].
use std::io::{self, BufRead, Write};

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::ExecutableCommand;
use tracing::info;

use crate::errors::Error;
use crate::storage::row::Row;
use crate::storage::Table;

/// Threads the shell's presentation choices through the loop, instead of
/// a global mutable color flag.
pub struct ShellConfig {
    pub color: bool,
}

enum MetaCommandResult {
    Exit,
    Handled,
    Unrecognized,
}

enum Statement {
    Insert(Row),
    Select,
}

/// Runs the REPL against `table` until `.exit` or EOF, reporting errors
/// inline and only returning `Err` for a fatal (I/O/corruption/bug) error.
pub fn run(table: &mut Table, config: &ShellConfig) -> Result<(), Error> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_prompt(config)?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('.') {
            match handle_meta_command(command, table, config)? {
                MetaCommandResult::Exit => break,
                MetaCommandResult::Handled => continue,
                MetaCommandResult::Unrecognized => {
                    print_error(config, &format!("Unrecognized command '.{}'", command));
                    continue;
                }
            }
        }

        match parse_statement(line) {
            Ok(statement) => {
                if let Err(e) = execute_statement(statement, table) {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    print_error(config, &e.to_string());
                } else {
                    print_line(config, "Executed.");
                }
            }
            Err(e) => print_error(config, &e.to_string()),
        }
    }
    Ok(())
}

fn handle_meta_command(
    command: &str,
    table: &mut Table,
    config: &ShellConfig,
) -> Result<MetaCommandResult, Error> {
    match command {
        "exit" => {
            table.close()?;
            info!("shell exiting via .exit");
            Ok(MetaCommandResult::Exit)
        }
        "print" => {
            print_line(config, &Table::render_constants());
            Ok(MetaCommandResult::Handled)
        }
        "btree" => {
            let dump = table.render_btree()?;
            print_line(config, dump.trim_end());
            Ok(MetaCommandResult::Handled)
        }
        _ => Ok(MetaCommandResult::Unrecognized),
    }
}

fn parse_statement(line: &str) -> Result<Statement, Error> {
    if line == "select" {
        return Ok(Statement::Select);
    }
    if let Some(rest) = line.strip_prefix("insert") {
        let fields: Vec<&str> = rest.split_whitespace().collect();
        let [id, username, email] = fields[..] else {
            return Err(Error::Syntax(
                "usage: insert <id> <username> <email>".to_string(),
            ));
        };
        let id: u32 = id
            .parse()
            .map_err(|_| Error::Syntax(format!("invalid id '{}'", id)))?;
        let row = Row::new(id, username, email)?;
        return Ok(Statement::Insert(row));
    }
    Err(Error::Syntax(format!("unrecognized keyword at start of '{}'", line)))
}

fn execute_statement(statement: Statement, table: &mut Table) -> Result<(), Error> {
    match statement {
        Statement::Insert(row) => table.insert_row(&row),
        Statement::Select => {
            for row in table.select_rows()? {
                println!("{}", format_row(&row));
            }
            Ok(())
        }
    }
}

/// Formats a row for `select` output: `<id> <username> <email>`.
fn format_row(row: &Row) -> String {
    format!("{} {} {}", row.id, row.username, row.email)
}

fn print_prompt(config: &ShellConfig) -> Result<(), Error> {
    if config.color {
        io::stdout()
            .execute(SetForegroundColor(Color::Cyan))?
            .execute(Print("db > "))?
            .execute(ResetColor)?;
    } else {
        print!("db > ");
    }
    io::stdout().flush()?;
    Ok(())
}

fn print_line(config: &ShellConfig, s: &str) {
    if config.color {
        let _ = io::stdout()
            .execute(Print(s))
            .and_then(|o| o.execute(Print("\n")));
    } else {
        println!("{}", s);
    }
}

fn print_error(config: &ShellConfig, s: &str) {
    if config.color {
        let _ = io::stdout()
            .execute(SetForegroundColor(Color::Red))
            .and_then(|o| o.execute(Print(s)))
            .and_then(|o| o.execute(Print("\n")))
            .and_then(|o| o.execute(ResetColor));
    } else {
        eprintln!("{}", s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insert_statement() {
        let statement = parse_statement("insert 1 alice alice@example.com").unwrap();
        match statement {
            Statement::Insert(row) => {
                assert_eq!(row.id, 1);
                assert_eq!(row.username, "alice");
                assert_eq!(row.email, "alice@example.com");
            }
            _ => panic!("expected Insert"),
        }
    }

    #[test]
    fn parses_select_statement() {
        assert!(matches!(parse_statement("select").unwrap(), Statement::Select));
    }

    #[test]
    fn rejects_insert_with_wrong_arity() {
        assert!(parse_statement("insert 1 alice").is_err());
    }

    #[test]
    fn rejects_insert_with_non_numeric_id() {
        assert!(parse_statement("insert x alice alice@example.com").is_err());
    }

    #[test]
    fn rejects_unknown_keyword() {
        assert!(parse_statement("delete 1").is_err());
    }

    #[test]
    fn format_row_is_space_separated_with_no_parens_or_commas() {
        let row = Row::new(1, "alice", "alice@example.com").unwrap();
        assert_eq!(format_row(&row), "1 alice alice@example.com");
    }

    #[test]
    fn select_statement_executes_against_every_inserted_row_in_order() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        for (id, username, email) in [
            (1, "alice", "alice@example.com"),
            (2, "bob", "bob@example.com"),
        ] {
            let row = Row::new(id, username, email).unwrap();
            execute_statement(Statement::Insert(row), &mut table).unwrap();
        }
        execute_statement(Statement::Select, &mut table).unwrap();
        let rendered: Vec<String> = table
            .select_rows()
            .unwrap()
            .iter()
            .map(format_row)
            .collect();
        assert_eq!(
            rendered,
            vec!["1 alice alice@example.com", "2 bob bob@example.com"]
        );
    }
}
