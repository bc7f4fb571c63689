use pgcrud::ColumnValues;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum Command {
    Help,
    Run(Invocation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    TestConnection,
    CreateDatabase,
    CreateTable,
    DropTable,
    ShowCreateTable,
    Insert,
    Select,
    Update,
    Delete,
}

impl Action {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "test-connection" => Action::TestConnection,
            "create-database" => Action::CreateDatabase,
            "create-table" => Action::CreateTable,
            "drop-table" => Action::DropTable,
            "show-create-table" => Action::ShowCreateTable,
            "insert" => Action::Insert,
            "select" => Action::Select,
            "update" => Action::Update,
            "delete" => Action::Delete,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub action: Action,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub columns: Option<String>,
    pub name: Option<String>,
    pub data: Option<ColumnValues>,
    pub condition: Option<ColumnValues>,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1).map(String::as_str);
    let Some(first) = it.next() else {
        return Ok(Command::Help);
    };
    if matches!(first, "-h" | "--help" | "help") {
        return Ok(Command::Help);
    }
    let Some(action) = Action::from_name(first) else {
        anyhow::bail!("unknown command: {first}");
    };

    let mut inv = Invocation {
        action,
        database: None,
        schema: None,
        table: None,
        columns: None,
        name: None,
        data: None,
        condition: None,
    };

    while let Some(token) = it.next() {
        if matches!(token, "-h" | "--help") {
            return Ok(Command::Help);
        }
        let (flag, inline) = match token.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value)),
            _ => (token, None),
        };
        let mut value = || -> anyhow::Result<String> {
            match inline {
                Some(v) => Ok(v.to_string()),
                None => match it.next() {
                    Some(v) => Ok(v.to_string()),
                    None => anyhow::bail!("{flag} requires a value"),
                },
            }
        };
        match flag {
            "--database" => inv.database = Some(value()?),
            "--schema" => inv.schema = Some(value()?),
            "--table" => inv.table = Some(value()?),
            "--columns" => inv.columns = Some(value()?),
            "--name" => inv.name = Some(value()?),
            "--data" => inv.data = Some(parse_object("--data", &value()?)?),
            "--where" => inv.condition = Some(parse_object("--where", &value()?)?),
            _ => anyhow::bail!("unknown argument: {token}"),
        }
    }

    Ok(Command::Run(inv))
}

fn parse_object(flag: &str, text: &str) -> anyhow::Result<ColumnValues> {
    let doc: Value = serde_json::from_str(text)
        .map_err(|e| anyhow::anyhow!("{flag} is not valid JSON: {e}"))?;
    ColumnValues::from_json(doc)
        .ok_or_else(|| anyhow::anyhow!("{flag} must be a JSON object"))
}

pub fn print_help() {
    println!(
        "\
pgcrud - schema-agnostic CRUD against PostgreSQL

USAGE:
  pgcrud <COMMAND> [OPTIONS]

COMMANDS:
  test-connection       Check connectivity and report the server version
  create-database       CREATE DATABASE (--name)
  create-table          CREATE TABLE IF NOT EXISTS (--table, --columns)
  drop-table            DROP TABLE IF EXISTS (--table)
  show-create-table     Print the CREATE TABLE text of an existing table
  insert                Insert one row (--data)
  select                Select rows (--where optional)
  update                Update rows (--data, --where required)
  delete                Delete rows (--where optional; omitted deletes all rows)

OPTIONS:
  --database <NAME>     Target database (default: DB_NAME)
  --schema <NAME>       Schema (default: public)
  --table <NAME>        Table name
  --columns <DDL>       Column definitions, passed through verbatim
  --name <NAME>         Database name for create-database
  --data <JSON>         Column values as a JSON object
  --where <JSON>        Equality conditions as a JSON object (ANDed)
  -h, --help            Print help

ENVIRONMENT:
  DB_HOST, DB_PORT, DB_USER, DB_PASSWORD, DB_NAME   Connection settings (.env is read)
  RUST_LOG                                          Log filter (default: info)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgcrud::FieldValue;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("pgcrud")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn no_arguments_prints_help() {
        assert!(matches!(parse_args(&args(&[])).unwrap(), Command::Help));
        assert!(matches!(
            parse_args(&args(&["select", "--help"])).unwrap(),
            Command::Help
        ));
    }

    #[test]
    fn parse_update_with_data_and_where() {
        let cmd = parse_args(&args(&[
            "update",
            "--database",
            "shop",
            "--table=users",
            "--data",
            r#"{"name": "Jane"}"#,
            "--where",
            r#"{"id": 1}"#,
        ]))
        .unwrap();
        let Command::Run(inv) = cmd else {
            panic!("expected run");
        };

        assert_eq!(inv.action, Action::Update);
        assert_eq!(inv.database.as_deref(), Some("shop"));
        assert_eq!(inv.table.as_deref(), Some("users"));
        assert_eq!(
            inv.data.unwrap().get("name"),
            Some(&FieldValue::Text("Jane".to_string()))
        );
        assert_eq!(inv.condition.unwrap().get("id"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn inline_value_may_contain_equals() {
        let cmd = parse_args(&args(&["create-table", "--table", "t", "--columns=flag BOOL DEFAULT x = y"])).unwrap();
        let Command::Run(inv) = cmd else {
            panic!("expected run");
        };
        assert_eq!(inv.columns.as_deref(), Some("flag BOOL DEFAULT x = y"));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&["truncate"])).is_err());
        assert!(parse_args(&args(&["select", "--table"])).is_err());
        assert!(parse_args(&args(&["select", "--bogus", "1"])).is_err());
        assert!(parse_args(&args(&["insert", "--data", "[1, 2]"])).is_err());
        assert!(parse_args(&args(&["insert", "--data", "{not json"])).is_err());
    }
}
