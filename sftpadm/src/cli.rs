use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::Serialize;
use serde_json::Value;
use sftpadm_core::{AdminClient, AdminError, Reply, StatusCode, User};

pub const USAGE: &str = "\
Usage: sftpadm <command> [args]

Commands:
  version                                  Show server version
  status                                   Show data provider status
  users [--limit N] [--offset N] [--username NAME]
  user ID                                  Show one user
  add-user FILE                            Create the user described in a JSON file
  update-user FILE                         Update the user described in a JSON file
  delete-user ID
  quota-scans                              List active quota scans
  start-quota-scan USERNAME
  connections                              List active connections
  close-connection ID
  dump FILE [--indent N]                   Back up server data
  load FILE [--scan-quota N] [--mode N]    Restore server data
  help

Environment: SFTPADM_URL, SFTPADM_USERNAME, SFTPADM_PASSWORD, SFTPADM_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Version,
    Status,
    Users {
        limit: u32,
        offset: u32,
        username: String,
    },
    User(i64),
    AddUser(PathBuf),
    UpdateUser(PathBuf),
    DeleteUser(i64),
    QuotaScans,
    StartQuotaScan(String),
    Connections,
    CloseConnection(String),
    Dump {
        output_file: String,
        indent: Option<u32>,
    },
    Load {
        input_file: String,
        scan_quota: Option<u32>,
        mode: Option<u32>,
    },
    Help,
}

pub fn parse_command<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let Some(name) = args.next() else {
        return Ok(Command::Help);
    };
    let rest: Vec<String> = args.collect();
    let command = match name.as_str() {
        "version" => no_args(&name, &rest, Command::Version)?,
        "status" => no_args(&name, &rest, Command::Status)?,
        "quota-scans" => no_args(&name, &rest, Command::QuotaScans)?,
        "connections" => no_args(&name, &rest, Command::Connections)?,
        "help" | "--help" | "-h" => Command::Help,
        "users" => {
            let mut limit = 0;
            let mut offset = 0;
            let mut username = String::new();
            let mut iter = rest.iter();
            while let Some(flag) = iter.next() {
                let value = flag_value(flag, iter.next())?;
                match flag.as_str() {
                    "--limit" => limit = parse_number(flag, value)?,
                    "--offset" => offset = parse_number(flag, value)?,
                    "--username" => username = value.to_string(),
                    other => bail!("unknown argument: {other}"),
                }
            }
            Command::Users {
                limit,
                offset,
                username,
            }
        }
        "user" => Command::User(parse_id(&single_arg(&name, &rest)?)?),
        "delete-user" => Command::DeleteUser(parse_id(&single_arg(&name, &rest)?)?),
        "add-user" => Command::AddUser(PathBuf::from(single_arg(&name, &rest)?)),
        "update-user" => Command::UpdateUser(PathBuf::from(single_arg(&name, &rest)?)),
        "start-quota-scan" => Command::StartQuotaScan(single_arg(&name, &rest)?),
        "close-connection" => Command::CloseConnection(single_arg(&name, &rest)?),
        "dump" => {
            let (output_file, flags) = split_positional(&name, &rest)?;
            let mut indent = None;
            let mut iter = flags.iter();
            while let Some(flag) = iter.next() {
                let value = flag_value(flag, iter.next())?;
                match flag.as_str() {
                    "--indent" => indent = Some(parse_number(flag, value)?),
                    other => bail!("unknown argument: {other}"),
                }
            }
            Command::Dump {
                output_file,
                indent,
            }
        }
        "load" => {
            let (input_file, flags) = split_positional(&name, &rest)?;
            let mut scan_quota = None;
            let mut mode = None;
            let mut iter = flags.iter();
            while let Some(flag) = iter.next() {
                let value = flag_value(flag, iter.next())?;
                match flag.as_str() {
                    "--scan-quota" => scan_quota = Some(parse_number(flag, value)?),
                    "--mode" => mode = Some(parse_number(flag, value)?),
                    other => bail!("unknown argument: {other}"),
                }
            }
            Command::Load {
                input_file,
                scan_quota,
                mode,
            }
        }
        other => bail!("unknown command: {other}"),
    };
    Ok(command)
}

pub async fn run(client: &AdminClient, command: Command) -> anyhow::Result<Value> {
    let ok = StatusCode::OK;
    let output = match command {
        Command::Help => Value::String(USAGE.to_string()),
        Command::Version => render(client.version(ok).await)?,
        Command::Status => render(client.provider_status(ok).await)?,
        Command::Users {
            limit,
            offset,
            username,
        } => render(client.list_users(limit, offset, &username, ok).await)?,
        Command::User(id) => render(client.get_user(id, ok).await)?,
        Command::AddUser(path) => {
            let user = read_user_file(&path)?;
            render(client.add_user(&user, ok).await)?
        }
        Command::UpdateUser(path) => {
            let user = read_user_file(&path)?;
            if user.id <= 0 {
                bail!("{} must contain the ID of the user to update", path.display());
            }
            render(client.update_user(&user, ok).await)?
        }
        Command::DeleteUser(id) => render(client.remove_user(id, ok).await)?,
        Command::QuotaScans => render(client.list_quota_scans(ok).await)?,
        Command::StartQuotaScan(username) => {
            let user = User {
                username,
                ..User::default()
            };
            render(client.start_quota_scan(&user, StatusCode::CREATED).await)?
        }
        Command::Connections => render(client.list_connections(ok).await)?,
        Command::CloseConnection(id) => render(client.close_connection(&id, ok).await)?,
        Command::Dump {
            output_file,
            indent,
        } => render(client.dump_data(&output_file, indent, ok).await)?,
        Command::Load {
            input_file,
            scan_quota,
            mode,
        } => render(client.load_data(&input_file, scan_quota, mode, ok).await)?,
    };
    Ok(output)
}

pub fn read_user_file(path: &Path) -> anyhow::Result<User> {
    let raw = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("invalid user JSON in {}", path.display()))
}

fn render<T: Serialize>(result: Result<Reply<T>, AdminError>) -> anyhow::Result<Value> {
    let reply = result.map_err(describe)?;
    match reply.value {
        Some(value) => Ok(serde_json::to_value(value)?),
        None => Ok(raw_body(&reply.body)),
    }
}

fn describe(err: AdminError) -> anyhow::Error {
    match err.api_message() {
        Some(message) if !message.error.is_empty() => {
            let detail = message.error.clone();
            anyhow::Error::new(err).context(format!("server error: {detail}"))
        }
        _ => err.into(),
    }
}

fn raw_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn no_args(name: &str, rest: &[String], command: Command) -> anyhow::Result<Command> {
    if let Some(extra) = rest.first() {
        bail!("{name} takes no arguments, got {extra}");
    }
    Ok(command)
}

fn single_arg(name: &str, rest: &[String]) -> anyhow::Result<String> {
    match rest {
        [value] => Ok(value.clone()),
        _ => bail!("{name} takes exactly one argument"),
    }
}

fn split_positional<'a>(name: &str, rest: &'a [String]) -> anyhow::Result<(String, &'a [String])> {
    match rest.split_first() {
        Some((first, flags)) if !first.starts_with("--") => Ok((first.clone(), flags)),
        _ => bail!("{name} requires a file name"),
    }
}

fn flag_value<'a>(flag: &str, value: Option<&'a String>) -> anyhow::Result<&'a str> {
    value
        .map(String::as_str)
        .with_context(|| format!("{flag} requires a value"))
}

fn parse_number(flag: &str, value: &str) -> anyhow::Result<u32> {
    value
        .parse()
        .with_context(|| format!("{flag} expects a non-negative number, got {value}"))
}

fn parse_id(value: &str) -> anyhow::Result<i64> {
    value
        .parse()
        .with_context(|| format!("invalid ID: {value}"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("sftpadm")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_command_shows_help() {
        assert_eq!(parse_command(args(&[])).unwrap(), Command::Help);
    }

    #[test]
    fn parses_users_filters() {
        let command =
            parse_command(args(&["users", "--limit", "10", "--username", "alice"])).unwrap();
        assert_eq!(
            command,
            Command::Users {
                limit: 10,
                offset: 0,
                username: "alice".to_string()
            }
        );
    }

    #[test]
    fn parses_dump_and_load_flags() {
        assert_eq!(
            parse_command(args(&["dump", "backup.json", "--indent", "1"])).unwrap(),
            Command::Dump {
                output_file: "backup.json".to_string(),
                indent: Some(1)
            }
        );
        assert_eq!(
            parse_command(args(&["load", "backup.json", "--mode", "1"])).unwrap(),
            Command::Load {
                input_file: "backup.json".to_string(),
                scan_quota: None,
                mode: Some(1)
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command(args(&["frobnicate"])).is_err());
        assert!(parse_command(args(&["user"])).is_err());
        assert!(parse_command(args(&["user", "abc"])).is_err());
        assert!(parse_command(args(&["users", "--limit"])).is_err());
        assert!(parse_command(args(&["dump", "--indent", "1"])).is_err());
        assert!(parse_command(args(&["version", "extra"])).is_err());
    }

    #[test]
    fn reads_user_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"id": 4, "username": "carol", "home_dir": "/srv/carol", "permissions": {{"/": ["*"]}}}}"#
        )
        .unwrap();
        let user = read_user_file(file.path()).unwrap();
        assert_eq!(user.id, 4);
        assert_eq!(user.username, "carol");
        assert_eq!(user.permissions["/"], vec!["*"]);
    }

    #[test]
    fn raw_body_prefers_json() {
        assert_eq!(raw_body(b""), Value::Null);
        assert_eq!(raw_body(br#"{"message":"ok"}"#)["message"], "ok");
        assert_eq!(raw_body(b"plain"), Value::String("plain".to_string()));
    }
}
