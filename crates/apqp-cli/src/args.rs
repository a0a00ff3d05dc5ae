//! Parser manual de argumentos de `apqp-cli`.
use thiserror::Error;

pub const USAGE: &str = "Uso:
  apqp-cli submit  --item <ID> --by <USER> --file <NOMBRE> [--path <RUTA>]
  apqp-cli decide  --item <ID> --status <done|reject|...> --by <USER> [--note <TXT>]
  apqp-cli status  --item <ID>
  apqp-cli pending --approver <USER>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit {
        item: i64,
        by: i64,
        file_name: String,
        file_path: String,
    },
    Decide {
        item: i64,
        status: String,
        by: i64,
        note: Option<String>,
    },
    Status {
        item: i64,
    },
    Pending {
        approver: i64,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("falta el subcomando")]
    MissingCommand,
    #[error("subcomando desconocido: {0}")]
    UnknownCommand(String),
    #[error("falta {0}")]
    Missing(&'static str),
    #[error("{flag} sin valor")]
    NoValue { flag: String },
    #[error("{flag} espera un entero, recibido '{value}'")]
    NotANumber { flag: String, value: String },
    #[error("opción desconocida: {0}")]
    UnknownFlag(String),
}

/// Pares `--flag valor` tras el subcomando.
struct Flags<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Flags<'a> {
    fn collect(args: &'a [String], allowed: &[&str]) -> Result<Self, ArgsError> {
        let mut pairs = Vec::new();
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            if !allowed.contains(&flag) {
                return Err(ArgsError::UnknownFlag(flag.to_string()));
            }
            i += 1;
            let Some(value) = args.get(i) else {
                return Err(ArgsError::NoValue { flag: flag.to_string() });
            };
            pairs.push((flag, value.as_str()));
            i += 1;
        }
        Ok(Self { pairs })
    }

    // la última aparición gana
    fn get(&self, flag: &str) -> Option<&'a str> {
        self.pairs.iter().rev().find(|(f, _)| *f == flag).map(|(_, v)| *v)
    }

    fn text(&self, flag: &'static str) -> Result<String, ArgsError> {
        self.get(flag).map(str::to_string).ok_or(ArgsError::Missing(flag))
    }

    fn id(&self, flag: &'static str) -> Result<i64, ArgsError> {
        let raw = self.get(flag).ok_or(ArgsError::Missing(flag))?;
        raw.trim().parse().map_err(|_| ArgsError::NotANumber { flag: flag.to_string(),
                                                               value: raw.to_string() })
    }
}

pub fn parse(args: &[String]) -> Result<Command, ArgsError> {
    let (cmd, rest) = args.split_first().ok_or(ArgsError::MissingCommand)?;
    match cmd.as_str() {
        "submit" => {
            let f = Flags::collect(rest, &["--item", "--by", "--file", "--path"])?;
            let file_name = f.text("--file")?;
            let file_path = f.get("--path").map(str::to_string).unwrap_or_else(|| file_name.clone());
            Ok(Command::Submit { item: f.id("--item")?,
                                 by: f.id("--by")?,
                                 file_name,
                                 file_path })
        }
        "decide" => {
            let f = Flags::collect(rest, &["--item", "--status", "--by", "--note"])?;
            Ok(Command::Decide { item: f.id("--item")?,
                                 status: f.text("--status")?,
                                 by: f.id("--by")?,
                                 note: f.get("--note").map(str::to_string) })
        }
        "status" => {
            let f = Flags::collect(rest, &["--item"])?;
            Ok(Command::Status { item: f.id("--item")? })
        }
        "pending" => {
            let f = Flags::collect(rest, &["--approver"])?;
            Ok(Command::Pending { approver: f.id("--approver")? })
        }
        other => Err(ArgsError::UnknownCommand(other.to_string())),
    }
}
