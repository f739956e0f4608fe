use std::str::FromStr;

use rolegate_core::AppError;
use rolegate_domain::{PermissionId, PermissionReference, UserId};

pub const USAGE: &str = "usage:
  rolegate migrate
  rolegate permissions <user-id>
  rolegate check <user-id> <reference>
  rolegate attach <user-id> <reference> [--no-touch]
  rolegate detach <user-id> [reference] [--no-touch]
  rolegate sync <user-id> [reference] [--keep]

references are comma-separated; numeric items are ids, other items are names
and may contain '|' separated alternatives";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Migrate,
    Permissions {
        user_id: UserId,
    },
    Check {
        user_id: UserId,
        reference: PermissionReference,
    },
    Attach {
        user_id: UserId,
        reference: PermissionReference,
        touch: bool,
    },
    Detach {
        user_id: UserId,
        reference: Option<PermissionReference>,
        touch: bool,
    },
    Sync {
        user_id: UserId,
        reference: Option<PermissionReference>,
        detaching: bool,
    },
}

impl CliCommand {
    pub fn parse<I, S>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let (flags, positional): (Vec<&str>, Vec<&str>) = args
            .iter()
            .map(String::as_str)
            .partition(|arg| arg.starts_with("--"));

        let Some((&name, rest)) = positional.split_first() else {
            return Err(usage_error("missing command"));
        };

        let allowed_flag = match name {
            "attach" | "detach" => Some("--no-touch"),
            "sync" => Some("--keep"),
            _ => None,
        };
        if let Some(flag) = flags.iter().find(|flag| Some(**flag) != allowed_flag) {
            return Err(usage_error(format!("unexpected flag '{flag}' for '{name}'").as_str()));
        }
        let flagged = !flags.is_empty();

        let command = match (name, rest) {
            ("migrate", []) => Self::Migrate,
            ("permissions", [user_id]) => Self::Permissions {
                user_id: parse_user_id(user_id)?,
            },
            ("check", [user_id, reference]) => Self::Check {
                user_id: parse_user_id(user_id)?,
                reference: parse_reference(reference)?,
            },
            ("attach", [user_id, reference]) => Self::Attach {
                user_id: parse_user_id(user_id)?,
                reference: parse_reference(reference)?,
                touch: !flagged,
            },
            ("detach", [user_id, reference @ ..]) if reference.len() <= 1 => Self::Detach {
                user_id: parse_user_id(user_id)?,
                reference: reference.first().map(|value| parse_reference(value)).transpose()?,
                touch: !flagged,
            },
            ("sync", [user_id, reference @ ..]) if reference.len() <= 1 => Self::Sync {
                user_id: parse_user_id(user_id)?,
                reference: reference.first().map(|value| parse_reference(value)).transpose()?,
                detaching: !flagged,
            },
            _ => return Err(usage_error(format!("invalid arguments for '{name}'").as_str())),
        };

        Ok(command)
    }
}

/// Parses a textual reference: comma-separated ids or names.
pub fn parse_reference(value: &str) -> Result<PermissionReference, AppError> {
    let items = value
        .split(',')
        .map(str::trim)
        .map(|item| {
            if item.is_empty() {
                return Err(AppError::Validation(format!(
                    "reference '{value}' contains an empty item"
                )));
            }

            Ok(match item.parse::<u64>() {
                Ok(id) => PermissionReference::Id(PermissionId::new(id)),
                Err(_) => PermissionReference::Name(item.to_owned()),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match <[PermissionReference; 1]>::try_from(items) {
        Ok([single]) => single,
        Err(items) => PermissionReference::List(items),
    })
}

fn parse_user_id(value: &str) -> Result<UserId, AppError> {
    UserId::from_str(value)
}

fn usage_error(reason: &str) -> AppError {
    AppError::Validation(format!("{reason}\n{USAGE}"))
}
