use crate::error::CommandError;

/// A state machine command as it travels through the log: `PUT key value`
/// or `DELETE key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Put { key: String, value: String },
    Delete { key: String },
}

impl Command {
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Command::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Command::Delete { key: key.into() }
    }

    /// Parses the textual form. The operator is case-insensitive and a PUT
    /// value runs to the end of the line, spaces included.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let mut parts = text.splitn(3, ' ');
        let op = parts.next().filter(|op| !op.is_empty()).ok_or(CommandError::Empty)?;
        let key = parts.next().filter(|k| !k.is_empty());

        match op.to_uppercase().as_str() {
            "PUT" => match (key, parts.next()) {
                (Some(key), Some(value)) => Ok(Command::put(key, value)),
                _ => Err(CommandError::WrongArity {
                    op: "PUT",
                    expected: "<key> <value>",
                }),
            },
            "DELETE" => match key {
                Some(key) => Ok(Command::delete(key)),
                None => Err(CommandError::WrongArity {
                    op: "DELETE",
                    expected: "<key>",
                }),
            },
            other => Err(CommandError::UnknownOperation(other.to_string())),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Command::Put { key, .. } | Command::Delete { key } => key,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Put { key, value } => write!(f, "PUT {key} {value}"),
            Command::Delete { key } => write!(f, "DELETE {key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_put_keeps_spaces_in_value() {
        let cmd = Command::parse("PUT /docs/a.txt node1 node2").unwrap();
        assert_eq!(cmd, Command::put("/docs/a.txt", "node1 node2"));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Command::parse("delete k").unwrap(), Command::delete("k"));
        assert_eq!(Command::parse("Put k v").unwrap(), Command::put("k", "v"));
    }

    #[test]
    fn test_display_matches_parse() {
        let cmd = Command::put("x", "1");
        assert_eq!(cmd.to_string(), "PUT x 1");
        assert_eq!(Command::parse(&cmd.to_string()).unwrap(), cmd);
    }

    #[test]
    fn test_malformed_commands() {
        assert_eq!(Command::parse(""), Err(CommandError::Empty));
        assert!(matches!(Command::parse("PUT k"), Err(CommandError::WrongArity { op: "PUT", .. })));
        assert!(matches!(Command::parse("DELETE"), Err(CommandError::WrongArity { op: "DELETE", .. })));
        assert_eq!(
            Command::parse("RENAME a b"),
            Err(CommandError::UnknownOperation("RENAME".to_string()))
        );
    }
}
