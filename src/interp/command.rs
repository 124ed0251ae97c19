//! The `Command` trait implemented by interpreter commands.

use crate::core::CommandError;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A command callable from an [`Interp`](crate::interp::Interp).
///
/// `args[0]` is the command name as typed, the remaining entries are its
/// arguments. The `Ok` string is the command result; the `Err` display
/// text is the error result.
#[async_trait]
pub trait Command: Send + Sync + Debug {
    /// Name the command is registered under.
    fn name(&self) -> &str;

    /// Runs the command.
    async fn invoke(&self, args: &[String]) -> Result<String, CommandError>;
}

/// An arc-wrapped command shared between interpreters.
pub type ArcCommand = Arc<dyn Command>;

/// Formats accepted words the way option lookups report them:
/// `a`, `a or b`, `a, b, or c`.
pub fn choices_list(choices: &[&str]) -> String {
    match choices {
        [] => String::new(),
        [only] => (*only).to_string(),
        [first, second] => format!("{first} or {second}"),
        [rest @ .., last] => format!("{}, or {last}", rest.join(", ")),
    }
}

/// Looks up `given` in `table` by exact match.
///
/// # Errors
///
/// Returns `CommandError::BadOption` naming every accepted word.
pub fn lookup_exact<T: Copy>(
    table: &[(&str, T)],
    given: &str,
    kind: &str,
) -> Result<T, CommandError> {
    table
        .iter()
        .find(|(name, _)| *name == given)
        .map(|(_, value)| *value)
        .ok_or_else(|| {
            let names: Vec<&str> = table.iter().map(|(name, _)| *name).collect();
            CommandError::BadOption {
                kind: kind.to_string(),
                given: given.to_string(),
                choices: choices_list(&names),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choices_list() {
        assert_eq!(choices_list(&["a"]), "a");
        assert_eq!(choices_list(&["scanbuff", "scanfile"]), "scanbuff or scanfile");
        assert_eq!(choices_list(&["a", "b", "c"]), "a, b, or c");
    }

    #[test]
    fn test_lookup_exact() {
        let table = [("scanbuff", 0), ("scanfile", 1)];
        assert_eq!(lookup_exact(&table, "scanfile", "command").unwrap(), 1);

        let err = lookup_exact(&table, "scanf", "command").unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad command \"scanf\": must be scanbuff or scanfile"
        );
    }
}
