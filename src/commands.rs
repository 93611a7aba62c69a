//! `:` commands and their autocomplete

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
  Transactions,
  Limits,
  Refresh,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub kind: CommandKind,
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
  Command {
    kind: CommandKind::Transactions,
    name: "transactions",
    aliases: &["t", "tx"],
    description: "Transactions for the selected month",
  },
  Command {
    kind: CommandKind::Limits,
    name: "limits",
    aliases: &["l", "limit", "budget"],
    description: "Spending limits and their usage",
  },
  Command {
    kind: CommandKind::Refresh,
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Fetch everything on screen again",
  },
  Command {
    kind: CommandKind::Quit,
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit midas",
  },
];

/// Lower is better; `None` means no match.
fn rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else {
    None
  }
}

pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&'static Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();
  matches.sort_by_key(|(_, r)| *r);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve typed input, preferring the highlighted suggestion.
pub fn resolve(input: &str, selected: usize) -> Option<CommandKind> {
  get_suggestions(input).get(selected).map(|cmd| cmd.kind)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_alias_beats_prefix() {
    let suggestions = get_suggestions("l");
    assert_eq!(suggestions[0].name, "limits");
  }

  #[test]
  fn test_prefix_and_substring() {
    assert_eq!(get_suggestions("tra")[0].name, "transactions");
    assert_eq!(get_suggestions("fresh")[0].name, "refresh");
  }

  #[test]
  fn test_resolve() {
    assert_eq!(resolve("q", 0), Some(CommandKind::Quit));
    assert_eq!(resolve("zzz", 0), None);
    assert_eq!(resolve("", 1), Some(CommandKind::Limits));
  }
}
