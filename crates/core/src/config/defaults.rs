use std::collections::BTreeMap;

use super::types::CommandPreset;

pub const DEFAULT_HTTP_PORT: u16 = 7862;

pub fn builtin_commands() -> BTreeMap<String, CommandPreset> {
  let mut commands = BTreeMap::new();
  commands.insert(
    "shell".to_string(),
    CommandPreset {
      argv: vec![
        "sh".to_string(),
        "-c".to_string(),
        "$ORCHESTRA_PROMPT".to_string(),
      ],
    },
  );
  commands.insert(
    "cat".to_string(),
    CommandPreset {
      argv: vec!["cat".to_string()],
    },
  );
  commands
}
