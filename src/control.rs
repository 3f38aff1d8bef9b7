//! Line-based trigger source for the daemon's stdin.

/// One parsed control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Reformat,
    CycleMode,
    Revert,
    SwitchMode(String),
    /// Answer a pending candidate prompt (1-based, as shown).
    Pick(usize),
    Cancel,
    Quit,
}

impl Trigger {
    /// Parse one line. Blank lines, comments and unknown commands yield None.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };
        match cmd.to_ascii_lowercase().as_str() {
            "reformat" | "r" => Some(Self::Reformat),
            "cycle" | "cycle-mode" => Some(Self::CycleMode),
            "revert" | "undo" => Some(Self::Revert),
            "mode" | "switch-mode" if !arg.is_empty() => Some(Self::SwitchMode(arg.to_string())),
            "pick" => arg.parse().ok().filter(|n| *n >= 1).map(Self::Pick),
            "cancel" => Some(Self::Cancel),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}
