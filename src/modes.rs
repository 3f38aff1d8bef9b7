use serde::{Deserialize, Serialize};

/// A named rewriting style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    /// Stable identifier, used by `switch-mode` triggers.
    pub id: String,
    pub name: String,
    /// System instruction sent to the provider.
    #[serde(alias = "system_prompt")]
    pub instruction: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_icon() -> String {
    "text.bubble".to_string()
}

fn default_color() -> String {
    "#6366F1".to_string()
}

impl Mode {
    pub fn new(id: &str, name: &str, instruction: &str, icon: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            instruction: instruction.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
        }
    }

    pub fn builtin() -> Vec<Mode> {
        vec![
            Mode::new(
                "email",
                "Email",
                "Reformat the following text as a professional email. Maintain a polite and clear tone. Expand any abbreviations. Ensure proper greeting and sign-off if appropriate. Return ONLY the reformatted text.",
                "envelope.fill",
                "#3B82F6",
            ),
            Mode::new(
                "whatsapp",
                "WhatsApp",
                "Reformat the following text for WhatsApp messaging. Keep it casual and friendly. Use appropriate emoji where natural. Keep it concise. Return ONLY the reformatted text.",
                "message.fill",
                "#22C55E",
            ),
            Mode::new(
                "formal",
                "Formal",
                "Reformat the following text in a formal, professional tone. Use proper grammar and vocabulary. Avoid contractions and colloquialisms. Return ONLY the reformatted text.",
                "building.2.fill",
                "#6366F1",
            ),
            Mode::new(
                "casual",
                "Casual",
                "Reformat the following text in a casual, friendly tone. Make it sound natural and conversational. Return ONLY the reformatted text.",
                "face.smiling.fill",
                "#F59E0B",
            ),
            Mode::new(
                "grammar",
                "Grammar Fix",
                "Fix any grammar, spelling, and punctuation errors in the following text. Keep the original meaning and tone intact. Return ONLY the corrected text.",
                "checkmark.circle.fill",
                "#14B8A6",
            ),
        ]
    }
}

/// Ordered mode list with a current selection.
#[derive(Debug, Clone)]
pub struct ModeBook {
    modes: Vec<Mode>,
    current: Option<usize>,
}

impl ModeBook {
    /// The first mode starts selected. An empty list has no current mode.
    pub fn new(modes: Vec<Mode>) -> Self {
        let current = if modes.is_empty() { None } else { Some(0) };
        Self { modes, current }
    }

    /// `modes`, or the built-in set when `modes` is empty.
    pub fn or_builtin(modes: Vec<Mode>) -> Self {
        if modes.is_empty() {
            Self::new(Mode::builtin())
        } else {
            Self::new(modes)
        }
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn current(&self) -> Option<&Mode> {
        self.current.and_then(|i| self.modes.get(i))
    }

    /// Advance to the next mode, wrapping around. Selects the first mode
    /// when nothing is selected.
    pub fn cycle_next(&mut self) -> Option<&Mode> {
        if self.modes.is_empty() {
            return None;
        }
        let next = match self.current {
            Some(i) => (i + 1) % self.modes.len(),
            None => 0,
        };
        self.current = Some(next);
        self.modes.get(next)
    }

    /// Select a mode by id (or, failing that, by case-insensitive name).
    /// Returns false and leaves the selection unchanged when nothing matches.
    pub fn switch_to(&mut self, id: &str) -> bool {
        let found = self
            .modes
            .iter()
            .position(|m| m.id == id)
            .or_else(|| {
                self.modes
                    .iter()
                    .position(|m| m.name.eq_ignore_ascii_case(id))
            });
        match found {
            Some(i) => {
                self.current = Some(i);
                true
            }
            None => false,
        }
    }
}
