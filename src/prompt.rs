use serde::{Deserialize, Serialize};

/// Suffix appended to every system instruction so models return the
/// rewritten text alone.
pub const RETURN_ONLY_INSTRUCTION: &str = "IMPORTANT: Return ONLY the reformatted text. \
Do not include any explanations, meta-commentary, or additional text.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abbreviation {
    #[serde(alias = "short_form")]
    pub short: String,
    pub expansion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Render the knowledge base into the auxiliary context string.
/// Empty sections are omitted; both empty yields an empty string.
pub fn render_knowledge(abbreviations: &[Abbreviation], names: &[NameEntry]) -> String {
    let mut sections = Vec::new();

    if !abbreviations.is_empty() {
        let list: Vec<String> = abbreviations
            .iter()
            .map(|a| format!("- {} = {}", a.short, a.expansion))
            .collect();
        sections.push(format!(
            "ABBREVIATIONS (expand these when encountered):\n{}",
            list.join("\n")
        ));
    }

    if !names.is_empty() {
        let list: Vec<String> = names
            .iter()
            .map(|n| match n.context.as_deref().filter(|c| !c.is_empty()) {
                Some(ctx) => format!("- {} ({ctx})", n.name),
                None => format!("- {}", n.name),
            })
            .collect();
        sections.push(format!(
            "KNOWN NAMES (ensure correct spelling):\n{}",
            list.join("\n")
        ));
    }

    sections.join("\n\n")
}

/// Full system instruction for one request: the mode's instruction, the
/// knowledge context when present, then the return-only suffix.
pub fn build_system_prompt(instruction: &str, knowledge: &str) -> String {
    let mut prompt = instruction.to_string();
    if !knowledge.is_empty() {
        prompt.push_str("\n\nAdditional context for reference:\n");
        prompt.push_str(knowledge);
    }
    prompt.push_str("\n\n");
    prompt.push_str(RETURN_ONLY_INSTRUCTION);
    prompt
}
