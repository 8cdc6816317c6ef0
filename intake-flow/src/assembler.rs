use crate::model::{DiseaseCandidate, HealthSnapshot, LlmRole, LlmTurn, Message};

const SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant providing medical guidance. \
This is not professional medical advice; always recommend consulting a qualified clinician.";

/// Build the ordered LLM turn sequence for one request.
///
/// The sequence is always: one system turn, the full history in original
/// order with roles preserved, then the new user turn. Health metrics and
/// disease candidates, when present, are folded into the system turn so the
/// history is never reordered and the new user turn is never duplicated.
pub fn assemble_turns(
    history: &[Message],
    health: Option<&HealthSnapshot>,
    diseases: &[DiseaseCandidate],
    new_user_text: &str,
) -> Vec<LlmTurn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(LlmTurn::new(
        LlmRole::System,
        build_system_instruction(health, diseases),
    ));

    for message in history {
        turns.push(LlmTurn::new(message.role.into(), message.text.clone()));
    }

    turns.push(LlmTurn::new(LlmRole::User, new_user_text));
    turns
}

fn build_system_instruction(
    health: Option<&HealthSnapshot>,
    diseases: &[DiseaseCandidate],
) -> String {
    let mut instruction = SYSTEM_INSTRUCTION.to_string();

    if let Some(snapshot) = health {
        if !snapshot.metrics.is_empty() {
            let metrics = snapshot
                .metrics
                .iter()
                .map(|(key, value)| format!("{}: {}", key, value))
                .collect::<Vec<_>>()
                .join(", ");
            instruction.push_str("\n\nThe user's latest recorded health metrics: ");
            instruction.push_str(&metrics);
        }
    }

    if !diseases.is_empty() {
        let candidates = diseases
            .iter()
            .map(|disease| format!("{} (symptoms: {})", disease.name, disease.symptoms.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        instruction.push_str("\n\nConditions matching the reported symptoms: ");
        instruction.push_str(&candidates);
    }

    instruction
}
