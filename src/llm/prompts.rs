/// Shown when a turn fails for any network or upstream reason
pub const ASSISTANT_ERROR: &str = "Error contacting assistant.";

/// Non-streaming reply when the response carries no candidate text
pub const NO_RESPONSE_FALLBACK: &str = "Sorry, I couldn't get a response.";

/// Wrap a user question in retrieved context. Existing evaluations of
/// assistant behavior depend on this exact wording.
pub fn rag_prompt(context: &str, message: &str) -> String {
    format!(
        r#"
Based on the following context, please answer the user's question. If the context does not contain the answer, state that you cannot find the information in the provided documents.

## Context:
{}

## User's Question:
{}
"#,
        context, message
    )
}

/// Transcript note for a turn that carried files
pub fn attachments_note(names: &[String]) -> String {
    format!("Files attached: {}", names.join(", "))
}
