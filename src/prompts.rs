//! Prompt templates for every LLM call the tool makes.
//!
//! Centralising prompts here keeps the orchestration code free of long string
//! literals and lets unit tests inspect the exact text sent to the model.

/// Instruction used to polish converter output into clean Markdown.
///
/// The raw Markdown is appended after the final line.
pub const FORMAT_MARKDOWN_PROMPT: &str = r#"You are a professional Markdown formatting assistant.

Your task:
1. Receive a piece of text.
2. Decide whether it is already Markdown.
3. If it is not, convert it into well-structured Markdown.
4. If it is, fix what needs fixing (broken syntax, heading levels, missing line breaks).
5. Make sure the resulting document:
   - has a clear heading hierarchy (#, ##, ###, …)
   - uses ordered and unordered lists correctly
   - fences code blocks with the right language tag
   - separates paragraphs with blank lines
   - has well-formed links and images
   - contains no explanatory text of your own

Return ONLY the formatted Markdown, with no other commentary.

Input text:
"#;

/// Build the formatting prompt for a converted document.
pub fn format_markdown(raw_markdown: &str) -> String {
    format!("{FORMAT_MARKDOWN_PROMPT}{raw_markdown}")
}

/// Build the prompt that reduces a user question to a technical query.
pub fn simplify_question(question: &str) -> String {
    format!(
        "Rewrite the following question as a concise technical search query, \
removing greetings and anything else that is not needed:\n{question}\nSimplified query:"
    )
}

/// Build the answer prompt from the original question and the retrieved knowledge.
pub fn answer_question(question: &str, knowledge: &str) -> String {
    format!(
        "Using the knowledge base content below and the user's original question, \
write a concise, friendly answer.\n\n\
User question: {question}\n\
Knowledge base content:\n{knowledge}\n\n\
Keep a professional but friendly tone and answer the key points directly."
    )
}

/// Instruction sent with an image when captions are requested.
pub const DESCRIBE_IMAGE_PROMPT: &str = "Describe this image for a Markdown document. \
Transcribe any visible text verbatim, then summarise the visual content in one or two \
sentences. Output plain Markdown only.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_prompt_ends_with_content() {
        let p = format_markdown("# Raw");
        assert!(p.starts_with("You are a professional Markdown formatting assistant."));
        assert!(p.ends_with("Input text:\n# Raw"));
    }

    #[test]
    fn simplify_embeds_question() {
        let p = simplify_question("Hi! What grid should buttons use?");
        assert!(p.contains("Hi! What grid should buttons use?"));
        assert!(p.ends_with("Simplified query:"));
    }

    #[test]
    fn answer_prompt_contains_both_parts() {
        let p = answer_question("original?", "Document: D");
        assert!(p.contains("User question: original?"));
        assert!(p.contains("Knowledge base content:\nDocument: D"));
    }
}
