//! Prompt templates for grounded answer generation

use crate::types::RetrievedChunk;

/// Prompt builder for grounded queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build numbered context blocks from retrieved chunks
    pub fn build_context(chunks: &[RetrievedChunk]) -> String {
        let mut context = String::new();

        for (i, chunk) in chunks.iter().enumerate() {
            context.push_str(&format!(
                "[{}] (document {})\n{}\n\n---\n\n",
                i + 1,
                chunk.document_id,
                chunk.content
            ));
        }

        context
    }

    /// Build the full grounded prompt for the external LLM provider
    pub fn build_grounded_prompt(question: &str, context: &str) -> String {
        format!(
            r#"You are a document-grounded assistant. Use ONLY the provided context to answer.

RULES:
1. Only use information explicitly stated in the CONTEXT below.
2. If the answer is not in the context, respond with "This information is not available in the provided documents."
3. Never use external knowledge or make inferences beyond what is stated.
4. Cite the numbered context block supporting each claim, e.g. [1].

CONTEXT:
{context}

QUESTION: {question}

Answer using only the context above:"#,
            context = context,
            question = question
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chunk(content: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: "c:00000".to_string(),
            document_id: Uuid::nil(),
            content: content.to_string(),
            distance: 0.1,
        }
    }

    #[test]
    fn test_context_numbers_blocks_in_order() {
        let context = PromptBuilder::build_context(&[chunk("first"), chunk("second")]);
        assert!(context.find("[1]").unwrap() < context.find("[2]").unwrap());
        assert!(context.contains("first"));
        assert!(context.contains("second"));
    }

    #[test]
    fn test_prompt_embeds_question_and_context() {
        let context = PromptBuilder::build_context(&[chunk("the sky is blue")]);
        let prompt = PromptBuilder::build_grounded_prompt("what color is the sky?", &context);
        assert!(prompt.contains("the sky is blue"));
        assert!(prompt.contains("what color is the sky?"));
    }
}
