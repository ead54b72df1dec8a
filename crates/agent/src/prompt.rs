//! Prompt assembly: system instructions with the retrieved context, followed
//! by a capped tail of the conversation.

use tutorgate_config::PromptConfig;
use tutorgate_core::knowledge::ContextChunk;
use tutorgate_core::message::{Conversation, Message};

/// The fixed strings the system instructions are built from.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub assistant_name: String,
    pub tutor_name: String,
    pub contact_email: String,
    pub rejection_message: String,
    pub fallback_message: String,
}

impl From<&PromptConfig> for PromptTemplate {
    fn from(config: &PromptConfig) -> Self {
        Self {
            assistant_name: config.assistant_name.clone(),
            tutor_name: config.tutor_name.clone(),
            contact_email: config.contact_email.clone(),
            rejection_message: config.rejection_message.clone(),
            fallback_message: config.fallback_message.clone(),
        }
    }
}

impl PromptTemplate {
    /// Render the system instructions around a context block.
    pub fn render(&self, context: &str) -> String {
        let PromptTemplate {
            assistant_name,
            tutor_name,
            contact_email,
            rejection_message,
            fallback_message,
        } = self;

        format!(
            r#"You are {assistant_name}, a virtual assistant for {tutor_name}, a Computer Science tutor.

GOAL:
Answer the user's question using ONLY the context data below.

PERSONA AND TONE:
- Helpful and direct, like a text message from a surprisingly efficient assistant.
- Friendly and conversational. Write like a person, not a brochure.
- No emojis. Keep sentences short.

FORMATTING:
- Prefer sentences. Use at most 1 or 2 bullet points, and only for complex details.
- Bold key numbers (like prices) so they stand out.

STRICT RULES:
1. NO QUESTIONS: never ask the user a follow-up question. Answer and stop.
2. SUMMARISE, DON'T DUMP: for a general question give a high-level summary (what, who, price). Only list specific details when the user asks for them.
3. NO MADE-UP FACTS: never state a fact that is not in the context data. If the question is relevant but the answer is not in the context, reply exactly:
"{fallback_message}"
and then add the email address in a code block on its own:
```
{contact_email}
```
4. OFF-TOPIC: if the question is not about {tutor_name}'s tutoring services, reply exactly:
"{rejection_message}"
5. ONE CALL TO ACTION AT MOST: do not tell the user to email {tutor_name} unless they ask how to get in touch or rule 3 applies. Never include more than one. When you give the email, put it in a code block.
6. SHORT RESPONSE: keep it to 3-4 sentences, or a very short bullet list.

CONTEXT DATA:
{context}"#
        )
    }
}

/// Builds the message sequence sent to the generator.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    template: PromptTemplate,
    history_limit: usize,
}

impl PromptAssembler {
    pub fn new(template: PromptTemplate, history_limit: usize) -> Self {
        Self {
            template,
            history_limit,
        }
    }

    /// Chunk texts in relevance order, separated by a blank line.
    pub fn context_block(chunks: &[ContextChunk]) -> String {
        chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn system_prompt(&self, chunks: &[ContextChunk]) -> String {
        self.template.render(&Self::context_block(chunks))
    }

    /// System turn first, then the most recent `history_limit` turns of the
    /// conversation (the current user turn included). Older turns are
    /// dropped.
    pub fn assemble(&self, chunks: &[ContextChunk], conversation: &Conversation) -> Vec<Message> {
        let tail = conversation.tail(self.history_limit);
        let mut messages = Vec::with_capacity(tail.len() + 1);
        messages.push(Message::system(self.system_prompt(chunks)));
        messages.extend(tail.iter().cloned());
        messages
    }
}
