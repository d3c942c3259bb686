//! Provider-agnostic message lists.
//!
//! Adapters render a [`PreparedConversation`] into their own wire format.
//! The builders here decide where the document goes: attached as a file
//! part when the request is multimodal and the document is binary, inlined
//! as text otherwise. In a chat only the first user turn carries it.
//! Stored system turns keep their position; wire formats without in-line
//! system messages fold them into the system instruction with
//! [`PreparedConversation::folded_system`].

use gistgate_types::error::GatewayError;
use gistgate_types::llm::{ConversationMessage, DocumentContent, MessageRole};

/// Fixed system-role instruction sent with every request.
pub const SYSTEM_INSTRUCTION: &str = "You are a careful assistant that reads documents and \
answers questions about them. Base every answer on the provided document, keep the \
structure of your answer clear, and format it as Markdown.";

#[derive(Debug, Clone, PartialEq)]
pub enum TurnPart<'a> {
    Text(String),
    /// A binary document sent as a file attachment.
    Document(&'a DocumentContent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTurn<'a> {
    pub role: MessageRole,
    pub parts: Vec<TurnPart<'a>>,
}

impl PreparedTurn<'_> {
    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                TurnPart::Text(t) => Some(t.as_str()),
                TurnPart::Document(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn has_attachment(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, TurnPart::Document(_)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedConversation<'a> {
    pub system: String,
    pub turns: Vec<PreparedTurn<'a>>,
}

impl<'a> PreparedConversation<'a> {
    /// One user turn asking for a summary of `content`.
    pub fn summary(
        content: &'a DocumentContent,
        is_multimodal: bool,
        prompt: &str,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            system: SYSTEM_INSTRUCTION.to_string(),
            turns: vec![PreparedTurn {
                role: MessageRole::User,
                parts: document_parts(prompt, std::slice::from_ref(content), is_multimodal)?,
            }],
        })
    }

    /// One user turn carrying every file.
    pub fn multi_file(
        files: &'a [DocumentContent],
        is_multimodal: bool,
        prompt: &str,
    ) -> Result<Self, GatewayError> {
        if files.is_empty() {
            return Err(GatewayError::Configuration(
                "no documents to summarize".to_string(),
            ));
        }
        Ok(Self {
            system: SYSTEM_INSTRUCTION.to_string(),
            turns: vec![PreparedTurn {
                role: MessageRole::User,
                parts: document_parts(prompt, files, is_multimodal)?,
            }],
        })
    }

    /// A chat over `content`.
    ///
    /// The document rides on the first user turn only. Unknown roles become
    /// `user`; every turn keeps its order and verbatim text. History without
    /// any user turn is sent without the document.
    pub fn chat(
        content: &'a DocumentContent,
        is_multimodal: bool,
        history: &[ConversationMessage],
    ) -> Result<Self, GatewayError> {
        let mut turns = Vec::with_capacity(history.len());
        let mut attached = false;

        for message in history {
            match message.role() {
                MessageRole::User if !attached => {
                    attached = true;
                    turns.push(PreparedTurn {
                        role: MessageRole::User,
                        parts: document_parts(
                            &message.content,
                            std::slice::from_ref(content),
                            is_multimodal,
                        )?,
                    });
                }
                role => turns.push(PreparedTurn {
                    role,
                    parts: vec![TurnPart::Text(message.content.clone())],
                }),
            }
        }

        if turns.iter().all(|t| t.role == MessageRole::System) {
            return Err(GatewayError::Configuration(
                "conversation has no messages".to_string(),
            ));
        }
        if !attached {
            tracing::warn!(
                filename = content.filename(),
                "conversation has no user turn, document not attached"
            );
        }
        Ok(Self {
            system: SYSTEM_INSTRUCTION.to_string(),
            turns,
        })
    }

    /// System instruction followed by the text of every system turn.
    pub fn folded_system(&self) -> String {
        let mut system = self.system.clone();
        for turn in self.turns.iter().filter(|t| t.role == MessageRole::System) {
            system.push_str("\n\n");
            system.push_str(&turn.text());
        }
        system
    }

    /// User and assistant turns, in order.
    pub fn dialogue(&self) -> impl Iterator<Item = &PreparedTurn<'a>> {
        self.turns.iter().filter(|t| t.role != MessageRole::System)
    }

    /// Minimal fixed exchange used by connection tests.
    pub fn probe(prompt: &str) -> Self {
        Self {
            system: SYSTEM_INSTRUCTION.to_string(),
            turns: vec![PreparedTurn {
                role: MessageRole::User,
                parts: vec![TurnPart::Text(prompt.to_string())],
            }],
        }
    }
}

/// Instruction text plus documents, attached or inlined.
fn document_parts<'a>(
    instruction: &str,
    documents: &'a [DocumentContent],
    is_multimodal: bool,
) -> Result<Vec<TurnPart<'a>>, GatewayError> {
    let mut parts = vec![TurnPart::Text(instruction.to_string())];
    let mut inline = Vec::new();

    for document in documents {
        match document {
            DocumentContent::Binary { filename, .. } => {
                if !is_multimodal {
                    return Err(GatewayError::Configuration(format!(
                        "'{filename}' is a binary document but the request is text-only; \
                         extract its text or enable multimodal input"
                    )));
                }
                parts.push(TurnPart::Document(document));
            }
            DocumentContent::Text { filename, text } => {
                inline.push(format!("--- {filename} ---\n{text}"));
            }
        }
    }

    if !inline.is_empty() {
        // Text documents go into the instruction part itself.
        if let Some(TurnPart::Text(first)) = parts.first_mut() {
            first.push_str("\n\n");
            first.push_str(&inline.join("\n\n"));
        }
    }
    Ok(parts)
}
