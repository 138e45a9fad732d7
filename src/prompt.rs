//! Builds the ordered message list sent to the completion provider.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::extract::ExtractedDocument;
use crate::message::ChatMessage;

/// Instruction prepended to every conversation. Never exposed to clients.
pub const SYSTEM_PROMPT: &str = "You are a helpful PDF document analyst assistant.

When users upload PDF files, you can:
1. Summarize the content
2. Answer questions about specific information in the PDFs
3. Extract key points, dates, names, numbers
4. Compare information across multiple PDFs
5. Search for specific topics or keywords

IMPORTANT RULES:
- Be concise but thorough in your answers
- Quote relevant sections from the PDFs when answering
- If information is not in the uploaded PDFs, clearly state that
- For greetings and casual conversation, respond naturally without referring to PDFs
- Use bullet points and formatting to make answers clear
- Include page numbers when referencing specific parts of PDFs

When analyzing PDFs:
- Focus on the most relevant information to the user's question
- Provide context around quotes and excerpts
- Organize information logically
- Highlight important numbers, dates, and names
";

static CONVERSATIONAL_PATTERNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(hi+|hello+|hey+|thanks?|thank\s*you|ok+ay?|cool|nice|bye|what\s*can\s*you\s*do|help|who\s*are\s*you)\s*[!?.]*\s*$",
    )
    .expect("valid regex")
});

/// True for short greeting/thanks/help-style utterances.
///
/// Used only as a prompt-framing hint: a matching utterance sent together
/// with documents still gets document-aware handling.
pub fn is_conversational(utterance: &str) -> bool {
    CONVERSATIONAL_PATTERNS.is_match(utterance)
}

/// The turn carried neither documents nor a non-empty utterance.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("No message or files provided")]
pub struct EmptyTurn;

/// Message list ready for the gateway, plus the framing hint.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    /// System instruction, prior history, then the new user turn.
    pub messages: Vec<ChatMessage>,
    /// Whether the turn reads as small talk rather than a document question.
    pub conversational: bool,
}

/// Merge prior history, extracted documents and the user's utterance into
/// the ordered message list for one completion call.
///
/// Document blocks come first, in upload order, each tagged with its
/// filename; the utterance follows. An empty turn is an input error and must
/// be rejected before the gateway runs.
pub fn assemble(
    history: &[ChatMessage],
    documents: &[ExtractedDocument],
    utterance: &str,
) -> Result<AssembledPrompt, EmptyTurn> {
    let utterance = utterance.trim();

    let mut parts: Vec<String> = documents
        .iter()
        .map(|doc| format!("[DOCUMENT: {}]\n{}\n", doc.filename, doc.text))
        .collect();
    if !utterance.is_empty() {
        parts.push(utterance.to_string());
    }
    if parts.is_empty() {
        return Err(EmptyTurn);
    }

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(parts.join("\n\n")));

    Ok(AssembledPrompt {
        conversational: documents.is_empty() && is_conversational(utterance),
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn doc(filename: &str, text: &str) -> ExtractedDocument {
        ExtractedDocument {
            filename: filename.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn empty_turn_is_an_input_error() {
        assert_eq!(assemble(&[], &[], "   "), Err(EmptyTurn));
    }

    #[test]
    fn system_message_comes_first() {
        let prompt = assemble(&[], &[], "hello").unwrap();
        assert_eq!(prompt.messages[0].role, Role::System);
        assert_eq!(prompt.messages[0].content, SYSTEM_PROMPT);
    }

    #[test]
    fn history_is_inserted_verbatim_between_system_and_new_turn() {
        let history = vec![ChatMessage::user("first"), ChatMessage::assistant("reply")];
        let prompt = assemble(&history, &[], "second").unwrap();
        assert_eq!(prompt.messages.len(), 4);
        assert_eq!(&prompt.messages[1..3], history.as_slice());
        assert_eq!(prompt.messages[3], ChatMessage::user("second"));
    }

    #[test]
    fn document_blocks_precede_the_utterance_in_upload_order() {
        let docs = vec![doc("a.txt", "alpha"), doc("b.txt", "beta")];
        let prompt = assemble(&[], &docs, "what do they say?").unwrap();
        let content = &prompt.messages.last().unwrap().content;
        assert_eq!(
            content,
            "[DOCUMENT: a.txt]\nalpha\n\n\n[DOCUMENT: b.txt]\nbeta\n\n\nwhat do they say?"
        );
    }

    #[test]
    fn documents_alone_make_a_valid_turn() {
        let docs = vec![doc("a.txt", "alpha")];
        let prompt = assemble(&[], &docs, "").unwrap();
        assert_eq!(
            prompt.messages.last().unwrap().content,
            "[DOCUMENT: a.txt]\nalpha\n"
        );
    }

    #[test]
    fn greeting_without_files_is_conversational() {
        let prompt = assemble(&[], &[], "hi").unwrap();
        assert!(prompt.conversational);
    }

    #[test]
    fn greeting_with_a_file_is_not_conversational() {
        let docs = vec![doc("a.txt", "alpha")];
        let prompt = assemble(&[], &docs, "hi").unwrap();
        assert!(!prompt.conversational);
    }

    #[test]
    fn pattern_set_boundaries() {
        for utterance in [
            "hi", "HI!", "hiii", "hello", "hey?", "thanks", "thank you", "ok", "okay",
            "cool", "nice", "bye", "what can you do", "help", "who are you", "  hi.  ",
        ] {
            assert!(is_conversational(utterance), "{utterance:?}");
        }
        for utterance in [
            "hi there",
            "summarize this",
            "help me with page 3",
            "what can you do with PDFs",
            "",
        ] {
            assert!(!is_conversational(utterance), "{utterance:?}");
        }
    }
}
