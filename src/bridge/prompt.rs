//! Prompt flattening
//!
//! Emohaa takes a single prompt string per turn, so the inbound conversation
//! is folded into one string in message order. Plain-text messages become
//! `role:content` lines. List content contributes the raw concatenation of
//! its text parts, without a role prefix or line break.

use super::types::{ChatMessage, Content};

/// Flatten an ordered conversation into one prompt
pub fn flatten(messages: &[ChatMessage]) -> String {
    messages.iter().fold(String::new(), |mut prompt, message| {
        match &message.content {
            Some(Content::Parts(parts)) => {
                for part in parts {
                    prompt.push_str(part.text_contribution());
                }
            }
            Some(Content::Text(text)) => push_line(&mut prompt, message.role_or_user(), text),
            None => push_line(&mut prompt, message.role_or_user(), ""),
        }
        prompt
    })
}

fn push_line(prompt: &mut String, role: &str, content: &str) {
    prompt.push_str(role);
    prompt.push(':');
    prompt.push_str(content);
    prompt.push('\n');
}
