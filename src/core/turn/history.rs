use std::collections::VecDeque;

use crate::core::llm::ChatMessage;

/// Default number of entries kept
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Sliding window of the most recent conversation entries.
///
/// Appends drop the oldest entries once the window is full. The only
/// in-place edit is [`rewrite_last_assistant`](Self::rewrite_last_assistant).
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<HistoryEntry>,
    window: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl ConversationHistory {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            entries: VecDeque::with_capacity(window + 1),
            window,
        }
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push_back(HistoryEntry {
            role,
            content: content.into(),
        });
        while self.entries.len() > self.window {
            self.entries.pop_front();
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content);
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content);
    }

    /// Replace the content of the newest entry if it is an assistant entry.
    ///
    /// Returns false (and changes nothing) otherwise.
    pub fn rewrite_last_assistant(&mut self, rewrite: impl FnOnce(&str) -> String) -> bool {
        match self.entries.back_mut() {
            Some(entry) if entry.role == Role::Assistant => {
                entry.content = rewrite(&entry.content);
                true
            }
            _ => false,
        }
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Prompt messages for the reply generator, oldest first
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.entries
            .iter()
            .map(|entry| match entry.role {
                Role::User => ChatMessage::user(entry.content.clone()),
                Role::Assistant => ChatMessage::assistant(entry.content.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::ChatRole;

    #[test]
    fn test_window_drops_oldest_first() {
        let mut history = ConversationHistory::new(4);
        for i in 0..7 {
            history.push_user(format!("m{i}"));
            assert!(history.len() <= 4);
        }
        let contents: Vec<&str> = history.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5", "m6"]);
    }

    #[test]
    fn test_default_window_is_ten() {
        let mut history = ConversationHistory::default();
        for i in 0..25 {
            history.push_assistant(i.to_string());
        }
        assert_eq!(history.len(), 10);
        assert_eq!(history.iter().next().unwrap().content, "15");
    }

    #[test]
    fn test_rewrite_only_touches_trailing_assistant() {
        let mut history = ConversationHistory::new(10);
        history.push_assistant("long reply");
        history.push_user("question");
        assert!(!history.rewrite_last_assistant(|_| "changed".to_string()));
        assert_eq!(history.last().unwrap().content, "question");

        history.push_assistant("answer here");
        assert!(history.rewrite_last_assistant(|c| format!("{c}!")));
        assert_eq!(history.last().unwrap().content, "answer here!");
    }

    #[test]
    fn test_chat_messages_keep_roles() {
        let mut history = ConversationHistory::default();
        history.push_user("hi");
        history.push_assistant("hello");
        let messages = history.to_chat_messages();
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content.as_deref(), Some("hello"));
    }
}
