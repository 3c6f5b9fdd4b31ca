use yojana_core::{ConversationTurn, Role};

/// Prior user turns folded into the retrieval query.
pub const DEFAULT_QUERY_USER_TURNS: usize = 2;
/// Turns of any role passed to the synthesizer.
pub const DEFAULT_TAIL_TURNS: usize = 6;

/// Derives the retrieval query and the conversation tail from a session's
/// history. Pure and deterministic.
///
/// The two values have independent knobs: `query_user_turns` only shapes
/// the retrieval query and `tail_turns` only shapes the tail.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    query_user_turns: usize,
    tail_turns: usize,
    separator: String,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_USER_TURNS, DEFAULT_TAIL_TURNS)
    }
}

impl ContextWindow {
    pub fn new(query_user_turns: usize, tail_turns: usize) -> Self {
        Self {
            query_user_turns,
            tail_turns,
            separator: " ".to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Last `query_user_turns` user messages (oldest first) followed by
    /// `current`, joined by the separator.
    pub fn retrieval_query(&self, history: &[ConversationTurn], current: &str) -> String {
        let mut recent: Vec<&str> = history
            .iter()
            .rev()
            .filter(|t| t.role == Role::User)
            .take(self.query_user_turns)
            .map(|t| t.content.as_str())
            .collect();
        recent.reverse();
        recent.push(current);
        recent.join(&self.separator)
    }

    /// Last `tail_turns` turns of any role.
    pub fn conversation_tail<'a>(&self, history: &'a [ConversationTurn]) -> &'a [ConversationTurn] {
        let start = history.len().saturating_sub(self.tail_turns);
        &history[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(pairs: &[(&str, &str)]) -> Vec<ConversationTurn> {
        let mut seq = 0;
        let mut turns = Vec::new();
        for (q, a) in pairs {
            seq += 1;
            turns.push(ConversationTurn::user(seq, *q));
            seq += 1;
            turns.push(ConversationTurn::assistant(seq, *a));
        }
        turns
    }

    #[test]
    fn test_new_session_query_is_current_message() {
        let window = ContextWindow::default();
        assert_eq!(window.retrieval_query(&[], "q1"), "q1");
        assert!(window.conversation_tail(&[]).is_empty());
    }

    #[test]
    fn test_folds_last_two_user_turns() {
        let window = ContextWindow::default();
        let h = history(&[("q1", "a1"), ("q2", "a2"), ("q3", "a3")]);
        assert_eq!(window.retrieval_query(&h, "q4"), "q2 q3 q4");
    }

    #[test]
    fn test_fewer_prior_turns_than_window() {
        let window = ContextWindow::default();
        let h = history(&[("Tell me about farmer subsidies", "Uzhavar...")]);
        assert_eq!(
            window.retrieval_query(&h, "Where do I apply?"),
            "Tell me about farmer subsidies Where do I apply?"
        );
    }

    #[test]
    fn test_assistant_turns_never_enter_query() {
        let window = ContextWindow::new(5, 6);
        let h = history(&[("q1", "a1"), ("q2", "a2")]);
        let query = window.retrieval_query(&h, "q3");
        assert_eq!(query, "q1 q2 q3");
        assert!(!query.contains('a'));
    }

    #[test]
    fn test_tail_is_independent_of_query_window() {
        let h = history(&[("q1", "a1"), ("q2", "a2"), ("q3", "a3"), ("q4", "a4")]);

        let narrow = ContextWindow::new(0, 6);
        assert_eq!(narrow.retrieval_query(&h, "q5"), "q5");
        let tail = narrow.conversation_tail(&h);
        assert_eq!(tail.len(), 6);
        assert_eq!(tail[0].content, "q2");
        assert_eq!(tail[5].content, "a4");

        let wide = ContextWindow::new(2, 1);
        assert_eq!(wide.retrieval_query(&h, "q5"), "q3 q4 q5");
        assert_eq!(wide.conversation_tail(&h).len(), 1);
    }

    #[test]
    fn test_custom_separator() {
        let window = ContextWindow::default().with_separator(" | ");
        let h = history(&[("q1", "a1")]);
        assert_eq!(window.retrieval_query(&h, "q2"), "q1 | q2");
    }
}
