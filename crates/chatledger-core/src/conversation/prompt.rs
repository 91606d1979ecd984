//! Prompt assembly and the history-windowing seam.
//!
//! Rendering sends the selected history verbatim; how much history is
//! selected is a pluggable policy so per-turn cost stays boundable as
//! conversations grow, instead of hardcoding "send everything".

use chatledger_types::message::Message;

/// Policy selecting which slice of the active ordered history feeds
/// the prompt.
pub trait HistoryWindow: Send + Sync {
    fn select<'a>(&self, history: &'a [Message]) -> &'a [Message];
}

/// Send the entire history. The default policy.
pub struct FullHistory;

impl HistoryWindow for FullHistory {
    fn select<'a>(&self, history: &'a [Message]) -> &'a [Message] {
        history
    }
}

/// Keep only the trailing `max_messages` messages.
pub struct RecentTurns {
    max_messages: usize,
}

impl RecentTurns {
    pub fn new(max_messages: usize) -> Self {
        Self { max_messages }
    }
}

impl HistoryWindow for RecentTurns {
    fn select<'a>(&self, history: &'a [Message]) -> &'a [Message] {
        let start = history.len().saturating_sub(self.max_messages);
        &history[start..]
    }
}

/// Render the prompt: one line per message, `"<sender>: <content>"`,
/// with `" [Context: <context>]"` appended only when context is
/// non-empty, joined by single newlines.
pub fn render_prompt(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| {
            let mut line = format!("{}: {}", m.sender, m.content);
            if let Some(ctx) = m.context.as_deref() {
                if !ctx.is_empty() {
                    line.push_str(&format!(" [Context: {ctx}]"));
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatledger_types::message::Sender;
    use chrono::Utc;
    use uuid::Uuid;

    fn msg(sender: Sender, content: &str, context: Option<&str>, seq: i64) -> Message {
        let now = Utc::now();
        Message {
            id: Uuid::now_v7(),
            session_id: Uuid::now_v7(),
            sender,
            content: content.to_string(),
            fingerprint: String::new(),
            context: context.map(str::to_string),
            seq,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_render_prompt_lines_and_context() {
        let history = vec![
            msg(Sender::User, "Hello", None, 1),
            msg(Sender::Assistant, "Hi there!", None, 2),
            msg(Sender::User, "What's next?", Some("itinerary v2"), 3),
        ];
        let prompt = render_prompt(&history);
        assert_eq!(
            prompt,
            "user: Hello\nassistant: Hi there!\nuser: What's next? [Context: itinerary v2]"
        );
    }

    #[test]
    fn test_render_prompt_empty_context_omitted() {
        let history = vec![msg(Sender::User, "Hello", Some(""), 1)];
        assert_eq!(render_prompt(&history), "user: Hello");
    }

    #[test]
    fn test_render_prompt_empty_history() {
        assert_eq!(render_prompt(&[]), "");
    }

    #[test]
    fn test_full_history_passes_everything() {
        let history = vec![msg(Sender::User, "a", None, 1), msg(Sender::Assistant, "b", None, 2)];
        assert_eq!(FullHistory.select(&history).len(), 2);
    }

    #[test]
    fn test_recent_turns_keeps_tail() {
        let history = vec![
            msg(Sender::User, "a", None, 1),
            msg(Sender::Assistant, "b", None, 2),
            msg(Sender::User, "c", None, 3),
        ];
        let window = RecentTurns::new(2);
        let selected = window.select(&history);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].content, "b");
    }

    #[test]
    fn test_recent_turns_shorter_history() {
        let history = vec![msg(Sender::User, "a", None, 1)];
        assert_eq!(RecentTurns::new(10).select(&history).len(), 1);
    }
}
