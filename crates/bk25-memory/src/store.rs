use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::types::{
    Conversation, ConversationMessage, ConversationSummary, MemoryStats, Role,
};

/// How many trailing messages `context()` formats.
const CONTEXT_MESSAGE_WINDOW: usize = 10;

struct Entry {
    conversation: Conversation,
    /// Monotonic touch counter: larger = more recently updated. Breaks
    /// timestamp ties so LRU eviction is deterministic.
    touched: u64,
}

struct Inner {
    conversations: HashMap<String, Entry>,
    clock: u64,
}

/// Bounded in-memory map of conversations with an append-only message log per
/// conversation.
///
/// Capacity is enforced on every mutation: per-conversation overflow drops the
/// oldest message, global overflow evicts the least-recently-updated
/// conversation entirely. All reads return cloned snapshots so callers never
/// iterate under the store lock.
pub struct ConversationStore {
    max_conversations: usize,
    max_messages_per_conversation: usize,
    inner: Mutex<Inner>,
}

impl ConversationStore {
    pub fn new(max_conversations: usize, max_messages_per_conversation: usize) -> Self {
        Self {
            max_conversations,
            max_messages_per_conversation,
            inner: Mutex::new(Inner {
                conversations: HashMap::new(),
                clock: 0,
            }),
        }
    }

    /// Create a conversation, or return the existing one on id collision.
    pub fn create(&self, id: &str, persona_id: &str, channel_id: &str) -> Conversation {
        let mut inner = self.inner.lock().unwrap();

        if let Some(entry) = inner.conversations.get(id) {
            debug!(id, "conversation already exists");
            return entry.conversation.clone();
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: id.to_string(),
            persona_id: persona_id.to_string(),
            channel_id: channel_id.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        inner.clock += 1;
        let touched = inner.clock;
        inner.conversations.insert(
            id.to_string(),
            Entry {
                conversation: conversation.clone(),
                touched,
            },
        );
        info!(id, persona_id, channel_id, "created conversation");

        evict_over_capacity(&mut inner, self.max_conversations);
        conversation
    }

    /// Append a message. Returns `false` when the conversation does not exist.
    pub fn append(
        &self,
        id: &str,
        role: Role,
        content: &str,
        metadata: serde_json::Value,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let touched = inner.clock;

        let Some(entry) = inner.conversations.get_mut(id) else {
            warn!(id, "append to unknown conversation");
            return false;
        };

        if entry.conversation.messages.len() >= self.max_messages_per_conversation {
            entry.conversation.messages.remove(0);
        }

        // Timestamps within a conversation are non-decreasing even if the
        // wall clock steps backwards.
        let mut now = Utc::now();
        if let Some(last) = entry.conversation.messages.last() {
            if now < last.timestamp {
                now = last.timestamp;
            }
        }

        entry.conversation.messages.push(ConversationMessage {
            role,
            content: content.to_string(),
            timestamp: now,
            metadata,
        });
        entry.conversation.updated_at = now;
        entry.touched = touched;
        debug!(id, role = %role, "appended message");
        true
    }

    /// Snapshot of a conversation's messages, optionally limited to the most
    /// recent `limit`.
    pub fn history(&self, id: &str, limit: Option<usize>) -> Vec<ConversationMessage> {
        let inner = self.inner.lock().unwrap();
        let Some(entry) = inner.conversations.get(id) else {
            return Vec::new();
        };
        let messages = &entry.conversation.messages;
        let start = match limit {
            Some(n) if n < messages.len() => messages.len() - n,
            _ => 0,
        };
        messages[start..].to_vec()
    }

    /// Full conversation snapshot.
    pub fn get(&self, id: &str) -> Option<Conversation> {
        self.inner
            .lock()
            .unwrap()
            .conversations
            .get(id)
            .map(|e| e.conversation.clone())
    }

    /// Formatted context block for LLM prompts: a small header plus the last
    /// ten messages. When `max_chars` is given and the block is longer, the
    /// oldest text is cut so the most recent messages survive.
    pub fn context(&self, id: &str, max_chars: Option<usize>) -> String {
        let inner = self.inner.lock().unwrap();
        let Some(entry) = inner.conversations.get(id) else {
            return String::new();
        };
        let conversation = &entry.conversation;

        let mut out = format!(
            "Conversation ID: {}\nPersona: {}\nChannel: {}\n\n",
            conversation.id, conversation.persona_id, conversation.channel_id
        );
        let tail_start = conversation
            .messages
            .len()
            .saturating_sub(CONTEXT_MESSAGE_WINDOW);
        for message in &conversation.messages[tail_start..] {
            out.push_str(&format!(
                "{}: {}\n",
                message.role.capitalized(),
                message.content
            ));
        }

        if let Some(max) = max_chars {
            if out.len() > max {
                let cut = out.len() - max;
                // Cut on a char boundary at or after the byte offset.
                let boundary = (cut..out.len())
                    .find(|i| out.is_char_boundary(*i))
                    .unwrap_or(out.len());
                out = out[boundary..].to_string();
            }
        }
        out
    }

    /// Reassign the conversation to `new_persona_id`, recording the swap as a
    /// system message.
    pub fn switch_persona(&self, id: &str, new_persona_id: &str) -> bool {
        let old = {
            let mut inner = self.inner.lock().unwrap();
            inner.clock += 1;
            let touched = inner.clock;
            let Some(entry) = inner.conversations.get_mut(id) else {
                return false;
            };
            let old = entry.conversation.persona_id.clone();
            entry.conversation.persona_id = new_persona_id.to_string();
            entry.conversation.updated_at = Utc::now();
            entry.touched = touched;
            old
        };

        self.append(
            id,
            Role::System,
            &format!("Persona switched from {} to {}", old, new_persona_id),
            serde_json::Value::Null,
        );
        info!(id, from = %old, to = new_persona_id, "conversation persona switched");
        true
    }

    pub fn delete(&self, id: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .conversations
            .remove(id)
            .is_some()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().conversations.clear();
        info!("cleared all conversations");
    }

    pub fn summary(&self, id: &str) -> Option<ConversationSummary> {
        self.inner
            .lock()
            .unwrap()
            .conversations
            .get(id)
            .map(|e| summarize(&e.conversation))
    }

    /// Summaries of every conversation, most recently updated first.
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<(&u64, ConversationSummary)> = inner
            .conversations
            .values()
            .map(|e| (&e.touched, summarize(&e.conversation)))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(a.0));
        entries.into_iter().map(|(_, s)| s).collect()
    }

    pub fn summaries_for_persona(&self, persona_id: &str) -> Vec<ConversationSummary> {
        self.summaries()
            .into_iter()
            .filter(|s| s.persona_id == persona_id)
            .collect()
    }

    pub fn summaries_for_channel(&self, channel_id: &str) -> Vec<ConversationSummary> {
        self.summaries()
            .into_iter()
            .filter(|s| s.channel_id == channel_id)
            .collect()
    }

    pub fn stats(&self) -> MemoryStats {
        let inner = self.inner.lock().unwrap();
        let total_messages = inner
            .conversations
            .values()
            .map(|e| e.conversation.messages.len())
            .sum();
        MemoryStats {
            total_conversations: inner.conversations.len(),
            total_messages,
            max_conversations: self.max_conversations,
            max_messages_per_conversation: self.max_messages_per_conversation,
            usage_percent: (inner.conversations.len() as f64 / self.max_conversations as f64)
                * 100.0,
        }
    }
}

fn summarize(conversation: &Conversation) -> ConversationSummary {
    ConversationSummary {
        id: conversation.id.clone(),
        persona_id: conversation.persona_id.clone(),
        channel_id: conversation.channel_id.clone(),
        message_count: conversation.messages.len(),
        last_preview: conversation.messages.last().map(|m| m.content.clone()),
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
    }
}

/// Drop least-recently-updated conversations until the store fits its cap.
fn evict_over_capacity(inner: &mut Inner, max_conversations: usize) {
    while inner.conversations.len() > max_conversations {
        let Some(oldest_id) = inner
            .conversations
            .iter()
            .min_by_key(|(_, e)| e.touched)
            .map(|(id, _)| id.clone())
        else {
            break;
        };
        inner.conversations.remove(&oldest_id);
        info!(id = %oldest_id, "evicted least-recently-updated conversation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_conv: usize, max_msg: usize) -> ConversationStore {
        ConversationStore::new(max_conv, max_msg)
    }

    #[test]
    fn create_is_idempotent() {
        let s = store(10, 10);
        let a = s.create("c1", "vanilla", "web");
        s.append("c1", Role::User, "hello", serde_json::Value::Null);
        let b = s.create("c1", "other", "slack");
        // existing conversation returned untouched
        assert_eq!(b.persona_id, a.persona_id);
        assert_eq!(b.messages.len(), 1);
    }

    #[test]
    fn message_cap_keeps_last_n_in_order() {
        let s = store(10, 5);
        s.create("c1", "p", "web");
        for i in 0..8 {
            s.append("c1", Role::User, &format!("m{i}"), serde_json::Value::Null);
        }
        let history = s.history("c1", None);
        assert_eq!(history.len(), 5);
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5", "m6", "m7"]);
    }

    #[test]
    fn history_limit_returns_tail() {
        let s = store(10, 50);
        s.create("c1", "p", "web");
        for i in 0..6 {
            s.append("c1", Role::User, &format!("m{i}"), serde_json::Value::Null);
        }
        let history = s.history("c1", Some(2));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "m4");
        assert_eq!(history[1].content, "m5");
    }

    #[test]
    fn timestamps_non_decreasing() {
        let s = store(10, 50);
        s.create("c1", "p", "web");
        for i in 0..20 {
            s.append("c1", Role::User, &format!("m{i}"), serde_json::Value::Null);
        }
        let history = s.history("c1", None);
        for pair in history.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn eviction_drops_least_recently_updated() {
        let s = store(3, 10);
        s.create("a", "p", "web");
        s.create("b", "p", "web");
        s.create("c", "p", "web");
        // Touch "a" so "b" becomes the LRU entry.
        s.append("a", Role::User, "bump", serde_json::Value::Null);
        s.create("d", "p", "web");

        assert!(s.get("a").is_some());
        assert!(s.get("b").is_none(), "LRU conversation must be evicted");
        assert!(s.get("c").is_some());
        assert!(s.get("d").is_some());
        assert_eq!(s.stats().total_conversations, 3);
    }

    #[test]
    fn store_never_exceeds_cap() {
        let s = store(5, 10);
        for i in 0..30 {
            s.create(&format!("c{i}"), "p", "web");
            assert!(s.stats().total_conversations <= 5);
        }
        // The survivors are exactly the most recently created ones.
        for i in 25..30 {
            assert!(s.get(&format!("c{i}")).is_some());
        }
    }

    #[test]
    fn context_formats_last_ten_with_header() {
        let s = store(10, 50);
        s.create("c1", "vanilla", "web");
        for i in 0..12 {
            s.append("c1", Role::User, &format!("m{i}"), serde_json::Value::Null);
        }
        let ctx = s.context("c1", None);
        assert!(ctx.starts_with("Conversation ID: c1\n"));
        assert!(ctx.contains("Persona: vanilla"));
        assert!(!ctx.contains("User: m1\n"), "older than window must be cut");
        assert!(ctx.contains("User: m2\n"));
        assert!(ctx.contains("User: m11\n"));
    }

    #[test]
    fn context_max_chars_keeps_recent_tail() {
        let s = store(10, 50);
        s.create("c1", "p", "web");
        for i in 0..10 {
            s.append("c1", Role::User, &format!("message-{i}"), serde_json::Value::Null);
        }
        let ctx = s.context("c1", Some(40));
        assert!(ctx.len() <= 40);
        assert!(ctx.contains("message-9"));
    }

    #[test]
    fn switch_persona_appends_system_message() {
        let s = store(10, 50);
        s.create("c1", "vanilla", "web");
        assert!(s.switch_persona("c1", "gru"));

        let conversation = s.get("c1").unwrap();
        assert_eq!(conversation.persona_id, "gru");
        let last = conversation.messages.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert!(last.content.contains("vanilla"));
        assert!(last.content.contains("gru"));

        assert!(!s.switch_persona("ghost", "gru"));
    }

    #[test]
    fn summaries_sorted_by_recency() {
        let s = store(10, 50);
        s.create("a", "p", "web");
        s.create("b", "p", "slack");
        s.append("a", Role::User, "newest activity", serde_json::Value::Null);

        let summaries = s.summaries();
        assert_eq!(summaries[0].id, "a");
        assert_eq!(summaries[0].last_preview.as_deref(), Some("newest activity"));

        assert_eq!(s.summaries_for_channel("slack").len(), 1);
    }
}
