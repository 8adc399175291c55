// ABOUTME: Chat session store with an always-valid active chat pointer
// ABOUTME: Most-recent-first chat list, message append/update, snapshot persistence and rehydration

use crate::error::{BuddyError, Result};
use crate::i18n::{is_default_title, is_default_welcome, Language};
use crate::models::{Chat, Message, MessagePatch};
use crate::persist::KeyValueStore;
use std::sync::Arc;

/// Owns every chat and the active-chat pointer.
///
/// Once constructed the store always holds at least one chat and
/// `active_id` always names one of them.
pub struct ChatStore {
    chats: Vec<Chat>,
    active_id: String,
    language: Language,
    storage: Arc<dyn KeyValueStore>,
    key: String,
}

impl ChatStore {
    /// Rehydrate from `storage[key]`, falling back to a fresh chat when the
    /// slot is absent, unreadable, unparsable or empty.
    pub fn restore(storage: Arc<dyn KeyValueStore>, key: &str, language: Language) -> Self {
        let restored = match Self::load(storage.as_ref(), key) {
            Ok(chats) => chats,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Discarding unreadable chat snapshot");
                Vec::new()
            }
        };

        let mut store = Self {
            chats: Vec::new(),
            active_id: String::new(),
            language,
            storage,
            key: key.to_string(),
        };

        if restored.is_empty() {
            store.create_chat();
        } else {
            tracing::debug!(chats = restored.len(), "Restored chat snapshot");
            store.chats = restored;
            for chat in store.chats.iter_mut().filter(|c| c.messages.is_empty()) {
                chat.messages.push(Message::welcome(language.strings()));
            }
            store.active_id = store.chats[0].id.clone();
        }
        store
    }

    /// Read the raw snapshot
    pub fn load(storage: &dyn KeyValueStore, key: &str) -> Result<Vec<Chat>> {
        match storage.get(key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Write the whole chat list to the snapshot slot
    pub fn persist(&self) -> Result<()> {
        let payload = serde_json::to_string(&self.chats)?;
        self.storage.set(&self.key, &payload)
    }

    /// Persist, logging instead of failing. In-memory state stays authoritative.
    pub fn save(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "Failed to persist chats");
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Create a chat with a welcome message, put it first and make it active
    pub fn create_chat(&mut self) -> Chat {
        let chat = Chat::new(self.language.strings());
        tracing::debug!(chat_id = %chat.id, "Created chat");
        self.active_id = chat.id.clone();
        self.chats.insert(0, chat.clone());
        self.save();
        chat
    }

    /// Remove a chat and return it so callers can release what it owned.
    /// Deleting the active chat activates the new head, or a fresh chat
    /// if none remain.
    pub fn delete_chat(&mut self, chat_id: &str) -> Result<Chat> {
        let idx = self
            .chats
            .iter()
            .position(|c| c.id == chat_id)
            .ok_or_else(|| BuddyError::ChatNotFound(chat_id.to_string()))?;
        let removed = self.chats.remove(idx);
        tracing::debug!(chat_id = %chat_id, "Deleted chat");

        if self.chats.is_empty() {
            self.create_chat();
        } else {
            if self.active_id == chat_id {
                self.active_id = self.chats[0].id.clone();
            }
            self.save();
        }
        Ok(removed)
    }

    pub fn select_chat(&mut self, chat_id: &str) -> Result<()> {
        if self.chat(chat_id).is_none() {
            return Err(BuddyError::ChatNotFound(chat_id.to_string()));
        }
        self.active_id = chat_id.to_string();
        Ok(())
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active_chat(&self) -> &Chat {
        self.chats
            .iter()
            .find(|c| c.id == self.active_id)
            .unwrap_or(&self.chats[0])
    }

    pub fn chat(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    fn chat_mut(&mut self, chat_id: &str) -> Result<&mut Chat> {
        self.chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| BuddyError::ChatNotFound(chat_id.to_string()))
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn message(&self, chat_id: &str, message_id: &str) -> Option<&Message> {
        self.chat(chat_id).and_then(|c| c.message(message_id))
    }

    /// Append a message at the end of a chat
    pub fn append_message(&mut self, chat_id: &str, message: Message) -> Result<()> {
        self.chat_mut(chat_id)?.messages.push(message);
        self.save();
        Ok(())
    }

    /// Patch one message and persist
    pub fn update_message(
        &mut self,
        chat_id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> Result<()> {
        self.patch_in_memory(chat_id, message_id, patch)?;
        self.save();
        Ok(())
    }

    /// Patch one message without touching storage. Used for streamed
    /// tokens; the turn persists once it reaches a terminal state.
    pub fn patch_in_memory(
        &mut self,
        chat_id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> Result<()> {
        let chat = self.chat_mut(chat_id)?;
        let message = chat
            .message_mut(message_id)
            .ok_or_else(|| BuddyError::MessageNotFound(message_id.to_string()))?;
        message.apply(patch);
        Ok(())
    }

    /// Rename a chat. An empty title keeps the current one.
    pub fn rename_chat(&mut self, chat_id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        let chat = self.chat_mut(chat_id)?;
        if !title.is_empty() {
            chat.title = title.to_string();
        }
        self.save();
        Ok(())
    }

    /// Derive a title from the first user message while the title is still the placeholder
    pub fn auto_title(&mut self, chat_id: &str, text: &str, max_chars: usize) -> Result<()> {
        let chat = self.chat_mut(chat_id)?;
        let has_earlier_user_message = chat.messages.iter().filter(|m| m.is_user()).count() > 1;
        if !is_default_title(&chat.title) || has_earlier_user_message {
            return Ok(());
        }
        let title = title_from(text, max_chars);
        if !title.is_empty() {
            chat.title = title;
            self.save();
        }
        Ok(())
    }

    /// Switch language, re-localizing chats the user has not written in yet
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
        let strings = language.strings();
        for chat in self.chats.iter_mut() {
            let untouched = chat.is_pristine() && is_default_welcome(&chat.messages[0].content);
            if !untouched {
                continue;
            }
            chat.messages[0].content = strings.welcome.to_string();
            if is_default_title(&chat.title) {
                chat.title = strings.new_chat.to_string();
            }
        }
        self.save();
    }
}

/// First line of `text`, collapsed whitespace, cut to `max_chars` with an ellipsis
pub fn title_from(text: &str, max_chars: usize) -> String {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let cut: String = collapsed.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{MemoryStore, CHATS_KEY};

    fn store() -> (ChatStore, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        let chats = ChatStore::restore(kv.clone(), CHATS_KEY, Language::English);
        (chats, kv)
    }

    #[test]
    fn test_empty_storage_creates_one_chat() {
        let (chats, _) = store();
        assert_eq!(chats.chats().len(), 1);
        let chat = chats.active_chat();
        assert_eq!(chat.title, "NEW SEARCH");
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].content, Language::English.strings().welcome);
    }

    #[test]
    fn test_create_prepends_and_activates() {
        let (mut chats, _) = store();
        let first = chats.active_id().to_string();
        let second = chats.create_chat();
        assert_eq!(chats.chats()[0].id, second.id);
        assert_eq!(chats.chats()[1].id, first);
        assert_eq!(chats.active_id(), second.id);
    }

    #[test]
    fn test_delete_active_activates_head() {
        let (mut chats, _) = store();
        let older = chats.active_id().to_string();
        let newer = chats.create_chat().id;
        chats.delete_chat(&newer).unwrap();
        assert_eq!(chats.active_id(), older);
        assert_eq!(chats.chats().len(), 1);
    }

    #[test]
    fn test_delete_inactive_keeps_active() {
        let (mut chats, _) = store();
        let older = chats.active_id().to_string();
        let newer = chats.create_chat().id;
        chats.delete_chat(&older).unwrap();
        assert_eq!(chats.active_id(), newer);
    }

    #[test]
    fn test_delete_last_creates_fresh_chat() {
        let (mut chats, _) = store();
        let only = chats.active_id().to_string();
        let removed = chats.delete_chat(&only).unwrap();
        assert_eq!(removed.id, only);
        assert_eq!(chats.chats().len(), 1);
        assert_ne!(chats.active_id(), only);
        assert!(chats.chat(chats.active_id()).is_some());
    }

    #[test]
    fn test_never_empty_under_mixed_sequence() {
        let (mut chats, _) = store();
        for step in 0..40 {
            if step % 3 == 0 {
                chats.create_chat();
            } else {
                let victim = if step % 2 == 0 {
                    chats.active_id().to_string()
                } else {
                    chats.chats().last().unwrap().id.clone()
                };
                chats.delete_chat(&victim).unwrap();
            }
            assert!(!chats.chats().is_empty());
            let active = chats.active_id();
            assert_eq!(chats.chats().iter().filter(|c| c.id == active).count(), 1);
        }
    }

    #[test]
    fn test_delete_unknown_chat() {
        let (mut chats, _) = store();
        assert!(matches!(
            chats.delete_chat("nope"),
            Err(BuddyError::ChatNotFound(_))
        ));
    }

    #[test]
    fn test_round_trip_persistence() {
        let (mut chats, kv) = store();
        let id = chats.active_id().to_string();
        chats
            .append_message(&id, Message::user("Hello".to_string()))
            .unwrap();
        chats.create_chat();
        chats.persist().unwrap();

        let restored = ChatStore::restore(kv, CHATS_KEY, Language::English);
        assert_eq!(restored.chats(), chats.chats());
        assert_eq!(restored.active_id(), chats.chats()[0].id);
    }

    #[test]
    fn test_corrupt_snapshot_falls_back() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(CHATS_KEY, "{definitely not json").unwrap();
        let chats = ChatStore::restore(kv, CHATS_KEY, Language::Portuguese);
        assert_eq!(chats.chats().len(), 1);
        assert_eq!(chats.active_chat().title, "NOVA PESQUISA");
    }

    #[test]
    fn test_empty_array_snapshot_falls_back() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(CHATS_KEY, "[]").unwrap();
        let chats = ChatStore::restore(kv, CHATS_KEY, Language::English);
        assert_eq!(chats.chats().len(), 1);
    }

    #[test]
    fn test_update_message_patch() {
        let (mut chats, _) = store();
        let id = chats.active_id().to_string();
        let placeholder = Message::assistant(String::new());
        let msg_id = placeholder.id.clone();
        chats.append_message(&id, placeholder).unwrap();
        chats
            .patch_in_memory(&id, &msg_id, MessagePatch::append("partial"))
            .unwrap();
        chats
            .update_message(&id, &msg_id, MessagePatch::append(" answer"))
            .unwrap();
        assert_eq!(chats.message(&id, &msg_id).unwrap().content, "partial answer");
        assert!(matches!(
            chats.update_message(&id, "missing", MessagePatch::default()),
            Err(BuddyError::MessageNotFound(_))
        ));
    }

    #[test]
    fn test_rename_empty_keeps_title() {
        let (mut chats, _) = store();
        let id = chats.active_id().to_string();
        chats.rename_chat(&id, "Budget 2025").unwrap();
        assert_eq!(chats.active_chat().title, "Budget 2025");
        chats.rename_chat(&id, "   ").unwrap();
        assert_eq!(chats.active_chat().title, "Budget 2025");
    }

    #[test]
    fn test_auto_title_only_once() {
        let (mut chats, _) = store();
        let id = chats.active_id().to_string();
        chats
            .append_message(&id, Message::user("Summarise the annual report".into()))
            .unwrap();
        chats
            .auto_title(&id, "Summarise the annual report", 40)
            .unwrap();
        assert_eq!(chats.active_chat().title, "Summarise the annual report");

        chats
            .append_message(&id, Message::user("Second question".into()))
            .unwrap();
        chats.auto_title(&id, "Second question", 40).unwrap();
        assert_eq!(chats.active_chat().title, "Summarise the annual report");
    }

    #[test]
    fn test_title_from_truncates() {
        assert_eq!(title_from("  short  ", 40), "short");
        assert_eq!(title_from("\n\nfirst line\nsecond", 40), "first line");
        assert_eq!(title_from("abcdefghij", 4), "abcd…");
        assert_eq!(title_from("", 10), "");
    }

    #[test]
    fn test_set_language_relocalizes_pristine_chats() {
        let (mut chats, _) = store();
        let pristine = chats.active_id().to_string();
        let used = chats.create_chat().id;
        chats
            .append_message(&used, Message::user("hi".into()))
            .unwrap();

        chats.set_language(Language::Portuguese);

        let pristine_chat = chats.chat(&pristine).unwrap();
        assert_eq!(pristine_chat.title, "NOVA PESQUISA");
        assert_eq!(
            pristine_chat.messages[0].content,
            Language::Portuguese.strings().welcome
        );
        let used_chat = chats.chat(&used).unwrap();
        assert_eq!(
            used_chat.messages[0].content,
            Language::English.strings().welcome
        );
    }
}
