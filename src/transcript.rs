use serde::{Deserialize, Serialize};

/// Seed message shown before the user has said anything.
pub const GREETING: &str = "Hi! I'm the support assistant. How can I help you today?";

/// Content of the assistant entry appended when an exchange starts,
/// overwritten as reply chunks stream in.
pub const PLACEHOLDER: &str = "…";

/// Appended as a fresh message when an exchange fails.
pub const APOLOGY: &str = "I'm sorry, but I encountered an error. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The visible conversation: an append-only message sequence plus the
/// single send-state flag. The only mutation ever applied to an existing
/// entry is overwriting the content of the last one while a reply streams.
pub struct Transcript {
    messages: Vec<Message>,
    sending: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
            sending: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Overwrite the content of the most recent entry. The transcript is
    /// seeded with the greeting, so there is always a last entry.
    pub fn update_last(&mut self, content: String) {
        if let Some(last) = self.messages.last_mut() {
            last.content = content;
        }
    }

    /// Guarded Idle -> Sending transition. Refuses empty/whitespace input
    /// and refuses to start while another exchange is in flight. On
    /// success the transcript gains the user message and the assistant
    /// placeholder, and the returned snapshot is the exact request
    /// payload: everything up to and including the new user turn.
    pub fn begin_exchange(&mut self, user_text: &str) -> Option<Vec<Message>> {
        let user_text = user_text.trim();
        if user_text.is_empty() || self.sending {
            return None;
        }

        self.sending = true;
        self.append(Message::user(user_text));
        let payload = self.messages.clone();
        self.append(Message::assistant(PLACEHOLDER));

        Some(payload)
    }

    /// Normal Sending -> Idle transition; the streamed reply stays as-is.
    pub fn finish_exchange(&mut self) {
        self.sending = false;
    }

    /// Failure Sending -> Idle transition. Whatever partial content
    /// already streamed into the last entry is kept; the apology goes in
    /// as a new message after it.
    pub fn fail_exchange(&mut self) {
        self.append(Message::assistant(APOLOGY));
        self.sending = false;
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_the_greeting() {
        let transcript = Transcript::new();
        assert_eq!(transcript.messages().len(), 1);
        assert_eq!(transcript.messages()[0].role, Role::Assistant);
        assert_eq!(transcript.messages()[0].content, GREETING);
        assert!(!transcript.is_sending());
    }

    #[test]
    fn begin_exchange_appends_user_and_placeholder() {
        let mut transcript = Transcript::new();
        let payload = transcript.begin_exchange("Hello").unwrap();

        assert!(transcript.is_sending());
        assert_eq!(transcript.messages().len(), 3);
        assert_eq!(transcript.messages()[1], Message::user("Hello"));
        assert_eq!(transcript.messages()[2], Message::assistant(PLACEHOLDER));

        // The payload stops just before the placeholder.
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].content, GREETING);
        assert_eq!(payload[1], Message::user("Hello"));
    }

    #[test]
    fn begin_exchange_trims_whitespace() {
        let mut transcript = Transcript::new();
        transcript.begin_exchange("  Hello  ").unwrap();
        assert_eq!(transcript.messages()[1].content, "Hello");
    }

    #[test]
    fn begin_exchange_refuses_blank_input() {
        let mut transcript = Transcript::new();
        assert!(transcript.begin_exchange("").is_none());
        assert!(transcript.begin_exchange("   \n\t").is_none());
        assert_eq!(transcript.messages().len(), 1);
        assert!(!transcript.is_sending());
    }

    #[test]
    fn begin_exchange_refuses_while_sending() {
        let mut transcript = Transcript::new();
        transcript.begin_exchange("first").unwrap();
        let before = transcript.messages().to_vec();

        assert!(transcript.begin_exchange("second").is_none());
        assert_eq!(transcript.messages(), &before[..]);
    }

    #[test]
    fn update_last_touches_only_the_last_entry() {
        let mut transcript = Transcript::new();
        transcript.begin_exchange("Hello").unwrap();

        transcript.update_last("Hi ".to_string());
        transcript.update_last("Hi there!".to_string());

        assert_eq!(transcript.messages()[0].content, GREETING);
        assert_eq!(transcript.messages()[1].content, "Hello");
        assert_eq!(transcript.last().unwrap().content, "Hi there!");
    }

    #[test]
    fn finish_exchange_clears_sending() {
        let mut transcript = Transcript::new();
        transcript.begin_exchange("Hello").unwrap();
        transcript.update_last("done".to_string());
        transcript.finish_exchange();

        assert!(!transcript.is_sending());
        assert_eq!(transcript.last().unwrap().content, "done");
        // Back to Idle: a new exchange is accepted.
        assert!(transcript.begin_exchange("again").is_some());
    }

    #[test]
    fn fail_exchange_appends_apology_and_keeps_partial_reply() {
        let mut transcript = Transcript::new();
        transcript.begin_exchange("Hello").unwrap();
        transcript.update_last("partial rep".to_string());
        transcript.fail_exchange();

        assert!(!transcript.is_sending());
        assert_eq!(transcript.messages().len(), 4);
        assert_eq!(transcript.messages()[2].content, "partial rep");
        assert_eq!(transcript.last().unwrap(), &Message::assistant(APOLOGY));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let payload = vec![Message::user("hi"), Message::assistant("hello")];
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            json,
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#
        );
    }
}
