use crate::client::ChatClient;
use crate::config::Config;
use crate::transcript::Transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation
    pub transcript: Transcript,

    // Input box state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Chat viewport state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Last transport error, shown in the footer until the next send
    pub last_error: Option<String>,

    // Backend
    pub client: ChatClient,
}

impl App {
    pub fn new(config: &Config) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            transcript: Transcript::new(),

            input: String::new(),
            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            last_error: None,

            client: ChatClient::new(config.backend_url()),
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.transcript.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Manual scrollback
    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let max_scroll = self.total_chat_lines().saturating_sub(self.chat_height);
        if self.chat_scroll < max_scroll {
            self.chat_scroll += 1;
        }
    }

    /// Scroll so the newest message (and the thinking indicator) is
    /// visible. Called whenever the transcript changes.
    pub fn scroll_chat_to_bottom(&mut self) {
        let total_lines = self.total_chat_lines();

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }

    /// Estimate the rendered line count of the transcript, accounting for
    /// wrapping at the chat pane width.
    fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.transcript.messages() {
            total_lines += 1; // Role line ("You:" or "Assistant:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        total_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrolls_to_keep_the_latest_message_visible() {
        let mut app = App::new(&Config::new());
        app.chat_width = 50;
        app.chat_height = 5;

        for i in 0..10 {
            app.transcript
                .append(crate::transcript::Message::user(format!("message {i}")));
        }
        app.scroll_chat_to_bottom();

        let total = app.total_chat_lines();
        assert!(total > app.chat_height);
        assert_eq!(app.chat_scroll, total - app.chat_height);
    }

    #[test]
    fn short_transcripts_stay_pinned_to_the_top() {
        let mut app = App::new(&Config::new());
        app.chat_width = 50;
        app.chat_height = 20;
        app.chat_scroll = 7;

        app.scroll_chat_to_bottom();
        assert_eq!(app.chat_scroll, 0);
    }

    #[test]
    fn animation_only_advances_while_sending() {
        let mut app = App::new(&Config::new());
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);

        app.transcript.begin_exchange("hi");
        app.tick_animation();
        assert_eq!(app.animation_frame, 1);
    }
}
