use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tokio::sync::mpsc::UnboundedSender;

use crate::app::{App, InputMode};
use crate::client::{self, ChatClient, ChatEvent};
use crate::transcript::Message;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(
    app: &mut App,
    event: AppEvent,
    tx: &UnboundedSender<AppEvent>,
) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, tx)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Chat(chat) => handle_chat_event(app, chat),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key, tx),
    }

    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Scrollback through the chat history
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        // Back to the input box
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    // Input is inert while an exchange is in flight; Esc still works so
    // the user can scroll back through the history.
    if app.transcript.is_sending() && key.code != KeyCode::Esc {
        return;
    }

    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            submit_message(app, tx);
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(),
        MouseEventKind::ScrollDown => app.scroll_down(),
        _ => {}
    }
}

/// Start an exchange if the transcript accepts it: the guard (non-blank
/// input, nothing in flight) lives in `Transcript::begin_exchange`. On
/// refusal nothing changes and the input is left alone.
fn submit_message(app: &mut App, tx: &UnboundedSender<AppEvent>) {
    let Some(payload) = app.transcript.begin_exchange(&app.input) else {
        return;
    };

    app.input.clear();
    app.cursor = 0;
    app.last_error = None;
    app.scroll_chat_to_bottom();

    // The task owns the request and the accumulator; the UI loop owns the
    // transcript. Progress comes back over the event channel.
    let client = app.client.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let event = match stream_reply(&client, &payload, &tx).await {
            Ok(()) => ChatEvent::Done,
            Err(err) => ChatEvent::Failed(err.to_string()),
        };
        let _ = tx.send(AppEvent::Chat(event));
    });
}

/// One request/response exchange: POST the history, then drain the body
/// publishing the accumulated reply after every chunk.
async fn stream_reply(
    client: &ChatClient,
    history: &[Message],
    tx: &UnboundedSender<AppEvent>,
) -> Result<()> {
    let response = client.send(history).await?;

    client::consume_stream(response.bytes_stream(), |reply| {
        let _ = tx.send(AppEvent::Chat(ChatEvent::Partial(reply)));
    })
    .await
}

fn handle_chat_event(app: &mut App, event: ChatEvent) {
    match event {
        ChatEvent::Partial(reply) => {
            app.transcript.update_last(reply);
            app.scroll_chat_to_bottom();
        }
        ChatEvent::Done => {
            app.transcript.finish_exchange();
        }
        ChatEvent::Failed(err) => {
            app.transcript.fail_exchange();
            app.last_error = Some(err);
            app.scroll_chat_to_bottom();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::transcript::{APOLOGY, PLACEHOLDER};

    #[test]
    fn char_to_byte_index_handles_multibyte() {
        let s = "héllo";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 1), 1);
        assert_eq!(char_to_byte_index(s, 2), 3); // 'é' is two bytes
        assert_eq!(char_to_byte_index(s, 5), s.len());
        assert_eq!(char_to_byte_index(s, 99), s.len());
    }

    #[test]
    fn partial_overwrites_placeholder_then_grows() {
        let mut app = App::new(&Config::new());
        app.transcript.begin_exchange("Hello").unwrap();
        assert_eq!(app.transcript.last().unwrap().content, PLACEHOLDER);

        handle_chat_event(&mut app, ChatEvent::Partial("Hi ".to_string()));
        handle_chat_event(&mut app, ChatEvent::Partial("Hi there!".to_string()));
        handle_chat_event(&mut app, ChatEvent::Done);

        assert_eq!(app.transcript.last().unwrap().content, "Hi there!");
        assert!(!app.transcript.is_sending());
    }

    #[test]
    fn failure_surfaces_apology_and_footer_error() {
        let mut app = App::new(&Config::new());
        app.transcript.begin_exchange("Hello").unwrap();
        let len_before = app.transcript.messages().len();

        handle_chat_event(&mut app, ChatEvent::Failed("connection refused".to_string()));

        assert_eq!(app.transcript.messages().len(), len_before + 1);
        assert_eq!(app.transcript.last().unwrap().content, APOLOGY);
        assert_eq!(app.last_error.as_deref(), Some("connection refused"));
        assert!(!app.transcript.is_sending());
    }
}
