//! Terminal front end: the auth flow, the chat screen and the event loop
//! that ties key input to the HTTP client.

pub mod auth;
pub mod chat;
pub mod clipboard;
pub mod composer;
pub mod scroll;
pub mod sidebar;
pub mod timefmt;

use std::error::Error;
use std::io;
use std::sync::Arc;
use std::time::{ Duration, Instant };

use crossterm::event::{
    self,
    DisableBracketedPaste,
    EnableBracketedPaste,
    Event,
    KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode,
    enable_raw_mode,
    EnterAlternateScreen,
    LeaveAlternateScreen,
};
use log::{ error, info };
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{ Constraint, Direction, Layout };
use ratatui::style::{ Color, Modifier, Style };
use ratatui::text::{ Line, Span };
use ratatui::widgets::{ Block, Borders, Paragraph };
use ratatui::{ Frame, Terminal };
use tokio::task::JoinHandle;

use crate::api::{ ApiError, AuthOutcome, ChatApi, SendReply };
use crate::cli::Args;
use crate::models::chat::{ ChatMessage, ConversationGroup };
use crate::ui::auth::{ AuthAction, AuthScreen, AuthView };
use crate::ui::chat::{ ChatAction, ChatScreen };
use crate::ui::clipboard::SystemClipboard;

enum Screen {
    Auth(AuthView),
    Chat(Box<ChatScreen>),
}

/// Result of a background API call, harvested by the event loop.
enum TaskOutcome {
    Auth {
        form: AuthScreen,
        result: Result<AuthOutcome, ApiError>,
    },
    Send(Result<SendReply, ApiError>),
    History(Result<Vec<ConversationGroup>, ApiError>),
    Conversation {
        id: String,
        result: Result<Vec<ChatMessage>, ApiError>,
    },
    Poll(Result<Vec<ChatMessage>, ApiError>),
}

/// Restores the terminal even when the loop unwinds.
struct TerminalCleanup;

impl Drop for TerminalCleanup {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableBracketedPaste);
    }
}

pub async fn run(
    args: &Args,
    api: Arc<dyn ChatApi>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, EnableBracketedPaste)?;
    let _cleanup = TerminalCleanup;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut screen = Screen::Auth(AuthView::new(&args.screen));
    let mut tasks: Vec<JoinHandle<TaskOutcome>> = Vec::new();
    let mut last_poll = Instant::now();
    let poll_every = if args.poll_interval > 0 {
        Some(Duration::from_secs(args.poll_interval))
    } else {
        None
    };

    loop {
        terminal.draw(|frame| {
            match &mut screen {
                Screen::Auth(view) => draw_auth(frame, view),
                Screen::Chat(chat) => chat.draw(frame),
            }
        })?;

        let (finished, running): (Vec<_>, Vec<_>) = tasks
            .drain(..)
            .partition(|handle| handle.is_finished());
        tasks = running;
        for handle in finished {
            match handle.await {
                Ok(outcome) => apply_outcome(outcome, &mut screen, &mut tasks, &api),
                Err(err) => error!("Background task panicked: {}", err),
            }
        }

        if let (Screen::Chat(chat), Some(every)) = (&screen, poll_every) {
            let idle = tasks.is_empty() && !chat.session.is_sending();
            if idle && chat.session.conversation_id().is_some() && last_poll.elapsed() >= every {
                last_poll = Instant::now();
                let api = api.clone();
                tasks.push(
                    tokio::spawn(async move { TaskOutcome::Poll(api.current_messages().await) })
                );
            }
        }

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                match &mut screen {
                    Screen::Auth(view) =>
                        match view.handle_key(key) {
                            AuthAction::Quit => {
                                break;
                            }
                            AuthAction::SubmitLogin { username, password } => {
                                let api = api.clone();
                                tasks.push(
                                    tokio::spawn(async move {
                                        TaskOutcome::Auth {
                                            form: AuthScreen::Login,
                                            result: api.login(&username, &password).await,
                                        }
                                    })
                                );
                            }
                            AuthAction::SubmitRegister { username, password1, password2 } => {
                                let api = api.clone();
                                tasks.push(
                                    tokio::spawn(async move {
                                        TaskOutcome::Auth {
                                            form: AuthScreen::Register,
                                            result: api.register(
                                                &username,
                                                &password1,
                                                &password2
                                            ).await,
                                        }
                                    })
                                );
                            }
                            AuthAction::None => {}
                        }
                    Screen::Chat(chat) =>
                        match chat.handle_key(key) {
                            ChatAction::Quit => {
                                break;
                            }
                            ChatAction::Send(text) => {
                                let api = api.clone();
                                let conversation_id = chat.session
                                    .conversation_id()
                                    .map(str::to_string);
                                tasks.push(
                                    tokio::spawn(async move {
                                        TaskOutcome::Send(
                                            api.send_message(
                                                &text,
                                                conversation_id.as_deref()
                                            ).await
                                        )
                                    })
                                );
                            }
                            ChatAction::LoadConversation(id) => {
                                let api = api.clone();
                                tasks.push(
                                    tokio::spawn(async move {
                                        let result = api.conversation_messages(&id).await;
                                        TaskOutcome::Conversation { id, result }
                                    })
                                );
                            }
                            ChatAction::RefreshHistory => {
                                chat.sidebar.begin_load();
                                tasks.push(spawn_history(&api));
                            }
                            ChatAction::None => {}
                        }
                }
            }
            Event::Paste(text) => {
                if let Screen::Chat(chat) = &mut screen {
                    chat.handle_paste(&text);
                }
            }
            _ => {}
        }
    }

    info!("Shutting down");
    for handle in tasks {
        handle.abort();
    }
    Ok(())
}

fn spawn_history(api: &Arc<dyn ChatApi>) -> JoinHandle<TaskOutcome> {
    let api = api.clone();
    tokio::spawn(async move { TaskOutcome::History(api.conversation_history().await) })
}

fn apply_outcome(
    outcome: TaskOutcome,
    screen: &mut Screen,
    tasks: &mut Vec<JoinHandle<TaskOutcome>>,
    api: &Arc<dyn ChatApi>
) {
    match outcome {
        TaskOutcome::Auth { form, result } => {
            let Screen::Auth(view) = &mut *screen else {
                return;
            };
            match result {
                Ok(AuthOutcome::Success) => {
                    info!("Signed in, entering chat");
                    let mut chat = ChatScreen::new(Box::new(SystemClipboard::new()));
                    chat.sidebar.begin_load();
                    tasks.push(spawn_history(api));
                    *screen = Screen::Chat(Box::new(chat));
                }
                Ok(AuthOutcome::FormErrors(errors)) => {
                    view.show_server_errors(form, errors);
                }
                Err(err) => {
                    error!("Auth request failed: {}", err);
                    view.submit_failed("Could not reach the server. Please try again.".to_string());
                }
            }
        }
        TaskOutcome::Send(result) => {
            let Screen::Chat(chat) = screen else {
                return;
            };
            if chat.apply_send_result(result) {
                chat.sidebar.begin_load();
                tasks.push(spawn_history(api));
            }
        }
        TaskOutcome::History(result) => {
            let Screen::Chat(chat) = screen else {
                return;
            };
            chat.sidebar.apply_history(result);
        }
        TaskOutcome::Conversation { id, result } => {
            let Screen::Chat(chat) = screen else {
                return;
            };
            match result {
                Ok(messages) => chat.open_conversation(id, messages),
                Err(err) => {
                    error!("Conversation {} load failed: {}", id, err);
                    chat.show_status("Could not load the conversation.");
                }
            }
        }
        TaskOutcome::Poll(result) => {
            let Screen::Chat(chat) = screen else {
                return;
            };
            match result {
                Ok(messages) => chat.refresh_messages(messages),
                Err(err) => {
                    // Polling failures stay quiet; the next tick retries.
                    error!("Message refresh failed: {}", err);
                }
            }
        }
    }
}

fn draw_auth(frame: &mut Frame, view: &AuthView) {
    let area = frame.area();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(area);

    let title = Paragraph::new(
        Line::from(
            Span::styled("chatBot", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        )
    );
    frame.render_widget(title, rows[0]);

    match view.screen() {
        AuthScreen::Choice => draw_choice(frame, view, rows[1]),
        AuthScreen::Register => draw_form(frame, view, rows[1], true),
        AuthScreen::Login => draw_form(frame, view, rows[1], false),
    }

    let hint = match view.screen() {
        AuthScreen::Choice => "Enter select | Up/Down move | Esc quit",
        _ => "Enter next/submit | Ctrl+Enter submit | Tab fields | Esc back",
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray)))),
        rows[2]
    );
}

fn draw_choice(frame: &mut Frame, view: &AuthView, area: ratatui::layout::Rect) {
    let items = ["Create an account", "Log in"];
    let mut lines = vec![Line::from("Welcome! How would you like to start?"), Line::from("")];
    for (index, label) in items.iter().enumerate() {
        let style = if index == view.choice_index() {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(format!("  {}  ", label), style)));
    }
    let block = Block::default().borders(Borders::ALL).title("Get started");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_form(frame: &mut Frame, view: &AuthView, area: ratatui::layout::Rect, register: bool) {
    let mut lines = Vec::new();
    let fields: Vec<(&str, String)> = if register {
        vec![
            ("Username", view.username().to_string()),
            ("Password", mask(view.password())),
            ("Confirm password", mask(view.password_confirm()))
        ]
    } else {
        vec![("Username", view.username().to_string()), ("Password", mask(view.password()))]
    };
    for (index, (label, value)) in fields.into_iter().enumerate() {
        let focused = index == view.focused_field();
        let marker = if focused { "> " } else { "  " };
        let style = if focused {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(
            Line::from(
                vec![
                    Span::raw(marker.to_string()),
                    Span::styled(format!("{:18}", format!("{}:", label)), style),
                    Span::raw(value)
                ]
            )
        );
    }
    if view.is_submitting() {
        lines.push(Line::from(""));
        lines.push(
            Line::from(Span::styled("Submitting...", Style::default().fg(Color::DarkGray)))
        );
    }
    for error in view.errors() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }
    let title = if register { "Create an account" } else { "Log in" };
    let block = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn mask(value: &str) -> String {
    "*".repeat(value.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use crossterm::event::{ KeyCode, KeyEvent, KeyModifiers };

    use crate::models::chat::ConversationSummary;
    use crate::ui::clipboard::ClipboardProvider;
    use crate::ui::sidebar::SidebarStatus;

    struct NoClipboard;

    impl ClipboardProvider for NoClipboard {
        fn read_text(&mut self) -> Result<Option<String>, String> {
            Ok(None)
        }

        fn write_text(&mut self, _text: &str) -> Result<(), String> {
            Ok(())
        }
    }

    /// Scripted server: answers every send with "pong", names the
    /// conversation "1" and records what went over the wire.
    struct MockApi {
        fail_sends: bool,
        sent: Mutex<Vec<(String, Option<String>)>>,
    }

    impl MockApi {
        fn new(fail_sends: bool) -> Self {
            Self { fail_sends, sent: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChatApi for MockApi {
        async fn prime_session(&self) -> Result<(), ApiError> {
            Ok(())
        }

        async fn login(&self, _username: &str, _password: &str) -> Result<AuthOutcome, ApiError> {
            Ok(AuthOutcome::Success)
        }

        async fn register(
            &self,
            _username: &str,
            _password1: &str,
            _password2: &str
        ) -> Result<AuthOutcome, ApiError> {
            Ok(AuthOutcome::Success)
        }

        async fn send_message(
            &self,
            message: &str,
            conversation_id: Option<&str>
        ) -> Result<SendReply, ApiError> {
            self.sent
                .lock()
                .unwrap()
                .push((message.to_string(), conversation_id.map(str::to_string)));
            if self.fail_sends {
                return Err(ApiError::Application("server error".to_string()));
            }
            Ok(SendReply {
                ai_response: "pong".to_string(),
                conversation_id: Some("1".to_string()),
            })
        }

        async fn current_messages(&self) -> Result<Vec<ChatMessage>, ApiError> {
            Ok(Vec::new())
        }

        async fn conversation_history(&self) -> Result<Vec<ConversationGroup>, ApiError> {
            Ok(
                vec![ConversationGroup {
                    name: "Today".to_string(),
                    conversations: vec![ConversationSummary {
                        id: "1".to_string(),
                        preview: "ping".to_string(),
                        time_display: "10:00".to_string(),
                    }],
                }]
            )
        }

        async fn conversation_messages(&self, _id: &str) -> Result<Vec<ChatMessage>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn press(screen: &mut ChatScreen, text: &str) {
        for ch in text.chars() {
            screen.handle_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE));
        }
    }

    fn enter(screen: &mut ChatScreen) -> ChatAction {
        screen.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn send_round_trip_adopts_id_and_refreshes_history() {
        let api = MockApi::new(false);
        let mut screen = ChatScreen::new(Box::new(NoClipboard));

        press(&mut screen, "ping");
        let ChatAction::Send(text) = enter(&mut screen) else {
            panic!("expected a send");
        };
        let result = api.send_message(&text, screen.session.conversation_id()).await;
        let refresh = screen.apply_send_result(result);
        assert!(refresh);
        assert_eq!(screen.session.conversation_id(), Some("1"));
        assert_eq!(screen.session.items().len(), 2);

        screen.sidebar.apply_history(api.conversation_history().await);
        assert_eq!(screen.sidebar.status(), SidebarStatus::Populated);

        // A follow-up send carries the adopted id and triggers no refresh.
        press(&mut screen, "again");
        let ChatAction::Send(text) = enter(&mut screen) else {
            panic!("expected a send");
        };
        let result = api.send_message(&text, screen.session.conversation_id()).await;
        assert!(!screen.apply_send_result(result));

        let sent = api.sent.lock().unwrap();
        assert_eq!(*sent, vec![
            ("ping".to_string(), None),
            ("again".to_string(), Some("1".to_string())),
        ]);
    }

    #[tokio::test]
    async fn failed_send_surfaces_the_error_and_unlocks() {
        use crate::session::{ ChatItem, SEND_ERROR_TEXT };

        let api = MockApi::new(true);
        let mut screen = ChatScreen::new(Box::new(NoClipboard));

        press(&mut screen, "ping");
        let ChatAction::Send(text) = enter(&mut screen) else {
            panic!("expected a send");
        };
        let result = api.send_message(&text, None).await;
        assert!(!screen.apply_send_result(result));
        assert_eq!(screen.session.items()[1], ChatItem::Error(SEND_ERROR_TEXT.to_string()));
        assert!(screen.composer.is_enabled());
        assert_eq!(screen.session.conversation_id(), None);
    }
}
