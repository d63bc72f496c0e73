use std::collections::HashMap;
use std::time::{ Duration, Instant };

use crossterm::event::{ KeyCode, KeyEvent, KeyModifiers };
use log::warn;
use ratatui::layout::{ Constraint, Direction, Layout, Rect };
use ratatui::style::{ Color, Modifier, Style };
use ratatui::text::{ Line, Span };
use ratatui::widgets::{ Block, Borders, Paragraph };
use ratatui::Frame;

use crate::api::{ ApiError, SendReply };
use crate::models::chat::{ ChatMessage, Role };
use crate::session::{ ChatItem, ChatSession };
use crate::ui::clipboard::ClipboardProvider;
use crate::ui::composer::ComposerState;
use crate::ui::scroll;
use crate::ui::sidebar::{ SidebarRow, SidebarState, SidebarStatus };
use crate::ui::timefmt;

/// How long the "Copied" confirmation replaces the copy control.
pub const COPY_FEEDBACK: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Messages,
    Composer,
}

/// Reader feedback on an assistant message. One of the two at most.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaction {
    Like,
    Dislike,
}

/// Side effects the run loop must carry out after a key was handled.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatAction {
    None,
    Quit,
    Send(String),
    LoadConversation(String),
    RefreshHistory,
}

/// The main screen: sidebar, message list and composer, plus everything
/// transient (focus, scroll, reactions, copy feedback, paste prompt).
pub struct ChatScreen {
    pub session: ChatSession,
    pub composer: ComposerState,
    pub sidebar: SidebarState,
    focus: FocusPane,
    scroll_offset: usize,
    follow_pending: bool,
    last_viewport_rows: usize,
    last_content_rows: usize,
    selected_message: usize,
    reactions: HashMap<usize, Reaction>,
    copied: Option<(usize, Instant)>,
    paste_prompt: Option<String>,
    status: Option<String>,
    clipboard: Box<dyn ClipboardProvider>,
}

impl ChatScreen {
    pub fn new(clipboard: Box<dyn ClipboardProvider>) -> Self {
        Self {
            session: ChatSession::new(),
            composer: ComposerState::default(),
            sidebar: SidebarState::new(),
            focus: FocusPane::Composer,
            scroll_offset: 0,
            follow_pending: true,
            last_viewport_rows: 0,
            last_content_rows: 0,
            selected_message: 0,
            reactions: HashMap::new(),
            copied: None,
            paste_prompt: None,
            status: None,
            clipboard,
        }
    }

    pub fn focus(&self) -> FocusPane {
        self.focus
    }

    pub fn reaction(&self, index: usize) -> Option<Reaction> {
        self.reactions.get(&index).copied()
    }

    pub fn paste_prompt(&self) -> Option<&str> {
        self.paste_prompt.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn show_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    /// Whether the copy control on `index` currently reads "Copied".
    pub fn copy_feedback_at(&self, index: usize, now: Instant) -> bool {
        matches!(self.copied, Some((i, since)) if i == index && now.duration_since(since) < COPY_FEEDBACK)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ChatAction {
        self.status = None;
        if self.paste_prompt.is_some() {
            return self.handle_paste_prompt_key(key);
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => {
                    return ChatAction::Quit;
                }
                KeyCode::Char('n') => {
                    self.start_new_chat();
                    return ChatAction::None;
                }
                KeyCode::Char('r') => {
                    return ChatAction::RefreshHistory;
                }
                _ => {}
            }
        }
        if key.code == KeyCode::Tab && self.focus != FocusPane::Sidebar {
            // Tab cycles panes except in the sidebar, where it would fight
            // with filter editing less than it helps.
            self.cycle_focus();
            return ChatAction::None;
        }
        match self.focus {
            FocusPane::Composer => self.handle_composer_key(key),
            FocusPane::Sidebar => self.handle_sidebar_key(key),
            FocusPane::Messages => self.handle_messages_key(key),
        }
    }

    /// Bracketed paste from the terminal lands straight in the composer.
    pub fn handle_paste(&mut self, text: &str) {
        if let Some(buffer) = self.paste_prompt.as_mut() {
            buffer.push_str(text);
        } else if self.focus == FocusPane::Composer {
            self.composer.insert_str(text);
        }
    }

    fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Composer => FocusPane::Messages,
            FocusPane::Messages => FocusPane::Sidebar,
            FocusPane::Sidebar => FocusPane::Composer,
        };
    }

    fn handle_composer_key(&mut self, key: KeyEvent) -> ChatAction {
        match key.code {
            KeyCode::Enter if
                key.modifiers.contains(KeyModifiers::SHIFT) ||
                key.modifiers.contains(KeyModifiers::CONTROL)
            => {
                self.composer.break_line();
                ChatAction::None
            }
            // Ctrl+J: terminals that cannot report Shift+Enter.
            KeyCode::Char('j') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.composer.break_line();
                ChatAction::None
            }
            KeyCode::Enter => self.submit(),
            KeyCode::Char('v') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.paste_from_clipboard();
                ChatAction::None
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.composer.insert_char(ch);
                ChatAction::None
            }
            KeyCode::Backspace => {
                self.composer.backspace();
                ChatAction::None
            }
            KeyCode::Left => {
                self.composer.move_left();
                ChatAction::None
            }
            KeyCode::Right => {
                self.composer.move_right();
                ChatAction::None
            }
            KeyCode::Up => {
                self.composer.move_up();
                ChatAction::None
            }
            KeyCode::Down => {
                self.composer.move_down();
                ChatAction::None
            }
            KeyCode::Home => {
                self.composer.move_to_start();
                ChatAction::None
            }
            KeyCode::End => {
                self.composer.move_to_end();
                ChatAction::None
            }
            KeyCode::Esc => {
                self.focus = FocusPane::Messages;
                ChatAction::None
            }
            _ => ChatAction::None,
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) -> ChatAction {
        match key.code {
            KeyCode::Esc => {
                if self.sidebar.filter().is_empty() {
                    self.focus = FocusPane::Composer;
                } else {
                    self.sidebar.clear_filter();
                }
                ChatAction::None
            }
            KeyCode::Tab => {
                self.focus = FocusPane::Composer;
                ChatAction::None
            }
            KeyCode::Up => {
                self.sidebar.move_selection_up();
                ChatAction::None
            }
            KeyCode::Down => {
                self.sidebar.move_selection_down();
                ChatAction::None
            }
            KeyCode::Enter =>
                match self.sidebar.selected_row() {
                    Some(SidebarRow::GroupHeader { name, .. }) => {
                        self.sidebar.toggle_group(&name);
                        ChatAction::None
                    }
                    Some(SidebarRow::Card(card)) => {
                        if self.sidebar.active_id() == Some(card.id.as_str()) {
                            ChatAction::None
                        } else {
                            ChatAction::LoadConversation(card.id)
                        }
                    }
                    None => ChatAction::None,
                }
            KeyCode::Backspace => {
                let mut term = self.sidebar.filter().to_string();
                term.pop();
                self.sidebar.set_filter(&term);
                ChatAction::None
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let term = format!("{}{}", self.sidebar.filter(), ch);
                self.sidebar.set_filter(&term);
                ChatAction::None
            }
            _ => ChatAction::None,
        }
    }

    fn handle_messages_key(&mut self, key: KeyEvent) -> ChatAction {
        let item_count = self.session.items().len();
        match key.code {
            KeyCode::Esc => {
                self.focus = FocusPane::Composer;
                ChatAction::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_message = self.selected_message.saturating_sub(1);
                ChatAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if item_count > 0 {
                    self.selected_message = (self.selected_message + 1).min(item_count - 1);
                }
                ChatAction::None
            }
            KeyCode::PageUp => {
                self.scroll_offset = self.scroll_offset.saturating_sub(
                    self.last_viewport_rows.max(1)
                );
                ChatAction::None
            }
            KeyCode::PageDown => {
                let bottom = scroll::bottom_offset(self.last_content_rows, self.last_viewport_rows);
                self.scroll_offset = (
                    self.scroll_offset + self.last_viewport_rows.max(1)
                ).min(bottom);
                ChatAction::None
            }
            KeyCode::Home => {
                self.scroll_offset = 0;
                ChatAction::None
            }
            KeyCode::End => {
                self.follow_pending = true;
                ChatAction::None
            }
            KeyCode::Char('l') => {
                self.toggle_reaction(Reaction::Like);
                ChatAction::None
            }
            KeyCode::Char('d') => {
                self.toggle_reaction(Reaction::Dislike);
                ChatAction::None
            }
            KeyCode::Char('c') | KeyCode::Char('y') => {
                self.copy_selected();
                ChatAction::None
            }
            _ => ChatAction::None,
        }
    }

    fn handle_paste_prompt_key(&mut self, key: KeyEvent) -> ChatAction {
        match key.code {
            KeyCode::Esc => {
                self.paste_prompt = None;
            }
            KeyCode::Enter => {
                if let Some(buffer) = self.paste_prompt.take() {
                    self.composer.insert_str(&buffer);
                }
            }
            KeyCode::Backspace => {
                if let Some(buffer) = self.paste_prompt.as_mut() {
                    buffer.pop();
                }
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(buffer) = self.paste_prompt.as_mut() {
                    buffer.push(ch);
                }
            }
            _ => {}
        }
        ChatAction::None
    }

    /// The composer Enter path. The session decides whether the send is
    /// accepted; the composer is only cleared (and locked) on acceptance,
    /// so a draft is never lost to a double submit.
    fn submit(&mut self) -> ChatAction {
        let draft = self.composer.text();
        match self.session.begin_send(&draft) {
            Some(wire_text) => {
                self.composer.clear();
                self.composer.set_enabled(false);
                self.note_content_change();
                ChatAction::Send(wire_text)
            }
            None => {
                if self.session.is_sending() {
                    self.status = Some("Still waiting for the last reply...".to_string());
                }
                ChatAction::None
            }
        }
    }

    /// Outcome of the in-flight send. Returns true when the sidebar needs
    /// a history refresh (the server just named this conversation).
    pub fn apply_send_result(&mut self, result: Result<SendReply, ApiError>) -> bool {
        let refresh = self.session.finish_send(result);
        self.composer.set_enabled(true);
        self.note_content_change();
        if let Some(id) = self.session.conversation_id() {
            self.sidebar.set_active(Some(id.to_string()));
        }
        refresh
    }

    /// Switch to a conversation fetched from the server.
    pub fn open_conversation(&mut self, id: String, messages: Vec<ChatMessage>) {
        self.session.replace(Some(id.clone()), messages);
        self.sidebar.set_active(Some(id));
        self.reactions.clear();
        self.copied = None;
        self.selected_message = self.session.items().len().saturating_sub(1);
        self.follow_pending = true;
        self.focus = FocusPane::Composer;
    }

    /// Polling refresh of the open conversation. The server copy replaces
    /// the list wholesale; reactions are keyed by index so they reset too.
    pub fn refresh_messages(&mut self, messages: Vec<ChatMessage>) {
        let id = self.session.conversation_id().map(str::to_string);
        let grew = messages.len() > self.session.items().len();
        self.session.replace(id, messages);
        self.reactions.clear();
        self.copied = None;
        self.selected_message = self.selected_message.min(
            self.session.items().len().saturating_sub(1)
        );
        if grew {
            self.note_content_change();
        }
    }

    /// Clears the list and returns to a new, unsaved conversation.
    pub fn start_new_chat(&mut self) {
        self.session.reset();
        self.sidebar.set_active(None);
        self.sidebar.clear_filter();
        self.reactions.clear();
        self.copied = None;
        self.selected_message = 0;
        self.scroll_offset = 0;
        self.follow_pending = true;
        self.focus = FocusPane::Composer;
    }

    fn toggle_reaction(&mut self, reaction: Reaction) {
        let index = self.selected_message;
        if !self.is_assistant_item(index) {
            return;
        }
        if self.reactions.get(&index) == Some(&reaction) {
            self.reactions.remove(&index);
        } else {
            self.reactions.insert(index, reaction);
        }
    }

    fn copy_selected(&mut self) {
        let index = self.selected_message;
        let Some(ChatItem::Message(msg)) = self.session.items().get(index) else {
            return;
        };
        if msg.role != Role::Assistant {
            return;
        }
        match self.clipboard.write_text(&msg.content) {
            Ok(()) => {
                self.copied = Some((index, Instant::now()));
            }
            Err(err) => {
                warn!("Clipboard write failed: {}", err);
                self.status = Some("Could not access the clipboard.".to_string());
            }
        }
    }

    fn paste_from_clipboard(&mut self) {
        match self.clipboard.read_text() {
            Ok(Some(text)) => self.composer.insert_str(&text),
            Ok(None) => {}
            Err(err) => {
                // Clipboard access denied or absent: fall back to a manual
                // prompt the user can type or bracket-paste into.
                warn!("Clipboard read failed: {}", err);
                self.paste_prompt = Some(String::new());
            }
        }
    }

    fn is_assistant_item(&self, index: usize) -> bool {
        matches!(
            self.session.items().get(index),
            Some(ChatItem::Message(msg)) if msg.role == Role::Assistant
        )
    }

    /// Something was appended to the message list: decide, against the
    /// geometry of the last render, whether the viewport follows.
    fn note_content_change(&mut self) {
        if
            scroll
                ::maybe_scroll_to_bottom(
                    self.last_content_rows,
                    self.last_viewport_rows,
                    self.scroll_offset,
                    self.last_content_rows
                )
                .is_some()
        {
            self.follow_pending = true;
        }
    }

    // --- rendering ---------------------------------------------------

    pub fn draw(&mut self, frame: &mut Frame) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(32), Constraint::Min(20)])
            .split(frame.area());
        self.draw_sidebar(frame, columns[0]);
        self.draw_main(frame, columns[1]);
    }

    fn draw_sidebar(&self, frame: &mut Frame, area: Rect) {
        let focused = self.focus == FocusPane::Sidebar;
        let border_style = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let filter_line = if self.sidebar.filter().is_empty() {
            if focused {
                Line::from(
                    Span::styled("type to filter...", Style::default().fg(Color::DarkGray))
                )
            } else {
                Line::from("")
            }
        } else {
            Line::from(vec![
                Span::styled("filter: ", Style::default().fg(Color::DarkGray)),
                Span::raw(self.sidebar.filter().to_string())
            ])
        };

        let mut lines = vec![filter_line, Line::from("")];
        match self.sidebar.status() {
            SidebarStatus::Loading => {
                lines.push(
                    Line::from(
                        Span::styled("Loading conversations...", Style::default().fg(Color::DarkGray))
                    )
                );
            }
            SidebarStatus::Empty => {
                lines.push(
                    Line::from(
                        Span::styled("No conversations yet", Style::default().fg(Color::DarkGray))
                    )
                );
            }
            SidebarStatus::NoResults => {
                lines.push(
                    Line::from(
                        Span::styled("No matching conversations", Style::default().fg(Color::DarkGray))
                    )
                );
            }
            SidebarStatus::Populated => {
                for (index, row) in self.sidebar.visible_rows().into_iter().enumerate() {
                    let selected = focused && index == self.sidebar.selected();
                    lines.push(self.sidebar_row_line(row, selected));
                }
            }
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title("Conversations");
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn sidebar_row_line(&self, row: SidebarRow, selected: bool) -> Line<'static> {
        let highlight = if selected {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        match row {
            SidebarRow::GroupHeader { name, collapsed, count } => {
                let marker = if collapsed { ">" } else { "v" };
                Line::from(
                    Span::styled(
                        format!("{} {} ({})", marker, name, count),
                        highlight.add_modifier(Modifier::BOLD)
                    )
                )
            }
            SidebarRow::Card(card) => {
                let active = self.sidebar.active_id() == Some(card.id.as_str());
                let mut style = highlight;
                if active {
                    style = style.fg(Color::Cyan);
                }
                let mut label = format!("  {}", truncate(&card.preview, 24));
                if !card.time_display.is_empty() {
                    label = format!("{}  {}", label, card.time_display);
                }
                Line::from(Span::styled(label, style))
            }
        }
    }

    fn draw_main(&mut self, frame: &mut Frame, area: Rect) {
        let composer_height = (self.composer.height() as u16) + 2;
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(composer_height),
            ])
            .split(area);
        self.draw_messages(frame, rows[0]);
        self.draw_status(frame, rows[1]);
        self.draw_composer(frame, rows[2]);
    }

    fn draw_messages(&mut self, frame: &mut Frame, area: Rect) {
        let focused = self.focus == FocusPane::Messages;
        let border_style = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let inner_width = area.width.saturating_sub(2).max(1) as usize;
        let viewport_rows = area.height.saturating_sub(2) as usize;

        let lines = self.message_lines(inner_width, focused);
        let content_rows = lines.len();

        if self.follow_pending {
            self.scroll_offset = scroll::bottom_offset(content_rows, viewport_rows);
            self.follow_pending = false;
        } else {
            self.scroll_offset = self.scroll_offset.min(
                scroll::bottom_offset(content_rows, viewport_rows)
            );
        }
        self.last_content_rows = content_rows;
        self.last_viewport_rows = viewport_rows;

        let title = match self.session.conversation_id() {
            Some(_) => "Chat",
            None => "Chat (new)",
        };
        let block = Block::default().borders(Borders::ALL).border_style(border_style).title(title);
        let paragraph = Paragraph::new(lines)
            .block(block)
            .scroll((self.scroll_offset as u16, 0));
        frame.render_widget(paragraph, area);
    }

    fn message_lines(&self, width: usize, focused: bool) -> Vec<Line<'static>> {
        let items = self.session.items();
        if items.is_empty() && !self.session.is_sending() {
            return vec![
                Line::from(""),
                Line::from(
                    Span::styled(
                        "No messages yet. Say hello!",
                        Style::default().fg(Color::DarkGray)
                    )
                )
            ];
        }

        let now = Instant::now();
        let mut lines = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let selected = focused && index == self.selected_message;
            match item {
                ChatItem::Message(msg) => {
                    lines.extend(self.message_block(index, msg, width, selected, now));
                }
                ChatItem::Error(text) => {
                    for part in wrap_text(text, width) {
                        lines.push(Line::from(Span::styled(part, Style::default().fg(Color::Red))));
                    }
                    lines.push(Line::from(""));
                }
            }
        }
        if self.session.is_sending() {
            lines.push(
                Line::from(
                    Span::styled(
                        "AI is typing...",
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
                    )
                )
            );
        }
        lines
    }

    fn message_block(
        &self,
        index: usize,
        msg: &ChatMessage,
        width: usize,
        selected: bool,
        now: Instant
    ) -> Vec<Line<'static>> {
        let badge_style = match msg.role {
            Role::User => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            Role::Assistant => Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        };
        let marker = if selected { "> " } else { "  " };
        let mut lines = vec![
            Line::from(
                vec![Span::raw(marker.to_string()), Span::styled(msg.role.label(), badge_style)]
            )
        ];
        for part in wrap_text(&msg.content, width.saturating_sub(2)) {
            lines.push(Line::from(format!("  {}", part)));
        }
        if msg.role == Role::Assistant {
            lines.push(self.assistant_footer(index, msg, now));
        }
        lines.push(Line::from(""));
        lines
    }

    fn assistant_footer(&self, index: usize, msg: &ChatMessage, now: Instant) -> Line<'static> {
        let dim = Style::default().fg(Color::DarkGray);
        let on = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        let reaction = self.reaction(index);
        let copy_label = if self.copy_feedback_at(index, now) { "Copied" } else { "[c]opy" };
        Line::from(
            vec![
                Span::styled(format!("  {}  ", timefmt::local_timestamp(msg.timestamp)), dim),
                Span::styled("[l]ike", if reaction == Some(Reaction::Like) { on } else { dim }),
                Span::raw(" "),
                Span::styled("[d]islike", if reaction == Some(Reaction::Dislike) {
                    on
                } else {
                    dim
                }),
                Span::raw(" "),
                Span::styled(copy_label.to_string(), dim)
            ]
        )
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let line = if let Some(prompt) = self.paste_prompt() {
            Line::from(
                vec![
                    Span::styled("Paste (Enter to insert, Esc to cancel): ", Style::default().fg(Color::Yellow)),
                    Span::raw(prompt.to_string())
                ]
            )
        } else if let Some(status) = self.status() {
            Line::from(Span::styled(status.to_string(), Style::default().fg(Color::Yellow)))
        } else {
            Line::from(
                Span::styled(
                    "Enter send | Shift+Enter newline | Tab panes | Ctrl+N new chat | Ctrl+Q quit",
                    Style::default().fg(Color::DarkGray)
                )
            )
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_composer(&self, frame: &mut Frame, area: Rect) {
        let focused = self.focus == FocusPane::Composer && self.paste_prompt.is_none();
        let border_style = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let title = if self.composer.is_enabled() { "Message" } else { "Message (sending...)" };
        let visible: Vec<Line> = self.composer
            .lines()
            .iter()
            .skip(self.composer.scroll())
            .take(self.composer.height())
            .map(|line| Line::from(line.clone()))
            .collect();
        let block = Block::default().borders(Borders::ALL).border_style(border_style).title(title);
        frame.render_widget(Paragraph::new(visible).block(block), area);

        if focused && self.composer.is_enabled() {
            let (row, col) = self.composer.cursor_screen_position();
            frame.set_cursor_position((
                area.x + 1 + (col.min(area.width.saturating_sub(3) as usize) as u16),
                area.y + 1 + (row as u16),
            ));
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Greedy word wrap so scroll math sees exactly the rows the terminal
/// will. Words longer than the width are split hard.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for raw_line in text.split('\n') {
        if raw_line.chars().count() <= width {
            out.push(raw_line.to_string());
            continue;
        }
        let mut current = String::new();
        let mut current_len = 0;
        for word in raw_line.split(' ') {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + 1 + word_len > width {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            if word_len > width {
                for ch in word.chars() {
                    if current_len == width {
                        out.push(std::mem::take(&mut current));
                        current_len = 0;
                    }
                    current.push(ch);
                    current_len += 1;
                }
            } else {
                current.push_str(word);
                current_len += word_len;
            }
        }
        out.push(current);
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SEND_ERROR_TEXT;

    struct MockClipboard {
        content: Option<String>,
        fail: bool,
        written: Vec<String>,
    }

    impl MockClipboard {
        fn with_text(text: &str) -> Box<Self> {
            Box::new(Self { content: Some(text.to_string()), fail: false, written: Vec::new() })
        }

        fn failing() -> Box<Self> {
            Box::new(Self { content: None, fail: true, written: Vec::new() })
        }
    }

    impl ClipboardProvider for MockClipboard {
        fn read_text(&mut self) -> Result<Option<String>, String> {
            if self.fail {
                Err("denied".to_string())
            } else {
                Ok(self.content.clone())
            }
        }

        fn write_text(&mut self, text: &str) -> Result<(), String> {
            if self.fail {
                Err("denied".to_string())
            } else {
                self.written.push(text.to_string());
                Ok(())
            }
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn shift_enter() -> KeyEvent {
        KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT)
    }

    fn screen() -> ChatScreen {
        ChatScreen::new(MockClipboard::with_text("from clipboard"))
    }

    fn type_str(screen: &mut ChatScreen, text: &str) {
        for ch in text.chars() {
            screen.handle_key(key(KeyCode::Char(ch)));
        }
    }

    fn reply(text: &str, id: Option<&str>) -> SendReply {
        SendReply {
            ai_response: text.to_string(),
            conversation_id: id.map(str::to_string),
        }
    }

    #[test]
    fn enter_sends_and_clears_and_locks_the_composer() {
        let mut screen = screen();
        type_str(&mut screen, "  hello  ");
        let action = screen.handle_key(key(KeyCode::Enter));
        assert_eq!(action, ChatAction::Send("hello".to_string()));
        assert!(screen.composer.is_empty());
        assert!(!screen.composer.is_enabled());
        assert_eq!(screen.session.items().len(), 1);
    }

    #[test]
    fn second_enter_keeps_the_draft_while_sending() {
        let mut screen = screen();
        type_str(&mut screen, "first");
        screen.handle_key(key(KeyCode::Enter));

        // Composer is disabled so nothing types, but even a non-empty
        // draft must not produce a second send.
        let action = screen.handle_key(key(KeyCode::Enter));
        assert_eq!(action, ChatAction::None);
        assert!(screen.status().is_some());
        assert_eq!(screen.session.items().len(), 1);
    }

    #[test]
    fn send_reply_unlocks_and_flags_sidebar_refresh() {
        let mut screen = screen();
        type_str(&mut screen, "hello");
        screen.handle_key(key(KeyCode::Enter));
        let refresh = screen.apply_send_result(Ok(reply("hi there", Some("7"))));
        assert!(refresh);
        assert!(screen.composer.is_enabled());
        assert_eq!(screen.sidebar.active_id(), Some("7"));
        assert_eq!(screen.session.items().len(), 2);
    }

    #[test]
    fn send_failure_shows_error_and_unlocks() {
        let mut screen = screen();
        type_str(&mut screen, "hello");
        screen.handle_key(key(KeyCode::Enter));
        let refresh = screen.apply_send_result(Err(ApiError::Application("500".into())));
        assert!(!refresh);
        assert!(screen.composer.is_enabled());
        assert_eq!(screen.session.items()[1], ChatItem::Error(SEND_ERROR_TEXT.to_string()));

        type_str(&mut screen, "retry");
        assert_eq!(screen.handle_key(key(KeyCode::Enter)), ChatAction::Send("retry".to_string()));
    }

    #[test]
    fn shift_enter_and_ctrl_j_insert_newlines() {
        let mut screen = screen();
        type_str(&mut screen, "line1");
        screen.handle_key(shift_enter());
        type_str(&mut screen, "line2");
        screen.handle_key(ctrl('j'));
        type_str(&mut screen, "line3");
        assert_eq!(screen.composer.text(), "line1\nline2\nline3");
        assert_eq!(screen.session.items().len(), 0);
    }

    #[test]
    fn reactions_are_mutually_exclusive_and_toggle_off() {
        let mut screen = screen();
        type_str(&mut screen, "q");
        screen.handle_key(key(KeyCode::Enter));
        screen.apply_send_result(Ok(reply("answer", None)));

        screen.handle_key(key(KeyCode::Esc)); // focus messages
        screen.handle_key(key(KeyCode::Down)); // select assistant message
        assert_eq!(screen.focus(), FocusPane::Messages);

        screen.handle_key(key(KeyCode::Char('l')));
        assert_eq!(screen.reaction(1), Some(Reaction::Like));
        screen.handle_key(key(KeyCode::Char('d')));
        assert_eq!(screen.reaction(1), Some(Reaction::Dislike));
        screen.handle_key(key(KeyCode::Char('d')));
        assert_eq!(screen.reaction(1), None);
    }

    #[test]
    fn reactions_ignore_user_messages() {
        let mut screen = screen();
        type_str(&mut screen, "q");
        screen.handle_key(key(KeyCode::Enter));
        screen.apply_send_result(Ok(reply("answer", None)));

        screen.handle_key(key(KeyCode::Esc));
        screen.handle_key(key(KeyCode::Up)); // select the user message
        screen.handle_key(key(KeyCode::Char('l')));
        assert_eq!(screen.reaction(0), None);
    }

    #[test]
    fn copy_sets_transient_feedback() {
        let mut screen = screen();
        type_str(&mut screen, "q");
        screen.handle_key(key(KeyCode::Enter));
        screen.apply_send_result(Ok(reply("answer", None)));

        screen.handle_key(key(KeyCode::Esc));
        screen.handle_key(key(KeyCode::Down));
        screen.handle_key(key(KeyCode::Char('c')));

        let now = Instant::now();
        assert!(screen.copy_feedback_at(1, now));
        assert!(!screen.copy_feedback_at(1, now + COPY_FEEDBACK));
        assert!(!screen.copy_feedback_at(0, now));
    }

    #[test]
    fn ctrl_v_falls_back_to_a_prompt_when_clipboard_fails() {
        let mut screen = ChatScreen::new(MockClipboard::failing());
        screen.handle_key(ctrl('v'));
        assert!(screen.paste_prompt().is_some());

        type_str(&mut screen, "typed in");
        screen.handle_key(key(KeyCode::Enter));
        assert_eq!(screen.paste_prompt(), None);
        assert_eq!(screen.composer.text(), "typed in");
    }

    #[test]
    fn ctrl_v_inserts_clipboard_text() {
        let mut screen = screen();
        screen.handle_key(ctrl('v'));
        assert_eq!(screen.composer.text(), "from clipboard");
    }

    #[test]
    fn new_chat_resets_list_filter_and_focus() {
        let mut screen = screen();
        type_str(&mut screen, "q");
        screen.handle_key(key(KeyCode::Enter));
        screen.apply_send_result(Ok(reply("answer", Some("9"))));
        screen.handle_key(key(KeyCode::Tab));
        screen.handle_key(key(KeyCode::Tab)); // sidebar
        type_str(&mut screen, "filter");

        screen.handle_key(ctrl('n'));
        assert!(screen.session.is_empty());
        assert_eq!(screen.session.conversation_id(), None);
        assert_eq!(screen.sidebar.active_id(), None);
        assert_eq!(screen.sidebar.filter(), "");
        assert_eq!(screen.focus(), FocusPane::Composer);
    }

    #[test]
    fn opening_the_active_conversation_is_a_noop() {
        use crate::models::chat::{ ConversationGroup, ConversationSummary };

        let mut screen = screen();
        screen.sidebar.apply_history(
            Ok(
                vec![ConversationGroup {
                    name: "Today".to_string(),
                    conversations: vec![ConversationSummary {
                        id: "5".to_string(),
                        preview: "hello".to_string(),
                        time_display: String::new(),
                    }],
                }]
            )
        );
        screen.open_conversation("5".to_string(), Vec::new());

        screen.handle_key(key(KeyCode::Tab));
        screen.handle_key(key(KeyCode::Tab)); // sidebar
        screen.handle_key(key(KeyCode::Down)); // move from header to card
        let action = screen.handle_key(key(KeyCode::Enter));
        assert_eq!(action, ChatAction::None);
    }

    #[test]
    fn wrap_text_splits_on_words_and_hard_breaks_long_ones() {
        assert_eq!(wrap_text("short line", 20), vec!["short line"]);
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_text("a\nb", 10), vec!["a", "b"]);
    }
}
