use crossterm::event::{ KeyCode, KeyEvent, KeyModifiers };

/// Which of the three auth panes is on screen. Exactly one is visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthScreen {
    Choice,
    Register,
    Login,
}

impl AuthScreen {
    /// Maps the `--screen` startup flag (the deep-link) to a pane.
    /// Unrecognized values fall back to the choice pane.
    pub fn from_route(route: &str) -> Self {
        match route.trim().trim_start_matches('#').to_lowercase().as_str() {
            "register" => AuthScreen::Register,
            "login" => AuthScreen::Login,
            _ => AuthScreen::Choice,
        }
    }
}

/// What the caller must do after a key was handled.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthAction {
    None,
    Quit,
    SubmitLogin {
        username: String,
        password: String,
    },
    SubmitRegister {
        username: String,
        password1: String,
        password2: String,
    },
}

const CHOICE_ITEMS: usize = 2; // create account, log in
const REGISTER_FIELDS: usize = 3;
const LOGIN_FIELDS: usize = 2;

/// Auth flow state: choice / register / login panes, field focus, and any
/// error lines to render. Field values survive switching panes so a typo
/// on the wrong form is not punished with retyping.
pub struct AuthView {
    screen: AuthScreen,
    choice_index: usize,
    username: String,
    password: String,
    password_confirm: String,
    field: usize,
    errors: Vec<String>,
    submitting: bool,
}

impl AuthView {
    pub fn new(route: &str) -> Self {
        Self {
            screen: AuthScreen::from_route(route),
            choice_index: 0,
            username: String::new(),
            password: String::new(),
            password_confirm: String::new(),
            field: 0,
            errors: Vec::new(),
            submitting: false,
        }
    }

    pub fn screen(&self) -> AuthScreen {
        self.screen
    }

    pub fn choice_index(&self) -> usize {
        self.choice_index
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn password_confirm(&self) -> &str {
        &self.password_confirm
    }

    pub fn focused_field(&self) -> usize {
        self.field
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Server finished a submit with form errors: stay on (or jump back
    /// to) the form that produced them so they are visible.
    pub fn show_server_errors(&mut self, screen: AuthScreen, errors: Vec<String>) {
        self.submitting = false;
        self.screen = screen;
        self.errors = errors;
    }

    pub fn submit_failed(&mut self, message: String) {
        self.submitting = false;
        self.errors = vec![message];
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AuthAction {
        if self.submitting {
            return AuthAction::None;
        }
        match self.screen {
            AuthScreen::Choice => self.handle_choice_key(key),
            AuthScreen::Register | AuthScreen::Login => self.handle_form_key(key),
        }
    }

    fn handle_choice_key(&mut self, key: KeyEvent) -> AuthAction {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => AuthAction::Quit,
            KeyCode::Up | KeyCode::BackTab => {
                self.choice_index = self.choice_index.saturating_sub(1);
                AuthAction::None
            }
            KeyCode::Down | KeyCode::Tab => {
                self.choice_index = (self.choice_index + 1).min(CHOICE_ITEMS - 1);
                AuthAction::None
            }
            KeyCode::Enter => {
                let screen = if self.choice_index == 0 {
                    AuthScreen::Register
                } else {
                    AuthScreen::Login
                };
                self.open_form(screen);
                AuthAction::None
            }
            _ => AuthAction::None,
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> AuthAction {
        let field_count = if self.screen == AuthScreen::Register {
            REGISTER_FIELDS
        } else {
            LOGIN_FIELDS
        };
        match key.code {
            KeyCode::Esc => {
                self.screen = AuthScreen::Choice;
                self.errors.clear();
                self.field = 0;
                AuthAction::None
            }
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::CONTROL) => self.submit(),
            KeyCode::Enter => {
                if self.field + 1 < field_count {
                    self.field += 1;
                    AuthAction::None
                } else {
                    self.submit()
                }
            }
            KeyCode::Tab | KeyCode::Down => {
                self.field = (self.field + 1) % field_count;
                AuthAction::None
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.field = (self.field + field_count - 1) % field_count;
                AuthAction::None
            }
            KeyCode::Backspace => {
                self.focused_value_mut().pop();
                AuthAction::None
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.focused_value_mut().push(ch);
                AuthAction::None
            }
            _ => AuthAction::None,
        }
    }

    fn open_form(&mut self, screen: AuthScreen) {
        self.screen = screen;
        self.errors.clear();
        self.field = 0;
    }

    fn focused_value_mut(&mut self) -> &mut String {
        match (self.screen, self.field) {
            (_, 0) => &mut self.username,
            (_, 1) => &mut self.password,
            _ => &mut self.password_confirm,
        }
    }

    fn submit(&mut self) -> AuthAction {
        self.errors = self.validate();
        if !self.errors.is_empty() {
            return AuthAction::None;
        }
        self.submitting = true;
        match self.screen {
            AuthScreen::Login =>
                AuthAction::SubmitLogin {
                    username: self.username.clone(),
                    password: self.password.clone(),
                },
            AuthScreen::Register =>
                AuthAction::SubmitRegister {
                    username: self.username.clone(),
                    password1: self.password.clone(),
                    password2: self.password_confirm.clone(),
                },
            AuthScreen::Choice => AuthAction::None,
        }
    }

    /// Client-side checks run before anything touches the network. The
    /// server re-validates everything; these only save a round trip.
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push("Username is required.".to_string());
        }
        if self.password.is_empty() {
            errors.push("Password is required.".to_string());
        }
        if self.screen == AuthScreen::Register {
            if self.password != self.password_confirm {
                errors.push("Passwords do not match. Please try again.".to_string());
            }
            if !self.password.is_empty() && self.password.chars().count() < 8 {
                errors.push("Password must be at least 8 characters long.".to_string());
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::CONTROL)
    }

    fn type_str(view: &mut AuthView, text: &str) {
        for ch in text.chars() {
            view.handle_key(key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn route_deep_links_pick_the_start_pane() {
        assert_eq!(AuthScreen::from_route("register"), AuthScreen::Register);
        assert_eq!(AuthScreen::from_route("#login"), AuthScreen::Login);
        assert_eq!(AuthScreen::from_route("LOGIN"), AuthScreen::Login);
        assert_eq!(AuthScreen::from_route(""), AuthScreen::Choice);
        assert_eq!(AuthScreen::from_route("settings"), AuthScreen::Choice);
    }

    #[test]
    fn choice_enter_opens_the_highlighted_form_and_esc_returns() {
        let mut view = AuthView::new("");
        view.handle_key(key(KeyCode::Down));
        view.handle_key(key(KeyCode::Enter));
        assert_eq!(view.screen(), AuthScreen::Login);

        view.handle_key(key(KeyCode::Esc));
        assert_eq!(view.screen(), AuthScreen::Choice);
    }

    #[test]
    fn field_values_survive_switching_panes() {
        let mut view = AuthView::new("login");
        type_str(&mut view, "alice");
        view.handle_key(key(KeyCode::Esc));
        view.handle_key(key(KeyCode::Enter)); // open register
        assert_eq!(view.screen(), AuthScreen::Register);
        assert_eq!(view.username(), "alice");
    }

    #[test]
    fn login_submits_from_the_last_field() {
        let mut view = AuthView::new("login");
        type_str(&mut view, "alice");
        view.handle_key(key(KeyCode::Enter));
        type_str(&mut view, "hunter2hunter2");
        let action = view.handle_key(key(KeyCode::Enter));
        assert_eq!(action, AuthAction::SubmitLogin {
            username: "alice".to_string(),
            password: "hunter2hunter2".to_string(),
        });
        assert!(view.is_submitting());
    }

    #[test]
    fn ctrl_enter_submits_from_any_field() {
        let mut view = AuthView::new("login");
        type_str(&mut view, "alice");
        view.handle_key(key(KeyCode::Tab));
        type_str(&mut view, "hunter2hunter2");
        view.handle_key(key(KeyCode::BackTab)); // back to username
        let action = view.handle_key(ctrl(KeyCode::Enter));
        assert!(matches!(action, AuthAction::SubmitLogin { .. }));
    }

    #[test]
    fn register_rejects_mismatched_passwords_locally() {
        let mut view = AuthView::new("register");
        type_str(&mut view, "bob");
        view.handle_key(key(KeyCode::Enter));
        type_str(&mut view, "longenough1");
        view.handle_key(key(KeyCode::Enter));
        type_str(&mut view, "longenough2");
        let action = view.handle_key(key(KeyCode::Enter));
        assert_eq!(action, AuthAction::None);
        assert!(!view.is_submitting());
        assert!(
            view
                .errors()
                .iter()
                .any(|e| e.contains("do not match"))
        );
    }

    #[test]
    fn register_rejects_short_passwords_locally() {
        let mut view = AuthView::new("register");
        type_str(&mut view, "bob");
        view.handle_key(key(KeyCode::Enter));
        type_str(&mut view, "short");
        view.handle_key(key(KeyCode::Enter));
        type_str(&mut view, "short");
        view.handle_key(key(KeyCode::Enter));
        assert!(
            view
                .errors()
                .iter()
                .any(|e| e.contains("at least 8"))
        );
    }

    #[test]
    fn server_errors_force_the_originating_form() {
        let mut view = AuthView::new("login");
        type_str(&mut view, "alice");
        view.handle_key(key(KeyCode::Tab));
        type_str(&mut view, "wrongpassword");
        view.handle_key(ctrl(KeyCode::Enter));
        assert!(view.is_submitting());

        // Keys are ignored while the submit is in flight.
        assert_eq!(view.handle_key(key(KeyCode::Esc)), AuthAction::None);
        assert_eq!(view.screen(), AuthScreen::Login);

        view.show_server_errors(AuthScreen::Login, vec!["Invalid credentials.".to_string()]);
        assert!(!view.is_submitting());
        assert_eq!(view.screen(), AuthScreen::Login);
        assert_eq!(view.errors(), ["Invalid credentials.".to_string()]);
    }
}
