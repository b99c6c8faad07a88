//! Page state and key handling. Backend calls run on the tokio runtime and
//! report back through [`Message`]s that the UI loop feeds to [`App::handle_message`].

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::error::Result;
use crate::service::TaskService;
use crate::session::{Authenticator, Session, SessionHandle};
use crate::view::{execute, Completion, Intent, TaskListView};

const SIGNUP_REDIRECT_DELAY: Duration = Duration::from_secs(2);
pub const SIGNUP_SUCCESS: &str = "Account created successfully! You can now login.";

/// Any page can be reached from any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Home,
    Login,
    Signup,
    Dashboard,
}

#[derive(Debug)]
pub enum Message {
    Tasks(Completion),
    SignedIn(Result<Session>),
    SignedUp(Result<()>),
    SignedOut(Result<()>),
    SignupRedirect,
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub focus: usize,
    pub loading: bool,
    pub error: Option<String>,
}

impl LoginForm {
    fn focused(&mut self) -> &mut String {
        match self.focus {
            0 => &mut self.email,
            _ => &mut self.password,
        }
    }
}

#[derive(Debug, Default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub focus: usize,
    pub loading: bool,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl SignupForm {
    fn focused(&mut self) -> &mut String {
        match self.focus {
            0 => &mut self.name,
            1 => &mut self.email,
            _ => &mut self.password,
        }
    }
}

/// Which half of the dashboard receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardFocus {
    #[default]
    List,
    Form,
}

pub struct App {
    pub page: Page,
    pub login: LoginForm,
    pub signup: SignupForm,
    pub tasks: TaskListView,
    pub focus: DashboardFocus,
    pub should_quit: bool,
    service: TaskService,
    auth: Arc<dyn Authenticator>,
    runtime: Handle,
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
}

impl App {
    pub fn new(service: TaskService, auth: Arc<dyn Authenticator>, runtime: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            page: Page::Home,
            login: LoginForm::default(),
            signup: SignupForm::default(),
            tasks: TaskListView::new(),
            focus: DashboardFocus::List,
            should_quit: false,
            service,
            auth,
            runtime,
            tx,
            rx,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        self.service.session()
    }

    /// Switches page, mounting or unmounting the task list as needed.
    pub fn navigate(&mut self, page: Page) {
        if self.page == page {
            return;
        }
        if self.page == Page::Dashboard {
            self.tasks.unmount();
        }
        self.page = page;
        if page == Page::Dashboard {
            self.focus = DashboardFocus::List;
            let (mount, intent) = self.tasks.mount();
            self.dispatch(mount, intent);
        }
    }

    fn dispatch(&self, mount: u64, intent: Intent) {
        let service = self.service.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let outcome = execute(&service, intent).await;
            // The receiver only goes away when the app is shutting down.
            let _ = tx.send(Message::Tasks(Completion { mount, outcome }));
        });
    }

    fn dispatch_current(&self, intent: Option<Intent>) {
        if let Some(intent) = intent {
            self.dispatch(self.tasks.generation(), intent);
        }
    }

    /// Applies every message that has arrived since the last call.
    pub fn drain_messages(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            self.handle_message(message);
        }
    }

    #[cfg(test)]
    pub async fn next_message(&mut self) {
        if let Some(message) = self.rx.recv().await {
            self.handle_message(message);
        }
    }

    pub fn handle_message(&mut self, message: Message) {
        match message {
            Message::Tasks(completion) => {
                self.tasks.apply(completion);
            }
            Message::SignedIn(result) => {
                self.login.loading = false;
                match result {
                    Ok(session) => {
                        info!(user = %session.user_id, "signed in");
                        self.session().set(session);
                        self.login = LoginForm::default();
                        if self.page == Page::Login {
                            self.navigate(Page::Dashboard);
                        }
                    }
                    Err(err) => self.login.error = Some(err.to_string()),
                }
            }
            Message::SignedUp(result) => {
                self.signup.loading = false;
                match result {
                    Ok(()) => {
                        self.signup = SignupForm {
                            success: Some(SIGNUP_SUCCESS.to_string()),
                            ..SignupForm::default()
                        };
                        let tx = self.tx.clone();
                        self.runtime.spawn(async move {
                            tokio::time::sleep(SIGNUP_REDIRECT_DELAY).await;
                            let _ = tx.send(Message::SignupRedirect);
                        });
                    }
                    Err(err) => self.signup.error = Some(err.to_string()),
                }
            }
            Message::SignedOut(result) => {
                if let Err(err) = result {
                    warn!(%err, "sign out failed");
                }
            }
            Message::SignupRedirect => {
                if self.page == Page::Signup {
                    self.signup.success = None;
                    self.navigate(Page::Login);
                }
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match self.page {
            Page::Home => self.home_key(key),
            Page::Login => self.login_key(key),
            Page::Signup => self.signup_key(key),
            Page::Dashboard => self.dashboard_key(key),
        }
    }

    fn home_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('l') => self.navigate(Page::Login),
            KeyCode::Char('s') => self.navigate(Page::Signup),
            KeyCode::Char('d') => self.navigate(Page::Dashboard),
            _ => {}
        }
    }

    fn login_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('n') {
                self.navigate(Page::Signup);
            }
            return;
        }
        match key.code {
            KeyCode::Esc => self.navigate(Page::Home),
            KeyCode::Tab | KeyCode::Down | KeyCode::Up => {
                self.login.focus = (self.login.focus + 1) % 2
            }
            KeyCode::Enter => self.submit_login(),
            KeyCode::Backspace => {
                self.login.focused().pop();
            }
            KeyCode::Char(c) => self.login.focused().push(c),
            _ => {}
        }
    }

    fn submit_login(&mut self) {
        if self.login.loading {
            return;
        }
        self.login.loading = true;
        self.login.error = None;
        let auth = Arc::clone(&self.auth);
        let tx = self.tx.clone();
        let email = self.login.email.trim().to_string();
        let password = self.login.password.clone();
        self.runtime.spawn(async move {
            let result = auth.sign_in(&email, &password).await;
            let _ = tx.send(Message::SignedIn(result));
        });
    }

    fn signup_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('l') {
                self.navigate(Page::Login);
            }
            return;
        }
        match key.code {
            KeyCode::Esc => self.navigate(Page::Home),
            KeyCode::Tab | KeyCode::Down => self.signup.focus = (self.signup.focus + 1) % 3,
            KeyCode::Up => self.signup.focus = (self.signup.focus + 2) % 3,
            KeyCode::Enter => self.submit_signup(),
            KeyCode::Backspace => {
                self.signup.focused().pop();
            }
            KeyCode::Char(c) => self.signup.focused().push(c),
            _ => {}
        }
    }

    fn submit_signup(&mut self) {
        if self.signup.loading {
            return;
        }
        self.signup.loading = true;
        self.signup.error = None;
        self.signup.success = None;
        let auth = Arc::clone(&self.auth);
        let tx = self.tx.clone();
        let name = self.signup.name.trim().to_string();
        let email = self.signup.email.trim().to_string();
        let password = self.signup.password.clone();
        self.runtime.spawn(async move {
            let result = auth.sign_up(&name, &email, &password).await;
            let _ = tx.send(Message::SignedUp(result));
        });
    }

    fn dashboard_key(&mut self, key: KeyEvent) {
        match self.focus {
            DashboardFocus::List => self.list_key(key),
            DashboardFocus::Form => self.form_key(key),
        }
    }

    fn list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => self.navigate(Page::Home),
            KeyCode::Char('o') => self.logout(),
            KeyCode::Char('a') | KeyCode::Tab => self.focus = DashboardFocus::Form,
            KeyCode::Up | KeyCode::Char('k') => self.tasks.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.tasks.select_next(),
            KeyCode::Enter | KeyCode::Char('s') => {
                self.dispatch_current(self.tasks.cycle_selected_status())
            }
            KeyCode::Char('p') => self.dispatch_current(self.tasks.cycle_selected_priority()),
            KeyCode::Char('d') | KeyCode::Delete => {
                self.dispatch_current(self.tasks.delete_selected())
            }
            _ => {}
        }
    }

    fn form_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            let form = &mut self.tasks.form;
            match key.code {
                KeyCode::Char('p') => form.priority = form.priority.cycle(),
                KeyCode::Char('t') => form.status = form.status.cycle(),
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Tab => self.focus = DashboardFocus::List,
            KeyCode::Backspace => {
                self.tasks.form.title.pop();
            }
            KeyCode::Char(c) => self.tasks.form.title.push(c),
            KeyCode::Enter => {
                let intent = self.tasks.submit();
                self.dispatch_current(intent);
            }
            _ => {}
        }
    }

    fn logout(&mut self) {
        self.navigate(Page::Home);
        if let Some(session) = self.session().clear() {
            info!(user = %session.user_id, "signing out");
            let auth = Arc::clone(&self.auth);
            let tx = self.tx.clone();
            self.runtime.spawn(async move {
                let result = auth.sign_out(&session).await;
                let _ = tx.send(Message::SignedOut(result));
            });
        }
    }
}
