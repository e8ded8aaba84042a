use async_trait::async_trait;
use tracing::{debug, info};

use crate::fetch::browser::js_string;
use crate::fetch::PageHandle;
use crate::settings::Credentials;
use crate::utils::error::{AppError, Result};

const LOGIN_URL: &str = "https://m.facebook.com";
const EMAIL_SELECTOR: &str = "#m_login_email";
const PASSWORD_SELECTOR: &str = "#m_login_password";
const LOGIN_BUTTON_SELECTOR: &str = "._56bu";
const INTERSTITIAL_SELECTOR: &str = "#_56bw";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    /// Terminal within a run. The caller decides whether to retry the whole
    /// scrape; the session never retries internally.
    Failed,
}

/// What the login flow needs from a page, separated out so the state machine
/// is testable without a browser.
#[async_trait]
pub trait LoginSurface: Send {
    async fn open_login(&mut self) -> Result<()>;
    async fn submit_credentials(&mut self, identity: &str, secret: &str) -> Result<()>;
    /// Best-effort: returns whether an interstitial dialog was dismissed.
    async fn dismiss_interstitial(&mut self) -> bool;
    async fn login_form_present(&mut self) -> bool;
}

/// One authenticated browsing session, created lazily and reused for every
/// feed source within a single run. Credentials arrive decrypted from the
/// settings collaborator and are never persisted here.
pub struct FeedSession {
    credentials: Credentials,
    state: SessionState,
}

impl FeedSession {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Log in once; subsequent calls on an authenticated session return
    /// immediately without touching the page.
    pub async fn login(&mut self, surface: &mut dyn LoginSurface) -> Result<()> {
        match self.state {
            SessionState::Authenticated => {
                debug!("Already logged in, reusing session");
                return Ok(());
            }
            SessionState::Failed => {
                return Err(AppError::Login(
                    "previous login attempt failed for this run".to_string(),
                ));
            }
            _ => {}
        }

        self.state = SessionState::Authenticating;
        match self.attempt(surface).await {
            Ok(()) => {
                info!("Feed login succeeded");
                self.state = SessionState::Authenticated;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn attempt(&self, surface: &mut dyn LoginSurface) -> Result<()> {
        surface.open_login().await?;
        surface
            .submit_credentials(&self.credentials.identity, &self.credentials.secret)
            .await?;

        if surface.dismiss_interstitial().await {
            debug!("Dismissed post-login dialog");
        }

        // Success is verified by the login form being gone, not by any
        // positive marker: the logged-in DOM varies too much to pin down.
        if surface.login_form_present().await {
            return Err(AppError::Login(
                "login form still present after submit".to_string(),
            ));
        }

        Ok(())
    }
}

/// Login surface over the mobile site in a real tab.
pub struct MobileLoginSurface<'a> {
    page: &'a PageHandle,
}

impl<'a> MobileLoginSurface<'a> {
    pub fn new(page: &'a PageHandle) -> Self {
        Self { page }
    }

    fn fill_input_js(selector: &str, value: &str) -> String {
        format!(
            r#"(() => {{
                const el = document.querySelector('{selector}');
                if (!el) return false;
                el.value = '{value}';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            selector = js_string(selector),
            value = js_string(value),
        )
    }
}

#[async_trait]
impl LoginSurface for MobileLoginSurface<'_> {
    async fn open_login(&mut self) -> Result<()> {
        self.page.goto(LOGIN_URL).await
    }

    async fn submit_credentials(&mut self, identity: &str, secret: &str) -> Result<()> {
        if !self.page.wait_for(EMAIL_SELECTOR) {
            return Err(AppError::Login("email input not found".to_string()));
        }
        if !self
            .page
            .eval_bool(&Self::fill_input_js(EMAIL_SELECTOR, identity))
        {
            return Err(AppError::Login("could not fill email input".to_string()));
        }

        if !self.page.wait_for(PASSWORD_SELECTOR) {
            return Err(AppError::Login("password input not found".to_string()));
        }
        if !self
            .page
            .eval_bool(&Self::fill_input_js(PASSWORD_SELECTOR, secret))
        {
            return Err(AppError::Login("could not fill password input".to_string()));
        }

        if !self.page.wait_for(LOGIN_BUTTON_SELECTOR) || !self.page.try_click(LOGIN_BUTTON_SELECTOR)
        {
            return Err(AppError::Login("login button not found".to_string()));
        }

        // Post-login navigation signal: give the redirect time to land.
        self.page.settle().await;
        Ok(())
    }

    async fn dismiss_interstitial(&mut self) -> bool {
        self.page.try_click(INTERSTITIAL_SELECTOR)
    }

    async fn login_form_present(&mut self) -> bool {
        self.page.eval_bool(&format!(
            "document.querySelector('{}') !== null",
            js_string(EMAIL_SELECTOR)
        ))
    }
}
