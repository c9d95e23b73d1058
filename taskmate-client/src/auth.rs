//! Auth Flow Controller: login, registration, logout and start-up restore.
//!
//! States: `Anonymous -> Submitting -> {Authenticated | Failed}`.

use taskmate_core::RegisterForm;

use crate::api::{ApiClient, RegisteredUser};
use crate::error::ApiError;
use crate::session::{Profile, SessionStore};
use crate::transport::{HttpTransport, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub token: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Submitting,
    Authenticated(Authenticated),
    Failed(String),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            AuthState::Authenticated(a) => Some(&a.profile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub profile: Profile,
    /// Where the user was heading before being asked to log in.
    pub redirect_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Account created; the caller should send the user to login.
    RedirectToLogin(RegisteredUser),
}

pub struct AuthFlow<T: Transport = HttpTransport> {
    api: ApiClient<T>,
    state: AuthState,
}

impl<T: Transport> AuthFlow<T> {
    pub fn new(api: ApiClient<T>) -> Self {
        Self {
            api,
            state: AuthState::Anonymous,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn session(&self) -> &SessionStore {
        self.api.session()
    }

    pub fn api(&self) -> &ApiClient<T> {
        &self.api
    }

    /// On failure the Session Store is left exactly as it was.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginSuccess, ApiError> {
        if email.trim().is_empty() {
            return Err(ApiError::Validation("email is required".to_string()));
        }
        if password.is_empty() {
            return Err(ApiError::Validation("password is required".to_string()));
        }

        self.state = AuthState::Submitting;
        match self.try_login(email, password).await {
            Ok((auth, redirect_to)) => {
                let profile = auth.profile.clone();
                tracing::info!(email = %profile.email, "logged in");
                self.state = AuthState::Authenticated(auth);
                Ok(LoginSuccess {
                    profile,
                    redirect_to,
                })
            }
            Err(e) => {
                tracing::warn!("login failed: {e}");
                self.state = AuthState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn try_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Authenticated, Option<String>), ApiError> {
        let token = self.api.login(email, password).await?;
        let profile = self.api.profile_with(&token).await?;
        let redirect_to = self.session().establish(&token, &profile)?;
        Ok((Authenticated { token, profile }, redirect_to))
    }

    /// On success the form is cleared; on failure it is kept for another try.
    pub async fn register(&mut self, form: &mut RegisterForm) -> Result<RegisterOutcome, ApiError> {
        form.validate()?;
        let user = self.api.register(form).await.inspect_err(|e| {
            tracing::warn!("registration failed: {e}");
        })?;
        tracing::info!(email = %form.email, "registered");
        form.clear();
        Ok(RegisterOutcome::RedirectToLogin(user))
    }

    pub fn logout(&mut self) -> Result<(), ApiError> {
        self.state = AuthState::Anonymous;
        self.session().clear()
    }

    /// Drop to `Anonymous` when the Session Store no longer holds the token
    /// this flow signed in with, e.g. after a task request was answered with
    /// 401 and the collection tore the session down.
    pub fn revalidate(&mut self) -> Result<&AuthState, ApiError> {
        if let AuthState::Authenticated(a) = &self.state {
            if self.session().current()?.as_deref() != Some(a.token.as_str()) {
                tracing::info!(email = %a.profile.email, "session ended");
                self.state = AuthState::Anonymous;
            }
        }
        Ok(&self.state)
    }

    /// Start-up check: a stored, unexpired token is confirmed by fetching the
    /// profile. If that fails for any reason the session is torn down.
    pub async fn restore(&mut self) -> Result<&AuthState, ApiError> {
        let Some(token) = self.session().current()? else {
            self.state = AuthState::Anonymous;
            return Ok(&self.state);
        };

        match self.api.profile_with(&token).await {
            Ok(profile) => {
                self.session().save_profile(&profile)?;
                self.state = AuthState::Authenticated(Authenticated { token, profile });
            }
            Err(e) => {
                tracing::warn!("stored session rejected, logging out: {e}");
                self.logout()?;
            }
        }
        Ok(&self.state)
    }
}
