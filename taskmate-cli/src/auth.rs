use anyhow::{Context, Result, bail};
use std::io::{self, Write};

use taskmate_client::{AuthFlow, AuthState, Profile, RegisterOutcome};
use taskmate_core::RegisterForm;

fn prompt_secret(label: &str) -> Result<String> {
    // Plain stdin; the terminal will echo.
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim_end_matches(['\r', '\n']).to_string())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => prompt_secret("Password"),
    }
}

pub async fn register(
    flow: &mut AuthFlow,
    name: String,
    email: String,
    password: Option<String>,
) -> Result<()> {
    let password = password_or_prompt(password)?;
    let mut form = RegisterForm::new(name, email.clone(), password);

    match flow.register(&mut form).await {
        Ok(RegisterOutcome::RedirectToLogin(_)) => {
            println!("Registration successful! Please log in:");
            println!("  taskmate login --email {email}");
            Ok(())
        }
        Err(e) => bail!("Registration failed: {e}"),
    }
}

pub async fn login(flow: &mut AuthFlow, email: String, password: Option<String>) -> Result<()> {
    let password = password_or_prompt(password)?;
    let ok = flow
        .login(&email, &password)
        .await
        .context("Login failed")?;

    println!("Welcome back, {}!", ok.profile.name);
    if let Some(next) = ok.redirect_to {
        println!("Continue with: taskmate {next}");
    }
    Ok(())
}

pub fn logout(flow: &mut AuthFlow) -> Result<()> {
    flow.logout().context("clear session")?;
    println!("Logged out.");
    Ok(())
}

pub async fn whoami(flow: &mut AuthFlow) -> Result<()> {
    let profile = require_login(flow, "whoami").await?;
    println!("{} <{}>", profile.name, profile.email);
    Ok(())
}

/// Start-up restore for protected commands. When signed out, remembers
/// `destination` so login can point back to it.
pub async fn require_login(flow: &mut AuthFlow, destination: &str) -> Result<Profile> {
    let state = flow.restore().await.context("restore session")?;
    if let AuthState::Authenticated(a) = state {
        return Ok(a.profile.clone());
    }
    flow.session()
        .set_return_to(destination)
        .context("remember destination")?;
    bail!("Not logged in (or the session expired). Run: taskmate login --email <you@example.com>")
}
