// src/cli/account.rs — login / register / logout

use crate::auth::client::{AuthClient, LOGIN_SUCCESSFUL};
use crate::auth::LocalStore;
use crate::infra::config::Config;

fn prompt_text(label: &str) -> anyhow::Result<String> {
    match inquire::Text::new(label).prompt_skippable()? {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => anyhow::bail!("{} is required", label.trim_end_matches(':')),
    }
}

fn prompt_password(label: &str) -> anyhow::Result<String> {
    match inquire::Password::new(label)
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt_skippable()?
    {
        Some(value) if !value.is_empty() => Ok(value),
        _ => anyhow::bail!("{} is required", label.trim_end_matches(':')),
    }
}

pub async fn run_login(config: &Config, email: Option<String>) -> anyhow::Result<()> {
    let email = match email {
        Some(e) => e,
        None => prompt_text("Email:")?,
    };
    let password = prompt_password("Password:")?;

    let store = LocalStore::open_default()?;
    let client = AuthClient::new(config.auth.clone());
    client.login_and_store(&store, &email, &password).await?;
    eprintln!("{LOGIN_SUCCESSFUL}");
    Ok(())
}

pub async fn run_register(config: &Config) -> anyhow::Result<()> {
    let name = prompt_text("Name:")?;
    let email = prompt_text("Email:")?;
    let password = prompt_password("Password:")?;
    let confirm = prompt_password("Confirm password:")?;

    let client = AuthClient::new(config.auth.clone());
    let message = client.register(&name, &email, &password, &confirm).await?;
    eprintln!("{message}");
    eprintln!("Run `avatar-studio login` to sign in.");
    Ok(())
}

pub fn run_logout() -> anyhow::Result<()> {
    let store = LocalStore::open_default()?;
    store.clear_token()?;
    eprintln!("Logged out.");
    Ok(())
}
