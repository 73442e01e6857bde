use colored::Colorize;

use ragchat::auth::{self, AuthStore, KeySource};
use ragchat::error::{ChatError, Result};

pub fn cmd_auth_set_key(key: Option<String>) -> Result<()> {
    use dialoguer::Password;

    let key = match key {
        Some(k) => k,
        None => Password::new()
            .with_prompt("Enter Gemini API key")
            .interact()
            .map_err(|e| ChatError::Auth(format!("Input cancelled: {}", e)))?,
    };

    let mut store = AuthStore::load()?;
    store.set_key(&key)?;
    store.save()?;

    println!(
        "{} API key successfully saved. Your session is now active.",
        "Done!".green().bold()
    );
    Ok(())
}

pub fn cmd_auth_status(explicit: Option<&str>) -> Result<()> {
    match auth::resolve_api_key(explicit)? {
        Some((key, source)) => {
            let from = match source {
                KeySource::Explicit => "--api-key flag".to_string(),
                KeySource::Env => format!("{} environment variable", auth::API_KEY_ENV),
                KeySource::Stored => AuthStore::path()?.display().to_string(),
            };
            println!("{} {} (from {})", "Key:".cyan(), auth::mask_key(&key), from);
        }
        None => {
            println!(
                "{} No API key configured. Run `ragchat auth set-key` or set {}.",
                "Note:".cyan(),
                auth::API_KEY_ENV
            );
        }
    }
    Ok(())
}

pub fn cmd_auth_logout() -> Result<()> {
    let mut store = AuthStore::load()?;
    if store.api_key.is_none() {
        println!("{}", "No stored API key.".yellow());
        return Ok(());
    }
    store.clear();
    store.save()?;
    println!("{} Removed stored API key.", "Done!".green().bold());
    Ok(())
}
