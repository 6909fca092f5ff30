use super::sync_ui::is_interactive;
use super::AppContext;
use crate::output::Output;
use crate::ConfigCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use serde_json::json;
use sheet_sync_config::env::{GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET, LASTFM_API_KEY};
use sheet_sync_config::{Config, EnvCredentials, PathManager};

pub fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show_config(output),
        ConfigCommands::Init { force } => init_config(force, output),
        ConfigCommands::Google { refresh_token } => configure_google(refresh_token, output),
    }
}

fn show_config(output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let credentials = ctx.credentials()?;
    let env = EnvCredentials::from_env();
    let config = &ctx.config;
    let refresh_token = credentials.get_google_refresh_token().map(|t| mask_string(t));
    let env_vars = [
        (LASTFM_API_KEY, env.lastfm_api_key.is_some()),
        (GOOGLE_CLIENT_ID, env.google_client_id.is_some()),
        (GOOGLE_CLIENT_SECRET, env.google_client_secret.is_some()),
    ];

    if !output.is_human() {
        let env_json: serde_json::Map<String, serde_json::Value> = env_vars
            .iter()
            .map(|(name, set)| (name.to_string(), json!(set)))
            .collect();
        output.json(&json!({
            "config_file": ctx.paths.config_file().display().to_string(),
            "config_file_exists": ctx.paths.config_file().exists(),
            "config": config,
            "google_refresh_token": refresh_token,
            "google_access_token_expires": credentials.get_google_token_expires(),
            "environment": env_json,
        }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    println!("{}", paths_table(&ctx.paths));
    if !ctx.paths.config_file().exists() {
        output.warn("No config.toml yet; defaults shown. Run 'sheetsync config init' to write one.");
    }
    println!();

    let mut lastfm = section_table("Last.fm");
    lastfm.add_row(vec!["Username".to_string(), or_unset(&config.lastfm.username)]);
    lastfm.add_row(vec!["Spreadsheet ID".to_string(), or_unset(&config.lastfm.spreadsheet_id)]);
    lastfm.add_row(vec!["Spreadsheet title".to_string(), config.lastfm.spreadsheet_title.clone()]);
    lastfm.add_row(vec!["Page size".to_string(), config.lastfm.page_size.to_string()]);
    println!("{}\n", lastfm);

    let mut youtube = section_table("YouTube");
    youtube.add_row(vec!["Spreadsheet ID".to_string(), or_unset(&config.youtube.spreadsheet_id)]);
    youtube.add_row(vec!["Spreadsheet title".to_string(), config.youtube.spreadsheet_title.clone()]);
    println!("{}\n", youtube);

    let mut retry = section_table("Retry");
    retry.add_row(vec!["Max attempts".to_string(), config.retry.max_attempts.to_string()]);
    retry.add_row(vec!["Base delay".to_string(), format!("{}s", config.retry.base_delay_secs)]);
    retry.add_row(vec!["Throttle".to_string(), format!("{}ms", config.retry.throttle_ms)]);
    retry.add_row(vec!["HTTP timeout".to_string(), format!("{}s", config.retry.http_timeout_secs)]);
    println!("{}\n", retry);

    let mut secrets = section_table("Credentials");
    secrets.add_row(vec![
        "Google refresh token".to_string(),
        refresh_token.unwrap_or_else(|| "<not set>".to_string()),
    ]);
    for (name, set) in env_vars {
        let marker = if set {
            "✓ set".green().to_string()
        } else {
            "✗ unset".red().to_string()
        };
        secrets.add_row(vec![format!("${}", name), marker]);
    }
    println!("{}", secrets);

    Ok(())
}

fn paths_table(paths: &PathManager) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("Config File").add_attribute(Attribute::Bold),
        Cell::new(paths.config_file().display().to_string()),
    ]);
    table.add_row(vec!["Credentials".to_string(), paths.credentials_file().display().to_string()]);
    table.add_row(vec!["State".to_string(), paths.state_dir().display().to_string()]);
    table.add_row(vec!["Logs".to_string(), paths.log_dir().display().to_string()]);
    table
}

fn section_table(title: &str) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec![Cell::new(title).fg(Color::Cyan).add_attribute(Attribute::Bold)]);
    table
}

fn init_config(force: bool, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config_file = paths.config_file();

    if config_file.exists() && !force {
        output.warn(format!(
            "Configuration already exists at {}. Use --force to overwrite it.",
            config_file.display()
        ));
        return Ok(());
    }

    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create configuration directories: {}", e))?;
    Config::default()
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to save config to {}: {}", config_file.display(), e))?;

    output.success(format!("Wrote default configuration to {}", config_file.display()));
    output.info("Set lastfm.username before syncing Last.fm scrobbles.");
    Ok(())
}

fn configure_google(refresh_token: Option<String>, output: &Output) -> Result<()> {
    let token = match refresh_token {
        Some(token) => token,
        None if is_interactive() => dialoguer::Password::new()
            .with_prompt("Google OAuth refresh token")
            .interact()
            .map_err(|e| eyre!("Failed to read refresh token: {}", e))?,
        None => return Err(eyre!("No terminal to prompt on; pass --refresh-token <TOKEN>")),
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(eyre!("Refresh token cannot be empty"));
    }

    let ctx = AppContext::load()?;
    let mut credentials = ctx.credentials()?;
    credentials.set_google_refresh_token(token);
    credentials
        .save()
        .map_err(|e| eyre!("Failed to save credentials: {}", e))?;

    output.success(format!(
        "Google refresh token saved to {}",
        ctx.paths.credentials_file().display()
    ));
    Ok(())
}

fn or_unset(value: &str) -> String {
    if value.trim().is_empty() {
        "<not set>".to_string()
    } else {
        value.to_string()
    }
}

/// First and last two characters, the rest hidden
fn mask_string(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.is_empty() {
        return "<not set>".to_string();
    }
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_string() {
        assert_eq!(mask_string("1//0gAbcdefXYZ"), "1/***YZ");
        assert_eq!(mask_string("abc"), "***");
        assert_eq!(mask_string(""), "<not set>");
    }

    #[test]
    fn test_or_unset() {
        assert_eq!(or_unset("  "), "<not set>");
        assert_eq!(or_unset("someone"), "someone");
    }
}
