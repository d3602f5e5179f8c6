// UI layer: logs in once, then offers a `dialoguer` select loop over the
// cloud operations. Each handler prompts for its paths, runs the call and
// prints the outcome; a failed operation is reported and the loop goes on.

use crate::client::CloudClient;
use crate::config::{Config, Credentials};
use crate::transport::HttpTransport;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

const LOGIN_FILE: &str = ".cloudmail_login";

type Client = CloudClient<HttpTransport>;

/// Log in, then run the operation menu until the user picks "Exit".
pub fn main_menu(config: Config) -> Result<()> {
    let mut client = login(&config)?;
    let items = vec![
        "List folder",
        "Create folder",
        "Upload file",
        "Download file",
        "Move",
        "Copy",
        "Rename",
        "Delete",
        "Public link",
        "Refresh token",
        "Exit",
    ];

    loop {
        let selection = Select::new().items(&items).default(0).interact()?;
        let outcome = match selection {
            0 => handle_list(&client),
            1 => handle_create_folder(&client),
            2 => handle_upload(&client),
            3 => handle_download(&client),
            4 => handle_move(&client, false),
            5 => handle_move(&client, true),
            6 => handle_rename(&client),
            7 => handle_delete(&client),
            8 => handle_link(&client),
            9 => client
                .refresh_token()
                .map(|_| println!("Token refreshed."))
                .context("Token refresh failed"),
            _ => break,
        };
        if let Err(e) = outcome {
            println!("{:#}", e);
        }
    }
    Ok(())
}

/// Collect whatever credentials the environment did not provide and open
/// a session. The login name is remembered for the next run.
fn login(config: &Config) -> Result<Client> {
    let credentials = match config.credentials() {
        Some(credentials) => credentials,
        None => {
            let mut input = Input::<String>::new();
            input.with_prompt("Login");
            if let Some(login) = config.login.clone().or_else(|| load_login().ok()) {
                input.default(login);
            }
            let login = input.interact_text()?;
            let password = match &config.password {
                Some(password) => password.clone(),
                None => Password::new().with_prompt("Password").interact()?,
            };
            Credentials::new(login, password, config.domain.clone())
        }
    };

    let spinner = spinner("Logging in...")?;
    let transport = HttpTransport::new().context("Failed to build HTTP client")?;
    let client = CloudClient::connect(transport, config.endpoints.clone(), credentials.clone());
    spinner.finish_and_clear();
    let client = client.context("Login failed")?;

    if let Some(email) = client.session().account_email() {
        println!("Welcome {}!", email);
    }
    if let Err(e) = persist_login(&credentials.login) {
        log::warn!("could not remember login: {}", e);
    }
    Ok(client)
}

fn handle_list(client: &Client) -> Result<()> {
    let path = prompt_path("Folder", Some("/"))?;
    let listing = client.list_folder(&path).context("Listing failed")?;
    print_listing(&listing);
    Ok(())
}

fn handle_create_folder(client: &Client) -> Result<()> {
    let path = prompt_path("New folder path", None)?;
    let res = client.create_folder(&path).context("Create folder failed")?;
    print_result(&res);
    Ok(())
}

fn handle_upload(client: &Client) -> Result<()> {
    let local: String = Input::new().with_prompt("Local file").interact_text()?;
    let local = PathBuf::from(local);
    let remote = prompt_path("Remote folder or file path (ending in / keeps the name)", Some("/"))?;

    let spinner = spinner("Uploading...")?;
    let res = if remote.ends_with('/') {
        client.upload_to_folder(&local, &remote)
    } else {
        client.upload(&local, &remote)
    };
    spinner.finish_and_clear();
    print_result(&res.context("Upload failed")?);
    Ok(())
}

fn handle_download(client: &Client) -> Result<()> {
    let remote = prompt_path("Remote file", None)?;
    let default_name = default_save_name(&remote);
    let default_target = dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(default_name);
    let target: String = Input::new()
        .with_prompt("Save as")
        .default(default_target.display().to_string())
        .interact_text()?;
    let target = PathBuf::from(target);

    let spinner = spinner("Downloading...")?;
    let res = client.download(&remote, &target);
    spinner.finish_and_clear();
    if let Err(e) = res {
        // A failed download may leave a partial file behind.
        let _ = std::fs::remove_file(&target);
        return Err(e).context("Download failed");
    }
    println!("Saved to {}", target.display());
    Ok(())
}

fn handle_move(client: &Client, copy: bool) -> Result<()> {
    let path = prompt_path("Source path", None)?;
    let folder = prompt_path("Destination folder", None)?;
    let res = if copy {
        client.copy_file(&path, &folder).context("Copy failed")?
    } else {
        client.move_file(&path, &folder).context("Move failed")?
    };
    print_result(&res);
    Ok(())
}

fn handle_rename(client: &Client) -> Result<()> {
    let path = prompt_path("Path", None)?;
    let name: String = Input::new().with_prompt("New name").interact_text()?;
    let res = client.rename(&path, &name).context("Rename failed")?;
    print_result(&res);
    Ok(())
}

fn handle_delete(client: &Client) -> Result<()> {
    let path = prompt_path("Path to delete", None)?;
    if !Confirm::new()
        .with_prompt(format!("Delete {}?", path))
        .interact()?
    {
        return Ok(());
    }
    let res = client.delete(&path).context("Delete failed")?;
    print_result(&res);
    Ok(())
}

fn handle_link(client: &Client) -> Result<()> {
    let path = prompt_path("Path to publish", None)?;
    let link = client.get_link(&path).context("Publishing failed")?;
    println!("{}", link);
    Ok(())
}

/// Last path segment of `remote`, or "download" when it has none.
fn default_save_name(remote: &str) -> &str {
    match remote.trim_end_matches('/').rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => "download",
    }
}

fn prompt_path(prompt: &str, default: Option<&str>) -> Result<String> {
    let mut input = Input::<String>::new();
    input.with_prompt(prompt);
    if let Some(default) = default {
        input.default(default.to_string());
    }
    Ok(input.interact_text()?)
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

/// Print the entries of a `/folder` response, or the raw JSON when it does
/// not look like one.
fn print_listing(listing: &Value) {
    let entries = match listing.pointer("/body/list").and_then(Value::as_array) {
        Some(entries) => entries,
        None => return print_result(listing),
    };
    if entries.is_empty() {
        println!("(empty)");
    }
    for entry in entries {
        let name = entry.get("name").and_then(Value::as_str).unwrap_or("?");
        let is_folder = entry.get("type").and_then(Value::as_str) == Some("folder");
        if is_folder {
            println!("{}/", name);
        } else {
            let size = entry.get("size").and_then(Value::as_u64).unwrap_or(0);
            println!("{}  ({} bytes)", name, size);
        }
    }
}

fn print_result(res: &Value) {
    match serde_json::to_string_pretty(res) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", res),
    }
}

/// Remember the login name in the user's home directory.
fn persist_login(login: &str) -> Result<()> {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    std::fs::write(dir.join(LOGIN_FILE), login)?;
    Ok(())
}

/// Load the login name saved by a previous run.
fn load_login() -> Result<String> {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let data = std::fs::read_to_string(dir.join(LOGIN_FILE))?;
    Ok(data.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_name_is_last_segment() {
        assert_eq!(default_save_name("/docs/a.txt"), "a.txt");
        assert_eq!(default_save_name("a.txt"), "a.txt");
    }

    #[test]
    fn save_name_never_empty() {
        assert_eq!(default_save_name("/docs/"), "docs");
        assert_eq!(default_save_name("/"), "download");
        assert_eq!(default_save_name(""), "download");
    }
}
