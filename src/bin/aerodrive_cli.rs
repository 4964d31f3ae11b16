//! AeroDrive CLI — explore the AeroDrive file server from the terminal
//!
//! Usage:
//!   aerodrive-cli ls [path]                 List files
//!   aerodrive-cli get <name> [-o local]     Download a file
//!   aerodrive-cli cp <path> <target>        Server-side copy into a folder
//!   aerodrive-cli mv <path> <target>        Server-side move into a folder
//!   aerodrive-cli rename <path> <new-name>  Rename a file or folder
//!   aerodrive-cli rm <path>                 Delete a file or folder
//!   aerodrive-cli mkdir <name> [--parent p] Create a folder
//!   aerodrive-cli status                    Check backend connectivity
//!   aerodrive-cli config set-url <url>      Override the backend URL

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use aerodrive::api::{format_size, ApiClient, FileEntry};
use aerodrive::config::{Prefs, TransportMode};
use aerodrive::explorer::{ConnectivityError, Explorer, Notifier};
use aerodrive::nav::Filter;

#[derive(Parser)]
#[command(
    name = "aerodrive-cli",
    about = "AeroDrive CLI — remote file explorer client",
    version,
    long_about = "Lists, copies, moves, renames, deletes and downloads files served by an \
                  AeroDrive backend. The backend URL is resolved from the persisted override, \
                  the AERODRIVE_API_URL environment variable, then http://localhost:8000."
)]
struct Cli {
    /// Verbose logging (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List files at a backend path
    Ls {
        /// Backend path (default: /)
        #[arg(default_value = "/")]
        path: String,
        /// Category filter: all, document, photo, video, audio, voice
        #[arg(long, default_value = "all")]
        filter: String,
        /// Case-insensitive substring search on names
        #[arg(long)]
        search: Option<String>,
    },
    /// Download a file by display name
    Get {
        name: String,
        /// Local destination (default: the file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch a thumbnail preview by id
    Thumb {
        thumbnail_id: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Server-side copy of a file into a target folder
    Cp {
        /// Source, e.g. /Images/cat.png
        path: String,
        /// Target backend folder, e.g. /Archive
        target: String,
    },
    /// Server-side move of a file into a target folder
    Mv {
        path: String,
        target: String,
    },
    /// Rename a file or folder
    Rename {
        path: String,
        new_name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete a file or folder
    Rm {
        path: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Create a folder
    Mkdir {
        name: String,
        /// Backend folder to create it in
        #[arg(long, default_value = "/")]
        parent: String,
    },
    /// Log in with username and password
    Login {
        username: String,
        /// Password; read from stdin when omitted
        password: Option<String>,
    },
    /// Log in with a Google identity token
    LoginGoogle { token: String },
    /// End the backend session
    Logout,
    /// Show the authenticated user
    Whoami,
    /// Check backend connectivity
    Status,
    /// Show or change client configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration
    Show,
    /// Set the backend base URL override
    SetUrl { url: String },
    /// Remove the override and return to the default
    ResetUrl,
    /// Auth transport: "cookie" (browser sessions) or "token" (X-Auth-Token)
    SetTransport { mode: String },
}

/// Notifier that prints where a GUI would toast.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn success(&mut self, message: &str) {
        println!("{}", message);
    }
    fn error(&mut self, message: &str) {
        eprintln!("error: {}", message);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let prefs = Prefs::load();

    match cli.command {
        Commands::Config { action } => run_config(prefs, action),
        Commands::Status => run_status(prefs).await,
        Commands::Login { username, password } => run_login(prefs, &username, password).await,
        Commands::LoginGoogle { token } => run_login_google(prefs, &token).await,
        Commands::Logout => {
            let client = client_for(&prefs)?;
            client.logout().await.context("logout failed")?;
            let mut prefs = prefs;
            prefs.auth_token = None;
            prefs.username = None;
            save_prefs(&mut prefs)?;
            println!("Logged out.");
            Ok(())
        }
        Commands::Whoami => {
            let client = client_for(&prefs)?;
            let status = client.check_auth().await.context("auth check failed")?;
            if status.authenticated {
                println!("{}", status.username.as_deref().unwrap_or("(unnamed user)"));
            } else {
                println!("not authenticated");
            }
            Ok(())
        }
        Commands::Ls {
            path,
            filter,
            search,
        } => run_ls(prefs, &path, &filter, search.as_deref()).await,
        Commands::Get { name, output } => run_get(prefs, &name, output).await,
        Commands::Thumb {
            thumbnail_id,
            output,
        } => run_thumb(prefs, &thumbnail_id, &output).await,
        Commands::Cp { path, target } => run_cp(prefs, &path, &target).await,
        Commands::Mv { path, target } => run_mv(prefs, &path, &target).await,
        Commands::Rename {
            path,
            new_name,
            yes,
        } => run_rename(prefs, &path, &new_name, yes).await,
        Commands::Rm { path, yes } => run_rm(prefs, &path, yes).await,
        Commands::Mkdir { name, parent } => run_mkdir(prefs, &name, &parent).await,
    }
}

// ─── Construction helpers ────────────────────────────────────────────────

fn client_for(prefs: &Prefs) -> Result<Arc<ApiClient>> {
    Ok(Arc::new(ApiClient::new(prefs)?))
}

fn explorer_for(prefs: Prefs) -> Result<Explorer<ApiClient>> {
    let client = client_for(&prefs)?;
    Ok(Explorer::new(client, prefs, Box::new(ConsoleNotifier)))
}

fn save_prefs(prefs: &mut Prefs) -> Result<()> {
    prefs.save().map_err(|e| anyhow::anyhow!(e))
}

/// Split "/Images/cat.png" into ("/Images", "cat.png").
fn split_parent(path: &str) -> Result<(String, String)> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "/" {
        bail!("'{}' does not name a file or folder", path);
    }
    let without_lead = trimmed.trim_start_matches('/');
    match without_lead.rfind('/') {
        Some(pos) => Ok((
            format!("/{}", &without_lead[..pos]),
            without_lead[pos + 1..].to_string(),
        )),
        None => Ok(("/".to_string(), without_lead.to_string())),
    }
}

/// Jump the explorer to `parent` and resolve `name` against the backend
/// listing there.
async fn resolve_entry(
    explorer: &mut Explorer<ApiClient>,
    parent: &str,
    name: &str,
) -> Result<FileEntry> {
    explorer.jump_to(parent);
    connectivity_guard(explorer.bootstrap().await)?;
    explorer
        .find_entry(name)
        .await
        .with_context(|| format!("'{}' not found in {}", name, parent))
}

/// Turn a connectivity failure into the recovery affordance text.
fn connectivity_guard<T>(result: std::result::Result<T, ConnectivityError>) -> Result<T> {
    result.map_err(|e| {
        anyhow::anyhow!(
            "{}\n\nThe backend may be down or the URL misconfigured. You can:\n  \
             aerodrive-cli config set-url <url>   reconfigure the backend\n  \
             aerodrive-cli config reset-url       restore the default\n  \
             retry the command once the backend is reachable",
            e
        )
    })
}

fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    eprint!("{} [y/N] ", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

// ─── Commands ────────────────────────────────────────────────────────────

fn run_config(mut prefs: Prefs, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("resolved URL : {}", prefs.resolve_base_url());
            println!(
                "override     : {}",
                prefs.server_url.as_deref().unwrap_or("(none)")
            );
            println!("transport    : {:?}", prefs.transport);
            println!(
                "user         : {}",
                prefs.username.as_deref().unwrap_or("(not logged in)")
            );
            println!(
                "last path    : {}",
                prefs.last_path.as_deref().unwrap_or("/")
            );
        }
        ConfigAction::SetUrl { url } => {
            prefs.set_server_url(Some(url.clone()))?;
            save_prefs(&mut prefs)?;
            println!("Backend URL set to {}", url);
        }
        ConfigAction::ResetUrl => {
            prefs.server_url = None;
            save_prefs(&mut prefs)?;
            println!("Backend URL reset to default ({})", prefs.resolve_base_url());
        }
        ConfigAction::SetTransport { mode } => {
            prefs.transport = match mode.as_str() {
                "cookie" => TransportMode::CookieSession,
                "token" => TransportMode::TokenHeader,
                other => bail!("unknown transport '{}', expected cookie or token", other),
            };
            save_prefs(&mut prefs)?;
            println!("Transport set to {:?}", prefs.transport);
        }
    }
    Ok(())
}

async fn run_status(prefs: Prefs) -> Result<()> {
    let base = prefs.resolve_base_url();
    let client = client_for(&prefs)?;
    print!("backend {} ... ", base);
    io::stdout().flush()?;
    match client.health_check().await {
        Ok(true) => println!("reachable"),
        Ok(false) => println!("responding, but health check failed"),
        Err(e) => {
            println!("unreachable");
            return connectivity_guard(Err(ConnectivityError {
                base_url: base,
                error: e,
            }));
        }
    }
    match client.check_auth().await {
        Ok(status) if status.authenticated => {
            println!(
                "authenticated as {}",
                status.username.as_deref().unwrap_or("(unnamed user)")
            );
        }
        Ok(_) => println!("not authenticated"),
        Err(e) => println!("auth check failed: {}", e),
    }
    Ok(())
}

async fn run_login(mut prefs: Prefs, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => {
            eprint!("password: ");
            io::stderr().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    let client = client_for(&prefs)?;
    let status = client.login(username, &password).await.context("login failed")?;
    if !status.authenticated && status.auth_token.is_none() {
        bail!("backend rejected the credentials");
    }
    prefs.username = status.username.clone().or_else(|| Some(username.to_string()));
    if prefs.transport == TransportMode::TokenHeader {
        prefs.auth_token = client.auth_token();
    }
    save_prefs(&mut prefs)?;
    println!(
        "Logged in as {}",
        prefs.username.as_deref().unwrap_or(username)
    );
    Ok(())
}

async fn run_login_google(mut prefs: Prefs, token: &str) -> Result<()> {
    let client = client_for(&prefs)?;
    let status = client.login_google(token).await.context("login failed")?;
    prefs.username = status.username.clone();
    if prefs.transport == TransportMode::TokenHeader {
        prefs.auth_token = client.auth_token();
    }
    save_prefs(&mut prefs)?;
    println!(
        "Logged in as {}",
        prefs.username.as_deref().unwrap_or("(unnamed user)")
    );
    Ok(())
}

async fn run_ls(prefs: Prefs, path: &str, filter: &str, search: Option<&str>) -> Result<()> {
    let filter = Filter::from_keyword(filter)
        .with_context(|| format!("unknown filter '{}'", filter))?;
    let mut explorer = explorer_for(prefs)?;
    explorer.jump_to(path);
    connectivity_guard(explorer.bootstrap().await)?;
    // A category filter replaces the path with the virtual folder, exactly
    // like clicking the sidebar; "all" leaves the requested path alone.
    if filter != Filter::All {
        explorer.set_filter(filter);
    }
    if let Some(query) = search {
        explorer.set_search_query(query);
    }

    let view = explorer.view().await;
    if view.entries.is_empty() {
        println!("(empty)");
    }
    for entry in &view.entries {
        let size = if entry.is_folder() {
            "-".to_string()
        } else {
            format_size(entry.size_mb)
        };
        println!("{}  {:<40} {:>10}  {}", entry.icon(), entry.name, size, entry.category);
    }
    println!(
        "\n{} items, {} total",
        view.stats.all,
        format_size(view.stats.total_size_mb)
    );
    Ok(())
}

async fn run_get(prefs: Prefs, name: &str, output: Option<PathBuf>) -> Result<()> {
    let mut explorer = explorer_for(prefs)?;
    let dest = output.unwrap_or_else(|| PathBuf::from(name));

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} {bytes_per_sec}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let bar_handle = bar.clone();
    let progress = Box::new(move |done: u64, total: u64| {
        if total > 0 && bar_handle.length() != Some(total) {
            bar_handle.set_length(total);
        }
        bar_handle.set_position(done);
    });

    explorer
        .download(name, &dest, Some(progress))
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    bar.finish_and_clear();
    Ok(())
}

async fn run_thumb(prefs: Prefs, thumbnail_id: &str, output: &PathBuf) -> Result<()> {
    let mut explorer = explorer_for(prefs)?;
    let bytes = explorer
        .thumbnail(thumbnail_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    std::fs::write(output, &bytes)
        .with_context(|| format!("cannot write {:?}", output))?;
    println!("Wrote {} bytes to {:?}", bytes.len(), output);
    Ok(())
}

async fn run_cp(prefs: Prefs, path: &str, target: &str) -> Result<()> {
    let (parent, name) = split_parent(path)?;
    let mut explorer = explorer_for(prefs)?;
    let entry = resolve_entry(&mut explorer, &parent, &name).await?;

    // Server-side copy is clipboard semantics: capture at the source,
    // paste at the target.
    explorer.copy_entry(&entry);
    explorer.jump_to(target);
    explorer
        .paste()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    Ok(())
}

async fn run_mv(prefs: Prefs, path: &str, target: &str) -> Result<()> {
    let (parent, name) = split_parent(path)?;
    let mut explorer = explorer_for(prefs)?;
    let entry = resolve_entry(&mut explorer, &parent, &name).await?;

    let pending = explorer.request_move(&entry, target);
    explorer
        .confirm_move(pending)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    Ok(())
}

async fn run_rename(prefs: Prefs, path: &str, new_name: &str, yes: bool) -> Result<()> {
    let (parent, name) = split_parent(path)?;
    let mut explorer = explorer_for(prefs)?;
    let entry = resolve_entry(&mut explorer, &parent, &name).await?;

    let pending = explorer.request_rename(&entry);
    if !confirm(&format!("Rename \"{}\" to \"{}\"?", name, new_name), yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    explorer
        .confirm_rename(pending, new_name)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    Ok(())
}

async fn run_rm(prefs: Prefs, path: &str, yes: bool) -> Result<()> {
    let (parent, name) = split_parent(path)?;
    let mut explorer = explorer_for(prefs)?;
    let entry = resolve_entry(&mut explorer, &parent, &name).await?;

    let kind = if entry.is_folder() { "folder" } else { "file" };
    let pending = explorer.request_delete(&entry);
    if !confirm(&format!("Delete {} \"{}\"?", kind, name), yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    explorer
        .confirm_delete(pending)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    Ok(())
}

async fn run_mkdir(prefs: Prefs, name: &str, parent: &str) -> Result<()> {
    let mut explorer = explorer_for(prefs)?;
    explorer.jump_to(parent);
    connectivity_guard(explorer.bootstrap().await)?;

    let pending = explorer.request_new_folder();
    explorer
        .confirm_new_folder(pending, name)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    Ok(())
}
