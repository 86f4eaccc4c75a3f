//! storekeep - a command-line admin console for a commerce-catalog API.
//!
//! Signs in against the API, keeps the session on disk, and lists catalog
//! data through the authenticated client, falling back to the local cache
//! when the listings are fresh enough.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storekeep_core::auth::CredentialStore;
use storekeep_core::cache::CacheManager;
use storekeep_core::utils::{format_optional, truncate_string};
use storekeep_core::{ApiClient, Config, FileSessionStorage, SessionStore};

/// Initialize tracing: stderr plus a daily-rolled file under the cache dir.
/// The returned guard must stay alive for the file writer to flush.
fn init_tracing(log_dir: PathBuf) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "storekeep.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Use RUST_LOG to control the log level (e.g. RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    guard
}

fn print_usage() {
    eprintln!("Usage: storekeep <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  login [email]   Sign in (password from keychain or prompt)");
    eprintln!("  logout          Sign out and forget the session");
    eprintln!("  whoami          Show the signed-in account");
    eprintln!("  products        List products");
    eprintln!("  users           List user accounts");
    eprintln!("  categories      List categories");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --refresh       Bypass the local cache for listing commands");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load().context("Failed to load configuration")?;
    let log_dir = config.cache_dir()?.join("logs");
    let _guard = init_tracing(log_dir);

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let force_refresh = args.iter().any(|arg| arg == "--refresh");

    let session = Arc::new(SessionStore::load(Box::new(FileSessionStorage::new(
        config.session_path()?,
    ))));
    let client = ApiClient::new(&config, Arc::clone(&session))?;

    match command {
        "login" => {
            let email = args.get(2).filter(|arg| !arg.starts_with("--")).cloned();
            login(&mut config, &client, email).await
        }
        "logout" => logout(&client).await,
        "whoami" => whoami(&client).await,
        "products" => list_products(&client, &config, force_refresh).await,
        "users" => list_users(&client, &config, force_refresh).await,
        "categories" => list_categories(&client, &config, force_refresh).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(2);
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}

async fn login(config: &mut Config, client: &ApiClient, email_arg: Option<String>) -> Result<()> {
    let email = match email_arg.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("E-mail: ")?,
    };

    let (password, from_keychain) = match CredentialStore::get_password(&email) {
        Ok(password) => {
            info!(%email, "using stored credentials");
            (password, true)
        }
        Err(_) => (
            rpassword::prompt_password("Password: ").context("Failed to read password")?,
            false,
        ),
    };

    let user = match client.sign_in(&email, &password).await {
        Ok(user) => user,
        Err(err) if from_keychain => {
            // Stored password may be outdated; fall back to a prompt once.
            warn!(error = %err, "stored credentials rejected");
            let password =
                rpassword::prompt_password("Password: ").context("Failed to read password")?;
            let user = client
                .sign_in(&email, &password)
                .await
                .context("Sign-in failed")?;
            store_password(&email, &password);
            user
        }
        Err(err) => return Err(err).context("Sign-in failed"),
    };

    if !from_keychain {
        store_password(&email, &password);
    }

    config.last_email = Some(email);
    config.save().context("Failed to save configuration")?;

    println!("Signed in as {} <{}> ({})", user.name, user.email, user.role);
    Ok(())
}

fn store_password(email: &str, password: &str) {
    if let Err(err) = CredentialStore::store(email, password) {
        warn!(error = %err, "could not store password in keychain");
    }
}

async fn logout(client: &ApiClient) -> Result<()> {
    client.sign_out().await;
    println!("Signed out.");
    Ok(())
}

async fn whoami(client: &ApiClient) -> Result<()> {
    let snapshot = client.session().snapshot().await;
    if snapshot.tokens.is_none() {
        println!("Not signed in.");
        return Ok(());
    }

    let user = client
        .profile()
        .await
        .context("Failed to fetch profile - try `storekeep login`")?;
    println!("{} <{}> ({})", user.name, user.email, user.role);
    if let Some(login_at) = snapshot.login_at {
        println!("Signed in since {}", login_at.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

async fn list_products(client: &ApiClient, config: &Config, force_refresh: bool) -> Result<()> {
    let cache = CacheManager::new(config.cache_dir()?)?;

    if !force_refresh {
        if let Some(cached) = cache.load_products()? {
            if !cached.is_stale() {
                println!("Products (cached {}):", cached.age_display());
                for product in &cached.data {
                    print_product_row(product);
                }
                return Ok(());
            }
        }
    }

    let products = client.fetch_products().await?;
    if let Err(err) = cache.save_products(&products) {
        warn!(error = %err, "failed to cache products");
    }

    println!("Products ({}):", products.len());
    for product in &products {
        print_product_row(product);
    }
    Ok(())
}

fn print_product_row(product: &storekeep_core::models::Product) {
    println!(
        "  {:>5}  {:<40}  {:>8.2}  {}",
        product.id,
        truncate_string(&product.title, 40),
        product.price,
        product.category.name
    );
}

async fn list_users(client: &ApiClient, config: &Config, force_refresh: bool) -> Result<()> {
    let cache = CacheManager::new(config.cache_dir()?)?;

    if !force_refresh {
        if let Some(cached) = cache.load_users()? {
            if !cached.is_stale() {
                println!("Users (cached {}):", cached.age_display());
                for user in &cached.data {
                    print_user_row(user);
                }
                return Ok(());
            }
        }
    }

    let users = client.fetch_users().await?;
    if let Err(err) = cache.save_users(&users) {
        warn!(error = %err, "failed to cache users");
    }

    println!("Users ({}):", users.len());
    for user in &users {
        print_user_row(user);
    }
    Ok(())
}

fn print_user_row(user: &storekeep_core::models::ApiUser) {
    println!(
        "  {:>5}  {:<30}  {:<25}  {}",
        user.id,
        truncate_string(&user.name, 30),
        truncate_string(&user.email, 25),
        user.role
    );
}

async fn list_categories(client: &ApiClient, config: &Config, force_refresh: bool) -> Result<()> {
    let cache = CacheManager::new(config.cache_dir()?)?;

    if !force_refresh {
        if let Some(cached) = cache.load_categories()? {
            if !cached.is_stale() {
                println!("Categories (cached {}):", cached.age_display());
                for category in &cached.data {
                    print_category_row(category);
                }
                return Ok(());
            }
        }
    }

    let categories = client.fetch_categories().await?;
    if let Err(err) = cache.save_categories(&categories) {
        warn!(error = %err, "failed to cache categories");
    }

    println!("Categories ({}):", categories.len());
    for category in &categories {
        print_category_row(category);
    }
    Ok(())
}

fn print_category_row(category: &storekeep_core::models::Category) {
    println!(
        "  {:>5}  {:<30}  {}",
        category.id,
        truncate_string(&category.name, 30),
        format_optional(&category.slug, "-")
    );
}
