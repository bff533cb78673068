use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use catalog_manager::app::catalog_service::CatalogService;
use catalog_manager::app::media::MediaUploader;
use catalog_manager::app::ports::{
    CatalogApiPort, ListingPort, MediaHostPort, NameCheckPort, NotifierPort,
};
use catalog_manager::app::uniqueness::{DebouncedNameField, UniquenessValidator};
use catalog_manager::app::update::PendingDelete;
use catalog_manager::app::wizard::WizardController;
use catalog_manager::config::Config;
use catalog_manager::domain::{EntityFields, EntityId, EntityKind, MediaInput, Query, Specification};
use catalog_manager::infra::http_client::HttpCatalogClient;
use catalog_manager::infra::media_host::{DevMediaHost, HttpMediaHost};
use catalog_manager::infra::notifier::{LogNotifier, WebhookNotifier};
use catalog_manager::infra::session::StaticTokenSessions;
use catalog_manager::observability::{init_logging, metrics};
use catalog_manager::server::{start_server, AppState};
use catalog_manager::storage::InMemoryStorage;

#[derive(Parser)]
#[command(name = "catalog_manager")]
#[command(about = "Storefront and back-office catalog manager for products and services")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (default: catalog.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the catalog HTTP server
    Serve,
    /// Create an entity through all three wizard stages from a JSON manifest
    Create {
        /// products or services
        kind: String,
        /// Manifest with fields, media paths or URLs, specifications and queries
        manifest: PathBuf,
    },
    /// Check whether a name is already used within a kind
    CheckName {
        kind: String,
        name: String,
        /// Id of the entity being edited, so its own name does not count
        #[arg(long)]
        exclude_id: Option<String>,
    },
    /// List entities of a kind
    List { kind: String },
    /// Delete an entity (asks for confirmation unless --yes)
    Delete {
        kind: String,
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

/// Input for `create`: media entries are local file paths or http(s) URLs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(flatten)]
    fields: EntityFields,
    display_image: String,
    #[serde(default)]
    additional_images: Vec<String>,
    #[serde(default)]
    specifications: Vec<Specification>,
    #[serde(default)]
    queries: Vec<Query>,
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

async fn media_input(raw: &str, base_dir: &Path) -> Result<MediaInput> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(MediaInput::url(raw));
    }
    let path = base_dir.join(raw);
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading media file {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(MediaInput::file(file_name, content_type_for(&path), bytes))
}

fn client(config: &Config) -> Result<Arc<HttpCatalogClient>> {
    let mut client = HttpCatalogClient::new(&config.client.api_url, config.client.timeout())?;
    if let Some(token) = &config.client.admin_token {
        client = client.with_admin_token(token.clone());
    }
    Ok(Arc::new(client))
}

async fn serve(config: &Config) -> Result<()> {
    metrics::init();

    let (host, media_dir): (Arc<dyn MediaHostPort>, Option<&Path>) = match &config.media.upload_url
    {
        Some(url) => {
            info!("Uploading media to {}", url);
            let host: Arc<dyn MediaHostPort> = Arc::new(HttpMediaHost::new(
                url.clone(),
                config.media.api_key.clone(),
                config.media.timeout(),
            )?);
            (host, None)
        }
        None => {
            let base = config.media_public_base();
            info!("No media host configured; storing uploads under {}", config.media.local_dir.display());
            let host: Arc<dyn MediaHostPort> =
                Arc::new(DevMediaHost::new(config.media.local_dir.clone(), &base));
            (host, Some(config.media.local_dir.as_path()))
        }
    };
    let uploader = MediaUploader::new(host).with_attempts(config.media.upload_attempts);
    let catalog = Arc::new(CatalogService::new(Arc::new(InMemoryStorage::new()), uploader));

    let notifier: Arc<dyn NotifierPort> = match &config.notifier.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(
            url.clone(),
            std::time::Duration::from_secs(config.notifier.timeout_secs),
        )?),
        None => Arc::new(LogNotifier),
    };

    if config.auth.admin_tokens.is_empty() {
        warn!("No admin tokens configured; every admin route will answer 401");
    }
    let sessions = Arc::new(StaticTokenSessions::new(config.auth.admin_tokens.clone()));

    let state = AppState::new(catalog, notifier, sessions, config.cache.ttl_minutes);
    start_server(
        state,
        &config.server.host,
        config.server.port,
        config.server.body_limit_bytes,
        media_dir,
    )
    .await?;
    Ok(())
}

async fn create(config: &Config, kind: EntityKind, manifest_path: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(manifest_path)
        .await
        .with_context(|| format!("reading manifest {}", manifest_path.display()))?;
    let manifest: Manifest = serde_json::from_str(&raw).context("parsing manifest")?;
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let api = client(config)?;
    let name_field = DebouncedNameField::new(
        UniquenessValidator::for_new(api.clone(), kind),
        config.names.debounce(),
    );
    name_field.input(&manifest.fields.name);
    let status = name_field.settled().await;
    println!("🔎 Name '{}': {}", manifest.fields.name, status.describe());

    let mut wizard = WizardController::new(api, kind)
        .with_name_gate(name_field.subscribe())
        .on_complete(|entity| info!("Wizard completed for {}", entity.id));

    let draft = wizard.draft_mut();
    draft.fields = manifest.fields;
    draft.display_image = Some(media_input(&manifest.display_image, base_dir).await?);
    for raw in &manifest.additional_images {
        draft.additional_images.push(media_input(raw, base_dir).await?);
    }

    let id = wizard.submit_basic_info().await?;
    println!("✅ Stage 1 saved {} {}", kind, id);
    wizard.submit_specifications(manifest.specifications).await?;
    println!("✅ Stage 2 saved specifications");
    let entity = wizard.submit_queries(manifest.queries).await?;
    println!("✅ Stage 3 saved queries; '{}' is complete", entity.fields.name);
    Ok(())
}

async fn check_name(config: &Config, kind: EntityKind, name: &str, exclude: Option<String>) -> Result<()> {
    let exclude = exclude.as_deref().map(EntityId::parse).transpose()?;
    let exists = client(config)?.name_exists(kind, name, exclude.as_ref()).await?;
    if exists {
        println!("❌ A {} named '{}' already exists", kind, name);
    } else {
        println!("✅ '{}' is available", name);
    }
    Ok(())
}

async fn list(config: &Config, kind: EntityKind) -> Result<()> {
    let items = client(config)?.list_entities(kind).await?;
    println!("📋 {} {}:", items.len(), kind.path_segment());
    for entity in &items {
        let marker = if entity.is_draft() { " (draft)" } else { "" };
        println!("   {}  {}{}", entity.id, entity.fields.name, marker);
    }
    Ok(())
}

async fn delete(config: &Config, kind: EntityKind, id: &str, confirmed: bool) -> Result<()> {
    let id = EntityId::parse(id)?;
    let api = client(config)?;
    let entity = api.get_entity(kind, &id).await?;
    let pending = PendingDelete::for_entity(&entity);

    if !confirmed {
        println!("⚠️  {}", pending.prompt());
        println!("   Re-run with --yes to confirm.");
        return Ok(());
    }
    let outcome = pending.confirm(api.as_ref()).await?;
    println!("🗑️  {:?}", outcome);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let _guard = init_logging(&config.server.log_dir);

    match cli.command {
        Commands::Serve => serve(&config).await?,
        Commands::Create { kind, manifest } => create(&config, kind.parse()?, &manifest).await?,
        Commands::CheckName {
            kind,
            name,
            exclude_id,
        } => check_name(&config, kind.parse()?, &name, exclude_id).await?,
        Commands::List { kind } => list(&config, kind.parse()?).await?,
        Commands::Delete { kind, id, yes } => delete(&config, kind.parse()?, &id, yes).await?,
    }

    Ok(())
}
