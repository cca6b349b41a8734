//! pipecfg - configuration document tool
//!
//! Upgrades stored documents to the current schema, validates them the way
//! the service does on startup, and prints entity version tokens for
//! scripted edits.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pipecfg_core::{ConfigService, CoreError, EngineConfig};
use pipecfg_loader::{DocumentStore, FileDocumentStore, CURRENT_SCHEMA_VERSION};
use pipecfg_model::EntityRef;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pipecfg")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Engine settings (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `pipecfg_loader=debug`
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upgrade a document to the current schema version
    Migrate {
        /// Document to upgrade
        document: PathBuf,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Check a document structurally and semantically
    Validate {
        document: PathBuf,

        /// Print errors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the version token of an entity
    Token {
        document: PathBuf,

        #[arg(value_enum)]
        kind: EntityKind,

        /// Name or id of the entity
        id: String,
    },

    /// Print the effective engine settings
    Settings,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum EntityKind {
    Pipeline,
    PipelineGroup,
    Template,
    Environment,
    ElasticProfile,
    PackageRepository,
    Scm,
    Agent,
    ConfigRepo,
}

impl EntityKind {
    fn reference(self, id: &str) -> EntityRef {
        match self {
            Self::Pipeline => EntityRef::Pipeline(id.into()),
            Self::PipelineGroup => EntityRef::PipelineGroup(id.into()),
            Self::Template => EntityRef::Template(id.into()),
            Self::Environment => EntityRef::Environment(id.into()),
            Self::ElasticProfile => EntityRef::ElasticProfile(id.to_owned()),
            Self::PackageRepository => EntityRef::PackageRepository(id.to_owned()),
            Self::Scm => EntityRef::Scm(id.to_owned()),
            Self::Agent => EntityRef::Agent(id.to_owned()),
            Self::ConfigRepo => EntityRef::ConfigRepo(id.to_owned()),
        }
    }
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn settings(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(EngineConfig::new()),
    }
}

async fn migrate(settings: &EngineConfig, document: &Path, dry_run: bool) -> Result<ExitCode> {
    let loader = settings.loader()?;
    let store = FileDocumentStore::new(document);
    let load = loader
        .load(&store)
        .await
        .with_context(|| format!("loading {}", document.display()))?;
    let loaded = &load.loaded;

    if !loaded.was_upgraded() {
        println!("{}: already at schema version {CURRENT_SCHEMA_VERSION}", document.display());
        return Ok(ExitCode::SUCCESS);
    }
    println!(
        "{}: schema version {} -> {CURRENT_SCHEMA_VERSION} (steps {:?})",
        document.display(),
        loaded.from_version,
        loaded.applied
    );
    if dry_run {
        return Ok(ExitCode::SUCCESS);
    }

    let bytes = loader.render(&loaded.graph)?;
    let token = store.write(bytes, &load.token).await?;
    info!(document = %document.display(), %token, "upgraded document written");
    Ok(ExitCode::SUCCESS)
}

async fn start(settings: EngineConfig, document: &Path) -> Result<ConfigService, CoreError> {
    let store = Arc::new(FileDocumentStore::new(document));
    ConfigService::start(settings.with_write_back_upgrades(false), store).await
}

async fn validate(settings: EngineConfig, document: &Path, json: bool) -> Result<ExitCode> {
    match start(settings, document).await {
        Ok(service) => {
            let snapshot = service.snapshot();
            debug!(token = %snapshot.store_token, "document loaded");
            if json {
                println!("{}", serde_json::json!({ "valid": true, "errors": {} }));
            } else {
                println!(
                    "{}: valid ({} pipelines, {} environments)",
                    document.display(),
                    snapshot.effective.pipelines().count(),
                    snapshot.effective.environments.len()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(CoreError::Invalid(report)) => {
            if json {
                println!("{}", serde_json::json!({ "valid": false, "errors": report }));
            } else {
                eprintln!("{}: {} error(s)", document.display(), report.error_count());
                for message in report.messages() {
                    eprintln!("  {message}");
                }
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).with_context(|| format!("loading {}", document.display())),
    }
}

async fn token(settings: EngineConfig, document: &Path, entity: &EntityRef) -> Result<ExitCode> {
    let service = start(settings, document)
        .await
        .with_context(|| format!("loading {}", document.display()))?;
    match service.version_token(entity)? {
        Some(token) => {
            println!("{token}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("{entity} not found");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = settings(cli.config.as_deref())?;
    match cli.command {
        Commands::Migrate { document, dry_run } => migrate(&settings, &document, dry_run).await,
        Commands::Validate { document, json } => validate(settings, &document, json).await,
        Commands::Token { document, kind, id } => token(settings, &document, &kind.reference(&id)).await,
        Commands::Settings => {
            print!("{}", settings.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V5: &str = r#"{
        "schemaVersion": 5,
        "pipelineGroups": [{"name": "first", "pipelines": [{
            "name": "build",
            "materials": [{"type": "git", "url": "https://example.com/app.git"}],
            "stages": [{"name": "compile", "jobs": [{"name": "unit",
                "tasks": [{"type": "exec", "command": "make"}]}]}]
        }]}]
    }"#;

    #[test]
    fn parses_token_arguments() {
        let cli = Cli::try_parse_from(["pipecfg", "token", "cfg.json", "elastic-profile", "docker"]).unwrap();
        match cli.command {
            Commands::Token { kind, id, .. } => {
                assert_eq!(kind, EntityKind::ElasticProfile);
                assert_eq!(kind.reference(&id), EntityRef::ElasticProfile("docker".into()));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_options_follow_subcommand() {
        let cli = Cli::try_parse_from(["pipecfg", "validate", "cfg.json", "--json", "--log-json"]).unwrap();
        assert!(cli.log_json);
        assert!(matches!(cli.command, Commands::Validate { json: true, .. }));
    }

    #[tokio::test]
    async fn migrate_rewrites_old_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, V5).unwrap();

        let settings = EngineConfig::new();
        migrate(&settings, &path, true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), V5);

        migrate(&settings, &path, false).await.unwrap();
        let rewritten: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rewritten["schemaVersion"], CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn token_of_missing_entity_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, V5).unwrap();

        let code = token(EngineConfig::new(), &path, &EntityRef::Environment("uat".into()))
            .await
            .unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }
}
