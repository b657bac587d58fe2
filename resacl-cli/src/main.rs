//! resacl CLI - Command-line administration of resource ACLs
//!
//! Every command runs as the site user with authorization checks skipped.

mod output;

use clap::{Parser, Subcommand};
use resacl_authz::{AclService, PrincipalName};
use resacl_core::{
    init_logging, log_operation_error, CallerContext, ErrorContext, ResaclConfig, ResaclError,
    ResaclResult, StaticDirectory,
};
use resacl_store::{AclInput, AclQuery, AclStore, SqliteAclStorage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const SITE_USER: &str = "site_user";

#[derive(Parser)]
#[command(name = "resacl")]
#[command(about = "Manage per-resource access control lists")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the resource_acl table
    InitDb,

    /// List resource ACLs
    ListAcl {
        /// Only entries for this resource
        resource_id: Option<String>,

        /// Maximum number of entries (0 for no limit)
        #[arg(long)]
        limit: Option<u32>,

        /// Number of entries to skip
        #[arg(long)]
        offset: Option<u32>,
    },

    /// Show one resource ACL
    ShowAcl { id: String },

    /// Create a resource ACL
    CreateAcl {
        resource_id: String,
        /// user or org
        auth_type: String,
        /// Id of the user or organization
        auth_id: String,
        /// none or read
        permission: String,
    },

    /// Create a resource ACL for a user or organization given by name
    Grant {
        resource_id: String,

        /// User name or id
        #[arg(long, conflicts_with = "organization", required_unless_present = "organization")]
        username: Option<String>,

        /// Organization name or id
        #[arg(long)]
        organization: Option<String>,

        /// none or read
        #[arg(long, default_value = "read")]
        permission: String,
    },

    /// Delete a resource ACL
    DeleteAcl { id: String },

    /// Replace auth type, auth id and permission of a resource ACL
    UpdateAcl {
        id: String,
        auth_type: String,
        auth_id: String,
        permission: String,
    },

    /// Change only the given fields of a resource ACL
    PatchAcl {
        id: String,

        #[arg(long)]
        auth_type: Option<String>,

        #[arg(long)]
        auth_id: Option<String>,

        #[arg(long)]
        permission: Option<String>,
    },

    /// Show a user's effective ACL permission on a resource
    Resolve {
        resource_id: String,
        /// User name or id
        user: String,
    },

    /// List resources a user can read through ACLs
    ListForUser {
        /// User name or id
        user: String,
    },

    /// Check whether a user (anonymous when omitted) can view a resource
    CanView {
        resource_id: String,

        #[arg(long)]
        user: Option<String>,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> ResaclResult<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config.level = "debug".to_string();
    }

    init_logging(&logging_config).map_err(|e| ResaclError::Config {
        message: format!("Failed to initialize logging: {}", e),
        source: Some(e),
        context: ErrorContext::new("cli")
            .with_operation("init_logging")
            .with_suggestion("Check logging configuration"),
    })?;

    info!("Starting resacl CLI v{}", env!("CARGO_PKG_VERSION"));

    if let Commands::Config {
        show,
        init,
        validate,
    } = cli.command
    {
        return handle_config(cli.config.as_deref(), &config, show, init, validate);
    }

    let service = build_service(&config).await?;
    let ctx = CallerContext::site(SITE_USER);

    let result = run(&service, &ctx, cli.command, cli.json).await;
    if let Err(e) = &result {
        log_operation_error!("cli_command", e);
    }
    result
}

async fn run(
    service: &AclService,
    ctx: &CallerContext,
    command: Commands,
    json: bool,
) -> ResaclResult<()> {
    match command {
        Commands::InitDb => {
            service.store().init().await?;
            println!("resource_acl table created");
        }
        Commands::ListAcl {
            resource_id,
            limit,
            offset,
        } => {
            let query = AclQuery {
                resource_id,
                limit,
                offset,
            };
            let acls = service.acl_list(ctx, &query).await?;
            if json {
                print_json(&acls)?;
            } else {
                for acl in &acls {
                    print!("{}", output::format_acl(acl));
                }
            }
        }
        Commands::ShowAcl { id } => {
            let acl = service.acl_show(ctx, &id).await?;
            print_acl(&acl, json)?;
        }
        Commands::CreateAcl {
            resource_id,
            auth_type,
            auth_id,
            permission,
        } => {
            let input = AclInput::new(&resource_id, &auth_type, &auth_id, &permission);
            let acl = service.acl_create(ctx, &input).await?;
            print_acl(&acl, json)?;
        }
        Commands::Grant {
            resource_id,
            username,
            organization,
            permission,
        } => {
            let principal = match (username, organization) {
                (_, Some(org)) => PrincipalName::Organization(org),
                (Some(user), None) => PrincipalName::User(user),
                (None, None) => {
                    return Err(resacl_core::validation_error!(
                        "Missing value",
                        "username",
                        "cli"
                    ))
                }
            };
            let acl = service
                .create_for_principal(ctx, &resource_id, &principal, &permission)
                .await?;
            print_acl(&acl, json)?;
        }
        Commands::DeleteAcl { id } => {
            service.acl_delete(ctx, &id).await?;
            if json {
                print_json(&serde_json::json!({ "id": id, "deleted": true }))?;
            } else {
                println!("acl <{}> was deleted.", id);
            }
        }
        Commands::UpdateAcl {
            id,
            auth_type,
            auth_id,
            permission,
        } => {
            let input = AclInput::replace(&auth_type, &auth_id, &permission);
            let acl = service.acl_update(ctx, &id, &input).await?;
            print_acl(&acl, json)?;
        }
        Commands::PatchAcl {
            id,
            auth_type,
            auth_id,
            permission,
        } => {
            let input = AclInput {
                resource_id: None,
                auth_type,
                auth_id,
                permission,
            };
            let acl = service.acl_patch(ctx, &id, &input).await?;
            print_acl(&acl, json)?;
        }
        Commands::Resolve { resource_id, user } => {
            let resolved = service
                .resolve_permission(ctx, &resource_id, Some(&user))
                .await?;
            if json {
                print_json(&resolved)?;
            } else {
                print!(
                    "{}",
                    output::format_resolution(&resource_id, &user, resolved.as_ref())
                );
            }
        }
        Commands::ListForUser { user } => {
            let grants = service.list_resources_for_user(ctx, Some(&user)).await?;
            if json {
                print_json(&grants)?;
            } else {
                for grant in &grants {
                    print!("{}", output::format_grant(grant));
                }
            }
        }
        Commands::CanView { resource_id, user } => {
            // anonymous unless a user is named
            let visible = service
                .gate()
                .can_view(&resource_id, user.as_deref())
                .await?;
            if json {
                print_json(&serde_json::json!({ "id": resource_id, "visible": visible }))?;
            } else {
                println!("{}", visible);
            }
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn print_acl(acl: &resacl_core::AclEntry, json: bool) -> ResaclResult<()> {
    if json {
        print_json(acl)
    } else {
        print!("{}", output::format_acl(acl));
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> ResaclResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(config_path: Option<&PathBuf>) -> ResaclResult<ResaclConfig> {
    if let Some(path) = config_path {
        return ResaclConfig::from_file(path);
    }

    let default_paths = [
        Some(ResaclConfig::default_path()),
        Some(PathBuf::from("resacl.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            return ResaclConfig::from_file(path);
        }
    }

    Ok(ResaclConfig::default())
}

async fn build_service(config: &ResaclConfig) -> ResaclResult<AclService> {
    if let Some(path) = config.database.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let storage =
        SqliteAclStorage::connect(&config.database.url, config.database.max_connections).await?;

    let directory = match &config.directory.path {
        Some(path) => {
            info!("Loading host directory from {:?}", path);
            StaticDirectory::from_file(path)?
        }
        None => {
            warn!("No directory.path configured; resources and users are unknown");
            StaticDirectory::new()
        }
    };

    let store = AclStore::new(Arc::new(storage), Arc::new(directory))
        .with_max_page_size(config.acl.max_page_size);
    Ok(AclService::new(store))
}

fn handle_config(
    config_path: Option<&Path>,
    config: &ResaclConfig,
    show: bool,
    init: bool,
    validate: bool,
) -> ResaclResult<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(ResaclConfig::default_path);

    if init {
        ResaclConfig::default().save_to_file(&path)?;
        println!("Configuration initialized at: {:?}", path);
    }

    if show {
        let rendered = toml::to_string_pretty(config).map_err(|e| ResaclError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("cli").with_operation("show_config"),
        })?;
        println!("{}", rendered);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                println!("Configuration validation failed: {}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}
