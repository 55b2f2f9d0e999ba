//! docscan CLI: command-line client for the docscan digitization service.
//!
//! Configuration comes from the environment (or a `.env` file): AUTH_API_BASE_URL,
//! BACKEND_API_BASE_URL, GOOGLE_CLIENT_ID, MAX_UPLOAD_MB, ACCEPTED_FILE_TYPES,
//! REQUEST_TIMEOUT_MS, FLASH_TIMEOUT_MS, SESSION_FILE, AUTH_ERROR_POLICY.
//! The session is persisted to SESSION_FILE between invocations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use docscan_api_client::{
    google_authorize_url, ApiClient, AuthService, BatchState, PendingUploads, UploadOrchestrator,
};
use docscan_cli::{init_tracing, render_flash, render_upload_row, select_files};
use docscan_core::models::{
    AdminUpdate, FlashKind, NewFormat, ProfileUpdate, UploadMetadata, UploadOutcome,
};
use docscan_core::validation::RegisterForm;
use docscan_core::{
    AcceptRules, AppError, ClientConfig, ErrorMetadata, FileSessionStorage, FileValidator,
    FlashStore, SessionStore,
};

#[derive(Parser)]
#[command(name = "docscan", about = "Digitize scanned documents from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and log in
    Register {
        email: String,
        #[arg(long)]
        password: String,
        /// Must match --password
        #[arg(long)]
        confirm: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Print the Google consent URL
    GoogleUrl {
        #[arg(long, default_value = "http://localhost:5173/auth/google/callback")]
        redirect_uri: String,
    },
    /// Finish Google sign-in with the code from the callback
    GoogleCallback {
        code: String,
        #[arg(long, default_value = "http://localhost:5173/auth/google/callback")]
        redirect_uri: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the stored session
    Whoami,
    /// Profile of the logged-in user
    Profile {
        #[command(subcommand)]
        sub: ProfileCommands,
    },
    /// Change the account password
    Password {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    /// Delete the account and log out
    DeleteAccount {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Validate files and upload them as one batch
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Target format id
        #[arg(long)]
        format: Option<i64>,
        /// Processing model id
        #[arg(long)]
        model: Option<i64>,
        #[arg(long, default_value = "0")]
        generation: i32,
        /// Stored file this upload derives from
        #[arg(long)]
        primary: Option<i64>,
        /// Accept the types the server lists under /formats instead of ACCEPTED_FILE_TYPES
        #[arg(long)]
        server_types: bool,
        /// Validate only; send nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Show what uploads are accepted
    Limits,
    /// List stored files (yours by default)
    List {
        /// List every stored file (admin)
        #[arg(long)]
        all: bool,
        /// List the files of another owner
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Get a stored file by id
    Get { id: i64 },
    /// Delete a stored file by id
    Delete { id: i64 },
    /// Download the PDF export of a stored file
    Export {
        id: i64,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Download the preview of a stored file
    Preview {
        id: i64,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Convert a stored DOCX to PDF and download it
    DocxToPdf {
        id: i64,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Editor document operations
    Sfdt {
        #[command(subcommand)]
        sub: SfdtCommands,
    },
    /// Format catalog
    Formats {
        #[command(subcommand)]
        sub: FormatCommands,
    },
    /// Admin management
    Admins {
        #[command(subcommand)]
        sub: AdminCommands,
    },
    /// List available processing models
    Models,
}

#[derive(Subcommand)]
enum ProfileCommands {
    Get,
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
}

#[derive(Subcommand)]
enum SfdtCommands {
    /// Fetch the editor document of a stored DOCX
    Get {
        id: i64,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Save an edited editor document
    Put { id: i64, file: PathBuf },
}

#[derive(Subcommand)]
enum FormatCommands {
    List,
    Add {
        name: String,
        mime_type: String,
        #[arg(long)]
        extension: Option<String>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    List,
    /// Grant (or with --revoke, remove) admin rights
    Set {
        user_id: i64,
        #[arg(long)]
        revoke: bool,
    },
}

struct App {
    config: ClientConfig,
    client: ApiClient,
    auth: AuthService,
    flash: FlashStore,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn write_output(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let ctx = match build_context(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(2);
        }
    };

    let result = run(cli.command, &ctx).await;
    if let Err(e) = &result {
        let text = match e.downcast_ref::<AppError>() {
            Some(app) => {
                tracing::debug!(code = app.error_code(), "Command failed");
                app.client_message()
            }
            None => format!("{:#}", e),
        };
        ctx.flash.error(text);
    }

    for message in ctx.flash.active() {
        eprintln!("{}", render_flash(&message));
    }
    if result.is_err() {
        std::process::exit(1);
    }
}

fn build_context(config: ClientConfig) -> anyhow::Result<App> {
    let storage = Arc::new(FileSessionStorage::new(config.session_file.clone()));
    let session = Arc::new(SessionStore::rehydrate(storage));
    let client = ApiClient::from_config(&config).context("Failed to create API client")?;
    let auth = AuthService::new(client.clone(), session, config.auth_error_policy);
    let flash = FlashStore::new(config.flash_timeout);
    Ok(App {
        config,
        client,
        auth,
        flash,
    })
}

async fn run(command: Commands, ctx: &App) -> anyhow::Result<()> {
    let auth = &ctx.auth;

    match command {
        Commands::Login { email, password } => {
            let response = auth.login(&email, &password).await?;
            ctx.flash.success(
                response
                    .message
                    .unwrap_or_else(|| format!("Logged in as {}", response.user.email)),
            );
        }
        Commands::Register {
            email,
            password,
            confirm,
            first_name,
            last_name,
        } => {
            let form = RegisterForm {
                email: &email,
                password: &password,
                confirm_password: &confirm,
            };
            let response = auth.register(form, first_name, last_name).await?;
            ctx.flash.success(format!("Account created for {}", response.user.email));
        }
        Commands::GoogleUrl { redirect_uri } => {
            let client_id = ctx
                .config
                .google_client_id
                .as_deref()
                .ok_or_else(|| AppError::Config("GOOGLE_CLIENT_ID is not set".to_string()))?;
            println!("{}", google_authorize_url(client_id, &redirect_uri));
        }
        Commands::GoogleCallback { code, redirect_uri } => {
            let response = auth.login_with_google(&code, &redirect_uri).await?;
            ctx.flash.success(format!("Logged in as {}", response.user.email));
        }
        Commands::Logout => {
            auth.logout()?;
            ctx.flash.info("Logged out");
        }
        Commands::Whoami => {
            let session = auth.session().current_session();
            print_json(&serde_json::json!({
                "logged_in": session.is_logged_in(),
                "user_id": session.user_id,
                "email": session.user_email,
                "is_admin": session.is_admin(),
            }))?;
        }
        Commands::Profile { sub } => match sub {
            ProfileCommands::Get => {
                let user_id = auth.require_user_id()?;
                let client = auth.authorized_client()?;
                let profile = auth.check(client.get_user(user_id).await)?;
                print_json(&profile)?;
            }
            ProfileCommands::Update {
                first_name,
                last_name,
            } => {
                let update = ProfileUpdate {
                    first_name,
                    last_name,
                };
                let profile = auth.update_profile(&update).await?;
                print_json(&profile)?;
                ctx.flash.success("Profile updated");
            }
        },
        Commands::Password { old, new } => {
            auth.change_password(&old, &new).await?;
            ctx.flash.success("Password updated");
        }
        Commands::DeleteAccount { yes } => {
            if !yes {
                anyhow::bail!("Refusing to delete the account without --yes");
            }
            auth.delete_account().await?;
            ctx.flash.info("Account deleted");
        }
        Commands::Upload {
            files,
            format,
            model,
            generation,
            primary,
            server_types,
            dry_run,
        } => {
            let metadata = UploadMetadata {
                format_id: format,
                processing_model_id: model,
                generation,
                primary_file_id: primary,
            };
            upload(ctx, files, metadata, server_types, dry_run).await?;
        }
        Commands::Limits => {
            println!("{}", ctx.config.file_validator().describe_limits());
        }
        Commands::List { all, owner } => {
            let client = auth.authorized_client()?;
            let files = if all {
                auth.check(client.list_stored_files().await)?
            } else {
                let owner_id = match owner {
                    Some(id) => id,
                    None => auth.require_user_id()?,
                };
                auth.check(client.list_stored_files_by_owner(owner_id).await)?
            };
            for file in &files {
                println!(
                    "{:>6}  gen {:<3}  {}",
                    file.id,
                    file.generation.unwrap_or(0),
                    file.display_name()
                );
            }
        }
        Commands::Get { id } => {
            let client = auth.authorized_client()?;
            let file = auth.check(client.get_stored_file(id).await)?;
            print_json(&file)?;
        }
        Commands::Delete { id } => {
            let client = auth.authorized_client()?;
            auth.check(client.delete_stored_file(id).await)?;
            ctx.flash.success(format!("Stored file {} deleted", id));
        }
        Commands::Export { id, output } => {
            let client = auth.authorized_client()?;
            let pdf = auth.check(client.export_pdf(id).await)?;
            write_output(&output, &pdf).await?;
            ctx.flash.success(format!("Exported to {}", output.display()));
        }
        Commands::Preview { id, output } => {
            let client = auth.authorized_client()?;
            let data = auth.check(client.preview(id).await)?;
            write_output(&output, &data).await?;
            ctx.flash.success(format!("Preview saved to {}", output.display()));
        }
        Commands::DocxToPdf { id, output } => {
            let client = auth.authorized_client()?;
            let pdf = auth.check(client.docx_to_pdf(id).await)?;
            write_output(&output, &pdf).await?;
            ctx.flash.success(format!("Converted to {}", output.display()));
        }
        Commands::Sfdt { sub } => {
            let client = auth.authorized_client()?;
            match sub {
                SfdtCommands::Get { id, output } => {
                    let sfdt = auth.check(client.docx_to_sfdt(id).await)?;
                    match output {
                        Some(path) => write_output(&path, sfdt.as_bytes()).await?,
                        None => println!("{}", sfdt),
                    }
                }
                SfdtCommands::Put { id, file } => {
                    let sfdt = tokio::fs::read_to_string(&file)
                        .await
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    serde_json::from_str::<serde_json::Value>(&sfdt)
                        .with_context(|| format!("{} is not a JSON document", file.display()))?;
                    auth.check(client.update_sfdt(id, sfdt).await)?;
                    ctx.flash.success("Document saved");
                }
            }
        }
        Commands::Formats { sub } => match sub {
            FormatCommands::List => {
                let formats = ctx.client.list_formats().await?;
                print_json(&formats)?;
            }
            FormatCommands::Add {
                name,
                mime_type,
                extension,
            } => {
                let client = auth.authorized_client()?;
                let format = NewFormat {
                    name,
                    mime_type,
                    extension,
                };
                let created = auth.check(client.create_format(&format).await)?;
                print_json(&created)?;
            }
            FormatCommands::Delete { id } => {
                let client = auth.authorized_client()?;
                auth.check(client.delete_format(id).await)?;
                ctx.flash.success(format!("Format {} deleted", id));
            }
        },
        Commands::Admins { sub } => {
            let client = auth.authorized_client()?;
            match sub {
                AdminCommands::List => {
                    let admins = auth.check(client.list_admins().await)?;
                    print_json(&admins)?;
                }
                AdminCommands::Set { user_id, revoke } => {
                    let update = AdminUpdate {
                        user_id,
                        is_admin: !revoke,
                    };
                    auth.check(client.update_admin(&update).await)?;
                    ctx.flash.success(format!("Admin rights updated for user {}", user_id));
                }
            }
        }
        Commands::Models => {
            let models = ctx.client.available_models().await?;
            print_json(&models)?;
        }
    }

    Ok(())
}

async fn upload(
    ctx: &App,
    paths: Vec<PathBuf>,
    metadata: UploadMetadata,
    server_types: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let auth = &ctx.auth;
    let owner_id = auth.require_user_id()?;

    let validator = if server_types {
        let formats = ctx.client.list_formats().await?;
        FileValidator::new(AcceptRules::from_formats(&formats), ctx.config.max_upload_bytes)
    } else {
        ctx.config.file_validator()
    };
    let mut pending = PendingUploads::new(validator);

    let selection = select_files(&mut pending, &paths).await;
    for line in &selection.rejected {
        // Kept until printed; a long upload would outlive the default timeout.
        ctx.flash.post(FlashKind::Warning, line.as_str(), Duration::ZERO);
    }
    if !selection.rejected.is_empty() {
        let limits = pending.validator().describe_limits();
        ctx.flash.post(FlashKind::Info, limits, Duration::ZERO);
    }
    selection.ensure_queued(dry_run)?;
    if dry_run {
        ctx.flash.info(format!("{} file(s) ready to upload", pending.len()));
        return Ok(());
    }

    let orchestrator = UploadOrchestrator::new(auth.authorized_client()?);
    let cancel = orchestrator.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let token = auth.session().bearer();
    let batch = pending
        .submit(&orchestrator, token.as_deref(), owner_id, &metadata)
        .await;
    ctrl_c.abort();
    let batch = batch?;

    for result in &batch.results {
        println!("{}", render_upload_row(result));
        if let UploadOutcome::SubmittedFailed(e) = &result.outcome {
            auth.observe(e);
        }
    }

    match batch.state {
        BatchState::AllSucceeded => {
            ctx.flash.success(format!("{} file(s) uploaded", batch.succeeded()));
            Ok(())
        }
        _ => {
            anyhow::bail!(
                "{} of {} file(s) failed to upload",
                batch.failed(),
                batch.results.len()
            )
        }
    }
}
