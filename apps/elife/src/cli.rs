//! # CLI
//!
//! clap command definitions and one `cmd_*` function per command. Each
//! function opens the database itself so tests can call it directly.

use crate::api::{self, ServerConfig};
use clap::{Parser, Subcommand};
use elife_core::formats::{registrations_csv, stopped_csv};
use elife_core::portal::UploadSummary;
use elife_core::{NewAdmin, Portal, RegistrationFilter, Role};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::info;

/// Result type for CLI commands.
pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "elife", version, about = "E-Life self-employment registration portal")]
pub struct Cli {
    /// Path to the portal database.
    #[arg(long, global = true, env = "ELIFE_DB", default_value = "elife.redb")]
    pub database: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the database, optionally with a first super admin.
    Init {
        #[arg(long, requires = "admin_password")]
        admin_user: Option<String>,
        #[arg(long, requires = "admin_user")]
        admin_password: Option<String>,
        /// Replace an existing database.
        #[arg(long)]
        force: bool,
    },

    /// Run the HTTP API.
    Serve {
        #[arg(long, env = "ELIFE_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "ELIFE_PORT", default_value_t = 8080)]
        port: u16,
        /// Browser origin allowed to call the API.
        #[arg(long, env = "ELIFE_CORS_ORIGIN")]
        cors_origin: Option<String>,
        /// Login attempts per minute per username.
        #[arg(long, default_value_t = 10)]
        login_rate: u32,
    },

    /// Show record counts.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Import clients from a CSV or XLSX file.
    Import {
        file: PathBuf,
        /// Recorded as the uploader.
        #[arg(long)]
        uploaded_by: Option<String>,
    },

    /// Export registrations as CSV.
    Export {
        output: PathBuf,
        /// Export stopped and stop-requested registrations instead.
        #[arg(long)]
        stopped: bool,
    },

    /// Manage admin accounts.
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum AdminCommands {
    /// Add an admin account.
    Add {
        username: String,
        password: String,
        /// super_admin, admin, moderator or viewer.
        #[arg(long)]
        role: Option<String>,
    },
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> CliResult {
    let db = cli.database.as_path();
    match cli.command {
        Commands::Init {
            admin_user,
            admin_password,
            force,
        } => cmd_init(db, admin_user.as_deref(), admin_password.as_deref(), force),
        Commands::Serve {
            host,
            port,
            cors_origin,
            login_rate,
        } => {
            let config = ServerConfig {
                host,
                port,
                cors_origin,
                login_rate,
            };
            cmd_serve(db, config).await
        }
        Commands::Status { json } => cmd_status(db, json),
        Commands::Import { file, uploaded_by } => {
            cmd_import(db, &file, uploaded_by.as_deref()).map(|_| ())
        }
        Commands::Export { output, stopped } => cmd_export(db, &output, stopped).map(|_| ()),
        Commands::Admin {
            command:
                AdminCommands::Add {
                    username,
                    password,
                    role,
                },
        } => cmd_admin_add(db, &username, &password, role.as_deref()),
    }
}

fn open_existing(db: &Path) -> CliResult<Portal> {
    if !db.exists() {
        return Err(format!(
            "database not found: {} (run `elife init` first)",
            db.display()
        )
        .into());
    }
    Ok(Portal::open(db)?)
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Create a fresh database. An existing file is only replaced with `force`.
pub fn cmd_init(
    db: &Path,
    admin_user: Option<&str>,
    admin_password: Option<&str>,
    force: bool,
) -> CliResult {
    if db.exists() {
        if !force {
            return Err(format!(
                "database already exists: {} (use --force to replace it)",
                db.display()
            )
            .into());
        }
        std::fs::remove_file(db)?;
        info!("Removed existing database {}", db.display());
    }

    let portal = Portal::open(db)?;
    println!("Initialized database at {}", db.display());

    match (admin_user, admin_password) {
        (Some(user), Some(password)) => {
            let admin = portal.bootstrap_admin(user, password)?;
            println!("Created super admin {}", admin.username);
        }
        (None, None) => {}
        _ => return Err("--admin-user and --admin-password must be given together".into()),
    }
    Ok(())
}

pub async fn cmd_serve(db: &Path, config: ServerConfig) -> CliResult {
    let portal = Portal::open(db)?;
    info!("Using database {}", db.display());
    api::serve(portal, config).await?;
    Ok(())
}

/// Print record counts, as text or JSON.
pub fn cmd_status(db: &Path, json: bool) -> CliResult {
    let portal = open_existing(db)?;
    let counts = portal.counts()?;
    let stats = portal.stats()?;

    if json {
        let report = serde_json::json!({
            "database": db.display().to_string(),
            "counts": counts,
            "registrations": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Database: {}", db.display());
    println!("  Admins:         {}", counts.admins);
    println!("  Categories:     {}", counts.categories);
    println!("  Sub-projects:   {}", counts.sub_projects);
    println!("  Programs:       {}", counts.programs);
    println!("  Clients:        {}", counts.clients);
    println!("  Uploads:        {}", counts.file_uploads);
    println!("  Notifications:  {}", counts.notifications);
    println!("  Stop requests:  {}", counts.stop_requests);
    println!(
        "  Registrations:  {} ({} pending, {} approved, {} rejected, {} stop requested, {} stopped, {} multi approved)",
        stats.total,
        stats.pending,
        stats.approved,
        stats.rejected,
        stats.stop_requested,
        stats.stopped,
        stats.multi_approved
    );
    Ok(())
}

/// Import clients from `file`. The file name decides CSV or XLSX.
pub fn cmd_import(db: &Path, file: &Path, uploaded_by: Option<&str>) -> CliResult<UploadSummary> {
    let portal = open_existing(db)?;
    let bytes = std::fs::read(file)?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or("import file has no usable name")?;

    let summary = portal.upload_clients(filename, &bytes, uploaded_by)?;
    println!(
        "Imported {}: {} inserted, {} updated, {} invalid rows skipped",
        filename, summary.inserted, summary.updated, summary.skipped_invalid
    );
    if !summary.skipped_conflicts.is_empty() {
        println!(
            "Skipped {} customer(s) whose mobile number belongs to another customer: {}",
            summary.skipped_conflicts.len(),
            summary.skipped_conflicts.join(", ")
        );
    }
    Ok(summary)
}

/// Write all registrations (or the stopped view) to `output` as CSV.
/// Returns the number of rows written.
pub fn cmd_export(db: &Path, output: &Path, stopped: bool) -> CliResult<usize> {
    let portal = open_existing(db)?;
    let filter = RegistrationFilter::default();
    let (rows, csv) = if stopped {
        let rows = portal.stopped_rows(&filter)?;
        let csv = stopped_csv(&rows);
        (rows.len(), csv)
    } else {
        let rows = portal.registration_rows(&filter)?;
        let csv = registrations_csv(&rows);
        (rows.len(), csv)
    };

    std::fs::write(output, csv)?;
    println!("Exported {rows} registration(s) to {}", output.display());
    Ok(rows)
}

/// Add an admin account. The role defaults to viewer.
pub fn cmd_admin_add(db: &Path, username: &str, password: &str, role: Option<&str>) -> CliResult {
    let portal = open_existing(db)?;
    let role = role.map(str::parse::<Role>).transpose()?;
    let admin = portal.create_admin(NewAdmin {
        username: username.to_string(),
        password: password.to_string(),
        role,
    })?;
    println!("Created {} {}", admin.role, admin.username);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn parses_global_database_and_serve_defaults() {
        let cli = Cli::try_parse_from(["elife", "--database", "x.redb", "serve"]).unwrap();
        assert_eq!(cli.database, PathBuf::from("x.redb"));
        assert!(matches!(
            cli.command,
            Commands::Serve {
                port: 8080,
                login_rate: 10,
                ..
            }
        ));
    }

    #[test]
    fn init_admin_flags_must_be_paired() {
        assert!(Cli::try_parse_from(["elife", "init", "--admin-user", "root"]).is_err());
        assert!(
            Cli::try_parse_from([
                "elife",
                "init",
                "--admin-user",
                "root",
                "--admin-password",
                "pw"
            ])
            .is_ok()
        );
    }

    #[test]
    fn admin_add_takes_optional_role() {
        let cli = Cli::try_parse_from(["elife", "admin", "add", "ann", "pw", "--role", "moderator"])
            .unwrap();
        let Commands::Admin {
            command: AdminCommands::Add { role, .. },
        } = cli.command
        else {
            panic!("expected admin add");
        };
        assert_eq!(role.as_deref(), Some("moderator"));
    }
}
