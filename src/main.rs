//! Database Snapshot Coordinator
//!
//! Produces, catalogues, restores, and retires point-in-time snapshots of
//! the application database against an S3-compatible object store.

// backuptool/src/main.rs
mod backup;
mod catalog;
mod config;
mod coordinator;
mod errors;
mod health;
mod restore;
mod retention;
mod scheduler;
mod store;
mod utils;

use anyhow::{Context, Result};
use catalog::BackupKind;
use coordinator::BackupCoordinator;
use scheduler::BackupScheduler;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LIST_LIMIT: usize = 50;

/// Main entry point for the snapshot coordinator CLI
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };

    let coordinator = Arc::new(BackupCoordinator::from_env().await);

    match choice.as_str() {
        "1" | "backup" => {
            println!("🚀 Creating manual snapshot...");
            let record = coordinator.create_backup(BackupKind::Manual).await?;
            println!("📦 {}", serde_json::to_string_pretty(&record)?);
        }
        "2" | "restore" => {
            let force = args.iter().any(|a| a == "--force");
            println!("🔄 Restoring latest snapshot{}...", if force { " (forced)" } else { "" });
            match coordinator.restore_latest(force).await? {
                Some(record) => println!("📦 Restored {}", serde_json::to_string_pretty(&record)?),
                None => println!("ℹ️ Nothing restored; local database is current or no snapshots exist."),
            }
        }
        "3" | "list" => {
            let limit = args
                .get(2)
                .and_then(|a| a.trim().parse::<usize>().ok())
                .unwrap_or(DEFAULT_LIST_LIMIT);
            let records = coordinator.list_backups(limit).await?;
            println!("📋 {} snapshot(s):", records.len());
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        "4" | "cleanup" => {
            println!("🗑 Sweeping expired snapshots...");
            coordinator.cleanup().await?;
        }
        "5" | "test" => {
            if coordinator.test_connection().await {
                println!("✓ Store connection healthy.");
            } else {
                println!("❌ Store connection failed; see log for diagnosis.");
            }
        }
        "6" | "status" => {
            let status = coordinator.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        "7" | "run" => {
            run_daemon(coordinator).await?;
        }
        _ => {
            println!("❌ Invalid choice. Valid operations: backup, restore [--force], list [limit], cleanup, test, status, run.");
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

/// Runs the periodic scheduler until Ctrl-C, then takes a final
/// shutdown-provenance snapshot on the way out.
async fn run_daemon(coordinator: Arc<BackupCoordinator>) -> Result<()> {
    let mut scheduler = BackupScheduler::new();
    scheduler.start(Arc::clone(&coordinator));

    println!("🕒 Coordinator running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    println!("\n🛑 Shutting down...");
    scheduler.stop();

    // A failed shutdown snapshot must never block process exit.
    match coordinator.create_backup(BackupKind::Shutdown).await {
        Ok(record) => println!("📦 Shutdown snapshot {} uploaded.", record.id),
        Err(e) => eprintln!("⚠️ Shutdown snapshot failed: {:#}", e),
    }
    Ok(())
}

/// Prompts the operator to select an operation
///
/// Returns the choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{stdin, stdout, Write};

    println!("Select an operation:");
    println!("1. Create Snapshot (or type 'backup')");
    println!("2. Restore Latest Snapshot (or type 'restore')");
    println!("3. List Snapshots (or type 'list')");
    println!("4. Sweep Expired Snapshots (or type 'cleanup')");
    println!("5. Test Store Connection (or type 'test')");
    println!("6. Show Status (or type 'status')");
    println!("7. Run Periodic Scheduler (or type 'run')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
