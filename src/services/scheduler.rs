//! Periodic task scheduler
//!
//! A simple scheduler for running background tasks at regular intervals.
//! Add new tasks by implementing the `PeriodicTask` trait.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

use super::invitation::expire_lapsed;

/// Trait for periodic background tasks
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Task name for logging
    fn name(&self) -> &'static str;

    /// How often to run (e.g., every 1 hour)
    fn interval(&self) -> Duration;

    /// Execute the task
    async fn run(&self, db: &DatabaseConnection) -> anyhow::Result<()>;
}

/// Start all periodic tasks
pub fn start_scheduler(db: DatabaseConnection) -> Vec<JoinHandle<()>> {
    let tasks: Vec<Box<dyn PeriodicTask>> = vec![Box::new(InvitationExpiryTask)];

    let handles = tasks
        .into_iter()
        .map(|task| {
            let db = db.clone();
            tokio::spawn(async move {
                run_task(task, db).await;
            })
        })
        .collect();

    tracing::info!("Periodic task scheduler started");
    handles
}

/// Run a single task on its interval
async fn run_task(task: Box<dyn PeriodicTask>, db: DatabaseConnection) {
    let mut ticker = interval(task.interval());

    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        ticker.tick().await;

        tracing::debug!(task = task.name(), "Running periodic task");

        match task.run(&db).await {
            Ok(()) => {
                tracing::debug!(task = task.name(), "Periodic task completed");
            }
            Err(e) => {
                tracing::error!(task = task.name(), error = %e, "Periodic task failed");
            }
        }
    }
}

// ============================================================================
// Invitation Expiry Task
// ============================================================================

/// Writes `expired` for pending invitations past their deadline
pub struct InvitationExpiryTask;

#[async_trait]
impl PeriodicTask for InvitationExpiryTask {
    fn name(&self) -> &'static str {
        "invitation_expiry"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60 * 60) // Every hour
    }

    async fn run(&self, db: &DatabaseConnection) -> anyhow::Result<()> {
        let expired = expire_lapsed(db, Utc::now()).await?;

        if expired > 0 {
            tracing::info!(expired, "Expired lapsed invitations");
        }

        Ok(())
    }
}
