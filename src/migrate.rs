//! Copies every user and prediction from one backend into another.
//!
//! The two stores assign surrogate keys independently, so a prediction's
//! owner is carried across by username: old `user_id` → source username →
//! destination id. Rows that cannot be placed are logged and counted, never
//! fatal. Only a destination without schema, or a source that cannot be read
//! at all, stops the run.

use std::collections::HashMap;
use std::fmt;

use futures_util::StreamExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::PersistenceBackend;
use crate::error::StoreError;
use crate::store::{Prediction, PredictionId, User, UserId};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("destination schema could not be created: {0}")]
    DestinationSchema(#[source] StoreError),

    #[error("source could not be read: {0}")]
    SourceUnavailable(#[source] StoreError),
}

/// Final tallies of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub users_migrated: u64,
    pub users_skipped: u64,
    /// Usernames already present at the destination.
    pub duplicate_usernames: Vec<String>,
    pub predictions_migrated: u64,
    pub predictions_skipped: u64,
}

/// Milestones of a run, for callers that report progress to a person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Phase(&'static str),
    DuplicateUser(String),
    UserSkipped { username: Option<String>, reason: String },
    PredictionSkipped { id: Option<PredictionId>, reason: String },
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Phase(name) => write!(f, "Migrating {name}..."),
            Progress::DuplicateUser(username) => {
                write!(f, "  Skipping duplicate user: {username}")
            }
            Progress::UserSkipped {
                username: Some(username),
                reason,
            } => write!(f, "  Skipping user {username}: {reason}"),
            Progress::UserSkipped {
                username: None,
                reason,
            } => write!(f, "  Skipping unreadable user row: {reason}"),
            Progress::PredictionSkipped { id: Some(id), reason } => {
                write!(f, "  Skipping prediction {id}: {reason}")
            }
            Progress::PredictionSkipped { id: None, reason } => {
                write!(f, "  Skipping unreadable prediction row: {reason}")
            }
        }
    }
}

type ProgressFn<'a> = Box<dyn Fn(&Progress) + Send + Sync + 'a>;

pub struct Migrator<'a> {
    source: &'a PersistenceBackend,
    destination: &'a PersistenceBackend,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> Migrator<'a> {
    pub fn new(source: &'a PersistenceBackend, destination: &'a PersistenceBackend) -> Self {
        Self {
            source,
            destination,
            progress: None,
        }
    }

    /// Calls `f` for every phase change and every skipped row.
    pub fn with_progress(mut self, f: impl Fn(&Progress) + Send + Sync + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    fn emit(&self, event: Progress) {
        if let Some(f) = &self.progress {
            f(&event);
        }
    }

    /// Runs the whole migration: schema, then users, then predictions.
    pub async fn run(&self) -> Result<MigrationReport, MigrationError> {
        info!("ensuring destination schema");
        self.destination
            .init_schema()
            .await
            .map_err(MigrationError::DestinationSchema)?;

        self.source
            .ping()
            .await
            .map_err(MigrationError::SourceUnavailable)?;

        let mut report = MigrationReport::default();
        let usernames = self.migrate_users(&mut report).await?;
        info!(
            migrated = report.users_migrated,
            skipped = report.users_skipped,
            "users done"
        );

        self.migrate_predictions(&usernames, &mut report).await?;
        info!(
            migrated = report.predictions_migrated,
            skipped = report.predictions_skipped,
            "predictions done"
        );
        Ok(report)
    }

    /// Copies every readable user and returns source id → username for
    /// re-keying predictions.
    async fn migrate_users(
        &self,
        report: &mut MigrationReport,
    ) -> Result<HashMap<UserId, String>, MigrationError> {
        info!("migrating users");
        self.emit(Progress::Phase("users"));
        let mut usernames = HashMap::new();
        let mut users = self.source.stream_users();
        let mut query_ran = false;

        while let Some(row) = users.next().await {
            let user = match row {
                Ok(u) => u,
                Err(e) if !query_ran && !e.is_row_decode() => {
                    return Err(MigrationError::SourceUnavailable(e))
                }
                Err(e) => {
                    warn!(error = %e, "unreadable source user row; skipping");
                    report.users_skipped += 1;
                    self.emit(Progress::UserSkipped {
                        username: None,
                        reason: e.to_string(),
                    });
                    query_ran = true;
                    continue;
                }
            };
            query_ran = true;
            self.copy_user(&user, report).await;
            usernames.insert(user.id, user.username);
        }
        Ok(usernames)
    }

    async fn copy_user(&self, user: &User, report: &mut MigrationReport) {
        match self.destination.import_user(user).await {
            Ok(new_id) => {
                info!(username = %user.username, old_id = user.id, new_id, "user migrated");
                report.users_migrated += 1;
            }
            Err(e) if e.is_duplicate() => {
                info!(username = %user.username, "skipping duplicate user");
                report.users_skipped += 1;
                report.duplicate_usernames.push(user.username.clone());
                self.emit(Progress::DuplicateUser(user.username.clone()));
            }
            Err(e) => {
                warn!(username = %user.username, error = %e, "error migrating user");
                report.users_skipped += 1;
                self.emit(Progress::UserSkipped {
                    username: Some(user.username.clone()),
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn migrate_predictions(
        &self,
        usernames: &HashMap<UserId, String>,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationError> {
        info!("migrating predictions");
        self.emit(Progress::Phase("predictions"));
        let mut predictions = self.source.stream_predictions();
        let mut query_ran = false;

        while let Some(row) = predictions.next().await {
            let prediction = match row {
                Ok(p) => p,
                Err(e) if !query_ran && !e.is_row_decode() => {
                    return Err(MigrationError::SourceUnavailable(e))
                }
                Err(e) => {
                    warn!(error = %e, "unreadable source prediction row; skipping");
                    report.predictions_skipped += 1;
                    self.emit(Progress::PredictionSkipped {
                        id: None,
                        reason: e.to_string(),
                    });
                    query_ran = true;
                    continue;
                }
            };
            query_ran = true;
            self.copy_prediction(&prediction, usernames, report).await;
        }
        Ok(())
    }

    async fn copy_prediction(
        &self,
        prediction: &Prediction,
        usernames: &HashMap<UserId, String>,
        report: &mut MigrationReport,
    ) {
        let new_user_id = match self.resolve_owner(prediction.user_id, usernames).await {
            Ok(id) => id,
            Err(reason) => {
                warn!(prediction_id = prediction.id, %reason, "skipping prediction");
                report.predictions_skipped += 1;
                self.emit(Progress::PredictionSkipped {
                    id: Some(prediction.id),
                    reason,
                });
                return;
            }
        };

        match self
            .destination
            .import_prediction(new_user_id, prediction)
            .await
        {
            Ok(new_id) => {
                info!(
                    old_id = prediction.id,
                    new_id,
                    user_id = new_user_id,
                    "prediction migrated"
                );
                report.predictions_migrated += 1;
            }
            Err(e) if e.is_duplicate() => {
                info!(old_id = prediction.id, "prediction already present; skipping");
                report.predictions_skipped += 1;
            }
            Err(e) => {
                warn!(old_id = prediction.id, error = %e, "error migrating prediction");
                report.predictions_skipped += 1;
                self.emit(Progress::PredictionSkipped {
                    id: Some(prediction.id),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Maps a source user id onto the destination through the username.
    /// The source side comes from the user phase, so the source stream is
    /// the only source connection held while predictions are copied.
    async fn resolve_owner(
        &self,
        source_user_id: UserId,
        usernames: &HashMap<UserId, String>,
    ) -> Result<UserId, String> {
        let username = usernames
            .get(&source_user_id)
            .ok_or_else(|| format!("source user {source_user_id} does not exist"))?;

        match self.destination.find_user_by_username(username).await {
            Ok(Some(u)) => Ok(u.id),
            Ok(None) => Err(format!("user `{username}` is not present at the destination")),
            Err(e) => Err(format!("destination lookup for `{username}` failed: {e}")),
        }
    }
}
