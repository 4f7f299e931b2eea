//! Local payment submission log
//!
//! Append-only JSON array of captured payments, kept on the device so that
//! money taken by the provider is never lost track of, whatever the backend
//! later says. Entries are never removed.

use parking_lot::Mutex;
use shared::error::{AppError, AppResult};
use shared::models::LocalPaymentSubmission;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File name inside the data directory
pub const SUBMISSIONS_FILE: &str = "payment_submissions.json";

/// File-backed append-only submission log
#[derive(Debug)]
pub struct SubmissionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SubmissionLog {
    /// Log stored at `<data_dir>/payment_submissions.json`
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SUBMISSIONS_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one submission.
    ///
    /// Fails without touching the file if the existing content is unreadable.
    pub fn append(&self, submission: &LocalPaymentSubmission) -> AppResult<()> {
        let _guard = self.write_lock.lock();

        let mut entries = self.read_entries()?;
        entries.push(submission.clone());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::storage(format!("create {}: {}", parent.display(), e)))?;
        }

        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| AppError::storage(format!("serialize submissions: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| AppError::storage(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| AppError::storage(format!("rename {}: {}", tmp.display(), e)))?;

        tracing::info!(
            target: crate::logger::PAYMENT_TARGET,
            local_id = %submission.local_id,
            order_id = %submission.order.order_id,
            provider_payment_id = %submission.provider_payment().provider_payment_id,
            entries = entries.len(),
            "Payment submission recorded"
        );
        Ok(())
    }

    /// All submissions, oldest first. A missing file is an empty log.
    pub fn load_all(&self) -> AppResult<Vec<LocalPaymentSubmission>> {
        let _guard = self.write_lock.lock();
        self.read_entries()
    }

    pub fn find_by_provider_payment_id(
        &self,
        provider_payment_id: &str,
    ) -> AppResult<Option<LocalPaymentSubmission>> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|s| s.provider_payment().provider_payment_id == provider_payment_id))
    }

    fn read_entries(&self) -> AppResult<Vec<LocalPaymentSubmission>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::storage(format!(
                    "read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&json).map_err(|e| {
            AppError::storage(format!("corrupt submission log {}: {}", self.path.display(), e))
        })
    }
}
