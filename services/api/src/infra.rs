use chrono::{NaiveDate, Utc};
use lendflow::workflows::underwriting::domain::{
    DocumentPackage, LoanApplication, LoanId, StoredFile, UploadedFile, ValuationFields,
};
use lendflow::workflows::underwriting::repository::{
    DispatchError, ProviderError, RepositoryError, StorageError,
};
use lendflow::workflows::underwriting::{
    DocumentStore, LoanRepository, NotificationDispatcher, ValuationProvider,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLoanRepository {
    records: Arc<Mutex<HashMap<LoanId, LoanApplication>>>,
}

impl LoanRepository for InMemoryLoanRepository {
    fn insert(&self, loan: LoanApplication) -> Result<LoanApplication, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&loan.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(loan.id.clone(), loan.clone());
        Ok(loan)
    }

    fn update(&self, loan: LoanApplication) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(loan.id.clone(), loan);
        Ok(())
    }

    fn fetch(&self, id: &LoanId) -> Result<Option<LoanApplication>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list_by_email(&self, email: &str) -> Result<Vec<LoanApplication>, RepositoryError> {
        let needle = email.trim().to_ascii_lowercase();
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut matches: Vec<LoanApplication> = guard
            .values()
            .filter(|loan| loan.borrower.email.trim().to_ascii_lowercase() == needle)
            .cloned()
            .collect();
        matches.sort_by_key(|loan| loan.created_at);
        Ok(matches)
    }
}

/// Strip any path components a client may have smuggled into a file name so
/// a stored path can never escape the loan's own prefix.
pub(crate) fn sanitize_file_name(raw: &str) -> String {
    let candidate = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if candidate.is_empty() || candidate == "." || candidate == ".." {
        "document".to_string()
    } else {
        candidate
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentStore {
    packages: Arc<Mutex<Vec<DocumentPackage>>>,
}

impl DocumentStore for InMemoryDocumentStore {
    fn persist_conditions_package(
        &self,
        loan_id: &LoanId,
        files: &[UploadedFile],
    ) -> Result<DocumentPackage, StorageError> {
        let stored: Vec<StoredFile> = files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                let name = sanitize_file_name(&file.name);
                StoredFile {
                    id: format!("doc-{:03}", index + 1),
                    relative_path: format!("{loan_id}/{name}"),
                    name,
                }
            })
            .collect();
        let package = DocumentPackage {
            files: stored,
            persisted_at: Utc::now(),
        };
        self.packages
            .lock()
            .expect("package mutex poisoned")
            .push(package.clone());
        Ok(package)
    }
}

/// Log-only dispatcher. A real SMTP transport plugs in behind the same trait.
#[derive(Default, Clone)]
pub(crate) struct LogNotificationDispatcher;

impl NotificationDispatcher for LogNotificationDispatcher {
    fn send_borrower_email(&self, to: &str, subject: &str, _body: &str)
        -> Result<(), DispatchError> {
        tracing::info!(%to, %subject, "borrower email queued");
        Ok(())
    }

    fn send_lender_email(
        &self,
        recipients: &[String],
        subject: &str,
        _body: &str,
    ) -> Result<(), DispatchError> {
        tracing::info!(recipients = recipients.join(","), %subject, "lender email queued");
        Ok(())
    }
}

/// Placeholder external valuation source; always reports no data available.
#[derive(Default, Clone)]
pub(crate) struct NullValuationProvider;

impl ValuationProvider for NullValuationProvider {
    fn fetch_external_valuation(
        &self,
        _address: &str,
    ) -> Result<Option<ValuationFields>, ProviderError> {
        Ok(None)
    }
}

pub(crate) fn lender_recipients() -> Vec<String> {
    std::env::var("LENDFLOW_LENDER_RECIPIENTS")
        .unwrap_or_else(|_| "lending@lendflow.local".to_string())
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::sanitize_file_name;

    #[test]
    fn file_names_cannot_escape_the_loan_prefix() {
        assert_eq!(sanitize_file_name("bank-may.pdf"), "bank-may.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("docs\\..\\secret.pdf"), "secret.pdf");
        assert_eq!(sanitize_file_name(".."), "document");
        assert_eq!(sanitize_file_name("   "), "document");
    }
}
