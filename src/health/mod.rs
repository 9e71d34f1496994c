// backuptool/src/health/mod.rs
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::store::StoreClient;

pub const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 500;

/// What a failed probe most likely means. The transport tends to report bad
/// credentials as generic handshake failures, so the probe classifies every
/// failure before an operator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    Handshake,
    InvalidCredentials,
    MissingBucket,
    NetworkUnreachable,
    Unknown,
}

impl Diagnosis {
    pub fn label(&self) -> &'static str {
        match self {
            Diagnosis::Handshake => "credential/handshake failure",
            Diagnosis::InvalidCredentials => "invalid-credentials",
            Diagnosis::MissingBucket => "missing-bucket",
            Diagnosis::NetworkUnreachable => "network-unreachable",
            Diagnosis::Unknown => "unknown",
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            Diagnosis::Handshake => {
                "verify STORE_ACCESS_KEY_ID / STORE_SECRET_ACCESS_KEY; handshake errors here usually mean bad credentials, not TLS misconfiguration"
            }
            Diagnosis::InvalidCredentials => {
                "the store rejected the credentials; rotate or re-issue the access key pair"
            }
            Diagnosis::MissingBucket => {
                "create the bucket named in STORE_BUCKET_NAME or point STORE_ENDPOINT at the right account"
            }
            Diagnosis::NetworkUnreachable => {
                "check STORE_ENDPOINT and outbound network access from this host"
            }
            Diagnosis::Unknown => "inspect the logged error; no known failure signature matched",
        }
    }
}

// Fallback signatures, matched in order against the lowercased error text.
// Credential signatures come first: they often surface wrapped in handshake
// noise and must not be mistaken for transport problems.
const DIAGNOSIS_TABLE: &[(Diagnosis, &[&str])] = &[
    (
        Diagnosis::InvalidCredentials,
        &["invalidaccesskeyid", "signaturedoesnotmatch", "accessdenied", "access denied", "invalid credentials"],
    ),
    (
        Diagnosis::MissingBucket,
        &["nosuchbucket", "bucket does not exist", "specified bucket"],
    ),
    (Diagnosis::Handshake, &["handshake", "certificate", "tls", "ssl"]),
    (
        Diagnosis::NetworkUnreachable,
        &["dns error", "failed to lookup", "connection refused", "connection reset", "timed out", "timeout", "unreachable"],
    ),
];

pub(crate) fn classify_message(message: &str) -> Diagnosis {
    let lowered = message.to_lowercase();
    for (diagnosis, needles) in DIAGNOSIS_TABLE {
        if needles.iter().any(|needle| lowered.contains(needle)) {
            return *diagnosis;
        }
    }
    Diagnosis::Unknown
}

/// Classifies a probe failure, preferring the SDK's structured error code
/// over string matching.
pub(crate) fn classify(error: &SdkError<ListObjectsV2Error>) -> Diagnosis {
    if let Some(code) = error.as_service_error().and_then(|service| service.code()) {
        match code {
            "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "AccessDenied" => {
                return Diagnosis::InvalidCredentials;
            }
            "NoSuchBucket" => return Diagnosis::MissingBucket,
            _ => {}
        }
    }
    if matches!(error, SdkError::TimeoutError(_)) {
        return Diagnosis::NetworkUnreachable;
    }
    classify_message(&format!("{:?}", error))
}

/// Delay before the retry following `attempt` (1-based): base * 2^(attempt-1).
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS * 2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Probes the store with bounded retries and exponential backoff. Never
/// fails: returns `false` after exhausting the attempts, having logged the
/// final diagnosis and a remediation hint.
pub async fn test_connection(store: &StoreClient) -> bool {
    for attempt in 1..=MAX_ATTEMPTS {
        match store.probe().await {
            Ok(()) => {
                info!(attempt, "store connection healthy");
                return true;
            }
            Err(e) => {
                let diagnosis = classify(&e);
                if attempt < MAX_ATTEMPTS {
                    warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        diagnosis = diagnosis.label(),
                        error = %format!("{:?}", e),
                        "store probe failed; backing off"
                    );
                    tokio::time::sleep(backoff_delay(attempt)).await;
                } else {
                    error!(
                        attempts = MAX_ATTEMPTS,
                        diagnosis = diagnosis.label(),
                        remediation = diagnosis.remediation(),
                        error = %format!("{:?}", e),
                        "store connection failed"
                    );
                }
            }
        }
    }
    false
}
