//! Classification of SDK failures into [`ProviderError`] values.
//!
//! The provisioners branch on error codes exactly two ways ("already
//! exists" and "not found"), so the mapping keys on the provider's error
//! code string, the same signal the service reports over the wire.

use std::fmt::Debug;

use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;

use crate::provider::{ErrorKind, ProviderError};

const ALREADY_EXISTS_CODES: &[&str] = &[
    "EntityAlreadyExists",
    "BucketAlreadyExists",
    "BucketAlreadyOwnedByYou",
    "ResourceConflictException",
    "AlreadyExistsException",
    "QueueNameExists",
    "CrawlerRunningException",
];

const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchEntity",
    "NoSuchBucket",
    "NoSuchKey",
    "NotFound",
    "NotFoundException",
    "404",
    "ResourceNotFoundException",
    "EntityNotFoundException",
    "AWS.SimpleQueueService.NonExistentQueue",
    "QueueDoesNotExist",
];

pub(super) fn classify(code: Option<&str>) -> ErrorKind {
    match code {
        Some(code) if ALREADY_EXISTS_CODES.contains(&code) => ErrorKind::AlreadyExists,
        Some(code) if NOT_FOUND_CODES.contains(&code) => ErrorKind::NotFound,
        _ => ErrorKind::Other,
    }
}

/// Converts an SDK failure into a classified [`ProviderError`].
pub(super) fn from_sdk<E, R>(operation: &'static str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + Debug,
    R: Debug,
{
    let (kind, message) = match err.as_service_error() {
        Some(service) => {
            let code = service.code();
            let detail = service.message().unwrap_or("no message from provider");
            (
                classify(code),
                format!("{}: {detail}", code.unwrap_or("unknown")),
            )
        }
        None => (ErrorKind::Other, format!("{err:?}")),
    };
    ProviderError::new(kind, operation, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_exists_codes_classify() {
        assert_eq!(
            classify(Some("EntityAlreadyExists")),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            classify(Some("BucketAlreadyOwnedByYou")),
            ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn not_found_codes_classify() {
        assert_eq!(classify(Some("NoSuchBucket")), ErrorKind::NotFound);
        assert_eq!(
            classify(Some("AWS.SimpleQueueService.NonExistentQueue")),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn unknown_codes_are_other() {
        assert_eq!(classify(Some("Throttling")), ErrorKind::Other);
        assert_eq!(classify(None), ErrorKind::Other);
    }
}
