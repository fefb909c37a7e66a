//! Error classification shared across the Integram crates.
//!
//! Error types stay module-specific (`StorageError`, `SessionError`, the
//! client crate's `ApiError`); this module provides the common vocabulary for
//! deciding how a failure should be handled: can the operation be retried,
//! and how loudly should it be reported.

/// Severity level for monitoring and log routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Expected conditions: missing resources, empty results.
    Info,
    /// Degraded but operational: transient transport failures, restorable
    /// sessions.
    Warning,
    /// Failure requiring attention: bad credentials, server errors.
    Error,
    /// Integrity at risk: persistence failures, invariant violations.
    Critical,
}

/// Standard interface for classifying errors by their handling
/// characteristics.
pub trait ErrorClassification {
    /// Whether the failed operation may be retried as-is.
    fn is_retryable(&self) -> bool;

    /// Severity for monitoring and alerting.
    fn severity(&self) -> ErrorSeverity;

    /// Whether this failure requires immediate attention.
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe(ErrorSeverity);

    impl ErrorClassification for Probe {
        fn is_retryable(&self) -> bool {
            false
        }

        fn severity(&self) -> ErrorSeverity {
            self.0
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
    }

    #[test]
    fn critical_follows_severity() {
        assert!(Probe(ErrorSeverity::Critical).is_critical());
        assert!(!Probe(ErrorSeverity::Error).is_critical());
    }
}
