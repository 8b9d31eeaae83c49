//! Macro for implementing Display and FromStr for domain enums
//!
//! Provider identifiers, token states and submission statuses all travel as
//! short lowercase strings (config keys, credential store keys, log fields).
//! This macro keeps the two conversions in one place.
//!
//! # Example
//!
//! ```rust
//! use finsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum PushStatus {
//!     Pending,
//!     Sent,
//! }
//!
//! impl_domain_status_conversions!(PushStatus {
//!     Pending => "pending",
//!     Sent => "sent",
//! });
//!
//! assert_eq!(PushStatus::Sent.to_string(), "sent");
//! assert_eq!("PENDING".parse::<PushStatus>().ok(), Some(PushStatus::Pending));
//! ```

/// Implements Display and FromStr traits for domain enums
///
/// - Display writes the mapped string
/// - FromStr parses case-insensitively and reports the enum name on failure
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestStatus {
        Draft,
        Submitted,
    }

    impl_domain_status_conversions!(TestStatus {
        Draft => "draft",
        Submitted => "submitted",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(TestStatus::Draft.to_string(), "draft");
        assert_eq!(TestStatus::Submitted.to_string(), "submitted");
    }

    #[test]
    fn test_fromstr_mixed_case() {
        assert_eq!(TestStatus::from_str("DrAfT").unwrap(), TestStatus::Draft);
        assert_eq!(TestStatus::from_str(" submitted ").unwrap(), TestStatus::Submitted);
    }

    #[test]
    fn test_fromstr_invalid() {
        let err = TestStatus::from_str("accepted").unwrap_err();
        assert!(err.contains("TestStatus"));
        assert!(err.contains("accepted"));
    }
}
