//! Fatal conditions that abort an archive run.
//!
//! Everything else travels as `anyhow::Error` with context; these variants
//! exist so callers (and tests) can tell the contract violations apart with
//! `downcast_ref`.

/// A condition that terminates the whole run.
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    /// The session stayed on the requested location without satisfying any
    /// condition within the attempt timeout.
    #[error("navigation contract violated: {location} met no condition after {attempts} attempt(s)")]
    NavigationStalled { location: String, attempts: u64 },

    /// A module whose markers match no known content type.
    #[error("unrecognized module type at {location} (markers: {})", markers.join(" "))]
    UnrecognizedModule {
        location: String,
        markers: Vec<String>,
    },

    /// Sign-in finished without the ready condition holding.
    #[error("authentication incomplete: {location} is still not ready")]
    AuthenticationIncomplete { location: String },
}
