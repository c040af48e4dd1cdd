/// Backend-assigned schema identifiers are opaque strings.
pub type SchemaId = String;

/// Backend-assigned job identifiers are opaque strings.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
