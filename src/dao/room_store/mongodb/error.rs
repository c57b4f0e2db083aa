use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is missing.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// Connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Client could not be built from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings attempted.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// Periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Upsert of a room document failed.
    #[error("failed to save room `{id}`")]
    SaveRoom {
        /// Room id.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Lookup of a room document failed.
    #[error("failed to load room `{id}`")]
    LoadRoom {
        /// Room id.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
