use thiserror::Error;

/// Failures while bringing up the process's external resources.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind http listener: {0}")]
    Bind(#[from] std::io::Error),
    #[error("database unavailable: {message}")]
    Database { message: String },
    #[error("job queue setup failed: {message}")]
    JobQueue { message: String },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn job_queue(message: impl Into<String>) -> Self {
        Self::JobQueue {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
