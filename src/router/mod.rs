//! Relay Router
//!
//! Parses the method and path of incoming requests into a [`Route`].

use thiserror::Error;

/// Passthrough relay path used by the browser client
pub const DETECTION_PATH: &str = "/api/beyblade-detection";
/// Envelope relay path
pub const UPLOAD_PATH: &str = "/api/upload";
pub const PROCESS_PATH: &str = "/api/process";
pub const STATUS_PREFIX: &str = "/api/status/";

/// Router errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    #[error("Not Found")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed(String),
}

impl RouterError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
        }
    }
}

/// Relay operations
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// GET /health
    Health,
    /// GET / or /index.html
    Index,
    /// POST /api/beyblade-detection
    Detect,
    /// POST /api/upload
    Upload,
    /// POST /api/process
    ProcessJob,
    /// GET /api/status/{job_id}
    JobStatus { job_id: String },
}

impl Route {
    /// Parse an HTTP request line into a route
    pub fn parse(method: &str, path: &str) -> Result<Route, RouterError> {
        let (route, allowed) = match path {
            "/health" => (Route::Health, "GET"),
            "/" | "/index.html" => (Route::Index, "GET"),
            DETECTION_PATH => (Route::Detect, "POST"),
            UPLOAD_PATH => (Route::Upload, "POST"),
            PROCESS_PATH => (Route::ProcessJob, "POST"),
            _ => match path.strip_prefix(STATUS_PREFIX) {
                Some(job_id) if !job_id.is_empty() && !job_id.contains('/') => (
                    Route::JobStatus {
                        job_id: job_id.to_string(),
                    },
                    "GET",
                ),
                _ => return Err(RouterError::NotFound(path.to_string())),
            },
        };

        if method != allowed {
            return Err(RouterError::MethodNotAllowed(format!(
                "{} {} (expected {})",
                method, path, allowed
            )));
        }

        Ok(route)
    }

    /// Multipart field carrying the file, for relay routes
    pub fn file_field(&self) -> Option<&'static str> {
        match self {
            Route::Detect => Some("file"),
            Route::Upload => Some("video"),
            _ => None,
        }
    }

    /// Low-cardinality label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Route::Health => "health",
            Route::Index => "index",
            Route::Detect => "detect",
            Route::Upload => "upload",
            Route::ProcessJob => "process",
            Route::JobStatus { .. } => "status",
        }
    }
}
