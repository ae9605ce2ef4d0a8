use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Fields {first} and {second} both map to {destination}")]
    FieldCollision {
        first: String,
        second: String,
        destination: String,
    },

    #[error("Input error: {message}")]
    InputError { message: String },


    #[error("Upload to {table} failed (HTTP {status}, code {code:?}): {message}")]
    UploadError {
        table: String,
        status: u16,
        code: Option<String>,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Processing,
    Network,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EtlError::InputError { .. } | EtlError::SerializationError(_) => ErrorCategory::Input,
            EtlError::FieldCollision { .. } => ErrorCategory::Processing,
            EtlError::ApiError(_) | EtlError::UploadError { .. } => ErrorCategory::Network,
            EtlError::IoError(_) | EtlError::CsvError(_) => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Input | ErrorCategory::Processing => {
                ErrorSeverity::High
            }
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::MissingConfigError { field } => {
                format!("Provide a value for '{}' on the command line or in the config file", field)
            }
            EtlError::InvalidConfigValueError { field, .. }
            | EtlError::ConfigValidationError { field, .. } => {
                format!("Check the value of '{}'", field)
            }
            EtlError::ConfigError { .. } => {
                "Check the field mapping JSON and the TOML config file".to_string()
            }
            EtlError::FieldCollision { destination, .. } => format!(
                "Map only one source field to '{}' or use --on-collision last-wins",
                destination
            ),
            EtlError::InputError { .. } | EtlError::SerializationError(_) => {
                "Make sure the scraper produced a JSON array of objects".to_string()
            }
            EtlError::UploadError { code: Some(code), .. } if code == "42P10" => {
                "Add a unique index on the conflict column".to_string()
            }
            EtlError::UploadError { status: 401 | 403, .. } => {
                "Check the upload API key".to_string()
            }
            EtlError::UploadError { .. } => {
                "Check that the table columns match the transformed records".to_string()
            }
            EtlError::ApiError(_) => "Check network connectivity and the upload URL".to_string(),
            EtlError::IoError(_) | EtlError::CsvError(_) => {
                "Check that the output directory is writable".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Could not read scraped jobs: {}", self),
            ErrorCategory::Processing => format!("Could not transform jobs: {}", self),
            ErrorCategory::Network => format!("Upload failed: {}", self),
            ErrorCategory::Storage => format!("Could not write output: {}", self),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
