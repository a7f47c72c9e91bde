/// Error code registry for chaosforge
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 3000-3999: Store errors
/// - 4000-4999: Capability errors
/// - 5000-5999: Workflow errors
/// - 6000-6999: Pipeline errors
/// - 7000-7999: Validation errors
/// - 9000-9999: Other errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_PARSE_ERROR: u16 = 1002;
    pub const CONFIG_INVALID_VALUE: u16 = 1003;

    // Store errors (3000-3999)
    pub const STORE_GENERIC: u16 = 3000;
    pub const STORE_IO_ERROR: u16 = 3001;
    pub const STORE_PERMISSION_DENIED: u16 = 3002;
    pub const STORE_NOT_FOUND: u16 = 3004;
    pub const STORE_CONFLICT: u16 = 3005;
    pub const STORE_UNAVAILABLE: u16 = 3009;
    pub const STORE_BACKEND_ERROR: u16 = 3010;
    pub const STORE_SERIALIZATION_ERROR: u16 = 3011;

    // Capability errors (4000-4999)
    pub const CAPABILITY_GENERIC: u16 = 4000;
    pub const CAPABILITY_TRANSIENT: u16 = 4001;
    pub const CAPABILITY_PERMANENT: u16 = 4002;
    pub const CAPABILITY_SPAWN_FAILED: u16 = 4003;
    pub const CAPABILITY_TIMEOUT: u16 = 4004;

    // Workflow errors (5000-5999)
    pub const WORKFLOW_GENERIC: u16 = 5000;
    pub const WORKFLOW_NOT_FOUND: u16 = 5001;
    pub const WORKFLOW_INVALID_DEFINITION: u16 = 5002;
    pub const WORKFLOW_STEP_FAILED: u16 = 5003;
    pub const WORKFLOW_TIMEOUT: u16 = 5005;
    pub const WORKFLOW_INVALID_TRANSITION: u16 = 5006;

    // Pipeline errors (6000-6999)
    pub const PIPELINE_GENERIC: u16 = 6000;
    pub const PIPELINE_SOURCE_MISSING: u16 = 6001;
    pub const PIPELINE_STAGE_FAILED: u16 = 6002;

    // Validation errors (7000-7999)
    pub const VALIDATION_GENERIC: u16 = 7000;
    pub const VALIDATION_MISSING_FIELD: u16 = 7001;
    pub const VALIDATION_INVALID_IDENTIFIER: u16 = 7002;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_PARSE_ERROR => "Configuration could not be parsed",
        ErrorCode::CONFIG_INVALID_VALUE => "Configuration contains an invalid value",

        ErrorCode::STORE_GENERIC => "General store error",
        ErrorCode::STORE_IO_ERROR => "Store I/O operation failed",
        ErrorCode::STORE_PERMISSION_DENIED => "Key is outside the caller's access contract",
        ErrorCode::STORE_NOT_FOUND => "Object not found in store",
        ErrorCode::STORE_CONFLICT => "Object already written with different content",
        ErrorCode::STORE_UNAVAILABLE => "Store backend temporarily unavailable",
        ErrorCode::STORE_BACKEND_ERROR => "Store backend error",
        ErrorCode::STORE_SERIALIZATION_ERROR => "Failed to serialize or deserialize object",

        ErrorCode::CAPABILITY_GENERIC => "General capability error",
        ErrorCode::CAPABILITY_TRANSIENT => "Capability failed with a retryable error",
        ErrorCode::CAPABILITY_PERMANENT => "Capability failed with a non-retryable error",
        ErrorCode::CAPABILITY_SPAWN_FAILED => "Capability process could not be started",
        ErrorCode::CAPABILITY_TIMEOUT => "Capability call timed out",

        ErrorCode::WORKFLOW_GENERIC => "General workflow error",
        ErrorCode::WORKFLOW_NOT_FOUND => "Workflow execution not found",
        ErrorCode::WORKFLOW_INVALID_DEFINITION => "Workflow definition is invalid",
        ErrorCode::WORKFLOW_STEP_FAILED => "Workflow step failed",
        ErrorCode::WORKFLOW_TIMEOUT => "Workflow execution timed out",
        ErrorCode::WORKFLOW_INVALID_TRANSITION => "Workflow state transition not permitted",

        ErrorCode::PIPELINE_GENERIC => "General pipeline error",
        ErrorCode::PIPELINE_SOURCE_MISSING => "Pipeline source artifact missing",
        ErrorCode::PIPELINE_STAGE_FAILED => "Pipeline stage failed",

        ErrorCode::VALIDATION_GENERIC => "General validation error",
        ErrorCode::VALIDATION_MISSING_FIELD => "Required field missing",
        ErrorCode::VALIDATION_INVALID_IDENTIFIER => "Identifier contains invalid characters",

        _ => "Unknown error",
    }
}
