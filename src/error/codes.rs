/// Error code registry for covtree
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Process spawn errors
/// - 3000-3999: Process I/O errors
/// - 4000-4999: Report parsing errors
/// - 5000-5999: Cache state errors
/// - 6000-6999: Lookup errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_MISSING_INTERPRETER: u16 = 1001;
    pub const CONFIG_MISSING_SCRIPT: u16 = 1002;
    pub const CONFIG_MISSING_DATA_DIR: u16 = 1003;
    pub const CONFIG_READ_FAILED: u16 = 1004;
    pub const CONFIG_PARSE_ERROR: u16 = 1005;
    pub const CONFIG_INVALID_ROOT: u16 = 1006;

    // Process spawn errors (2000-2999)
    pub const SPAWN_GENERIC: u16 = 2000;
    pub const SPAWN_COMMAND_NOT_FOUND: u16 = 2001;
    pub const SPAWN_PIPE_UNAVAILABLE: u16 = 2002;

    // Process I/O errors (3000-3999)
    pub const PROCESS_IO_GENERIC: u16 = 3000;
    pub const PROCESS_IO_STDIN: u16 = 3001;
    pub const PROCESS_IO_STDOUT: u16 = 3002;
    pub const PROCESS_IO_WAIT: u16 = 3003;
    pub const PROCESS_IO_TIMEOUT: u16 = 3004;
    pub const PROCESS_IO_ENUMERATION: u16 = 3005;

    // Report parsing errors (4000-4999)
    pub const PARSE_GENERIC: u16 = 4000;
    pub const PARSE_INVALID_COUNT: u16 = 4001;

    // Cache state errors (5000-5999)
    pub const CACHE_GENERIC: u16 = 5000;
    pub const CACHE_MISSING_PARENT: u16 = 5001;
    pub const CACHE_ROOT_CONFLICT: u16 = 5002;
    pub const CACHE_KIND_CONFLICT: u16 = 5003;

    // Lookup errors (6000-6999)
    pub const NOT_FOUND_GENERIC: u16 = 6000;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_MISSING_INTERPRETER => "No interpreter configured for the coverage tool",
        ErrorCode::CONFIG_MISSING_SCRIPT => "No analysis script configured",
        ErrorCode::CONFIG_MISSING_DATA_DIR => "No location configured for the coverage data file",
        ErrorCode::CONFIG_READ_FAILED => "Configuration file could not be read",
        ErrorCode::CONFIG_PARSE_ERROR => "Configuration file is not valid TOML",
        ErrorCode::CONFIG_INVALID_ROOT => "Collection root is not a directory",

        ErrorCode::SPAWN_GENERIC => "Failed to start the coverage tool",
        ErrorCode::SPAWN_COMMAND_NOT_FOUND => "Interpreter executable not found",
        ErrorCode::SPAWN_PIPE_UNAVAILABLE => "Child process pipe could not be captured",

        ErrorCode::PROCESS_IO_GENERIC => "I/O error while talking to the coverage tool",
        ErrorCode::PROCESS_IO_STDIN => "Failed to write the input file list",
        ErrorCode::PROCESS_IO_STDOUT => "Failed to read the coverage report",
        ErrorCode::PROCESS_IO_WAIT => "Failed to wait for the coverage tool to exit",
        ErrorCode::PROCESS_IO_TIMEOUT => "Coverage tool did not finish in time",
        ErrorCode::PROCESS_IO_ENUMERATION => "Failed to enumerate the source tree",

        ErrorCode::PARSE_GENERIC => "Unrecognized report line",
        ErrorCode::PARSE_INVALID_COUNT => "Statement count is not an integer",

        ErrorCode::CACHE_GENERIC => "Coverage cache is in an unexpected state",
        ErrorCode::CACHE_MISSING_PARENT => "Parent folder is not registered",
        ErrorCode::CACHE_ROOT_CONFLICT => "A different root folder is already registered",
        ErrorCode::CACHE_KIND_CONFLICT => "Path is already registered with another kind",

        ErrorCode::NOT_FOUND_GENERIC => "Path is not part of the coverage tree",

        _ => "Unknown error",
    }
}
