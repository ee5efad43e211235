/// Error code registry for lineage
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Precondition errors (nothing was started)
/// - 3000-3999: Storage errors
/// - 4000-4999: Execution errors
/// - 6000-6999: Git errors
/// - 9000-9999: Other errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_PARSE_ERROR: u16 = 1002;
    pub const CONFIG_INVALID_VALUE: u16 = 1003;

    // Precondition errors (2000-2999)
    pub const PRECONDITION_GENERIC: u16 = 2000;
    pub const PRECONDITION_DIRTY_WORKTREE: u16 = 2001;
    pub const PRECONDITION_OUT_OF_SYNC: u16 = 2002;
    pub const PRECONDITION_REPOSITORY_BUSY: u16 = 2003;
    pub const PRECONDITION_INVALID_STATE: u16 = 2004;

    // Storage errors (3000-3999)
    pub const STORAGE_GENERIC: u16 = 3000;
    pub const STORAGE_UNAVAILABLE: u16 = 3001;
    pub const STORAGE_SERIALIZATION_ERROR: u16 = 3002;

    // Execution errors (4000-4999)
    pub const EXEC_GENERIC: u16 = 4000;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 4001;
    pub const EXEC_SPAWN_FAILED: u16 = 4002;
    pub const EXEC_INTERRUPTED: u16 = 4003;
    pub const EXEC_TIMEOUT: u16 = 4004;

    // Git errors (6000-6999)
    pub const GIT_GENERIC: u16 = 6000;
    pub const GIT_REPO_NOT_FOUND: u16 = 6001;
    pub const GIT_COMMIT_FAILED: u16 = 6002;
    pub const GIT_ROLLBACK_FAILED: u16 = 6003;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
    pub const OTHER_IO: u16 = 9001;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1000 => "Generic configuration error",
        1001 => "Configuration file not found",
        1002 => "Failed to parse configuration",
        1003 => "Invalid value in configuration",

        2000 => "Generic precondition failure",
        2001 => "Working tree has uncommitted changes",
        2002 => "Local branch is behind its upstream",
        2003 => "Repository is locked by another invocation",
        2004 => "Guarded operation used out of order",

        3000 => "Generic storage error",
        3001 => "Workflow store unavailable after commit",
        3002 => "Workflow store serialization error",

        4000 => "Generic execution error",
        4001 => "Command not found",
        4002 => "Failed to spawn subprocess",
        4003 => "Command execution interrupted",
        4004 => "Command execution timed out",

        6000 => "Generic git error",
        6001 => "Git repository not found",
        6002 => "Failed to create commit",
        6003 => "Failed to restore the repository baseline",

        9000 => "Generic error",
        9001 => "I/O error",

        _ => "Unknown error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_have_descriptions() {
        for code in [
            ErrorCode::PRECONDITION_DIRTY_WORKTREE,
            ErrorCode::PRECONDITION_OUT_OF_SYNC,
            ErrorCode::STORAGE_UNAVAILABLE,
            ErrorCode::GIT_COMMIT_FAILED,
        ] {
            assert_ne!(describe_error_code(code), "Unknown error code");
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(describe_error_code(4242), "Unknown error code");
    }
}
