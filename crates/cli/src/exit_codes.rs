//! CLI Exit Code Registry
//!
//! Single source of truth for `tabsight` exit codes. Scripts rely on them.
//!
//! | Code  | Domain    | Description                                        |
//! |-------|-----------|----------------------------------------------------|
//! | 0     | Universal | Success                                            |
//! | 1     | Universal | General error, including a 500-class response      |
//! | 2     | Universal | Usage error (bad arguments)                        |
//! | 3     | request   | Request body rejected (the 400 class)              |
//! | 4     | request   | Request body could not be read                     |
//! | 10-19 | ai        | AI provider configuration                          |
//!
//! When adding a code: add the constant, document its trigger, update the
//! table, then wire it into the command's error handling.

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Unspecified failure. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments or missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Requests (3-9)
// =============================================================================

/// Request failed validation. The rejection envelope is still printed.
pub const EXIT_INVALID_REQUEST: u8 = 3;

/// Input file or stdin could not be read.
pub const EXIT_IO: u8 = 4;

// =============================================================================
// AI (10-19)
// =============================================================================

/// `provider = none` and no OPENAI_API_KEY in the environment.
pub const EXIT_AI_DISABLED: u8 = 10;

/// A provider is selected but no API key was found.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

/// Exit code for a handler response status.
pub fn status_exit_code(status: tabsight_protocol::Status) -> u8 {
    match status {
        tabsight_protocol::Status::Ok => EXIT_SUCCESS,
        tabsight_protocol::Status::BadRequest => EXIT_INVALID_REQUEST,
        tabsight_protocol::Status::InternalError => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsight_protocol::Status;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INVALID_REQUEST,
            EXIT_IO,
            EXIT_AI_DISABLED,
            EXIT_AI_MISSING_KEY,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn statuses_map_to_codes() {
        assert_eq!(status_exit_code(Status::Ok), 0);
        assert_eq!(status_exit_code(Status::BadRequest), 3);
        assert_eq!(status_exit_code(Status::InternalError), 1);
    }
}
