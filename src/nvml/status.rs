//! Status code translation
//!
//! Every wrapped call routes its return code through [`check`].

use crate::error::NvmlError;
use crate::nvml::api::NvmlApi;
use crate::nvml::ffi::{self, Status};

/// Turn a native status into `Ok(())` or a descriptive [`NvmlError::Native`]
pub fn check<A: NvmlApi + ?Sized>(api: &A, status: Status) -> Result<(), NvmlError> {
    if status == ffi::NVML_SUCCESS {
        return Ok(());
    }

    Err(NvmlError::Native {
        code: status,
        message: escape_ascii(&api.error_string(status)),
    })
}

/// Escape quotes, control and non-ASCII characters so the text is safe to log
fn escape_ascii(text: &str) -> String {
    text.chars().flat_map(char::escape_default).collect()
}

/// Text for a status code when `nvmlErrorString` is unavailable
pub fn fallback_error_string(status: Status) -> &'static str {
    match status {
        ffi::NVML_SUCCESS => "Success",
        ffi::NVML_ERROR_UNINITIALIZED => "Uninitialized",
        ffi::NVML_ERROR_INVALID_ARGUMENT => "Invalid Argument",
        ffi::NVML_ERROR_NOT_SUPPORTED => "Not Supported",
        ffi::NVML_ERROR_NO_PERMISSION => "Insufficient Permissions",
        ffi::NVML_ERROR_ALREADY_INITIALIZED => "Already Initialized",
        ffi::NVML_ERROR_NOT_FOUND => "Not Found",
        ffi::NVML_ERROR_INSUFFICIENT_SIZE => "Insufficient Size",
        ffi::NVML_ERROR_DRIVER_NOT_LOADED => "Driver Not Loaded",
        ffi::NVML_ERROR_TIMEOUT => "Timeout",
        ffi::NVML_ERROR_LIBRARY_NOT_FOUND => "NVML Shared Library Not Found",
        ffi::NVML_ERROR_FUNCTION_NOT_FOUND => "Function Not Found",
        ffi::NVML_ERROR_GPU_IS_LOST => "GPU is lost",
        _ => "Unknown Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockNvml;

    #[test]
    fn test_success_is_ok() {
        let api = MockNvml::new(1);
        assert!(check(&api, ffi::NVML_SUCCESS).is_ok());
    }

    #[test]
    fn test_failure_carries_library_text() {
        let api = MockNvml::new(1);
        let err = check(&api, ffi::NVML_ERROR_NOT_FOUND).unwrap_err();
        assert_eq!(err.code(), Some(ffi::NVML_ERROR_NOT_FOUND));
        assert_eq!(err.to_string(), "NVML error: \"Not Found\" (code 6)");
    }

    #[test]
    fn test_escape_ascii() {
        assert_eq!(escape_ascii("Not Found"), "Not Found");
        assert_eq!(escape_ascii("bad \"quote\""), "bad \\\"quote\\\"");
        assert_eq!(escape_ascii("line\nbreak"), "line\\nbreak");
        assert_eq!(escape_ascii("caf\u{e9}"), "caf\\u{e9}");
    }

    #[test]
    fn test_fallback_strings() {
        assert_eq!(
            fallback_error_string(ffi::NVML_ERROR_INSUFFICIENT_SIZE),
            "Insufficient Size"
        );
        assert_eq!(fallback_error_string(12345), "Unknown Error");
    }
}
