//! FFI bindings for Synheart Rhythm
//!
//! C-compatible functions over the JSON request/response surface. All inputs
//! are null-terminated C strings. Returned strings are allocated by Rust and
//! must be released with `rhythm_free_string`.

use serde::Deserialize;
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::error::Result;
use crate::pipeline::{assess_peaks, AnalysisRequest, RhythmAnalyzer};
use crate::store::{CsvRecordStore, InMemoryRecordStore};
use crate::thresholds::AgeThresholdTable;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Hand a JSON result back to C, or record the error and return NULL
fn finish(result: Result<String>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Body of `rhythm_classify_json`
#[derive(Deserialize)]
struct ClassifyRequest {
    peaks: Vec<usize>,
    sampling_rate: f64,
    age: u32,
}

fn classify_json(request: &str) -> Result<String> {
    let request: ClassifyRequest = serde_json::from_str(request)?;
    let assessment = assess_peaks(&request.peaks, request.sampling_rate, request.age)?;
    Ok(serde_json::to_string(&assessment)?)
}

fn analyze_json(request: &str, records_path: Option<String>) -> Result<String> {
    let request: AnalysisRequest = serde_json::from_str(request)?;
    let report = match records_path {
        Some(path) => RhythmAnalyzer::new(CsvRecordStore::new(path)).analyze(&request)?,
        None => RhythmAnalyzer::new(InMemoryRecordStore::new())
            .without_persistence()
            .analyze(&request)?,
    };
    Ok(serde_json::to_string(&report)?)
}

// ============================================================================
// Stateless API
// ============================================================================

/// Age-adjusted heart-rate limits as JSON.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `rhythm_free_string`.
#[no_mangle]
pub unsafe extern "C" fn rhythm_hr_limits(age: u32) -> *mut c_char {
    clear_last_error();
    let limits = AgeThresholdTable::lookup(age);
    finish(serde_json::to_string(&limits).map_err(Into::into))
}

/// Classify beats and return the assessment as JSON.
///
/// The request is `{"peaks": [...], "sampling_rate": 1000.0, "age": 42}`.
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `rhythm_free_string`.
/// - Returns NULL on error; call `rhythm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rhythm_classify_json(request_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let request = match cstr_to_string(request_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid request string pointer");
            return ptr::null_mut();
        }
    };

    finish(classify_json(&request))
}

/// Run a full analysis and return the report as JSON.
///
/// When `records_path` is NULL the analysis runs without history and nothing
/// is written.
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string.
/// - `records_path` must be NULL or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `rhythm_free_string`.
/// - Returns NULL on error; call `rhythm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rhythm_analyze_json(
    request_json: *const c_char,
    records_path: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let request = match cstr_to_string(request_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid request string pointer");
            return ptr::null_mut();
        }
    };

    let records_path = if records_path.is_null() {
        None
    } else {
        match cstr_to_string(records_path) {
            Some(s) => Some(s),
            None => {
                set_last_error("Records path is not valid UTF-8");
                return ptr::null_mut();
            }
        }
    };

    finish(analyze_json(&request, records_path))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Rhythm functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Rhythm function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn rhythm_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - The returned pointer is valid until the next Rhythm call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn rhythm_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Rhythm library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn rhythm_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    unsafe fn take_json(ptr: *mut c_char) -> serde_json::Value {
        assert!(!ptr.is_null());
        let value = serde_json::from_str(CStr::from_ptr(ptr).to_str().unwrap()).unwrap();
        rhythm_free_string(ptr);
        value
    }

    unsafe fn last_error() -> String {
        let error = rhythm_last_error();
        assert!(!error.is_null());
        CStr::from_ptr(error).to_str().unwrap().to_string()
    }

    #[test]
    fn test_ffi_hr_limits() {
        unsafe {
            let value = take_json(rhythm_hr_limits(0));
            assert_eq!(value["lower_normal"], 100);
            assert_eq!(value["tachy_threshold"], 180);
        }
    }

    #[test]
    fn test_ffi_classify() {
        let request =
            CString::new(r#"{"peaks": [0, 1000, 2000, 3000], "sampling_rate": 1000, "age": 300}"#)
                .unwrap();
        unsafe {
            let value = take_json(rhythm_classify_json(request.as_ptr()));
            assert_eq!(value["metrics"]["avg_hr"], 60.0);
            assert_eq!(value["severity"], "normal");
            assert!(rhythm_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_classify_errors() {
        let short = CString::new(r#"{"peaks": [5], "sampling_rate": 1000, "age": 300}"#).unwrap();
        let garbage = CString::new("not json").unwrap();
        unsafe {
            assert!(rhythm_classify_json(short.as_ptr()).is_null());
            assert!(last_error().starts_with("Insufficient data"));

            assert!(rhythm_classify_json(garbage.as_ptr()).is_null());
            assert!(!last_error().is_empty());

            assert!(rhythm_classify_json(ptr::null()).is_null());
            assert_eq!(last_error(), "Invalid request string pointer");
        }
    }

    #[test]
    fn test_ffi_analyze_with_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = CString::new(dir.path().join("records.csv").to_str().unwrap()).unwrap();
        let request = CString::new(
            r#"{"profile": {"name": "Ada", "age": 300}, "peaks": [0, 1000, 2000], "sampling_rate": 1000}"#,
        )
        .unwrap();

        unsafe {
            let first = take_json(rhythm_analyze_json(request.as_ptr(), path.as_ptr()));
            assert_eq!(first["comparison"]["status"], "not_found");
            assert_eq!(first["persistence"]["status"], "saved");

            let second = take_json(rhythm_analyze_json(request.as_ptr(), path.as_ptr()));
            assert_eq!(second["comparison"]["status"], "prior");
        }
    }

    #[test]
    fn test_ffi_analyze_without_store() {
        let request = CString::new(
            r#"{"profile": {"name": "Ada", "age": 300}, "peaks": [0, 1000, 2000], "sampling_rate": 1000}"#,
        )
        .unwrap();
        unsafe {
            let value = take_json(rhythm_analyze_json(request.as_ptr(), ptr::null()));
            assert_eq!(value["persistence"]["status"], "skipped");
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = rhythm_version();
            assert!(!version.is_null());
            assert!(!CStr::from_ptr(version).to_str().unwrap().is_empty());
        }
    }
}
