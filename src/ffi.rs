//! FFI interface for C/C++ hosts
//!
//! Provides C-compatible functions that evaluate a schema against HTML.
//! Schemas and results cross the boundary as JSON.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dom::Page;
use crate::error::Result;
use crate::extractors::Schema;
use crate::settings::Settings;
use crate::structured_data::StructuredDataService;

/// Result struct returned to the host
/// Both pointers are owned by Rust and must be freed via free_extraction_result
#[repr(C)]
pub struct ExtractionResultFFI {
    /// JSON-serialized result (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if extraction failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Extraction request from the host
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaRequest {
    pub schema: Schema,
    /// Base for resolving image and link URLs
    #[serde(default)]
    pub base_url: Option<String>,
    /// Falls back to [`Settings::from_env`] when missing
    #[serde(default)]
    pub settings: Option<Settings>,
}

impl SchemaRequest {
    pub fn settings(&self) -> Settings {
        self.settings.clone().unwrap_or_else(Settings::from_env)
    }
}

/// Extraction response; `data` is null when the schema produced nothing
#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_tag: Option<String>,
}

/// Evaluate a schema against the HTML document.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `request_json` - JSON-serialized SchemaRequest (null-terminated)
///
/// # Returns
/// ExtractionResultFFI with either json_ptr set (success) or error_ptr set (failure)
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `request_json` must be a valid null-terminated C string
/// - Caller must free the result via `free_extraction_result`
#[no_mangle]
pub unsafe extern "C" fn schema_extract_evaluate(
    html_ptr: *const c_char,
    html_len: usize,
    request_json: *const c_char,
) -> ExtractionResultFFI {
    let (html, request) = match read_input(html_ptr, html_len, request_json) {
        Ok(input) => input,
        Err(msg) => return make_error_result(&msg),
    };

    respond(evaluate(&html, &request))
}

/// Evaluate a schema as schema.org structured data, including the rendered
/// `<script type="application/ld+json">` tag.
///
/// # Safety
/// Same as schema_extract_evaluate
#[no_mangle]
pub unsafe extern "C" fn schema_extract_structured_data(
    html_ptr: *const c_char,
    html_len: usize,
    request_json: *const c_char,
) -> ExtractionResultFFI {
    let (html, request) = match read_input(html_ptr, html_len, request_json) {
        Ok(input) => input,
        Err(msg) => return make_error_result(&msg),
    };

    respond(structured_data(&html, &request))
}

/// Free an ExtractionResultFFI returned by this library
///
/// # Safety
/// - `result` must have been returned by `schema_extract_evaluate` or
///   `schema_extract_structured_data`
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_extraction_result(result: ExtractionResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

fn evaluate(html: &str, request: &SchemaRequest) -> Result<SchemaResponse> {
    let page = load_page(html, request)?;
    Ok(SchemaResponse {
        data: request.schema.evaluate(&page.root())?,
        script_tag: None,
    })
}

fn structured_data(html: &str, request: &SchemaRequest) -> Result<SchemaResponse> {
    let page = load_page(html, request)?;
    let service = StructuredDataService::new(request.settings());
    let data = service.generate(&request.schema, &page.root())?;
    let script_tag = service.script_tag(data.as_ref())?;
    Ok(SchemaResponse { data, script_tag })
}

fn load_page(html: &str, request: &SchemaRequest) -> Result<Page> {
    match request.base_url.as_deref() {
        Some(base) => Page::with_base_url(html, base),
        None => Ok(Page::parse(html)),
    }
}

// Read and validate the raw inputs
unsafe fn read_input(
    html_ptr: *const c_char,
    html_len: usize,
    request_json: *const c_char,
) -> std::result::Result<(String, SchemaRequest), String> {
    let html = if html_ptr.is_null() || html_len == 0 {
        String::new()
    } else {
        let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
        match std::str::from_utf8(slice) {
            Ok(s) => s.to_string(),
            Err(_) => return Err("Invalid UTF-8 in HTML content".to_string()),
        }
    };

    if request_json.is_null() {
        return Err("Request JSON is null".to_string());
    }
    let request_str = CStr::from_ptr(request_json)
        .to_str()
        .map_err(|_| "Invalid UTF-8 in request JSON".to_string())?;

    let request: SchemaRequest = serde_json::from_str(request_str)
        .map_err(|e| format!("Failed to parse request JSON: {}", e))?;

    Ok((html, request))
}

fn respond(response: Result<SchemaResponse>) -> ExtractionResultFFI {
    let response = match response {
        Ok(r) => r,
        Err(e) => {
            log::error!("Schema extraction failed: {}", e);
            return make_error_result(&e.to_string());
        }
    };

    match serde_json::to_string(&response) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => ExtractionResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> ExtractionResultFFI {
    let error_cstr = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    ExtractionResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}
