//! systemlib — the system core of a guitar tablature editor.
//!
//! A [`System`] is one line of staves across the page with its own
//! timeline: barlines, directions, chord text, rhythm slashes and staff
//! notes all sit at integer positions, and the layout engine turns those
//! positions into x-coordinates. Systems are stored in the binary Power Tab
//! layout; both the legacy (1.0, 1.0.2) and current (1.5+) versions can be
//! read.
//!
//! # Example
//! ```
//! use systemlib::{Barline, BarType, System};
//!
//! let mut system = System::new();
//! system.init(&[6], &[true], false).unwrap();
//! system.insert_barline(Barline::new(8, BarType::Bar)).unwrap();
//!
//! let bytes = systemlib::encode_system(&system).unwrap();
//! let copy = systemlib::decode_system(&bytes, 4).unwrap();
//! assert_eq!(copy, system);
//! ```

pub mod codec;
pub mod error;
pub mod model;
pub mod playback;
pub mod render_map;
pub mod staff;
pub mod system;

#[cfg(target_os = "android")]
pub mod android;

use std::io::Cursor;

pub use codec::FileVersion;
pub use error::{CodecError, SystemError};
pub use model::*;
pub use render_map::{build_render_map, render_map_to_json, RenderMap};
pub use staff::{Clef, Staff};
pub use system::{Rect, ShiftDirection, System};

/// Decode a system from bytes stored under file version `version`.
pub fn decode_system(data: &[u8], version: u16) -> Result<System, String> {
    codec::decode_system(&mut Cursor::new(data), version)
        .map_err(|e| format!("Failed to decode system (version {version}): {e}"))
}

/// Encode a system in the current file version.
pub fn encode_system(system: &System) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    codec::encode_system(system, &mut buf)
        .map_err(|e| format!("Failed to encode system: {e}"))?;
    Ok(buf)
}

/// Convert a system to a JSON string.
/// Useful for passing data across FFI boundaries.
pub fn system_to_json(system: &System) -> Result<String, String> {
    serde_json::to_string_pretty(system).map_err(|e| format!("JSON serialization error: {e}"))
}

/// Parse a system from JSON produced by [`system_to_json`].
///
/// The end bar is re-synced to the layout, so a hand-edited width or
/// spacing cannot leave it stale.
pub fn system_from_json(json: &str) -> Result<System, String> {
    let mut system: System =
        serde_json::from_str(json).map_err(|e| format!("JSON parse error: {e}"))?;
    system.sync_end_bar();
    Ok(system)
}

/// Decode system bytes and render the layout snapshot as JSON.
pub fn render_map_json_from_bytes(data: &[u8], version: u16) -> Result<String, String> {
    let system = decode_system(data, version)?;
    Ok(render_map_to_json(&build_render_map(&system)))
}

// ═══════════════════════════════════════════════════════════════════════
// C FFI — for iOS (static library) and Android (JNI)
// ═══════════════════════════════════════════════════════════════════════

use std::ffi::CString;
use std::os::raw::c_char;

fn into_c_string(s: String) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

/// Decode system bytes and return the system as a JSON C string.
/// The caller must free the returned string with `systemlib_free_string`.
///
/// # Safety
/// `data` must point to `len` valid bytes.
#[no_mangle]
pub unsafe extern "C" fn systemlib_decode_to_json(
    data: *const u8,
    len: usize,
    version: u16,
) -> *mut c_char {
    if data.is_null() || len == 0 {
        return std::ptr::null_mut();
    }
    let bytes = unsafe { std::slice::from_raw_parts(data, len) };

    match decode_system(bytes, version).and_then(|s| system_to_json(&s)) {
        Ok(json) => into_c_string(json),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Decode system bytes and return its render map as a JSON C string.
/// The caller must free the returned string with `systemlib_free_string`.
///
/// # Safety
/// `data` must point to `len` valid bytes.
#[no_mangle]
pub unsafe extern "C" fn systemlib_render_map_json(
    data: *const u8,
    len: usize,
    version: u16,
) -> *mut c_char {
    if data.is_null() || len == 0 {
        return std::ptr::null_mut();
    }
    let bytes = unsafe { std::slice::from_raw_parts(data, len) };

    match render_map_json_from_bytes(bytes, version) {
        Ok(json) => into_c_string(json),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a string previously returned by systemlib functions.
///
/// # Safety
/// `ptr` must be a string previously returned by a systemlib function, or null.
#[no_mangle]
pub unsafe extern "C" fn systemlib_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}
