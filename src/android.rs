//! JNI bindings for Android.
//!
//! These functions are called from Kotlin via the JNI bridge.

use jni::objects::{JByteArray, JClass};
use jni::sys::{jint, jstring};
use jni::JNIEnv;

use crate::{decode_system, render_map_json_from_bytes, system_to_json};

fn to_jstring(env: &mut JNIEnv, result: Result<String, String>) -> jstring {
    match result {
        Ok(json) => match env.new_string(&json) {
            Ok(js) => js.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        Err(err) => {
            log::warn!("{err}");
            std::ptr::null_mut()
        }
    }
}

fn file_version(version: jint) -> Result<u16, String> {
    u16::try_from(version).map_err(|_| format!("Invalid file version {version}"))
}

/// Decode system bytes to JSON.
///
/// Called from Kotlin as:
///   external fun decodeSystem(data: ByteArray, version: Int): String?
#[no_mangle]
pub extern "system" fn Java_com_powertab_app_SystemLib_decodeSystem(
    mut env: JNIEnv,
    _class: JClass,
    data: JByteArray,
    version: jint,
) -> jstring {
    let bytes = match env.convert_byte_array(&data) {
        Ok(b) => b,
        Err(_) => return std::ptr::null_mut(),
    };

    let result = file_version(version)
        .and_then(|v| decode_system(&bytes, v))
        .and_then(|system| system_to_json(&system));
    to_jstring(&mut env, result)
}

/// Decode system bytes and return the render map as JSON.
///
/// Called from Kotlin as:
///   external fun renderMap(data: ByteArray, version: Int): String?
#[no_mangle]
pub extern "system" fn Java_com_powertab_app_SystemLib_renderMap(
    mut env: JNIEnv,
    _class: JClass,
    data: JByteArray,
    version: jint,
) -> jstring {
    let bytes = match env.convert_byte_array(&data) {
        Ok(b) => b,
        Err(_) => return std::ptr::null_mut(),
    };

    let result = file_version(version).and_then(|v| render_map_json_from_bytes(&bytes, v));
    to_jstring(&mut env, result)
}
