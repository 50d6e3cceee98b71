//! Wire protocol for the update server.
//!
//! The server speaks a small GET-only protocol. Responses are parsed into
//! typed records first; a body that is not valid JSON falls back to a scan
//! for the literal truthy patterns, matching what the server has always
//! emitted. Malformed bodies therefore mean "no action", never an error.
//! The wire format is owned by the server, so the device stays permissive.

use serde::Deserialize;

pub const CHECK_UPDATE_PATH: &str = "/check_update";
pub const CHECK_FLAGS_PATH: &str = "/check_flags";
pub const FIRMWARE_PATH: &str = "/download/firmware.bin";

/// Response body of `/check_update`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UpdateCheck {
    /// A newer firmware image exists on the server. Informational only.
    #[serde(default)]
    pub update: bool,
}

/// Response body of `/check_flags?mac=<device id>`.
///
/// Both fields are independent. Absent or false fields request nothing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DeviceFlags {
    /// The server asks this device to download the staged firmware image.
    #[serde(default)]
    pub download: bool,
    /// The server asks this device to apply the staged image.
    #[serde(default)]
    pub update: bool,
}

impl UpdateCheck {
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self {
            update: contains_true(body, "update"),
        })
    }
}

impl DeviceFlags {
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self {
            download: contains_true(body, "download"),
            update: contains_true(body, "update"),
        })
    }
}

fn contains_true(body: &str, key: &str) -> bool {
    body.contains(&format!("\"{key}\":true"))
}

pub fn check_update_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), CHECK_UPDATE_PATH)
}

pub fn check_flags_url(base: &str, device_id: &str) -> String {
    format!(
        "{}{}?mac={}",
        base.trim_end_matches('/'),
        CHECK_FLAGS_PATH,
        device_id
    )
}

pub fn firmware_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), FIRMWARE_PATH)
}
