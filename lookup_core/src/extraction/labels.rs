//! Field naming tables for extracted records.

/// Envelope and bookkeeping keys that never reach the user (lower-case).
pub const SKIP_KEYS: &[&str] = &[
    "header",
    "total_records",
    "success",
    "result",
    "data",
    "creator",
    "developer",
];

const FIELD_LABELS: &[(&str, &str)] = &[
    ("mobile", "📱 ᴍᴏʙɪʟᴇ"),
    ("name", "👤 ɴᴀᴍᴇ"),
    ("fname", "👨 ғᴀᴛʜᴇʀ"),
    ("address", "📍 ᴀᴅᴅʀᴇss"),
    ("circle", "📡 ᴄɪʀᴄʟᴇ"),
    ("email", "📧 ᴇᴍᴀɪʟ"),
    ("alt", "📞 ᴀʟᴛ"),
    ("id", "📝 ɪᴅ"),
];

#[must_use]
pub fn is_skipped(key: &str) -> bool {
    let key = key.to_lowercase();
    SKIP_KEYS.contains(&key.as_str())
}

/// Display label for a known field, matched case-insensitively.
#[must_use]
pub fn known_label(key: &str) -> Option<&'static str> {
    let key = key.to_lowercase();
    FIELD_LABELS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, label)| *label)
}
