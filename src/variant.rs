use serde::{Deserialize, Serialize};

use crate::link_define::{
    CK3862S_FRAME_LEN, CK3862S_ITEM_COUNT, CK3864S_FRAME_LEN, CK3864S_ITEM_COUNT, CMD_CK3862S,
    CMD_CK3864S,
};

/// Supported controller models. They differ in parameter count and in the
/// command byte of their normal write / read response frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum DeviceVariant {
    #[default]
    #[serde(rename = "CK3864S")]
    Ck3864s,
    #[serde(rename = "CK3862S")]
    Ck3862s,
}

impl DeviceVariant {
    pub const ALL: [Self; 2] = [Self::Ck3864s, Self::Ck3862s];

    /// Parse a variant from its model name, case-insensitive.
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ck3864s => "CK3864S",
            Self::Ck3862s => "CK3862S",
        }
    }

    #[must_use]
    pub const fn item_count(&self) -> usize {
        match self {
            Self::Ck3864s => CK3864S_ITEM_COUNT,
            Self::Ck3862s => CK3862S_ITEM_COUNT,
        }
    }

    /// Command byte of the normal write frame and of the read response.
    #[must_use]
    pub const fn command(&self) -> u8 {
        match self {
            Self::Ck3864s => CMD_CK3864S,
            Self::Ck3862s => CMD_CK3862S,
        }
    }

    #[must_use]
    pub const fn frame_len(&self) -> usize {
        match self {
            Self::Ck3864s => CK3864S_FRAME_LEN,
            Self::Ck3862s => CK3862S_FRAME_LEN,
        }
    }

    /// Variant whose normal frames carry `command`.
    #[must_use]
    pub const fn from_command(command: u8) -> Option<Self> {
        match command {
            CMD_CK3864S => Some(Self::Ck3864s),
            CMD_CK3862S => Some(Self::Ck3862s),
            _ => None,
        }
    }
}

impl std::str::FromStr for DeviceVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s).ok_or_else(|| format!("unknown device variant: {s}"))
    }
}

impl std::fmt::Display for DeviceVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
