//! Protocol constants shared by the codec and both session engines.
//!
//! Every frame on the wire is `[command][length][payload...][checksum]` with
//! single-byte fields. The checksum is the low byte of `length + sum(payload)`.
//! The only exception is the read request, a fixed 5-byte sequence defined by
//! the controller firmware.

use std::time::Duration;

/// Normal write / read response command of the 13-item controller (CK3864S).
pub const CMD_CK3864S: u8 = 0xAA;

/// Normal write / read response command of the 8-item controller (CK3862S).
pub const CMD_CK3862S: u8 = 0x55;

/// Live-debug poll command, used for both the poll write and its response.
pub const CMD_DEBUG: u8 = 0x4B;

/// Read request opcode.
pub const CMD_READ_REQUEST: u8 = 0x38;

pub const CK3864S_ITEM_COUNT: usize = 13;
pub const CK3862S_ITEM_COUNT: usize = 8;

/// command + length + checksum
pub const FRAME_OVERHEAD: usize = 3;

pub const CK3864S_FRAME_LEN: usize = CK3864S_ITEM_COUNT + FRAME_OVERHEAD;
pub const CK3862S_FRAME_LEN: usize = CK3862S_ITEM_COUNT + FRAME_OVERHEAD;

/// Total length of a debug poll response.
pub const DEBUG_RESPONSE_LEN: usize = 5;

/// Read request: opcode, zero address/length fields, trailing byte fixed by firmware.
pub const READ_REQUEST: [u8; 5] = [CMD_READ_REQUEST, 0x02, 0x00, 0x00, 0x02];

/// Transfer timeout and timer period.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_millis(50);
/// Debug write cadence; also the steady-state response bound.
pub const DEFAULT_DEBUG_WRITE_INTERVAL: Duration = Duration::from_millis(200);
/// Debug read-timeout timer period.
pub const DEFAULT_DEBUG_READ_POLL: Duration = Duration::from_millis(50);
/// Max wait for the first byte of a debug response.
pub const DEFAULT_DEBUG_FIRST_RESPONSE: Duration = Duration::from_millis(1000);
/// Clock granularity used by the runtime to drive `tick(now)`.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Error code reported when the underlying port fails (resource error).
pub const TRANSPORT_RESOURCE_ERROR: i32 = -2;
