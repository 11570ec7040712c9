#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown,
    clippy::too_long_first_doc_paragraph
)]

//! motor_link
//!
//! Serial transfer protocol engine for the CK3864S / CK3862S motor
//! controllers: frame codec, parameter registry, the write/read transfer
//! engine and the live-debug poll loop.
//!
//! Main pieces:
//! - frame building and validation (`link_frame`)
//! - per-model parameter lists with bounds (`device_registry`)
//! - sans-IO state machines driven by `tick(now)` (`transfer`, `debug_session`)
//! - the `MotorLink` coordinator and a tokio driver (`link`, `runtime`)
//! - a simulated controller for tests (separate crate `motor_link_mock`)
//!
//! Short example:
//! ```no_run
//! use motor_link::{runtime, DeviceRegistry, DeviceVariant, LinkTiming};
//! # async fn run() -> Result<(), motor_link::LinkError> {
//! let registry = DeviceRegistry::new(DeviceVariant::Ck3864s);
//! let (link, mut events) =
//!     runtime::connect_tcp("127.0.0.1:5020", registry, LinkTiming::from_config()).await?;
//! link.connect().await?;
//! link.read().await?;
//! let _ = events.recv().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod debug_session;
pub mod device_registry;
pub mod error;
pub mod link;
pub mod link_define;
pub mod link_frame;
pub mod parameter;
pub mod runtime;
pub mod session;
pub mod test_utils;
pub mod toml_helpers;
pub mod transfer;
pub mod transport;
pub mod variant;

pub use config::LinkTiming;
pub use device_registry::{DeviceRegistry, VariantCatalog};
pub use error::{EncodeError, LinkError, TransportError, ValidationError};
pub use link::{LinkMode, MotorLink};
pub use parameter::Parameter;
pub use runtime::{LinkEvent, LinkHandle};
pub use session::{SessionObserver, StopReason};
pub use transfer::TransferPhase;
pub use variant::DeviceVariant;

/// Install `env_logger` for the `log` facade.
///
/// Safe to call more than once; later calls are no-ops. Level comes from
/// `RUST_LOG` as usual.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
