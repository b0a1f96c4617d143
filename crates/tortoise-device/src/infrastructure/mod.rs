//! Infrastructure layer for the device.
//!
//! Contains the adapters behind the application-layer ports: frame sources,
//! the JPEG encoder, display metrics, gesture dispatchers, TOML config
//! storage, and the command bridge.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `tortoise_core`, but MUST NOT be imported by the `application` or domain
//! layers.
//!
//! # Sub-modules
//!
//! - **`frame_source`** – `ScreenProjector` / `FrameSource` implementations.
//!   The synthetic projector renders a moving test pattern into a fixed slot
//!   pool and is what the demo binary and the integration tests run against.
//!
//! - **`encoder`** – `FrameEncoder` backed by the `image` crate's JPEG codec.
//!
//! - **`display_info`** – `DisplayProbe` returning fixed metrics.
//!
//! - **`gesture_dispatch`** – `GestureDispatcher` implementations (recording
//!   and tracing) plus the `AccessibilityBinding` that issues injector
//!   handles.
//!
//! - **`storage`** – TOML config file persistence.
//!
//! - **`ui_bridge`** – Control command handlers returning `CommandResult`.

pub mod display_info;
pub mod encoder;
pub mod frame_source;
pub mod gesture_dispatch;
pub mod storage;
pub mod ui_bridge;
