//! Hardware device backends.
//!
//! Feature-gated so headless hosts build without platform audio stacks.
//! Each backend keeps its non-`Send` platform objects on a dedicated thread
//! and exposes the same trait surface as the simulated devices.

#[cfg(feature = "cpal-backend")]
mod cpal_mic;
#[cfg(feature = "cpal-backend")]
pub use cpal_mic::CpalMicrophone;

#[cfg(feature = "rodio-backend")]
mod rodio_sink;
#[cfg(feature = "rodio-backend")]
pub use rodio_sink::RodioSink;
