//! Memory-image tooling for the archsim simulation kernel.

use tracing_subscriber as _;

/// Loading images into a one-memory circuit and reporting on them.
pub mod inspect;
