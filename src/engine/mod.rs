//! Remote engine boundary.
//!
//! This module defines the seam between this crate and the remote analytic
//! engine. The engine is an opaque capability: the driver only ever sees a
//! [`SessionFactory`] that opens stateful query sessions and a
//! [`QuerySession`] that is advanced page by page until it reports itself
//! invalid. Wire protocol, transport and authentication all live on the far
//! side of these traits.

mod error;
mod session;

pub use error::{EngineError, EngineResult};
pub use session::{ColumnDescriptor, QuerySession, ResultPage, SessionFactory, SessionHandle};
