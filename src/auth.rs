//! Bearer-token lifecycle: cached state, the two acquisition flows, and the manager that
//! refreshes, extends, and revokes tokens.

mod manager;
mod metrics;
mod secret;
mod state;

pub use self::{manager::*, metrics::*, secret::*, state::*};
