//! External service integrations.

pub mod gateway_client {
    pub use crate::gateway_client::*;
}

pub mod payment {
    pub use crate::payment::*;
}

pub mod session_store {
    pub use crate::session_store::*;
}
