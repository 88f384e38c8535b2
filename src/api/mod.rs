// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod errors {
    pub use crate::errors::*;
}

pub mod navigation {
    pub use crate::navigation::*;
}
