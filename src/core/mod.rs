// Domain-layer modules and shared models
pub mod eligibility {
    pub use crate::eligibility::*;
}

pub mod application {
    pub use crate::application::*;
}

pub mod validation {
    pub use crate::validation::*;
}

pub mod catalog {
    pub use crate::catalog::*;
}

pub mod models {
    pub use crate::models::*;
}
