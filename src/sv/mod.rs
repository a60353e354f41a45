pub mod entitlement;
pub mod identity;
pub mod license;
pub mod quota;

pub use entitlement::{Entitlement, Tier};
pub use identity::Identity;
pub use license::License;
pub use quota::{Quota, Usage};
