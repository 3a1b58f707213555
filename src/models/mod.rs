pub mod affiliate;
pub mod plan;
pub mod referral;
pub mod transaction;

pub use affiliate::*;
pub use plan::*;
pub use referral::*;
pub use transaction::*;
