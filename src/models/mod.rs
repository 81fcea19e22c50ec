mod account;
mod activation_key;
mod audit;
mod license;
mod payment;
mod plan;

pub use account::*;
pub use activation_key::*;
pub use audit::*;
pub use license::*;
pub use payment::*;
pub use plan::*;
