pub mod session;
pub mod wizard;

pub use session::{SessionState, Stage, Ticket};
pub use wizard::Wizard;
