pub mod actor;
pub mod blackout;
pub mod booking;
pub mod business;
pub mod outbox;
pub mod payment;
pub mod schedule;
pub mod webhook;

pub use actor::*;
pub use blackout::*;
pub use booking::*;
pub use business::*;
pub use outbox::*;
pub use payment::*;
pub use schedule::*;
pub use webhook::*;
