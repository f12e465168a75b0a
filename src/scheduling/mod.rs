pub mod conflict;
pub mod policy;
pub mod slots;

pub use conflict::{intervals_overlap, ConflictDetector};
pub use policy::{CancellationPolicy, PolicyDecision};
pub use slots::{available_slots, BusyInterval, Slot, SlotContext, SlotStatus};
