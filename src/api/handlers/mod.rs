pub mod bookings;
pub mod root;
pub mod webhooks;
