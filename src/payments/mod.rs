pub mod gateway;
pub mod reconciler;
pub mod refund;
pub mod stripe_gateway;

pub use gateway::{ChargeView, IntentView, PaymentGateway, RefundView, UnconfiguredGateway};
pub use reconciler::{PaymentReconciler, ProviderEvent, ProviderEventKind, ReconcileOutcome};
pub use refund::{RefundOutcome, RefundProcessor};
pub use stripe_gateway::{parse_webhook_event, StripeGateway};
