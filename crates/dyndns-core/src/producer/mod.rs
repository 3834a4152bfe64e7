// # Producers
//
// The two sources of observed addresses. Both end in the same
// `DispatchSender`; neither talks to the DNS provider.
//
// - **poller**: asks the gateway on a timer, dedups with its own `ChangeGate`
// - **push**: turns an inbound dyndns report into addresses, no dedup

pub mod poller;
pub mod push;

pub use poller::Poller;
pub use push::{PushListener, PushOutcome, PushReport};
