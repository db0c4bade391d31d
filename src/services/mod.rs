//! Seams to the external collaborators: the time-series store and the chat
//! destination. Concrete clients live under `infra`.

pub mod notifier;
pub mod timeseries;
