//! Client-side data pipeline of the dashboard: fetch, normalize, select,
//! bin and advise.

pub mod advisor;
pub mod calendar;
pub mod fetcher;
pub mod hourly;
pub mod models;
pub mod normalizer;
pub mod poller;
pub mod selector;
pub mod session;
pub mod view;

pub use fetcher::Fetcher;
pub use poller::{Poller, PollerHandle, PollerSettings, Snapshot};
