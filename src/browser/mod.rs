// Browser module - filter state, query/download orchestration, open players

pub mod controller;
pub mod errors;
pub mod models;
pub mod registry;

pub use controller::{headless_engines, BrowserEvent, EngineFactory, Update, VideoBrowserController};
pub use errors::BrowserError;
pub use models::{
    DownloadState, FilterCriteria, QueryState, RequestId, SelectionState, Topology, ALL_DEVICES,
    DEFAULT_SEARCH_DAYS,
};
pub use registry::OpenSessionRegistry;
