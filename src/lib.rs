pub mod counters;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod reshape;
pub mod stats;
pub mod view;
