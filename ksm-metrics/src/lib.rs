pub mod cache;
pub mod family;
pub mod filter;
pub mod labels;
pub mod render;
pub mod watcher;

pub use crate::cache::KindCache;
pub use crate::family::{Family, MetricType, Sample};
pub use crate::filter::NameFilter;
pub use crate::labels::{KeyAllowList, sanitize_label_key};
pub use crate::watcher::{ReadyTx, ShardConfig};
