//! Operator implementations. Each is reached through a provided method on
//! [`Publisher`](crate::publisher::Publisher); the types here are what those
//! methods return.

pub mod aggregate;
pub mod all_satisfy;
pub mod collect;
pub mod collect_by_time;
pub mod combine_latest;
pub mod compact_map;
pub mod comparison;
pub mod contains;
pub mod drop_until_output;
pub mod filter;
pub mod ignore_output;
pub mod map;
pub mod map_error;
pub mod measure_interval;
pub mod merge;
pub mod print;
pub mod receive_on;
pub mod reduce;
pub mod remove_duplicates;
pub mod replace_empty;
pub mod replace_error;
pub mod scan;
pub mod subscribe_on;
