pub mod store_stats;
