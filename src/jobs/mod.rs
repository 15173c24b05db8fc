pub mod market_data_sync;
