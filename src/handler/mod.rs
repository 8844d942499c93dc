pub mod cache_warmup;
