pub mod low_memory;
