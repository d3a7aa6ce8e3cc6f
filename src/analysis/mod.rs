pub mod normalizer;
pub mod token;
pub mod tokenizer;
