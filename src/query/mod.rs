pub mod ast;
pub mod builder;
pub mod compiler;
pub mod render;
