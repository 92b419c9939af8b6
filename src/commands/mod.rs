pub mod annotate;
pub mod catalog;
