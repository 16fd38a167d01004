pub mod ooxml;
pub mod source_reader;
pub mod writer;
pub mod xlsx_container;
mod xml;
