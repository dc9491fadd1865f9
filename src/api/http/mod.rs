// src/api/http/mod.rs

pub mod records;
pub mod retrieval;
pub mod router;
pub mod summarize;
