//! medcite-index — Qdrant access for the abstract index.
//!
//! One collection, one named vector per embedding model. The vector field
//! name is derived from the model name by `schema::embedding_field_name`;
//! both the upsert path and the search path go through that single
//! function, which is what keeps the write and read sides addressing the
//! same vector space.

pub mod client;
pub mod schema;

pub use client::{IndexError, QdrantStore, ScoredPoint, VectorSearch};
pub use schema::{embedding_field_name, ArticlePayload, AuthorName, JournalInfo, PubDate};
