// src/lib.rs

//! Ditorja article retrieval library
//!
//! Fetches article rows from the hosted row store, reconciles their legacy
//! shapes into canonical [`models::Article`] records and resolves category
//! slugs through a time-bounded mapping cache.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{AppError, Result};
pub use models::{Article, ArticleStatus, Category, Config};
pub use services::{ArticleService, CategoryCache, QueryOutcome};
pub use utils::slug::slugify;
