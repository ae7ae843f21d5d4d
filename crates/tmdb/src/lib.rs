//! The Movie Database (TMDB) implementation of [`ebert_core::MovieCatalog`].

pub mod client;

pub use client::TmdbClient;
