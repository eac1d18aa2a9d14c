pub mod app;
mod plan;
mod sources;
mod sync;
