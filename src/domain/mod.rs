pub mod hasher;
pub mod models;
pub mod position;
