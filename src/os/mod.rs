// src/os/mod.rs

pub mod poll;
