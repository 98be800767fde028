//! StickerStudio: a sticker design canvas with die-cut borders, a CPU
//! rasterizer, live pricing and a small egui editor on top.
//!
//! The engine ([`engine::CanvasEngine`]) is host-agnostic: the editor in
//! [`app`] and the headless [`cli`] both drive it the same way.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod error;
pub mod units;
pub mod settings;
pub mod scene;
pub mod image_cache;
pub mod autocrop;
pub mod surface;
pub mod text;
pub mod sticker;
pub mod render;
pub mod interaction;
pub mod upload;
pub mod pricing;
pub mod io;
pub mod engine;
pub mod cli;
pub mod app;
