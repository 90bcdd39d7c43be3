//! Core library for lightsync.
//!
//! Turns a live audio stream into lighting control frames. Each block is
//! reduced to mono, transformed into a magnitude spectrum, summarised as
//! bass/mid/treble levels plus a beat flag, and quantized into a
//! `<bass>,<mid>,<treble>,<beat>` record for a serial lighting controller.
//!
//! The per-block work lives in [`Pipeline`], which the capture layer drives
//! synchronously. Delivery to the controller happens on a separate thread
//! ([`TransportWorker`]) and display code reads the smoothed spectrum through
//! a [`RenderHandle`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod render;
pub mod transport;

pub use analysis::{
    AnalysisEngine, AnalysisFrame, Band, BandEnergies, BandLayout, BeatDetector, EnergyHistory,
    SpectralAnalyzer,
};
pub use audio::{AudioBlock, BlockAssembler, BlockLayout};
pub use config::{
    AnalysisConfig, AppConfig, AudioConfig, BandEdges, BandRange, RenderConfig, TransportConfig,
    WarmupPolicy, WindowKind,
};
pub use error::{LightSyncError, Result};
pub use mapping::{ControlFrame, Quantizer};
pub use pipeline::{BlockOutput, Pipeline};
pub use render::{RenderHandle, RenderPublisher, SpectrumSnapshot};
pub use transport::{FrameSender, FrameSink, LineSink, TransportStats, TransportWorker};
