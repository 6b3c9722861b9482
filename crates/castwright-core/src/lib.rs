//! # Castwright Core
//!
//! Audio synthesis and assembly engine for narrated episodes.
//!
//! ## Features
//!
//! - Boundary-aware text chunking and midpoint bisection
//! - Voice and engine fallback with per-attempt timeouts and backoff
//! - Byte-bounded synthesis units with contiguous numbering
//! - Transition cues between segments and size-capped distribution parts
//! - Reconstructed playback timestamps for every content item
//!
//! ## Example
//!
//! ```rust,no_run
//! use castwright_core::{ContentItem, EngineConfig, EpisodePipeline, RunContext};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = EpisodePipeline::from_config(EngineConfig::default())?;
//!     let ctx = RunContext::create("out", "episode")?;
//!     let script = "Welcome to the show.\n[[TRANSITION]]\nFirst story.";
//!     let items = vec![ContentItem::new("First story", 1)];
//!
//!     let episode = pipeline.run(script, &items, &ctx).await?;
//!     for entry in &episode.timestamps {
//!         println!("{} {}", entry.label(), entry.title);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod assembler;
pub mod config;
pub mod context;
pub mod cue;
pub mod episode;
pub mod error;
pub mod grouping;
pub mod media;
pub mod pipeline;
pub mod report;
pub mod script;
pub mod segmenter;
pub mod synthesis;
pub mod timestamps;
pub mod unit_generator;

// Re-export main types for convenience
pub use assembler::{Assembler, AssembledStream, DistributionPart, SplitPolicy};
pub use config::{EngineConfig, SpeechRate};
pub use context::RunContext;
pub use cue::{RenderedCue, TransitionCue};
pub use episode::{AudioChunk, ContentItem, Episode, Group, TextSegment, TimestampEntry, TimestampMap};
pub use error::{CastError, CastResult};
pub use grouping::{GroupedAudio, SegmentGrouper};
pub use media::{FfmpegTool, MediaTool};
pub use pipeline::EpisodePipeline;
pub use report::{OversizeReason, RunIssue, RunReport, Severity};
pub use synthesis::{
    Candidate, CandidateState, RetryPolicy, SpeechApiBackend, SpeechBackend, SynthesisAdapter,
    TranslateTtsBackend,
};
pub use unit_generator::{UnitBatch, UnitGenerator};

/// Version information for the castwright-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
