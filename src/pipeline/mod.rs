//! Pipeline stages for request-to-animation generation.
//!
//! Each submodule implements one transformation step and can be tested in
//! isolation; [`crate::orchestrator`] sequences them and owns the retries.
//!
//! ## Data Flow
//!
//! ```text
//! request ──▶ normalize ──▶ scene ──▶ code ──▶ extract ──▶ render
//!            (pdfium/sniff) (VLM)     (LLM)   (regex)     (manim)
//! ```
//!
//! 1. [`normalize`]: validate the request; PDFs go through [`rasterize`]
//!    (pdfium in `spawn_blocking`) and [`encode`] (PNG)
//! 2. [`scene`]: storyboard synthesis with transport retries; the
//!    document variant falls back to a second model once
//! 3. [`code`]: one call turning the storyboard into a program
//! 4. [`extract`]: isolate the fenced code and its single scene class
//! 5. [`render`]: run the engine in a scoped directory, persist the video
//!
//! [`llm`] holds the model seam shared by stages 2 and 3.

pub mod code;
pub mod encode;
pub mod extract;
pub mod llm;
pub mod normalize;
pub mod rasterize;
pub mod render;
pub mod scene;
