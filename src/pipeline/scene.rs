//! Storyboard synthesis: normalised input → [`SceneDescription`].
//!
//! ## Message Layout
//!
//! 1. **System**: [`SCENE_SYSTEM_PROMPT`], the storyboard schema
//! 2. **Few-shot**: fixed user/assistant exchanges ([`SCENE_EXAMPLES`] for
//!    text, [`PDF_EXAMPLE`] for documents; none for handwriting)
//! 3. **User**: the caller's text, or page images with an instruction
//!
//! The model's reply is returned verbatim. Whether it actually follows the
//! schema is only observable downstream, when extraction succeeds or not.

use crate::error::TransportError;
use crate::pipeline::llm::{complete_with_retries, ModelClient, RetryPolicy, Turn};
use crate::prompts::{DOCUMENT_INSTRUCTION, PDF_EXAMPLE, SCENE_EXAMPLES, SCENE_SYSTEM_PROMPT};
use crate::request::{NormalizedInput, PageImage, PageSource, SceneDescription};
use tracing::{info, warn};

fn few_shot(turns: &mut Vec<Turn>, examples: &[(&str, &str)]) {
    for (user, assistant) in examples {
        turns.push(Turn::user(*user));
        turns.push(Turn::assistant(*assistant));
    }
}

/// Build the turn sequence for a storyboard request.
pub fn build_scene_turns(input: &NormalizedInput) -> Vec<Turn> {
    let mut turns = vec![Turn::system(SCENE_SYSTEM_PROMPT)];

    match input {
        NormalizedInput::Text(prompt) => {
            few_shot(&mut turns, SCENE_EXAMPLES);
            turns.push(Turn::user(prompt.as_str()));
        }
        NormalizedInput::Pages {
            source,
            images,
            instruction,
        } => {
            let default_instruction = match source {
                PageSource::Document => {
                    few_shot(&mut turns, PDF_EXAMPLE);
                    DOCUMENT_INSTRUCTION
                }
                PageSource::Handwriting => "",
            };
            let text = instruction.as_deref().unwrap_or(default_instruction);
            turns.push(Turn::user_with_images(text, images.clone()));
        }
    }

    turns
}

/// Synthesise a storyboard with one model call plus transport retries.
pub async fn synthesize_scene(
    client: &dyn ModelClient,
    input: &NormalizedInput,
    model: &str,
    policy: RetryPolicy,
) -> Result<SceneDescription, TransportError> {
    let turns = build_scene_turns(input);
    let text = complete_with_retries(client, model, &turns, policy).await?;
    info!("Storyboard from {}: {} chars", model, text.len());
    Ok(SceneDescription(text))
}

/// Document variant: page images straight to the vision model.
///
/// When the call against `model` fails and a `fallback` is configured, the
/// full call is repeated exactly once against the fallback before the error
/// surfaces.
pub async fn synthesize_document_scene(
    client: &dyn ModelClient,
    pages: &[PageImage],
    instruction: Option<&str>,
    model: &str,
    fallback: Option<&str>,
    policy: RetryPolicy,
) -> Result<SceneDescription, TransportError> {
    let input = NormalizedInput::Pages {
        source: PageSource::Document,
        images: pages.to_vec(),
        instruction: instruction.map(str::to_string),
    };

    match synthesize_scene(client, &input, model, policy).await {
        Ok(scene) => Ok(scene),
        Err(e) => match fallback {
            Some(fallback) if fallback != model => {
                warn!("Document storyboard failed on {} ({}); retrying with {}", model, e, fallback);
                synthesize_scene(client, &input, fallback, policy).await
            }
            _ => Err(e),
        },
    }
}

/// Dispatch on the input shape: documents get the fallback-model variant.
pub async fn describe(
    client: &dyn ModelClient,
    input: &NormalizedInput,
    model: &str,
    fallback: Option<&str>,
    policy: RetryPolicy,
) -> Result<SceneDescription, TransportError> {
    match input {
        NormalizedInput::Pages {
            source: PageSource::Document,
            images,
            instruction,
        } => {
            synthesize_document_scene(
                client,
                images,
                instruction.as_deref(),
                model,
                fallback,
                RetryPolicy::NONE,
            )
            .await
        }
        other => synthesize_scene(client, other, model, policy).await,
    }
}
