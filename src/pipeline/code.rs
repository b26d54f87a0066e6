//! Code synthesis: storyboard → [`GeneratedProgram`].
//!
//! A single model call with no retry of its own. A bad program is usually
//! the product of a bad storyboard, so recovery belongs to the orchestrator,
//! which restarts the whole chain from storyboard synthesis.

use crate::error::TransportError;
use crate::pipeline::llm::{ModelClient, Turn};
use crate::prompts::CODE_SYSTEM_PROMPT;
use crate::request::{GeneratedProgram, SceneDescription};
use tracing::info;

pub fn build_code_turns(scene: &SceneDescription) -> Vec<Turn> {
    vec![Turn::system(CODE_SYSTEM_PROMPT), Turn::user(scene.as_str())]
}

pub async fn synthesize_code(
    client: &dyn ModelClient,
    scene: &SceneDescription,
    model: &str,
) -> Result<GeneratedProgram, TransportError> {
    let text = client.complete(model, &build_code_turns(scene)).await?;
    info!("Program from {}: {} chars", model, text.len());
    Ok(GeneratedProgram(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysDown(AtomicU32);

    #[async_trait]
    impl ModelClient for AlwaysDown {
        async fn complete(&self, model: &str, _turns: &[Turn]) -> Result<String, TransportError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Timeout {
                model: model.into(),
                secs: 1,
            })
        }
    }

    #[test]
    fn user_turn_is_the_storyboard() {
        let scene = SceneDescription("**Topic**: circles".into());
        let turns = build_code_turns(&scene);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, CODE_SYSTEM_PROMPT);
        assert_eq!(turns[1].text, "**Topic**: circles");
    }

    #[tokio::test]
    async fn does_not_retry() {
        let client = AlwaysDown(AtomicU32::new(0));
        let scene = SceneDescription("x".into());
        assert!(synthesize_code(&client, &scene, "m").await.is_err());
        assert_eq!(client.0.load(Ordering::SeqCst), 1);
    }
}
