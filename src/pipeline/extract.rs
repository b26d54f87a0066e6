//! Code extraction: isolate program source and its scene class.
//!
//! Two narrow rules, applied in order:
//!
//! 1. **Fence detection**: take the first fenced block that declares a
//!    scene class, else the first fenced block. With no fence at all the
//!    whole response is treated as code (lenient fallback).
//! 2. **Scene identification**: find `class Name(<...>Scene)` definitions.
//!    Exactly one must exist; zero or several means "retry the chain".
//!
//! Extraction is idempotent: the returned code contains no fence, so feeding
//! it back in yields the same code and scene id.

use crate::error::ExtractionFailure;
use crate::request::{ExtractedCode, GeneratedProgram};
use once_cell::sync::Lazy;
use regex::Regex;

// A closing fence must open its own line, so "```" inside a string survives.
static RE_FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)```[ \t]*([A-Za-z0-9_+-]*)[^\n]*\n(.*?)^[ \t]*```").unwrap()
});

// Any base in the list may be the scene: Scene, MovingCameraScene,
// ThreeDScene, manim.Scene, ...
static RE_SCENE_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*class[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*\(\s*(?:[^()]*,\s*)?(?:[A-Za-z_][A-Za-z0-9_]*\.)*[A-Za-z0-9_]*Scene\s*(?:,[^)]*)?\)\s*:").unwrap()
});

static RE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Whether `name` is a valid class identifier for the render engine.
pub fn is_valid_scene_id(name: &str) -> bool {
    RE_IDENTIFIER.is_match(name)
}

/// Every scene class declared in `code`, in order.
pub fn scene_classes(code: &str) -> Vec<String> {
    RE_SCENE_CLASS
        .captures_iter(code)
        .map(|c| c[1].to_string())
        .collect()
}

fn isolate_code(response: &str) -> Option<String> {
    let blocks: Vec<&str> = RE_FENCED_BLOCK
        .captures_iter(response)
        .filter_map(|c| c.get(2).map(|m| m.as_str()))
        .collect();

    let code = if blocks.is_empty() {
        response
    } else {
        blocks
            .iter()
            .copied()
            .find(|b| !scene_classes(b).is_empty())
            .unwrap_or(blocks[0])
    };

    let code = code.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

/// Extract code and scene id, reporting why extraction failed.
pub fn try_extract(program: &GeneratedProgram) -> Result<ExtractedCode, ExtractionFailure> {
    let code = isolate_code(program.as_str()).ok_or(ExtractionFailure::NoCode)?;

    let mut classes = scene_classes(&code);
    match classes.len() {
        0 => Err(ExtractionFailure::NoSceneClass),
        1 => Ok(ExtractedCode {
            code,
            scene_id: classes.remove(0),
        }),
        count => Err(ExtractionFailure::AmbiguousScene {
            count,
            names: classes.join(", "),
        }),
    }
}

/// Extract code and scene id; `None` means "retry the chain", not "abort".
pub fn extract(program: &GeneratedProgram) -> Option<ExtractedCode> {
    try_extract(program).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUADRATIC: &str = "from manim import *\n\nclass QuadraticFormula(Scene):\n    def construct(self):\n        self.play(Write(MathTex(r\"x = \\frac{-b \\pm \\sqrt{b^2-4ac}}{2a}\")))\n";

    fn program(s: &str) -> GeneratedProgram {
        GeneratedProgram(s.to_string())
    }

    #[test]
    fn extracts_fenced_python() {
        let resp = format!("Here is your animation:\n\n```python\n{QUADRATIC}```\n\nRun it with manim.");
        let out = extract(&program(&resp)).unwrap();
        assert_eq!(out.scene_id, "QuadraticFormula");
        assert!(out.code.starts_with("from manim import *"));
        assert!(!out.code.contains("```"));
        assert!(!out.code.contains("Here is"));
    }

    #[test]
    fn unfenced_response_is_treated_as_code() {
        let out = extract(&program(QUADRATIC)).unwrap();
        assert_eq!(out.scene_id, "QuadraticFormula");
        assert_eq!(out.code, QUADRATIC.trim());
    }

    #[test]
    fn prose_without_scene_is_none() {
        let resp = "I'm sorry, I cannot produce an animation for that.";
        assert_eq!(
            try_extract(&program(resp)),
            Err(ExtractionFailure::NoSceneClass)
        );
        assert!(extract(&program(resp)).is_none());
    }

    #[test]
    fn empty_response_is_no_code() {
        assert_eq!(try_extract(&program("  \n ")), Err(ExtractionFailure::NoCode));
        assert_eq!(
            try_extract(&program("```python\n```")),
            Err(ExtractionFailure::NoCode)
        );
    }

    #[test]
    fn two_scene_classes_are_ambiguous() {
        let code = "class A(Scene):\n    pass\n\nclass B(Scene):\n    pass\n";
        assert!(matches!(
            try_extract(&program(code)),
            Err(ExtractionFailure::AmbiguousScene { count: 2, .. })
        ));
    }

    #[test]
    fn recognises_scene_base_variants() {
        for base in ["Scene", "MovingCameraScene", "ThreeDScene", "manim.Scene"] {
            let code = format!("class Demo({base}):\n    pass\n");
            assert_eq!(scene_classes(&code), vec!["Demo"], "base {base}");
        }
        assert!(scene_classes("class Helper(VGroup):\n    pass\n").is_empty());
        assert!(scene_classes("class Helper(SceneMeta):\n    pass\n").is_empty());
        assert!(scene_classes("# class Fake(Scene) in a comment").is_empty());
    }

    #[test]
    fn scene_base_may_follow_a_mixin() {
        assert_eq!(scene_classes("class A(VGroup, Scene):\n    pass\n"), vec!["A"]);
        assert_eq!(
            scene_classes("class B(Mixin, manim.ThreeDScene, Other):\n    pass\n"),
            vec!["B"]
        );
    }

    #[test]
    fn inline_backticks_do_not_close_the_fence() {
        let resp = "```python\nclass A(Scene):\n    s = '''```'''\n```\n";
        let out = extract(&program(resp)).unwrap();
        assert_eq!(out.scene_id, "A");
        assert_eq!(out.code, "class A(Scene):\n    s = '''```'''");
    }

    #[test]
    fn prefers_block_containing_scene() {
        let resp = "```bash\nmanim -pql scene.py Demo\n```\n\n```python\nclass Demo(Scene):\n    pass\n```";
        let out = extract(&program(resp)).unwrap();
        assert_eq!(out.scene_id, "Demo");
        assert!(out.code.starts_with("class Demo"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let resp = format!("Sure!\n```py\n{QUADRATIC}\n```");
        let first = extract(&program(&resp)).unwrap();
        let second = extract(&program(&first.code)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn scene_id_validation() {
        assert!(is_valid_scene_id("QuadraticFormula"));
        assert!(is_valid_scene_id("_Scene2"));
        assert!(!is_valid_scene_id("2Fast"));
        assert!(!is_valid_scene_id("Bad Name"));
        assert!(!is_valid_scene_id("x; rm -rf /"));
        assert!(!is_valid_scene_id(""));
    }
}
