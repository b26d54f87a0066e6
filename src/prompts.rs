//! System prompts and few-shot exchanges for storyboard and code synthesis.
//!
//! Prompt wording is tuning, not engineering: it lives here so that the
//! stage modules only assemble messages and never embed text.

/// System prompt for storyboard synthesis.
///
/// The storyboard sections (Topic, Key Points, Visual Elements, Style) are
/// what the code-generation prompt expects to read back.
pub const SCENE_SYSTEM_PROMPT: &str = r#"You are an expert educator who designs short explanatory animations in the style of 3Blue1Brown, rendered with the Manim Community library.

Given a concept, a document, or an image of notes, write a storyboard for one animation of 30–90 seconds. Use exactly these sections:

**Topic**: one line naming the concept.

**Key Points**:
1. The ideas to convey, in the order they should appear.
2. Include the exact formulas (LaTeX) that must be shown.

**Visual Elements**:
- Concrete on-screen objects for each key point: equations, axes, graphs, shapes, arrows, labels.
- How they appear, transform, and leave the screen.

**Style**: colours, pacing, and tone.

Rules:
- Every visual must be achievable with standard Manim primitives (Text, MathTex, Axes, Circle, Arrow, VGroup, Transform, Write, FadeIn, FadeOut).
- Do not write any code.
- Keep the storyboard focused on a single scene."#;

/// User/assistant exchanges prepended to a text-prompt storyboard request.
pub const SCENE_EXAMPLES: &[(&str, &str)] = &[
    (
        "Explain the Pythagorean theorem",
        r#"**Topic**: The Pythagorean theorem

**Key Points**:
1. In a right triangle the legs a and b and hypotenuse c satisfy $a^2 + b^2 = c^2$.
2. Squares built on each side make the areas visible.
3. The two smaller areas add up exactly to the largest.

**Visual Elements**:
- A right triangle drawn with Create, sides labelled a, b, c.
- Squares grow outward from each side, filled with distinct colours.
- The areas a², b² slide together and Transform into c².
- The equation $a^2 + b^2 = c^2$ is written beneath the triangle.

**Style**: dark background, blue and yellow accents, calm pacing with short pauses after each step."#,
    ),
    (
        "What is a derivative?",
        r#"**Topic**: The derivative as the slope of a tangent line

**Key Points**:
1. The secant slope $\frac{f(x+h) - f(x)}{h}$ between two points on a curve.
2. As $h \to 0$ the secant approaches the tangent.
3. The limit is the derivative $f'(x)$.

**Visual Elements**:
- Axes with the graph of $f(x) = x^2$.
- Two dots on the curve joined by a secant line; the difference quotient written above.
- The second dot slides toward the first while the secant rotates into the tangent.
- The final tangent is highlighted and labelled $f'(x)$.

**Style**: minimal, green curve on dark background, smooth continuous motion."#,
    ),
];

/// User/assistant exchange prepended to a document (PDF pages) storyboard request.
pub const PDF_EXAMPLE: &[(&str, &str)] = &[(
    "The attached pages are from a research paper. Summarise its central idea as an animation storyboard.",
    r#"**Topic**: Scaled dot-product attention

**Key Points**:
1. Queries, keys, and values are matrices derived from the same input.
2. Attention weights are $\mathrm{softmax}\left(\frac{QK^T}{\sqrt{d_k}}\right)$.
3. The output is the weighted sum of the values.

**Visual Elements**:
- Three labelled matrices Q, K, V appear side by side.
- K transposes, multiplies with Q, and the product grid fades in.
- The grid is divided by $\sqrt{d_k}$ and colour-coded by softmax weight.
- Weighted rows of V merge into the output matrix.

**Style**: clean, matrix cells as coloured squares, deliberate pacing."#,
)];

/// Instruction accompanying the page images of a document request.
pub const DOCUMENT_INSTRUCTION: &str =
    "The attached pages are from a document. Create a detailed scene description for animating its central concept.";

/// Instruction accompanying a handwriting image in vision mode.
pub const HANDWRITING_INSTRUCTION: &str =
    "Please analyze this handwritten mathematical content and create a detailed scene description for animating the concepts shown in the image.";

/// System prompt for code synthesis.
pub const CODE_SYSTEM_PROMPT: &str = r#"You are an expert Manim Community (v0.18+) developer. Turn the storyboard you are given into one complete, runnable Python program.

Requirements:
- Start with `from manim import *`.
- Define exactly one class that inherits from `Scene` (or `MovingCameraScene` / `ThreeDScene` when the storyboard needs it) and implement `construct(self)`.
- Use only objects and animations that exist in Manim Community; do not load external files, images, or sounds.
- Keep the total runtime under 90 seconds and clean up objects with FadeOut when they are no longer needed.
- Return the program in a single ```python fenced code block, with no other code blocks."#;

/// Wrap OCR output into a text prompt for the storyboard model.
pub fn recognized_text_prompt(extracted: &str) -> String {
    format!(
        "The following text was extracted from handwritten content (including mathematical formulas and regular text):\n\n{}\n\nPlease create a detailed scene description for animating the concepts found in this handwritten content.",
        extracted.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_prompt_names_every_section() {
        for section in ["Topic", "Key Points", "Visual Elements", "Style"] {
            assert!(SCENE_SYSTEM_PROMPT.contains(section), "missing {section}");
        }
    }

    #[test]
    fn few_shot_answers_follow_schema() {
        for (_, answer) in SCENE_EXAMPLES.iter().chain(PDF_EXAMPLE) {
            assert!(answer.starts_with("**Topic**"));
            assert!(answer.contains("**Visual Elements**"));
        }
    }

    #[test]
    fn code_prompt_requests_fenced_python() {
        assert!(CODE_SYSTEM_PROMPT.contains("```python"));
    }

    #[test]
    fn recognized_prompt_embeds_text() {
        let p = recognized_text_prompt("  x^2 - 5x + 6 = 0\n");
        assert!(p.contains("\n\nx^2 - 5x + 6 = 0\n\n"));
    }
}
