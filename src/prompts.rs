//! Prompts for the solve and recolor provider calls.
//!
//! Every instruction sent to the provider lives here so prompt changes never
//! touch pipeline or transport code, and so tests can inspect the exact text
//! without a live model.
//!
//! The solve request is assembled from parts: [`SOLVE_BASE_PROMPT`], then the
//! uploaded file, then either [`template_instruction`] or
//! [`SELF_CONTAINED_INSTRUCTION`]. Putting the template *after* the
//! attachment makes the model solve first and re-flow second.

/// Instructions sent ahead of the uploaded problem file.
pub const SOLVE_BASE_PROMPT: &str = r#"Analyze the provided image or PDF containing one or more math problems. Identify ALL problems presented.
For EACH problem:
1.  Clearly state the original problem using appropriate LaTeX formatting (e.g., using a \textbf{Question X:} prefix).
2.  Provide a detailed, step-by-step solution. Use LaTeX environments like {align*} or {enumerate} for clarity where appropriate.
3.  Include brief explanatory text *between* major steps or calculations within the solution to clarify the reasoning. This text should be part of the standard LaTeX flow.
4.  Ensure adequate vertical spacing between problems and between major steps within a solution (e.g., using \medskip, \bigskip, or paragraph breaks).
5.  Format the entire output (questions, steps, explanations, equations) using standard LaTeX suitable for direct compilation with pdflatex. Use the 'article' document class and common packages like 'amsmath'."#;

/// Appended after the attachment when no template was supplied.
pub const SELF_CONTAINED_INSTRUCTION: &str = r#"

6. The final output must be ONLY the raw, complete, self-contained LaTeX code necessary to produce the document. Do not include any text before \documentclass or after \end{document}. Do not wrap the LaTeX code in markdown fences (```)."#;

/// Appended after the attachment when the caller supplied a template.
pub fn template_instruction(template: &str) -> String {
    format!(
        r#"

IMPORTANT: Now, take the step-by-step solution you generated from the image and format it strictly within the following provided LaTeX template. Place the problem statements and solutions within the main body of the template where appropriate. Ensure the final output is ONLY the raw, complete LaTeX code based on the template, ready for compilation. Do not include any text before \documentclass or after \end{{document}}. Do not wrap the LaTeX code in markdown fences (```).

TEMPLATE:
```latex
{template}
```"#
    )
}

/// Prompt asking the provider to colour only the solution text.
///
/// `rgb_triple` is the `{r, g, b}` argument produced by
/// [`crate::pipeline::input::RgbColor::latex_triple`].
pub fn recolor_prompt(latex: &str, rgb_triple: &str) -> String {
    format!(
        r#"Given the following LaTeX document:
```latex
{latex}
```
Modify this LaTeX code to change the color of the text corresponding to the SOLUTIONS of the math problems presented. Keep the text of the QUESTIONS themselves in the default black color. Use the LaTeX command \textcolor[rgb]{rgb_triple}{{<solution text>}} to apply the target color. Ensure the \usepackage{{xcolor}} package is included in the preamble. Output ONLY the complete, modified, raw LaTeX code suitable for direct compilation with pdflatex. Do not include any explanations or markdown fences."#
    )
}
