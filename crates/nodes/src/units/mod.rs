//! The six capability units.
//!
//! | Unit | Stage | Input | Output | Catalog writes |
//! |------|-------|-------|--------|----------------|
//! | [`SchemaAnalysisUnit`] | `schema_analysis` | `GraphSchema` | `SchemaAnalysis` | none |
//! | [`RequirementsUnit`] | `requirements_extraction` | documents | `Requirement` | requirement |
//! | [`UseCaseUnit`] | `use_case_generation` | analysis + requirement | `Vec<UseCase>` | use cases |
//! | [`TemplateUnit`] | `template_generation` | analysis + use cases | `Vec<Template>` | templates |
//! | [`ExecutionUnit`] | `execution` | templates | `Vec<ExecutionOutput>` | executions + status |
//! | [`ReportingUnit`] | `reporting` | execution outputs | `Vec<AnalysisReport>` | none |

mod execution;
mod reporting;
mod requirements;
mod schema;
mod templates;
mod use_cases;

pub use execution::ExecutionUnit;
pub use reporting::ReportingUnit;
pub use requirements::RequirementsUnit;
pub use schema::SchemaAnalysisUnit;
pub use templates::{TemplateInput, TemplateUnit};
pub use use_cases::{UseCaseInput, UseCaseUnit};

/// At most `max` characters of `text`, cut on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// The first sentence of `text`, bounded to `max` characters.
pub(crate) fn first_sentence(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| {
            c == '\n'
                || (matches!(c, '.' | '!' | '?')
                    && trimmed[i + c.len_utf8()..]
                        .chars()
                        .next()
                        .map_or(true, char::is_whitespace))
        })
        .map_or(trimmed.len(), |(i, c)| i + c.len_utf8());
    truncate_chars(trimmed[..end].trim(), max)
}
