use sqlformat::{FormatOptions, Indent, QueryParams};
use thiserror::Error;

use crate::settings::FormatterSettings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("query text is empty")]
    EmptyInput,
}

#[derive(Debug, Clone, Default)]
pub struct SqlFormatter {
    settings: FormatterSettings,
}

impl SqlFormatter {
    #[must_use]
    pub fn new(settings: FormatterSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &FormatterSettings {
        &self.settings
    }

    pub fn format(&self, sql: &str) -> Result<String, FormatError> {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(FormatError::EmptyInput);
        }

        let options = FormatOptions {
            indent: Indent::Spaces(self.settings.indent_width),
            uppercase: Some(self.settings.uppercase_keywords),
            lines_between_queries: self.settings.lines_between_queries,
            ..FormatOptions::default()
        };
        let formatted = sqlformat::format(trimmed, &QueryParams::None, &options);

        Ok(formatted.replace("\r\n", "\n").trim_end().to_string())
    }
}
