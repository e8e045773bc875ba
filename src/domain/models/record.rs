use serde::{Deserialize, Serialize};

/// One catalogue entry, keyed by its 6-character unit-group code.
///
/// All text fields may be empty but are never absent; the hierarchy
/// descriptions follow the taxonomy from class up to division.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRecord {
    code: String,
    description: String,
    class_desc: String,
    group_desc: String,
    subdivision_desc: String,
    division_desc: String,
    class_exclusions: String,
    enriched_text: String,
}

impl CodeRecord {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            class_desc: String::new(),
            group_desc: String::new(),
            subdivision_desc: String::new(),
            division_desc: String::new(),
            class_exclusions: String::new(),
            enriched_text: String::new(),
        }
    }

    pub fn with_hierarchy(
        mut self,
        class_desc: impl Into<String>,
        group_desc: impl Into<String>,
        subdivision_desc: impl Into<String>,
        division_desc: impl Into<String>,
    ) -> Self {
        self.class_desc = class_desc.into();
        self.group_desc = group_desc.into();
        self.subdivision_desc = subdivision_desc.into();
        self.division_desc = division_desc.into();
        self
    }

    pub fn with_class_exclusions(mut self, exclusions: impl Into<String>) -> Self {
        self.class_exclusions = exclusions.into();
        self
    }

    pub fn with_enriched_text(mut self, text: impl Into<String>) -> Self {
        self.enriched_text = text.into();
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn class_desc(&self) -> &str {
        &self.class_desc
    }

    pub fn group_desc(&self) -> &str {
        &self.group_desc
    }

    pub fn subdivision_desc(&self) -> &str {
        &self.subdivision_desc
    }

    pub fn division_desc(&self) -> &str {
        &self.division_desc
    }

    pub fn class_exclusions(&self) -> &str {
        &self.class_exclusions
    }

    pub fn enriched_text(&self) -> &str {
        &self.enriched_text
    }

    pub fn summary(&self) -> CodeSummary {
        CodeSummary::new(self.code.clone(), self.description.clone())
    }
}

/// Compact code + description pair, used for the catalogue-wide
/// reference listing embedded in the re-ranker's fallback prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSummary {
    code: String,
    description: String,
}

impl CodeSummary {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}
