use indexmap::IndexSet;

/// A material compatibility issue reported for one object in the source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialWarning {
    pub object_name: String,
    pub issue: String,
}

impl MaterialWarning {
    pub fn new(object_name: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            issue: issue.into(),
        }
    }
}

/// Outcome of running the analysis script on a source file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Visible, non-excluded collections found in the file
    pub collections: IndexSet<String>,

    /// Material issues, in the order the tool reported them
    pub material_warnings: Vec<MaterialWarning>,

    /// Whether the file embeds packed textures
    pub is_packed: bool,
}

impl AnalysisResult {
    pub fn has_material_warnings(&self) -> bool {
        !self.material_warnings.is_empty()
    }

    /// Indented `object: issue` lines, one per warning
    pub fn material_warning_text(&self) -> String {
        self.material_warnings
            .iter()
            .map(|warning| format!("\t{}: {}\n", warning.object_name, warning.issue))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_clean() {
        let result = AnalysisResult::default();
        assert!(!result.is_packed);
        assert!(!result.has_material_warnings());
        assert!(result.material_warning_text().is_empty());
    }

    #[test]
    fn test_material_warning_text() {
        let result = AnalysisResult {
            material_warnings: vec![
                MaterialWarning::new("Cube", "NO_MATERIAL_OUTPUT"),
                MaterialWarning::new("Floor", "BSDF_NORMAL_INPUT_NOT_NORMAL_MAP, IMAGE_MISSING"),
            ],
            ..Default::default()
        };

        assert_eq!(
            result.material_warning_text(),
            "\tCube: NO_MATERIAL_OUTPUT\n\tFloor: BSDF_NORMAL_INPUT_NOT_NORMAL_MAP, IMAGE_MISSING\n"
        );
    }
}
