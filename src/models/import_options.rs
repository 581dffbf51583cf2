use indexmap::IndexSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between the pivot flag and the collection list in the persisted form
const FIELD_SEPARATOR: char = ';';

/// Separator between collection names
const COLLECTION_SEPARATOR: char = ',';

/// Errors raised when a persisted options string cannot be read back
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionsParseError {
    #[error("expected 2 fields separated by ';', found {0}")]
    FieldCount(usize),

    #[error("invalid object pivot flag '{0}', expected 'true' or 'false'")]
    InvalidFlag(String),
}

/// User-configurable settings for one import operation.
///
/// Persisted per asset as `"<true|false>;<comma,joined,collections>"` so that a
/// reimport can reuse the choices made the first time without prompting again.
///
/// Collection names must be non-empty and must not contain `;` or `,`; the
/// analysis protocol never produces such names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Export each object around its own pivot instead of the scene origin
    pub use_object_pivot: bool,

    /// Collections to include in the export, in the order they were chosen
    pub enabled_collections: IndexSet<String>,
}

impl ImportOptions {
    pub fn new(use_object_pivot: bool) -> Self {
        Self {
            use_object_pivot,
            enabled_collections: IndexSet::new(),
        }
    }

    /// Enable a collection. Returns false if it was already enabled.
    pub fn enable_collection(&mut self, name: impl Into<String>) -> bool {
        self.enabled_collections.insert(name.into())
    }

    /// Builder-style variant of [`enable_collection`](Self::enable_collection)
    pub fn with_collections<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.enable_collection(name);
        }
        self
    }

    /// Comma-joined collection list, as handed to the export script
    pub fn collections_joined(&self) -> String {
        let names: Vec<&str> = self.enabled_collections.iter().map(String::as_str).collect();
        names.join(",")
    }

    /// Serialize into the compact persisted form
    pub fn to_metadata_string(&self) -> String {
        format!(
            "{}{}{}",
            self.use_object_pivot,
            FIELD_SEPARATOR,
            self.collections_joined()
        )
    }

    /// Overwrite `self` from a persisted string.
    ///
    /// On error `self` is left untouched.
    pub fn load_metadata_string(&mut self, data: &str) -> Result<(), OptionsParseError> {
        *self = data.parse()?;
        Ok(())
    }
}

impl FromStr for ImportOptions {
    type Err = OptionsParseError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = data.split(FIELD_SEPARATOR).collect();
        if fields.len() != 2 {
            return Err(OptionsParseError::FieldCount(fields.len()));
        }

        let use_object_pivot = match fields[0] {
            "true" => true,
            "false" => false,
            other => return Err(OptionsParseError::InvalidFlag(other.to_string())),
        };

        let enabled_collections = fields[1]
            .split(COLLECTION_SEPARATOR)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            use_object_pivot,
            enabled_collections,
        })
    }
}

impl fmt::Display for ImportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_metadata_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let options = ImportOptions::default();
        assert!(!options.use_object_pivot);
        assert!(options.enabled_collections.is_empty());
        assert_eq!(options.to_metadata_string(), "false;");
    }

    #[test]
    fn test_serialize_preserves_collection_order() {
        let options = ImportOptions::new(true).with_collections(["Props", "Characters", "Lights"]);
        assert_eq!(options.to_metadata_string(), "true;Props,Characters,Lights");
    }

    #[test]
    fn test_duplicate_collections_rejected() {
        let mut options = ImportOptions::default();
        assert!(options.enable_collection("Props"));
        assert!(!options.enable_collection("Props"));
        assert_eq!(options.enabled_collections.len(), 1);
    }

    #[test]
    fn test_parse_valid() {
        let options: ImportOptions = "true;Foo,Bar".parse().unwrap();
        assert!(options.use_object_pivot);
        assert_eq!(
            options.enabled_collections.iter().collect::<Vec<_>>(),
            vec!["Foo", "Bar"]
        );

        let empty: ImportOptions = "false;".parse().unwrap();
        assert!(!empty.use_object_pivot);
        assert!(empty.enabled_collections.is_empty());
    }

    #[test]
    fn test_parse_wrong_field_count() {
        assert_eq!(
            "".parse::<ImportOptions>(),
            Err(OptionsParseError::FieldCount(1))
        );
        assert_eq!(
            "true".parse::<ImportOptions>(),
            Err(OptionsParseError::FieldCount(1))
        );
        assert_eq!(
            "true;a;b".parse::<ImportOptions>(),
            Err(OptionsParseError::FieldCount(3))
        );
    }

    #[test]
    fn test_parse_bad_flag() {
        assert!(matches!(
            "maybe;Foo".parse::<ImportOptions>(),
            Err(OptionsParseError::InvalidFlag(_))
        ));
    }

    #[test]
    fn test_failed_load_leaves_options_untouched() {
        let mut options = ImportOptions::new(true).with_collections(["Keep"]);
        let before = options.clone();

        assert!(options.load_metadata_string("false;A;B").is_err());
        assert_eq!(options, before);

        options.load_metadata_string("false;A").unwrap();
        assert!(!options.use_object_pivot);
        assert!(options.enabled_collections.contains("A"));
    }

    fn collection_name() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 _.-]{1,16}"
    }

    proptest! {
        #[test]
        fn options_round_trip(
            pivot in any::<bool>(),
            names in prop::collection::vec(collection_name(), 0..8),
        ) {
            let options = ImportOptions::new(pivot).with_collections(names);
            let parsed: ImportOptions = options.to_metadata_string().parse().unwrap();
            prop_assert_eq!(parsed, options);
        }

        #[test]
        fn persisted_string_round_trip(
            pivot in any::<bool>(),
            names in prop::collection::hash_set(collection_name(), 0..8),
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let data = format!("{};{}", pivot, names.join(","));
            let parsed: ImportOptions = data.parse().unwrap();
            prop_assert_eq!(parsed.to_metadata_string(), data);
        }

        #[test]
        fn wrong_field_count_never_mutates(extra in 2usize..6) {
            let data = vec!["true"; extra + 1].join(";");
            let mut options = ImportOptions::new(false).with_collections(["Original"]);
            let before = options.clone();
            prop_assert!(options.load_metadata_string(&data).is_err());
            prop_assert_eq!(options, before);
        }
    }
}
