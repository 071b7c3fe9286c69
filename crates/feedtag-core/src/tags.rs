//! Categorical tag fields and the per-record prediction built from them.

/// One of the seven categorical fields inferred from the reference corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagField {
    OfficialStatus,
    Platform,
    PriorityLevel,
    Region,
    StatusForWzs,
    Type,
    Category,
}

impl TagField {
    pub const COUNT: usize = 7;

    /// All fields, in the order they appear in the tagged output.
    pub const ALL: [TagField; Self::COUNT] = [
        TagField::OfficialStatus,
        TagField::Platform,
        TagField::PriorityLevel,
        TagField::Region,
        TagField::StatusForWzs,
        TagField::Type,
        TagField::Category,
    ];

    /// Destination column name, shared by the CSV files, the store and the sheet.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            TagField::OfficialStatus => "Official Status",
            TagField::Platform => "Platform",
            TagField::PriorityLevel => "Priority Level",
            TagField::Region => "Region",
            TagField::StatusForWzs => "Status for WZS",
            TagField::Type => "Type",
            TagField::Category => "Category",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for TagField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Inferred value per [`TagField`]; an empty string means "no prediction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prediction {
    values: [String; TagField::COUNT],
}

impl Prediction {
    /// A prediction with every field empty.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, field: TagField) -> &str {
        &self.values[field.index()]
    }

    pub fn set(&mut self, field: TagField, value: impl Into<String>) {
        self.values[field.index()] = value.into();
    }

    /// Builder-style [`Prediction::set`].
    #[must_use]
    pub fn with(mut self, field: TagField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// `true` when no field carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(String::is_empty)
    }
}

/// One ranked hit from the reference corpus, projected onto the tag fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusMatch {
    values: [Option<String>; TagField::COUNT],
}

impl CorpusMatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: TagField, value: impl Into<String>) -> Self {
        self.values[field.index()] = Some(value.into());
        self
    }

    /// The hit's value for `field`; blank values count as absent.
    #[must_use]
    pub fn get(&self, field: TagField) -> Option<&str> {
        self.values[field.index()]
            .as_deref()
            .filter(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_fields_are_distinct_and_indexed_in_order() {
        for (i, field) in TagField::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
        }
    }

    #[test]
    fn empty_prediction_has_no_values() {
        let prediction = Prediction::empty();
        assert!(prediction.is_empty());
        for field in TagField::ALL {
            assert_eq!(prediction.get(field), "");
        }
    }

    #[test]
    fn prediction_set_and_get() {
        let prediction = Prediction::empty()
            .with(TagField::Region, "EMEA")
            .with(TagField::Type, "Outage");
        assert_eq!(prediction.get(TagField::Region), "EMEA");
        assert_eq!(prediction.get(TagField::Type), "Outage");
        assert_eq!(prediction.get(TagField::Category), "");
        assert!(!prediction.is_empty());
    }

    #[test]
    fn corpus_match_treats_blank_as_absent() {
        let hit = CorpusMatch::new()
            .with(TagField::Platform, "  ")
            .with(TagField::Category, "Weather");
        assert_eq!(hit.get(TagField::Platform), None);
        assert_eq!(hit.get(TagField::Category), Some("Weather"));
        assert_eq!(hit.get(TagField::Region), None);
    }

    #[test]
    fn column_names_match_destination_schema() {
        assert_eq!(TagField::StatusForWzs.column(), "Status for WZS");
        assert_eq!(TagField::PriorityLevel.to_string(), "Priority Level");
    }
}
