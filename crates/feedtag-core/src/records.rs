//! Row types that flow between the feed files, the tagger and the sinks.

use serde::{Deserialize, Serialize};

use crate::tags::{Prediction, TagField};

/// Sentinel written into `Official Status` for every freshly tagged row.
pub const OFFICIAL_STATUS_FINAL_CHECK: &str = "Final Check";
/// Marker written into the workflow columns of machine-tagged rows.
pub const MODEL_MARKER: &str = "model";
/// The only `Status for WZS` value that survives reshaping.
pub const WZS_APPROVED: &str = "Yes";
/// `strftime` format of the `Published Date` column.
pub const PUBLISHED_DATE_FORMAT: &str = "%m/%d/%Y";

/// One row of a downloaded feed CSV. Columns are matched by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecord {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Link", default)]
    pub link: String,
    #[serde(rename = "Plain Description", default)]
    pub plain_description: String,
    #[serde(rename = "Author", default)]
    pub author: String,
    #[serde(rename = "Date")]
    pub date: String,
}

/// A record after prediction merge and reshaping, in destination schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggedRecord {
    #[serde(rename = "Heading")]
    pub heading: String,
    /// Shortened link; `None` when shortening failed or was not configured.
    #[serde(rename = "Live Source")]
    pub live_source: Option<String>,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Published Date")]
    pub published_date: String,
    #[serde(rename = "Official Status")]
    pub official_status: String,
    #[serde(rename = "Platform")]
    pub platform: String,
    #[serde(rename = "Priority Level")]
    pub priority_level: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Status for WZS")]
    pub status_for_wzs: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Attachments")]
    pub attachments: String,
    #[serde(rename = "Source Button")]
    pub source_button: String,
    #[serde(rename = "Publish FOR WZS")]
    pub publish_for_wzs: String,
    #[serde(rename = "Archive")]
    pub archive: String,
    #[serde(rename = "Original Source")]
    pub original_source: String,
}

impl TaggedRecord {
    /// Column headers in serialization order.
    pub const COLUMNS: [&'static str; 17] = [
        "Heading",
        "Live Source",
        "Content",
        "Author",
        "Published Date",
        "Official Status",
        "Platform",
        "Priority Level",
        "Region",
        "Status for WZS",
        "Type",
        "Category",
        "Attachments",
        "Source Button",
        "Publish FOR WZS",
        "Archive",
        "Original Source",
    ];

    /// Copy every prediction field into the matching column.
    pub fn apply_prediction(&mut self, prediction: &Prediction) {
        for field in TagField::ALL {
            *self.tag_mut(field) = prediction.get(field).to_string();
        }
    }

    #[must_use]
    pub fn tag(&self, field: TagField) -> &str {
        match field {
            TagField::OfficialStatus => &self.official_status,
            TagField::Platform => &self.platform,
            TagField::PriorityLevel => &self.priority_level,
            TagField::Region => &self.region,
            TagField::StatusForWzs => &self.status_for_wzs,
            TagField::Type => &self.kind,
            TagField::Category => &self.category,
        }
    }

    fn tag_mut(&mut self, field: TagField) -> &mut String {
        match field {
            TagField::OfficialStatus => &mut self.official_status,
            TagField::Platform => &mut self.platform,
            TagField::PriorityLevel => &mut self.priority_level,
            TagField::Region => &mut self.region,
            TagField::StatusForWzs => &mut self.status_for_wzs,
            TagField::Type => &mut self.kind,
            TagField::Category => &mut self.category,
        }
    }

    /// `(column, value)` pairs in [`TaggedRecord::COLUMNS`] order.
    #[must_use]
    pub fn cells(&self) -> Vec<(&'static str, String)> {
        let values = [
            self.heading.clone(),
            self.live_source.clone().unwrap_or_default(),
            self.content.clone(),
            self.author.clone(),
            self.published_date.clone(),
            self.official_status.clone(),
            self.platform.clone(),
            self.priority_level.clone(),
            self.region.clone(),
            self.status_for_wzs.clone(),
            self.kind.clone(),
            self.category.clone(),
            self.attachments.clone(),
            self.source_button.clone(),
            self.publish_for_wzs.clone(),
            self.archive.clone(),
            self.original_source.clone(),
        ];
        Self::COLUMNS.into_iter().zip(values).collect()
    }

    /// Project onto the nine-field store schema.
    #[must_use]
    pub fn to_corpus_document(&self) -> CorpusDocument {
        CorpusDocument {
            heading: self.heading.clone(),
            content: self.content.clone(),
            status_for_wzs: self.status_for_wzs.clone(),
            official_status: self.official_status.clone(),
            region: self.region.clone(),
            priority_level: self.priority_level.clone(),
            kind: self.kind.clone(),
            category: self.category.clone(),
            platform: self.platform.clone(),
        }
    }
}

/// A document in the reference corpus / durable store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusDocument {
    #[serde(rename = "Heading")]
    pub heading: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Status for WZS")]
    pub status_for_wzs: String,
    #[serde(rename = "Official Status")]
    pub official_status: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Priority Level")]
    pub priority_level: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Platform")]
    pub platform: String,
}

impl CorpusDocument {
    /// Documents without both a heading and content are never stored.
    #[must_use]
    pub fn is_storable(&self) -> bool {
        !self.heading.trim().is_empty() && !self.content.trim().is_empty()
    }
}
