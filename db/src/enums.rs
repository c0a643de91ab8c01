use diesel_derive_enum::DbEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DbEnum)]
#[ExistingTypePath = "crate::schema::sql_types::ProcessingStatus"]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Default for ProcessingStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let desc = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };

        f.write_str(desc)
    }
}

/// Which size tier an image row holds. Uploaded images are `Original`; the rest are derived from
/// an original and point back at it through `parent_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DbEnum)]
#[ExistingTypePath = "crate::schema::sql_types::ImageVariant"]
pub enum ImageVariant {
    Original,
    Medium,
    Small,
    Thumb,
}

impl Default for ImageVariant {
    fn default() -> Self {
        Self::Original
    }
}

impl ImageVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Medium => "medium",
            Self::Small => "small",
            Self::Thumb => "thumb",
        }
    }
}

impl std::fmt::Display for ImageVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
