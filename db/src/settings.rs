use diesel::sql_types::Jsonb;
use serde::{Deserialize, Serialize};

pub use crate::schema::settings::*;
use crate::diesel_jsonb;

/// The settings category that holds image processing preferences.
pub const IMAGES_CATEGORY: &str = "images";

/// The `data` of a tenant's `images` settings row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Jsonb)]
pub struct ImageSettings {
    /// Re-encode variants as WebP. Unset means yes.
    #[serde(default)]
    pub convert_webp: Option<bool>,
}

diesel_jsonb!(ImageSettings);

impl ImageSettings {
    pub fn convert_webp(&self) -> bool {
        self.convert_webp.unwrap_or(true)
    }
}
