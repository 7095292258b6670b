use std::{
    fmt,
};

use url::{
    Url,
};

use serde::{
    Deserialize,
};

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailSetResponse {
    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub etag: Option<String>,

    #[serde(default)]
    pub items: Vec<ThumbnailDetails>,
}

impl ThumbnailSetResponse {
    /// Url of the "default" variant of the first item, if the response carries one.
    pub fn default_url(&self) -> Option<&Url> {
        self.items.first()
            .and_then(|item| item.default.as_ref())
            .map(|thumbnail| &thumbnail.url)
    }
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailDetails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
    pub standard: Option<Thumbnail>,
    pub maxres: Option<Thumbnail>,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    pub url: Url,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetails,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDetails {
    pub code: u16,
    pub message: String,

    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

impl fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.code, self.message)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorItem {
    pub domain: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub location: Option<String>,
    pub location_type: Option<String>,
}
