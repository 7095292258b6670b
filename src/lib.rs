mod payload;
mod upload;
mod input;
mod progress;

pub mod app;
pub mod auth;
pub mod config;

use std::{
    io,
    path::{
        PathBuf,
    },
};

use url::{
    Url,
};

use reqwest::{
    Client,
    RequestBuilder,
    Response,
    StatusCode,
    redirect::{
        Policy,
    },
};

use serde::{
    de::{
        DeserializeOwned,
    },
};

use thiserror::{
    Error,
};

use tracing::{
    debug,
};

pub use payload::{
    ThumbnailSetResponse,
    ThumbnailDetails,
    Thumbnail,
    ApiErrorResponse,
    ApiErrorDetails,
    ApiErrorItem,
};

pub use upload::{
    MediaContent,
    MediaUploader,
    UploadState,
    ProgressListener,
    MINIMUM_CHUNK_SIZE,
    DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_RECOVERIES,
};

pub use input::{
    InputField,
    Prompter,
};

pub use progress::{
    ConsoleProgress,
    BarProgress,
};

pub use auth::{
    Credential,
};

pub const APPLICATION_NAME: &str = "youtube-cmdline-uploadthumbnail-sample";
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/";

const THUMBNAILS_SET_PATH: &str = "upload/youtube/v3/thumbnails/set";

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", .0.empty_message())]
    EmptyInput(InputField),

    #[error("couldn't access the console: {0}")]
    Console(#[from] io::Error),

    #[error("couldn't open {}: {1}", .0.display())]
    CouldntOpenFile(PathBuf, #[source] io::Error),

    #[error("couldn't read {}: {1}", .0.display())]
    CouldntReadFile(PathBuf, #[source] io::Error),

    #[error("http request failed: {1}")]
    HttpRequestError(Option<Url>, #[source] reqwest::Error),

    #[error("{0} responded with {1}")]
    HttpStatusCodeError(Url, StatusCode),

    #[error("{0} responded with error {1}")]
    ApiError(Url, ApiErrorDetails),

    #[error("{0} didn't return a resumable upload location")]
    MissingUploadLocation(Url),

    #[error("invalid range header {0:?}")]
    InvalidRange(String),

    #[error("upload to {0} stopped making progress at byte {1}")]
    UploadStalled(Url, u64),

    #[error("chunk size {0} must be a positive multiple of {min}", min = MINIMUM_CHUNK_SIZE)]
    InvalidChunkSize(usize),

    #[error("invalid url {0:?}: {1}")]
    InvalidUrl(String, #[source] url::ParseError),

    #[error("the response didn't contain a default thumbnail")]
    MissingThumbnail,

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpRequestError(err.url().cloned(), err)
    }
}

impl Error {
    /// The structured error the remote API answered with, if this failure came from it.
    pub fn api_details(&self) -> Option<&ApiErrorDetails> {
        match self {
            Self::ApiError(_, details) => Some(details),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct YouTube {
    base_url: String,
    credential: Credential,
    client: Client,
}

impl YouTube {
    pub fn new(credential: Credential, application_name: impl AsRef<str>) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(format!("{} {}/{}", application_name.as_ref(), env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))
            // 308 means "resume incomplete" for resumable uploads, never a redirect
            .redirect(Policy::none())
            .build()?;
        Ok(YouTube { base_url: DEFAULT_BASE_URL.into(), credential, client })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn thumbnails(&self) -> Thumbnails<'_> {
        Thumbnails { api: self }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(self.credential.access_token())
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, Error> {
        let raw = format!("{}{}", self.base_url, path);
        let mut url = Url::parse(&raw).map_err(|err| Error::InvalidUrl(raw, err))?;
        for (key, value) in params {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url)
    }

    pub(crate) async fn parse_res<T>(res: Response) -> Result<T, Error>
        where
            T: DeserializeOwned,
    {
        if !res.status().is_success() {
            return Err(Self::error_from_res(res).await);
        };
        Ok(res.json::<T>().await?)
    }

    pub(crate) async fn error_from_res(res: Response) -> Error {
        let status = res.status();
        let url = res.url().clone();
        debug!(%url, %status, "request was rejected");
        match res.json::<ApiErrorResponse>().await {
            Ok(res_obj) => Error::ApiError(url, res_obj.error),
            Err(_) => Error::HttpStatusCodeError(url, status),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Thumbnails<'a> {
    api: &'a YouTube,
}

impl<'a> Thumbnails<'a> {
    /// Build a request that uploads `media` as the custom thumbnail of `video_id`.
    pub fn set(&self, video_id: impl Into<String>, media: MediaContent) -> ThumbnailSet<'a> {
        ThumbnailSet {
            api: self.api,
            video_id: video_id.into(),
            uploader: MediaUploader::new(media),
        }
    }
}

pub struct ThumbnailSet<'a> {
    api: &'a YouTube,
    video_id: String,
    uploader: MediaUploader<'a>,
}

impl<'a> ThumbnailSet<'a> {
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn media_uploader(&mut self) -> &mut MediaUploader<'a> {
        &mut self.uploader
    }

    pub async fn execute(mut self) -> Result<ThumbnailSetResponse, Error> {
        let url = self.api.url(THUMBNAILS_SET_PATH, &[("videoId", self.video_id.as_str())])?;
        self.uploader.upload(self.api, url).await
    }
}
