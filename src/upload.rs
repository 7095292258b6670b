use std::{
    cmp,
    fmt,
    io::{
        self,
        SeekFrom,
    },
    path::{
        Path,
        PathBuf,
    },
};

use url::{
    Url,
};

use mime::{
    Mime,
};

use reqwest::{
    Body,
    Response,
    StatusCode,
    header::{
        HeaderMap,
        CONTENT_LENGTH,
        CONTENT_RANGE,
        CONTENT_TYPE,
        LOCATION,
        RANGE,
    },
};

use serde::{
    de::{
        DeserializeOwned,
    },
};

use tokio::{
    fs::{
        File,
    },
    io::{
        AsyncReadExt,
        AsyncSeekExt,
    },
};

use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    Error,
    YouTube,
};

/// Resumable chunks must be a multiple of this many bytes.
pub const MINIMUM_CHUNK_SIZE: usize = 256 * 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 40 * MINIMUM_CHUNK_SIZE;
pub const DEFAULT_MAX_RECOVERIES: u32 = 3;

const UPLOAD_CONTENT_TYPE: &str = "X-Upload-Content-Type";
const UPLOAD_CONTENT_LENGTH: &str = "X-Upload-Content-Length";

#[derive(Debug)]
pub struct MediaContent {
    mime: Mime,
    path: PathBuf,
    file: File,
    length: u64,
}

impl MediaContent {
    pub async fn open(mime: Mime, path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(err) => return Err(Error::CouldntOpenFile(path.into(), err)),
        };
        let metadata = match file.metadata().await {
            Ok(metadata) => metadata,
            Err(err) => return Err(Error::CouldntOpenFile(path.into(), err)),
        };
        if metadata.is_dir() {
            return Err(Error::CouldntOpenFile(path.into(), io::Error::new(io::ErrorKind::InvalidInput, "is a directory")));
        };

        Ok(MediaContent { mime, path: path.into(), file, length: metadata.len() })
    }

    pub fn mime(&self) -> &Mime {
        &self.mime
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    async fn read_chunk(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; len];
        let read = async {
            self.file.seek(SeekFrom::Start(offset)).await?;
            self.file.read_exact(&mut buf).await?;
            Ok::<_, io::Error>(())
        };
        match read.await {
            Ok(()) => Ok(buf),
            Err(err) => Err(Error::CouldntReadFile(self.path.clone(), err)),
        }
    }

    async fn body(&self) -> Result<Body, Error> {
        let reopen = async {
            let mut file = self.file.try_clone().await?;
            file.seek(SeekFrom::Start(0)).await?;
            Ok::<_, io::Error>(file)
        };
        match reopen.await {
            Ok(file) => Ok(Body::from(file)),
            Err(err) => Err(Error::CouldntReadFile(self.path.clone(), err)),
        }
    }
}

/// Stages of a media upload, in the order they are entered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UploadState {
    NotStarted,
    InitiationStarted,
    InitiationComplete,
    MediaInProgress { progress: f64 },
    MediaComplete,
}

impl UploadState {
    fn rank(&self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::InitiationStarted => 1,
            Self::InitiationComplete => 2,
            Self::MediaInProgress { .. } => 3,
            Self::MediaComplete => 4,
        }
    }

    pub fn can_advance_to(&self, next: &UploadState) -> bool {
        match (self, next) {
            (Self::MediaInProgress { .. }, Self::MediaInProgress { .. }) => true,
            _ => self.rank() < next.rank(),
        }
    }
}

pub trait ProgressListener {
    fn progress_changed(&mut self, state: UploadState);
}

impl<F> ProgressListener for F
    where
        F: FnMut(UploadState),
{
    fn progress_changed(&mut self, state: UploadState) {
        self(state)
    }
}

pub struct MediaUploader<'a> {
    media: MediaContent,
    direct_upload_enabled: bool,
    chunk_size: usize,
    max_recoveries: u32,
    state: UploadState,
    bytes_uploaded: u64,
    listener: Option<Box<dyn ProgressListener + 'a>>,
}

impl fmt::Debug for MediaUploader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaUploader")
            .field("media", &self.media)
            .field("direct_upload_enabled", &self.direct_upload_enabled)
            .field("chunk_size", &self.chunk_size)
            .field("max_recoveries", &self.max_recoveries)
            .field("state", &self.state)
            .field("bytes_uploaded", &self.bytes_uploaded)
            .finish_non_exhaustive()
    }
}

enum ChunkOutcome<T> {
    Complete(T),
    Incomplete(u64),
}

impl<'a> MediaUploader<'a> {
    pub fn new(media: MediaContent) -> Self {
        MediaUploader {
            media,
            direct_upload_enabled: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_recoveries: DEFAULT_MAX_RECOVERIES,
            state: UploadState::NotStarted,
            bytes_uploaded: 0,
            listener: None,
        }
    }

    pub fn validate_chunk_size(chunk_size: usize) -> Result<usize, Error> {
        if chunk_size == 0 || chunk_size % MINIMUM_CHUNK_SIZE != 0 {
            return Err(Error::InvalidChunkSize(chunk_size));
        };
        Ok(chunk_size)
    }

    pub fn set_direct_upload_enabled(&mut self, enabled: bool) -> &mut Self {
        self.direct_upload_enabled = enabled;
        self
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) -> Result<&mut Self, Error> {
        self.chunk_size = Self::validate_chunk_size(chunk_size)?;
        Ok(self)
    }

    /// Number of times a session may be re-synchronized with the server after
    /// a failed or non-advancing chunk.
    pub fn set_max_recoveries(&mut self, max_recoveries: u32) -> &mut Self {
        self.max_recoveries = max_recoveries;
        self
    }

    pub fn set_progress_listener(&mut self, listener: impl ProgressListener + 'a) -> &mut Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn is_direct_upload_enabled(&self) -> bool {
        self.direct_upload_enabled
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn upload_state(&self) -> UploadState {
        self.state
    }

    pub fn media(&self) -> &MediaContent {
        &self.media
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded
    }

    pub fn progress(&self) -> f64 {
        if self.media.length == 0 {
            return 0.0;
        };
        self.bytes_uploaded as f64 / self.media.length as f64
    }

    fn update_state(&mut self, state: UploadState) {
        debug_assert!(self.state.can_advance_to(&state));
        self.state = state;
        if let Some(listener) = self.listener.as_mut() {
            listener.progress_changed(state);
        };
    }

    pub(crate) async fn upload<T>(&mut self, api: &YouTube, url: Url) -> Result<T, Error>
        where
            T: DeserializeOwned,
    {
        if self.direct_upload_enabled {
            self.direct_upload(api, url).await
        } else {
            self.resumable_upload(api, url).await
        }
    }

    async fn direct_upload<T>(&mut self, api: &YouTube, mut url: Url) -> Result<T, Error>
        where
            T: DeserializeOwned,
    {
        url.query_pairs_mut().append_pair("uploadType", "media");
        let body = self.media.body().await?;

        self.update_state(UploadState::MediaInProgress { progress: 0.0 });
        debug!(%url, length = self.media.length, "sending media in one request");
        let res = api.authorized(api.client().post(url))
            .header(CONTENT_TYPE, self.media.mime.as_ref())
            .header(CONTENT_LENGTH, self.media.length)
            .body(body)
            .send()
            .await?;

        let parsed = YouTube::parse_res(res).await?;
        self.bytes_uploaded = self.media.length;
        self.update_state(UploadState::MediaComplete);
        info!(bytes = self.bytes_uploaded, "media upload complete");
        Ok(parsed)
    }

    async fn resumable_upload<T>(&mut self, api: &YouTube, mut url: Url) -> Result<T, Error>
        where
            T: DeserializeOwned,
    {
        url.query_pairs_mut().append_pair("uploadType", "resumable");

        self.update_state(UploadState::InitiationStarted);
        let session = self.initiate(api, url).await?;
        self.update_state(UploadState::InitiationComplete);

        let total = self.media.length;
        let mut recoveries_left = self.max_recoveries;
        loop {
            let offset = self.bytes_uploaded;
            let len = cmp::min(self.chunk_size as u64, total - offset) as usize;
            let chunk = self.media.read_chunk(offset, len).await?;
            let range = content_range(offset, len, total);
            debug!(%session, %range, "sending chunk");

            let sent = api.authorized(api.client().put(session.clone()))
                .header(CONTENT_RANGE, range.as_str())
                .header(CONTENT_TYPE, self.media.mime.as_ref())
                .body(chunk)
                .send()
                .await;
            let res = match sent {
                Ok(res) => res,
                Err(err) if recoveries_left > 0 => {
                    recoveries_left -= 1;
                    warn!(%session, error = %err, "chunk failed, asking the server how much it received");
                    self.query_status(api, &session).await?
                },
                Err(err) => return Err(err.into()),
            };

            match Self::chunk_response(res, total).await? {
                ChunkOutcome::Complete(parsed) => {
                    self.bytes_uploaded = total;
                    self.update_state(UploadState::MediaComplete);
                    info!(bytes = total, "media upload complete");
                    return Ok(parsed);
                },
                ChunkOutcome::Incomplete(next) => {
                    if next <= offset {
                        if recoveries_left == 0 {
                            return Err(Error::UploadStalled(session, next));
                        };
                        recoveries_left -= 1;
                        warn!(%session, next, "server made no progress on the last chunk");
                    };
                    self.bytes_uploaded = next;
                    self.update_state(UploadState::MediaInProgress { progress: self.progress() });
                },
            };
        }
    }

    async fn initiate(&self, api: &YouTube, url: Url) -> Result<Url, Error> {
        debug!(%url, "initiating resumable session");
        let res = api.authorized(api.client().post(url.clone()))
            .header(UPLOAD_CONTENT_TYPE, self.media.mime.as_ref())
            .header(UPLOAD_CONTENT_LENGTH, self.media.length)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(YouTube::error_from_res(res).await);
        };

        let Some(location) = res.headers().get(LOCATION).and_then(|value| value.to_str().ok()) else {
            return Err(Error::MissingUploadLocation(url));
        };
        Url::parse(location).map_err(|err| Error::InvalidUrl(location.into(), err))
    }

    async fn query_status(&self, api: &YouTube, session: &Url) -> Result<Response, Error> {
        let res = api.authorized(api.client().put(session.clone()))
            .header(CONTENT_RANGE, format!("bytes */{}", self.media.length))
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;
        Ok(res)
    }

    async fn chunk_response<T>(res: Response, total: u64) -> Result<ChunkOutcome<T>, Error>
        where
            T: DeserializeOwned,
    {
        let status = res.status();
        if status.is_success() {
            return Ok(ChunkOutcome::Complete(res.json::<T>().await?));
        };
        if status == StatusCode::PERMANENT_REDIRECT {
            let next = next_offset(res.headers())?;
            if next > total {
                return Err(Error::InvalidRange(format!("server claims {} of {} bytes", next, total)));
            };
            return Ok(ChunkOutcome::Incomplete(next));
        };
        Err(YouTube::error_from_res(res).await)
    }
}

fn content_range(offset: u64, len: usize, total: u64) -> String {
    if len == 0 {
        return format!("bytes */{}", total);
    };
    format!("bytes {}-{}/{}", offset, offset + len as u64 - 1, total)
}

/// Offset of the first byte the server has not persisted yet, from a `Range: bytes=0-N` header.
fn next_offset(headers: &HeaderMap) -> Result<u64, Error> {
    let Some(range) = headers.get(RANGE) else {
        return Ok(0);
    };
    let invalid = || Error::InvalidRange(String::from_utf8_lossy(range.as_bytes()).into_owned());
    let range = range.to_str().map_err(|_| invalid())?;
    let Some((_, last)) = range.strip_prefix("bytes=").and_then(|bytes| bytes.split_once('-')) else {
        return Err(invalid());
    };
    match last.trim().parse::<u64>() {
        Ok(last) => Ok(last + 1),
        Err(_) => Err(invalid()),
    }
}
