//! The interactive thumbnail upload: prompt, upload, report.

use std::{
    error::Error as _,
    io::{
        self,
        BufRead,
        Write,
    },
};

use mime::{
    Mime,
};

use url::{
    Url,
};

use tracing::{
    info,
    warn,
};

use crate::{
    config::{
        UploadOptions,
    },
    BarProgress,
    ConsoleProgress,
    Error,
    InputField,
    MediaContent,
    Prompter,
    YouTube,
};

/// Name of the token store this sample keeps its credential in.
pub const CREDENTIAL_DATASTORE: &str = "uploadthumbnail";

/// Declared type of every uploaded image, whatever its real encoding is.
pub const IMAGE_FILE_FORMAT: Mime = mime::IMAGE_PNG;

pub const DIVIDER: &str = "\n================== Uploaded Thumbnail ==================\n";

pub const EXIT_INVALID_INPUT: u8 = 1;
pub const EXIT_FAILURE: u8 = 2;

#[derive(Debug, PartialEq)]
pub enum Outcome {
    Uploaded(Url),
    InvalidInput(InputField),
    Failed,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Uploaded(_) => 0,
            Self::InvalidInput(_) => EXIT_INVALID_INPUT,
            Self::Failed => EXIT_FAILURE,
        }
    }
}

/// Ask for a video id and an image path on `input`/`out`, upload the image as that video's
/// thumbnail and print the resulting url. Failures are reported on `err`.
pub async fn run<R, W, E>(youtube: &YouTube, options: &UploadOptions, input: R, mut out: W, mut err: E) -> Outcome
    where
        R: BufRead,
        W: Write,
        E: Write,
{
    let result = upload_from_input(youtube, options, input, &mut out).await;
    if let Err(write_err) = out.flush() {
        warn!(error = %write_err, "couldn't flush stdout");
    };

    let outcome = match &result {
        Ok(url) => Outcome::Uploaded(url.clone()),
        Err(Error::EmptyInput(field)) => Outcome::InvalidInput(*field),
        Err(_) => Outcome::Failed,
    };
    if let Err(error) = result {
        let reported = match error {
            Error::EmptyInput(field) => writeln!(err, "{}", field.empty_message()),
            error => report_failure(&mut err, &error),
        };
        if let Err(write_err) = reported {
            warn!(error = %write_err, "couldn't report failure");
        };
    };
    outcome
}

async fn upload_from_input<R, W>(youtube: &YouTube, options: &UploadOptions, input: R, out: &mut W) -> Result<Url, Error>
    where
        R: BufRead,
        W: Write,
{
    let mut prompter = Prompter::new(input, &mut *out);
    let video_id = prompter.read_video_id()?;
    writeln!(prompter.output(), "You chose {} to upload a thumbnail.", video_id)?;

    let path = prompter.read_image_path()?;
    writeln!(prompter.output(), "You chose {} to upload.", path.display())?;
    drop(prompter);

    let media = MediaContent::open(IMAGE_FILE_FORMAT, &path).await?;
    let url = upload_thumbnail(youtube, &video_id, media, options, out).await?;

    writeln!(out, "{}", DIVIDER)?;
    writeln!(out, "  - Url: {}", url)?;
    Ok(url)
}

pub async fn upload_thumbnail<W>(youtube: &YouTube, video_id: &str, media: MediaContent, options: &UploadOptions, out: &mut W) -> Result<Url, Error>
    where
        W: Write,
{
    let mut request = youtube.thumbnails().set(video_id, media);
    let uploader = request.media_uploader();
    uploader
        .set_direct_upload_enabled(options.direct_upload)
        .set_max_recoveries(options.max_recoveries)
        .set_chunk_size(options.chunk_size)?;
    if options.progress_bar {
        uploader.set_progress_listener(BarProgress::new());
    } else {
        uploader.set_progress_listener(ConsoleProgress::new(&mut *out));
    };

    let response = request.execute().await?;
    let Some(url) = response.default_url() else {
        return Err(Error::MissingThumbnail);
    };
    info!(video_id, %url, "thumbnail set");
    Ok(url.clone())
}

pub fn report_failure<E>(err: &mut E, error: &Error) -> io::Result<()>
    where
        E: Write,
{
    match error.api_details() {
        Some(details) => writeln!(err, "API error code: {} : {}", details.code, details.message)?,
        None => writeln!(err, "IO error: {}", error)?,
    };
    writeln!(err, "{:?}", error)?;
    let mut source = error.source();
    while let Some(cause) = source {
        writeln!(err, "caused by: {}", cause)?;
        source = cause.source();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Credential,
        APPLICATION_NAME,
    };
    use mockito::Matcher;
    use std::io::Cursor;

    const SET_PATH: &str = "/upload/youtube/v3/thumbnails/set";

    struct Run {
        outcome: Outcome,
        out: String,
        err: String,
    }

    async fn run_with(server: &mockito::Server, input: &str, options: &UploadOptions) -> Run {
        let youtube = YouTube::new(Credential::new("token"), APPLICATION_NAME).unwrap()
            .with_base_url(server.url());
        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = run(&youtube, options, Cursor::new(input.as_bytes().to_vec()), &mut out, &mut err).await;
        Run {
            outcome,
            out: String::from_utf8(out).unwrap(),
            err: String::from_utf8(err).unwrap(),
        }
    }

    fn image_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file
    }

    async fn mock_session(server: &mut mockito::Server, body: &str) -> (mockito::Mock, mockito::Mock) {
        let location = format!("{}/upload/session?upload_id=xyz", server.url());
        let initiate = server.mock("POST", SET_PATH)
            .match_query(Matcher::Any)
            .match_header("x-upload-content-type", "image/png")
            .with_status(200)
            .with_header("location", &location)
            .create_async().await;
        let chunk = server.mock("PUT", "/upload/session")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async().await;
        (initiate, chunk)
    }

    #[tokio::test]
    async fn uploads_and_prints_url() {
        let mut server = mockito::Server::new_async().await;
        // a jpeg header, still declared as png
        let file = image_file(&[0xff, 0xd8, 0xff, 0xe0, 0, 0x10]);
        let (initiate, chunk) = mock_session(&mut server, r#"{"items":[{"default":{"url":"https://example.com/thumb.jpg"}}]}"#).await;

        let input = format!("abc123\n{}\n", file.path().display());
        let run = run_with(&server, &input, &UploadOptions::default()).await;

        assert_eq!(run.outcome, Outcome::Uploaded(Url::parse("https://example.com/thumb.jpg").unwrap()));
        assert_eq!(run.outcome.exit_code(), 0);
        assert_eq!(run.err, "");
        assert_eq!(
            run.out,
            format!(
                "Please enter a video Id to update: You chose abc123 to upload a thumbnail.\n\
                 Please enter the path of the image file to upload: You chose {} to upload.\n\
                 Initiation Started\n\
                 Initiation Completed\n\
                 Upload Completed!\n\
                 \n================== Uploaded Thumbnail ==================\n\n\
                 \x20 - Url: https://example.com/thumb.jpg\n",
                file.path().display(),
            ),
        );
        initiate.assert_async().await;
        chunk.assert_async().await;
    }

    #[tokio::test]
    async fn declares_file_length() {
        let mut server = mockito::Server::new_async().await;
        let file = image_file(&[1u8; 1234]);
        let initiate = server.mock("POST", SET_PATH)
            .match_query(Matcher::Any)
            .match_header("x-upload-content-type", "image/png")
            .match_header("x-upload-content-length", "1234")
            .with_status(200)
            .with_header("location", &format!("{}/upload/session", server.url()))
            .create_async().await;
        let _chunk_1 = server.mock("PUT", "/upload/session")
            .match_query(Matcher::Any)
            .match_header("content-range", "bytes 0-1233/1234")
            .with_status(200)
            .with_body(r#"{"items":[{"default":{"url":"https://example.com/thumb.jpg"}}]}"#)
            .create_async().await;

        let input = format!("abc123\n{}\n", file.path().display());
        let run = run_with(&server, &input, &UploadOptions::default()).await;

        assert_eq!(run.outcome.exit_code(), 0);
        initiate.assert_async().await;
    }

    #[tokio::test]
    async fn api_error() {
        let mut server = mockito::Server::new_async().await;
        let file = image_file(b"png");
        let _initiate_2 = server.mock("POST", SET_PATH)
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"code":403,"message":"forbidden","errors":[{"domain":"youtube.thumbnail","reason":"forbidden","message":"forbidden"}]}}"#)
            .create_async().await;

        let input = format!("abc123\n{}\n", file.path().display());
        let run = run_with(&server, &input, &UploadOptions::default()).await;

        assert_eq!(run.outcome, Outcome::Failed);
        assert_eq!(run.outcome.exit_code(), EXIT_FAILURE);
        let diagnostic = run.err.lines().next().unwrap();
        assert_eq!(diagnostic, "API error code: 403 : forbidden");
        assert!(!run.out.contains("Url:"));
        assert!(!run.out.contains("Uploaded Thumbnail"));
    }

    #[tokio::test]
    async fn api_error_with_partial_items() {
        let mut server = mockito::Server::new_async().await;
        let file = image_file(b"png");
        let _initiate_3 = server.mock("POST", SET_PATH)
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"code":403,"message":"forbidden","errors":[{"message":"forbidden","reason":"forbidden"}]}}"#)
            .create_async().await;

        let input = format!("abc123\n{}\n", file.path().display());
        let run = run_with(&server, &input, &UploadOptions::default()).await;

        assert_eq!(run.outcome, Outcome::Failed);
        assert_eq!(run.err.lines().next(), Some("API error code: 403 : forbidden"));
    }

    #[tokio::test]
    async fn missing_file() {
        let mut server = mockito::Server::new_async().await;
        let upload = server.mock("POST", SET_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async().await;
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.png");

        let input = format!("abc123\n{}\n", missing.display());
        let run = run_with(&server, &input, &UploadOptions::default()).await;

        assert_eq!(run.outcome, Outcome::Failed);
        assert!(run.err.starts_with(&format!("IO error: couldn't open {}", missing.display())));
        assert!(run.err.contains("caused by: "));
        assert!(!run.out.contains("Url:"));
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn empty_input_stops_before_upload() {
        let mut server = mockito::Server::new_async().await;
        let upload = server.mock("POST", SET_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async().await;
        let file = image_file(b"png");

        let run = run_with(&server, "\n", &UploadOptions::default()).await;
        assert_eq!(run.outcome, Outcome::InvalidInput(InputField::VideoId));
        assert_eq!(run.outcome.exit_code(), EXIT_INVALID_INPUT);
        assert_eq!(run.err, "Video Id can't be empty!\n");
        assert_eq!(run.out, "Please enter a video Id to update: ");

        let run = run_with(&server, "   \n", &UploadOptions::default()).await;
        assert_eq!(run.outcome, Outcome::InvalidInput(InputField::VideoId));

        let run = run_with(&server, "abc123\n \n", &UploadOptions::default()).await;
        assert_eq!(run.outcome, Outcome::InvalidInput(InputField::ImagePath));
        assert_eq!(run.err, "Path can not be empty!\n");

        let run = run_with(&server, &format!("\n{}\n", file.path().display()), &UploadOptions::default()).await;
        assert_eq!(run.outcome.exit_code(), EXIT_INVALID_INPUT);

        upload.assert_async().await;
    }

    #[tokio::test]
    async fn empty_item_list() {
        let mut server = mockito::Server::new_async().await;
        let file = image_file(b"png");
        let _session = mock_session(&mut server, r#"{"kind":"youtube#thumbnailSetResponse","items":[]}"#).await;

        let input = format!("abc123\n{}\n", file.path().display());
        let run = run_with(&server, &input, &UploadOptions::default()).await;

        assert_eq!(run.outcome, Outcome::Failed);
        assert!(run.err.starts_with("IO error: the response didn't contain a default thumbnail"));
        assert!(!run.out.contains("Url:"));
    }

    #[tokio::test]
    async fn invalid_chunk_size_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let upload = server.mock("POST", SET_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async().await;
        let file = image_file(b"png");

        let options = UploadOptions { chunk_size: 3, ..UploadOptions::default() };
        let input = format!("abc123\n{}\n", file.path().display());
        let run = run_with(&server, &input, &options).await;

        assert_eq!(run.outcome, Outcome::Failed);
        upload.assert_async().await;
    }
}
