//! URL-encoded form and multipart file decoding.

use bytes::Bytes;
use http::Method;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::request::Request;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("form body is malformed: {0}")]
    Malformed(#[from] serde_urlencoded::de::Error),

    #[error("form failed validation: {0}")]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("request content-type is not multipart/form-data")]
    NotMultipart,

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("multipart body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("multipart body is malformed: {0}")]
    Malformed(#[source] multer::Error),
}

impl From<multer::Error> for FileError {
    fn from(e: multer::Error) -> Self {
        match e {
            multer::Error::StreamSizeExceeded { limit } => Self::TooLarge { limit },
            multer::Error::NoMultipart | multer::Error::NoBoundary => Self::NotMultipart,
            other => Self::Malformed(other),
        }
    }
}

/// One uploaded file, fully read into memory and owned by the caller.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

/// Decodes form fields into `T`, then validates it.
///
/// Fields come from the query string and, for `POST`, `PUT` and `PATCH`
/// requests with an `application/x-www-form-urlencoded` body, from the body.
/// When a key appears in both, the body wins.
pub fn read_form<T>(req: &Request) -> Result<T, FormError>
where
    T: DeserializeOwned + Validate,
{
    let mut pairs: Vec<(String, String)> = Vec::new();

    let method = req.method();
    let has_form_body = (method == Method::POST || method == Method::PUT || method == Method::PATCH)
        && req.header("content-type").is_some_and(is_form_urlencoded);
    if has_form_body {
        pairs.extend(serde_urlencoded::from_bytes::<Vec<(String, String)>>(req.body())?);
    }
    if let Some(query) = req.uri().query() {
        pairs.extend(serde_urlencoded::from_str::<Vec<(String, String)>>(query)?);
    }

    let mut seen = std::collections::HashSet::new();
    pairs.retain(|(key, _)| seen.insert(key.clone()));

    let encoded = serde_urlencoded::to_string(&pairs)
        .unwrap_or_else(|e| unreachable!("string pairs always encode: {e}"));
    let value: T = serde_urlencoded::from_str(&encoded)?;
    value.validate()?;
    Ok(value)
}

fn is_form_urlencoded(content_type: &str) -> bool {
    content_type.split(';').next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(FORM_URLENCODED))
}

/// Reads the first file part named `field` from a `multipart/form-data` body.
///
/// The whole body may not exceed `max_megabytes` MiB. The server's
/// [`max_body_size`](crate::Server::max_body_size) applies first, while the
/// body is still being received. A missing part is an error only when
/// `required`; otherwise the result is `Ok(None)`.
pub async fn read_file(
    req: &Request,
    field: &str,
    required: bool,
    max_megabytes: u64,
) -> Result<Option<UploadedFile>, FileError> {
    let content_type = req.header("content-type").ok_or(FileError::NotMultipart)?;
    let boundary = multer::parse_boundary(content_type)?;

    let limit = max_megabytes.saturating_mul(1 << 20);
    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().whole_stream(limit));
    let body = req.body().clone();
    let stream = futures::stream::once(async move { Ok::<Bytes, std::convert::Infallible>(body) });
    let mut multipart = multer::Multipart::with_constraints(stream, boundary, constraints);

    while let Some(part) = multipart.next_field().await? {
        let Some(file_name) = part.file_name().map(str::to_owned) else {
            continue;
        };
        if part.name() != Some(field) {
            continue;
        }
        let content_type = part.content_type().map(ToString::to_string);
        let data = part.bytes().await?;
        return Ok(Some(UploadedFile {
            field_name: field.to_owned(),
            file_name,
            content_type,
            data,
        }));
    }

    if required {
        Err(FileError::MissingRequiredField(field.to_owned()))
    } else {
        Ok(None)
    }
}
