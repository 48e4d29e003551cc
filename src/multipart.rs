//! Streaming `multipart/form-data` bodies for file and JSON uploads.
//!
//! Parts are lightweight descriptions: file-backed parts only hold a path and
//! are opened when the body stream reaches them, so each attempt of a retried
//! upload reads the files afresh and no file is ever held in memory whole.
//!
//! # Wire layout
//!
//! ```text
//! --{BOUNDARY}\r\n
//! Content-Disposition: form-data; name="{name}"; filename="{filename}"\r\n
//! Content-Type: {type}\r\n
//! \r\n
//! {body bytes}\r\n
//! ...
//! --{BOUNDARY}--\r\n
//! ```

use std::collections::VecDeque;
use std::io;
use std::path::{Component, Path, PathBuf};

use futures_util::Stream;
use futures_util::stream;
use serde_json::Value;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

/// Fixed boundary token separating parts.
pub const BOUNDARY: &str = "SocketSdkMultipartBoundary7f3a9c2e51d84b06";

/// Read size for file-backed parts (64 KiB).
const CHUNK_SIZE: usize = 64 * 1024;
const CHUNK_LIMIT: u64 = 64 * 1024;

const JSON_CONTENT_TYPE: &str = "Content-Type: application/json";
const FILE_CONTENT_TYPE: &str = "Content-Type: application/octet-stream";

/// Default field name for JSON parts.
pub const DEFAULT_JSON_FIELD: &str = "data";

/// Default filename for JSON parts.
pub const DEFAULT_JSON_FILENAME: &str = "data.json";

/// A file-backed part could not be opened or read while the body streamed.
#[derive(Debug, Error)]
#[error("could not read upload file {}: {source}", path.display())]
pub struct PartReadError {
    /// The file that failed.
    pub path: PathBuf,
    /// The underlying IO error.
    #[source]
    pub source: io::Error,
}

impl PartReadError {
    /// Kind of the underlying IO error.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// `Content-Type` header value for bodies built by this module.
#[must_use]
pub fn content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Where a streamed part's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    /// A file opened and read in chunks when the part is written.
    File(PathBuf),
    /// An in-memory buffer (serialized JSON).
    Buffer(Vec<u8>),
}

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    /// Pre-rendered headers and body written verbatim between boundaries.
    Segment(String),
    /// Headers followed by a lazily read body.
    Stream {
        /// Header lines such as `Content-Disposition`.
        header_lines: Vec<String>,
        /// The `Content-Type` line for the part.
        content_type_line: String,
        /// Body source.
        source: BodySource,
    },
}

impl MultipartPart {
    /// Form field name from the `Content-Disposition` line, if present.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.disposition_param("name")
    }

    /// Filename from the `Content-Disposition` line, if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.disposition_param("filename")
    }

    fn disposition_param(&self, param: &str) -> Option<&str> {
        let Self::Stream { header_lines, .. } = self else {
            return None;
        };
        let line = header_lines
            .iter()
            .find(|line| line.starts_with("Content-Disposition:"))?;
        let marker = format!(" {param}=\"");
        let start = line.find(&marker)? + marker.len();
        let end = line[start..].find('"')? + start;
        Some(&line[start..end])
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn disposition_line(name: &str, filename: &str) -> String {
    format!(
        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
        escape_quoted(name),
        escape_quoted(filename)
    )
}

/// Path of `path` relative to `base_path`, always joined with `/`.
///
/// Paths outside `base_path` keep their own components.
#[must_use]
pub fn relative_field_name(path: &Path, base_path: &Path) -> String {
    let relative = path.strip_prefix(base_path).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds one file-backed part per path.
///
/// Each part's field name is the file's path relative to `base_path` and its
/// filename is the base name. Files are not opened here.
#[must_use]
pub fn build_parts(filepaths: &[PathBuf], base_path: &Path) -> Vec<MultipartPart> {
    filepaths
        .iter()
        .map(|path| {
            let name = relative_field_name(path, base_path);
            let filename = path
                .file_name()
                .map_or_else(|| name.clone(), |file| file.to_string_lossy().into_owned());
            trace!(name = %name, filename = %filename, "built file part");
            MultipartPart::Stream {
                header_lines: vec![disposition_line(&name, &filename)],
                content_type_line: FILE_CONTENT_TYPE.to_string(),
                source: BodySource::File(path.clone()),
            }
        })
        .collect()
}

/// Builds a part carrying `data` serialized as a JSON file.
///
/// Without `basename` the part is named `data` with filename `data.json`.
/// With a basename, the filename is the basename verbatim and the field name
/// is the basename without its extension.
///
/// # Errors
///
/// Returns the serialization error if `data` cannot be rendered as JSON.
pub fn build_json_part(
    data: &Value,
    basename: Option<&str>,
) -> Result<MultipartPart, serde_json::Error> {
    let body = serde_json::to_vec(data)?;
    let (name, filename) = match basename.filter(|name| !name.is_empty()) {
        Some(basename) => {
            let stem = Path::new(basename)
                .file_stem()
                .map_or_else(|| basename.to_string(), |stem| stem.to_string_lossy().into_owned());
            (stem, basename.to_string())
        }
        None => (
            DEFAULT_JSON_FIELD.to_string(),
            DEFAULT_JSON_FILENAME.to_string(),
        ),
    };

    Ok(MultipartPart::Stream {
        header_lines: vec![disposition_line(&name, &filename)],
        content_type_line: JSON_CONTENT_TYPE.to_string(),
        source: BodySource::Buffer(body),
    })
}

/// Streaming state: parts not yet started plus the file currently being read.
struct BodyState {
    parts: VecDeque<MultipartPart>,
    open_file: Option<(PathBuf, File)>,
    finished: bool,
}

impl BodyState {
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, PartReadError>> {
        if let Some((path, file)) = self.open_file.as_mut() {
            let mut buffer = Vec::with_capacity(CHUNK_SIZE);
            let read = file.take(CHUNK_LIMIT).read_to_end(&mut buffer).await;
            return match read {
                Ok(0) => {
                    trace!(path = %path.display(), "finished streaming file part");
                    // Closes the handle before the next part is opened.
                    self.open_file = None;
                    Some(Ok(b"\r\n".to_vec()))
                }
                Ok(_) => Some(Ok(buffer)),
                Err(source) => {
                    debug!(path = %path.display(), error = %source, "file part read failed");
                    let path = path.clone();
                    self.open_file = None;
                    self.finished = true;
                    Some(Err(PartReadError { path, source }))
                }
            };
        }

        if self.finished {
            return None;
        }

        let Some(part) = self.parts.pop_front() else {
            self.finished = true;
            return Some(Ok(format!("--{BOUNDARY}--\r\n").into_bytes()));
        };

        match part {
            MultipartPart::Segment(segment) => {
                Some(Ok(format!("--{BOUNDARY}\r\n{segment}\r\n").into_bytes()))
            }
            MultipartPart::Stream {
                header_lines,
                content_type_line,
                source,
            } => {
                let mut head = format!("--{BOUNDARY}\r\n");
                for line in header_lines {
                    head.push_str(&line);
                    head.push_str("\r\n");
                }
                head.push_str(&content_type_line);
                head.push_str("\r\n\r\n");

                match source {
                    BodySource::Buffer(bytes) => {
                        let mut chunk = head.into_bytes();
                        chunk.extend_from_slice(&bytes);
                        chunk.extend_from_slice(b"\r\n");
                        Some(Ok(chunk))
                    }
                    BodySource::File(path) => match File::open(&path).await {
                        Ok(file) => {
                            self.open_file = Some((path, file));
                            Some(Ok(head.into_bytes()))
                        }
                        Err(source) => {
                            debug!(path = %path.display(), error = %source, "could not open file part");
                            self.finished = true;
                            Some(Err(PartReadError { path, source }))
                        }
                    },
                }
            }
        }
    }
}

/// Renders `parts` as a lazily produced multipart body.
///
/// At most one file is open at a time. The handle is released when its part
/// finishes, when a read fails, or when the stream is dropped mid-upload.
/// A failing file ends the stream with a [`PartReadError`] naming it.
pub fn body_stream(
    parts: Vec<MultipartPart>,
) -> impl Stream<Item = Result<Vec<u8>, PartReadError>> + Send + 'static {
    let state = BodyState {
        parts: parts.into(),
        open_file: None,
        finished: false,
    };
    stream::unfold(state, |mut state| async move {
        let chunk = state.next_chunk().await?;
        Some((chunk, state))
    })
}
