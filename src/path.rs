//! Store path model.
//!
//! Paths look like POSIX paths but address a two-level namespace:
//!
//! ```text
//!   /                    root (the set of all buckets)
//!   /bucket/             a bucket
//!   /bucket/some/key     an object, or an object-key prefix ("directory")
//! ```
//!
//! Non-rooted strings are resolved relative to a default bucket by
//! [`normalize`].  A trailing `/` marks a path as a directory; parsing with
//! `as_directory = true` adds it when missing so that keys double as
//! listing prefixes.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Path segment separator.
pub const SEPARATOR: char = '/';

/// Suffix of the zero-byte objects that make empty directories listable.
pub const DIRECTORY_MARKER_SUFFIX: &str = "_$folder$";

/// Reasons a path string is rejected by [`StorePath::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path does not start with '/'")]
    NotRooted,
    #[error("bucket segment is empty")]
    EmptyBucket,
    #[error("path contains a control character")]
    ControlCharacter,
}

/// What a [`StorePath`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    Root,
    Bucket,
    Object,
}

/// A parsed, normalized store path.
///
/// Equality is case-sensitive on bucket and key, matching the backend
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    bucket: Option<String>,
    key: String,
}

impl StorePath {
    /// The unique root path `/`.
    pub fn root() -> Self {
        Self {
            bucket: None,
            key: String::new(),
        }
    }

    /// Parse an absolute path string.
    ///
    /// With `as_directory`, a non-empty key gets exactly one trailing
    /// separator.
    pub fn parse(raw: &str, as_directory: bool) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        if raw.chars().any(char::is_control) {
            return Err(PathError::ControlCharacter);
        }
        let rest = raw.strip_prefix(SEPARATOR).ok_or(PathError::NotRooted)?;
        if rest.is_empty() {
            return Ok(Self::root());
        }

        let (bucket, key) = rest.split_once(SEPARATOR).unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(PathError::EmptyBucket);
        }

        let mut key = key.to_string();
        if as_directory && !key.is_empty() && !key.ends_with(SEPARATOR) {
            key.push(SEPARATOR);
        }

        Ok(Self {
            bucket: Some(bucket.to_string()),
            key,
        })
    }

    pub fn kind(&self) -> PathKind {
        match (&self.bucket, self.key.is_empty()) {
            (None, _) => PathKind::Root,
            (Some(_), true) => PathKind::Bucket,
            (Some(_), false) => PathKind::Object,
        }
    }

    pub fn is_root(&self) -> bool {
        self.bucket.is_none()
    }

    /// Root, buckets, and keys ending in `/` are directories.
    pub fn is_directory(&self) -> bool {
        self.kind() != PathKind::Object || self.key.ends_with(SEPARATOR)
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Object key relative to the bucket; empty for root and buckets.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key of the zero-byte object that marks this directory as existing.
    ///
    /// `None` for root and bucket paths, which need no marker.
    pub fn directory_marker_key(&self) -> Option<String> {
        if self.kind() != PathKind::Object {
            return None;
        }
        let folder = get_folder_name(&self.key);
        Some(combine([
            self.key.as_str(),
            "/",
            &format!("{folder}{DIRECTORY_MARKER_SUFFIX}"),
        ]))
    }

    /// Render an object key of this path's bucket as an absolute path.
    pub(crate) fn sibling(&self, key: &str) -> String {
        match &self.bucket {
            Some(bucket) => format!("/{bucket}/{key}"),
            None => format!("/{key}"),
        }
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bucket {
            None => f.write_str("/"),
            Some(bucket) if self.key.is_empty() => write!(f, "/{bucket}/"),
            Some(bucket) => write!(f, "/{bucket}/{}", self.key),
        }
    }
}

impl FromStr for StorePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorePath::parse(s, false)
    }
}

/// Resolve `raw` against `default_bucket`.
///
/// A valid absolute path is taken as is; anything else is treated as a key
/// relative to the default bucket.  Relative keys are appended verbatim, so
/// interior separator runs such as `a//b` are kept.
pub fn normalize(default_bucket: &str, raw: &str, as_directory: bool) -> Result<StorePath, PathError> {
    if is_path_rooted(raw) {
        if let Ok(path) = StorePath::parse(raw, as_directory) {
            return Ok(path);
        }
    }
    let key = raw.trim_start_matches(SEPARATOR);
    StorePath::parse(&format!("/{default_bucket}/{key}"), as_directory)
}

/// Join segments with `/`, collapsing runs of separators.
///
/// Leading and trailing separators of the input survive; empty segments
/// are skipped.
pub fn combine<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for segment in segments {
        let segment = segment.as_ref();
        if segment.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push(SEPARATOR);
        }
        joined.push_str(segment);
    }

    let mut out = String::with_capacity(joined.len());
    let mut previous_was_separator = false;
    for ch in joined.chars() {
        let is_separator = ch == SEPARATOR;
        if is_separator && previous_was_separator {
            continue;
        }
        previous_was_separator = is_separator;
        out.push(ch);
    }
    out
}

/// Everything before the last separator (`/` for top-level entries).
pub fn get_directory_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        None => "",
        Some(0) => "/",
        Some(idx) => &path[..idx],
    }
}

/// Everything after the last separator.
pub fn get_file_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Last segment of a directory path, ignoring a trailing separator.
pub fn get_folder_name(path: &str) -> &str {
    get_file_name(path.trim_end_matches(SEPARATOR))
}

pub fn is_path_rooted(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

/// Whether an object key is a directory marker rather than a file.
pub fn is_directory_marker(key: &str) -> bool {
    key.ends_with(DIRECTORY_MARKER_SUFFIX)
}

// -- Bucket name validation ---------------------------------------------------

/// Whether `name` conforms to S3 bucket naming rules.
///
/// Rules:
/// - 3-63 characters long
/// - Only lowercase letters, numbers, hyphens, and periods
/// - Must begin and end with a letter or number
/// - Cannot be formatted as an IP address (e.g., 192.168.5.4)
/// - Must not start with `xn--` or end with `-s3alias` or `--ol-s3`
pub fn is_valid_s3_bucket_name(name: &str) -> bool {
    if !(3..=63).contains(&name.len()) {
        return false;
    }

    if !name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '.')
    {
        return false;
    }

    let alnum = |ch: char| ch.is_ascii_lowercase() || ch.is_ascii_digit();
    let first_ok = name.chars().next().is_some_and(alnum);
    let last_ok = name.chars().last().is_some_and(alnum);
    if !first_ok || !last_ok {
        return false;
    }

    !(looks_like_ip(name)
        || name.starts_with("xn--")
        || name.ends_with("-s3alias")
        || name.ends_with("--ol-s3"))
}

/// Minimal bucket-name rule every backend shares: non-empty, a single
/// path segment, printable.
pub fn is_plain_bucket_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(SEPARATOR) && !name.chars().any(char::is_control)
}

/// Check whether a string looks like an IPv4 address (e.g., "192.168.5.4").
fn looks_like_ip(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() == 4 && parts.iter().all(|p| p.parse::<u8>().is_ok())
}
