//! Strict `/bucket/name` path parsing.

/// A bucket/object-name pair extracted from a request path. Only present
/// when the path splits into exactly `["", bucket, name]` — sub-paths under
/// a bucket (`/bucket/prefix/key`) are treated as non-object requests and
/// bypass the transform pipeline entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Object {
    pub bucket: String,
    pub name: String,
}

impl S3Object {
    pub fn extract(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() != 3 || !segments[0].is_empty() {
            return None;
        }
        let (bucket, name) = (segments[1], segments[2]);
        if bucket.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            bucket: bucket.to_string(),
            name: name.to_string(),
        })
    }
}
