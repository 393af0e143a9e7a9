//! Maps a parameter's declared location to its validation bucket.

use crate::types::{Bucket, Parameter, ParameterLocation};

/// Resolve the bucket a parameter is validated in.
///
/// `header`, `path` and `query` map to their own buckets. Everything else
/// (`body`, `formData`, `cookie`, unknown locations) lands in
/// [`Bucket::Fields`], which the parameters schema does not compile.
pub fn resolve_parameter_source(parameter: &Parameter) -> Bucket {
    match parameter.location {
        ParameterLocation::Header => Bucket::Headers,
        ParameterLocation::Path => Bucket::Path,
        ParameterLocation::Query => Bucket::Query,
        _ => Bucket::Fields,
    }
}
