//! Output path planning.
//!
//! [`resolve_destination`] is a pure function from a source path and naming
//! rule to an output path. [`plan_destinations`] applies it to a whole job
//! and settles name conflicts up front, so workers running in parallel
//! never race for the same file name.

use super::job::{ConflictPolicy, DestinationPolicy, NamingRule};
use super::report::ItemFailure;
use crate::image_io::OutputFormat;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Format used when neither the rule nor the source extension names a
/// format we can write.
pub const FALLBACK_FORMAT: OutputFormat = OutputFormat::Png;

/// Where one item will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub dest: PathBuf,
    pub format: OutputFormat,
}

/// Output format for `source` under `naming`.
pub fn output_format_for(source: &Path, naming: &NamingRule) -> OutputFormat {
    naming
        .force_format
        .or_else(|| {
            source
                .extension()
                .and_then(|e| e.to_str())
                .and_then(OutputFormat::from_extension)
        })
        .unwrap_or(FALLBACK_FORMAT)
}

/// Output path for the item at zero-based `index` of a batch.
///
/// The stem is the source stem (or `image_0001`-style numbering when
/// `keep_original_name` is off) wrapped in the rule's prefix and suffix.
/// The extension follows the output format; a source extension that already
/// names that format is kept as written (`.JPEG` stays `.JPEG`).
pub fn resolve_destination(
    source: &Path,
    index: usize,
    output_root: &Path,
    naming: &NamingRule,
) -> PathBuf {
    let format = output_format_for(source, naming);

    let stem = if naming.keep_original_name {
        source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| numbered_stem(index))
    } else {
        numbered_stem(index)
    };

    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .filter(|ext| OutputFormat::from_extension(ext) == Some(format))
        .map(str::to_string)
        .unwrap_or_else(|| format.extension().to_string());

    output_root.join(format!(
        "{}{}{}.{}",
        naming.prefix, stem, naming.suffix, extension
    ))
}

fn numbered_stem(index: usize) -> String {
    format!("image_{:04}", index + 1)
}

/// Plan the output of every source in order.
///
/// An item whose output would replace its own source fails with
/// [`ItemFailure::UnsafeOverwrite`]. Two items of the same batch never share
/// an output path; the later one gets a `_1`, `_2`, ... suffix. Under
/// [`ConflictPolicy::AutoRename`] files already on disk are avoided the
/// same way, under [`ConflictPolicy::Overwrite`] they are replaced.
pub fn plan_destinations(
    sources: &[PathBuf],
    policy: &DestinationPolicy,
) -> Vec<Result<PlannedOutput, ItemFailure>> {
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    sources
        .iter()
        .enumerate()
        .map(|(index, source)| {
            let format = output_format_for(source, &policy.naming);
            let candidate =
                resolve_destination(source, index, &policy.output_root, &policy.naming);

            if is_same_file(source, &candidate) {
                return Err(ItemFailure::UnsafeOverwrite { dest: candidate });
            }

            let dest = free_name(&candidate, |path| {
                claimed.contains(path)
                    || is_same_file(source, path)
                    || (policy.conflict == ConflictPolicy::AutoRename && path.exists())
            });
            claimed.insert(dest.clone());
            Ok(PlannedOutput { dest, format })
        })
        .collect()
}

/// First of `path`, `stem_1.ext`, `stem_2.ext`, ... for which `taken` is false.
fn free_name(path: &Path, mut taken: impl FnMut(&Path) -> bool) -> PathBuf {
    if !taken(path) {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    (1..)
        .map(|n| {
            let name = match &extension {
                Some(ext) => format!("{}_{}.{}", stem, n, ext),
                None => format!("{}_{}", stem, n),
            };
            path.with_file_name(name)
        })
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| path.to_path_buf())
}

/// Whether `a` and `b` name the same file, resolving symlinks and relative
/// components when both exist.
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
