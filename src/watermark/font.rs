//! Font resolution.
//!
//! Text layers never touch the filesystem directly; they ask an injected
//! [`FontResolver`] for a face. [`SystemFontResolver`] scans font directories
//! and caches loaded faces, [`BuiltinFontResolver`] always answers with the
//! embedded default face.

use super::WatermarkError;
use ab_glyph::FontArc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument};

/// Embedded default face (DejaVu Sans Mono).
const EMBEDDED_FONT_DATA: &[u8] = include_bytes!("fonts/DejaVuSansMono.ttf");

/// Name reported for the embedded face.
pub const BUILTIN_FONT_NAME: &str = "DejaVu Sans Mono (built-in)";

static DEFAULT_FONT: OnceLock<FontArc> = OnceLock::new();

/// Maximum directory depth walked below each configured font directory.
const MAX_SCAN_DEPTH: usize = 4;

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

/// Style tokens stripped from file names when deriving the family key.
const STYLE_TOKENS: &[&str] = &[
    "bolditalic",
    "boldoblique",
    "bold",
    "italic",
    "oblique",
    "regular",
    "book",
    "roman",
    "normal",
];

/// What the renderer wants to draw with.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontRequest<'a> {
    pub family: Option<&'a str>,
    pub file: Option<&'a Path>,
    pub bold: bool,
    pub italic: bool,
}

/// A loaded face plus the styles it provides natively.
///
/// When a style was requested but `bold`/`italic` is false here, the text
/// renderer synthesizes it.
#[derive(Clone)]
pub struct ResolvedFont {
    pub font: FontArc,
    pub name: String,
    pub bold: bool,
    pub italic: bool,
}

impl std::fmt::Debug for ResolvedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFont")
            .field("name", &self.name)
            .field("bold", &self.bold)
            .field("italic", &self.italic)
            .finish()
    }
}

/// Font lookup service shared by all render workers.
pub trait FontResolver: Send + Sync {
    /// Resolve a face for the request.
    ///
    /// An explicit file wins over a family name; with neither, the built-in
    /// face is returned.
    fn resolve(&self, request: &FontRequest<'_>) -> Result<ResolvedFont, WatermarkError>;
}

/// Get the embedded default face, initializing it lazily.
pub fn builtin_font() -> Result<ResolvedFont, WatermarkError> {
    let font = match DEFAULT_FONT.get() {
        Some(font) => font.clone(),
        None => {
            let font = FontArc::try_from_slice(EMBEDDED_FONT_DATA).map_err(|e| {
                WatermarkError::FontResolution(format!("embedded font is invalid: {}", e))
            })?;
            DEFAULT_FONT.get_or_init(|| font).clone()
        }
    };

    Ok(ResolvedFont {
        font,
        name: BUILTIN_FONT_NAME.to_string(),
        bold: false,
        italic: false,
    })
}

/// Resolver that ignores the request and returns the embedded face.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinFontResolver;

impl FontResolver for BuiltinFontResolver {
    fn resolve(&self, _request: &FontRequest<'_>) -> Result<ResolvedFont, WatermarkError> {
        builtin_font()
    }
}

/// A font file discovered while scanning font directories.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FontFileEntry {
    path: PathBuf,
    family_key: String,
    bold: bool,
    italic: bool,
}

/// Resolver backed by font files on disk.
pub struct SystemFontResolver {
    dirs: Vec<PathBuf>,
    index: RwLock<Option<Arc<Vec<FontFileEntry>>>>,
    loaded: RwLock<HashMap<PathBuf, FontArc>>,
}

impl std::fmt::Debug for SystemFontResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemFontResolver")
            .field("dirs", &self.dirs)
            .field("loaded", &self.loaded.read().len())
            .finish()
    }
}

impl SystemFontResolver {
    /// Resolver that only looks in `dirs`.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            index: RwLock::new(None),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Resolver over `extra_dirs` followed by the platform font directories.
    pub fn with_platform_dirs(extra_dirs: Vec<PathBuf>) -> Self {
        let mut dirs = extra_dirs;
        dirs.extend(platform_font_dirs());
        Self::new(dirs)
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Number of faces currently held in the cache.
    pub fn cached_faces(&self) -> usize {
        self.loaded.read().len()
    }

    fn index(&self) -> Arc<Vec<FontFileEntry>> {
        if let Some(index) = self.index.read().as_ref() {
            return Arc::clone(index);
        }

        let mut guard = self.index.write();
        if let Some(index) = guard.as_ref() {
            return Arc::clone(index);
        }

        let mut entries = Vec::new();
        for dir in &self.dirs {
            scan_dir(dir, 0, &mut entries);
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(faces = entries.len(), "Indexed font directories");

        let index = Arc::new(entries);
        *guard = Some(Arc::clone(&index));
        index
    }

    fn load(&self, path: &Path) -> Result<FontArc, WatermarkError> {
        if let Some(font) = self.loaded.read().get(path) {
            return Ok(font.clone());
        }

        let bytes = std::fs::read(path).map_err(|e| {
            WatermarkError::FontResolution(format!("cannot read {}: {}", path.display(), e))
        })?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| {
            WatermarkError::FontResolution(format!("cannot parse {}: {}", path.display(), e))
        })?;

        self.loaded
            .write()
            .insert(path.to_path_buf(), font.clone());
        Ok(font)
    }

    fn find_family(&self, family: &str, bold: bool, italic: bool) -> Option<FontFileEntry> {
        let key = strip_style_tokens(normalize_name(family));
        let index = self.index();
        let candidates: Vec<&FontFileEntry> =
            index.iter().filter(|e| e.family_key == key).collect();

        let score = |e: &FontFileEntry| {
            // exact style first, then plain faces to synthesize from
            let style_match = (e.bold == bold) as u8 + (e.italic == italic) as u8;
            let plain = (!e.bold) as u8 + (!e.italic) as u8;
            style_match * 4 + plain
        };

        candidates
            .into_iter()
            .max_by(|a, b| score(a).cmp(&score(b)).then_with(|| b.path.cmp(&a.path)))
            .cloned()
    }
}

impl FontResolver for SystemFontResolver {
    #[instrument(level = "debug", skip(self))]
    fn resolve(&self, request: &FontRequest<'_>) -> Result<ResolvedFont, WatermarkError> {
        if let Some(file) = request.file {
            let font = self.load(file)?;
            let (_, bold, italic) = classify_file_name(file);
            return Ok(ResolvedFont {
                font,
                name: file.display().to_string(),
                bold,
                italic,
            });
        }

        let Some(family) = request.family else {
            return builtin_font();
        };

        let entry = self
            .find_family(family, request.bold, request.italic)
            .ok_or_else(|| {
                WatermarkError::FontResolution(format!("font family '{}' not found", family))
            })?;

        let font = self.load(&entry.path)?;
        Ok(ResolvedFont {
            font,
            name: family.to_string(),
            bold: entry.bold,
            italic: entry.italic,
        })
    }
}

/// Well-known font directories for the current platform.
pub fn platform_font_dirs() -> Vec<PathBuf> {
    let mut dirs_found = Vec::new();
    if let Some(dir) = dirs::font_dir() {
        dirs_found.push(dir);
    }
    if let Some(home) = dirs::home_dir() {
        dirs_found.push(home.join(".fonts"));
    }

    if cfg!(target_os = "macos") {
        dirs_found.push(PathBuf::from("/Library/Fonts"));
        dirs_found.push(PathBuf::from("/System/Library/Fonts"));
    } else if cfg!(windows) {
        dirs_found.push(PathBuf::from(r"C:\Windows\Fonts"));
    } else {
        dirs_found.push(PathBuf::from("/usr/share/fonts"));
        dirs_found.push(PathBuf::from("/usr/local/share/fonts"));
    }

    dirs_found
}

fn scan_dir(dir: &Path, depth: usize, out: &mut Vec<FontFileEntry>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(&path, depth + 1, out);
            continue;
        }

        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| FONT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_font {
            continue;
        }

        let (family_key, bold, italic) = classify_file_name(&path);
        if !family_key.is_empty() {
            out.push(FontFileEntry {
                path,
                family_key,
                bold,
                italic,
            });
        }
    }
}

/// Lowercase alphanumerics only: "DejaVu Sans" and "dejavu-sans" compare equal.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Derive (family key, bold, italic) from a font file name.
fn classify_file_name(path: &Path) -> (String, bool, bool) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(normalize_name)
        .unwrap_or_default();

    let bold = stem.contains("bold");
    let italic = stem.contains("italic") || stem.contains("oblique");

    (strip_style_tokens(stem), bold, italic)
}

/// Drop trailing style words so "TestSans-Bold" and "Test Sans" share a key.
fn strip_style_tokens(mut name: String) -> String {
    for token in STYLE_TOKENS {
        if name.ends_with(token) && name.len() > token.len() {
            name.truncate(name.len() - token.len());
        }
    }
    name
}
