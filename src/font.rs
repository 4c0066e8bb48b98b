//! Font registry, system font discovery and shaping.
//!
//! This module is the only environment-dependent input to rendering: which font file
//! backs a family depends on what was registered and what the host has installed.
//! Everything downstream goes through [`TextMeasurer`], so layout can be exercised
//! with a synthetic measurer and the real registry stays the single place where
//! output may vary between machines.

use crate::text::FontWeight;
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use ttf_parser::GlyphId;

/// Opaque handle to a resolved face.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontRef {
    key: Arc<str>,
}

impl FontRef {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Ascent above and descent below the baseline, both positive, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalMetrics {
    pub ascent: f32,
    pub descent: f32,
}

/// Font lookup and measurement as seen by the text compositor.
pub trait TextMeasurer: Send + Sync {
    /// Resolves `family` (a CSS-style list) at `weight`, falling back to sans-serif.
    fn resolve_font(&self, family: &str, weight: FontWeight) -> Option<FontRef>;

    /// Advance width of `text`, with `letter_spacing` added after every glyph.
    fn text_width(&self, font: &FontRef, size: f32, text: &str, letter_spacing: f32) -> f32;

    fn vertical_metrics(&self, font: &FontRef, size: f32) -> VerticalMetrics;
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font: Arc<str>,
    size_bits: u32,
    spacing_bits: u32,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, f32>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<f32> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: f32) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            match self.order.pop_front() {
                Some(old) => {
                    self.map.remove(&old);
                }
                None => break,
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct LoadedFont {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    units_per_em: f32,
    ascender: f32,
    descender: f32,
}

impl LoadedFont {
    fn parse(name: String, data: Vec<u8>) -> Option<Self> {
        let face = ttf_parser::Face::parse(&data, 0).ok()?;
        let units_per_em = face.units_per_em().max(1) as f32;
        let ascender = face.ascender() as f32;
        let descender = face.descender() as f32;
        Some(Self {
            name,
            units_per_em,
            ascender,
            descender,
            data,
        })
    }
}

#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<Arc<LoadedFont>>,
    lookup: HashMap<String, usize>,
    system_fonts: bool,
    resolved: Mutex<HashMap<String, Option<Arc<LoadedFont>>>>,
    text_width_cache: Mutex<TextWidthCache>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            system_fonts: true,
            resolved: Mutex::new(HashMap::new()),
            text_width_cache: Mutex::new(TextWidthCache::new(20_000)),
        }
    }

    /// Whether families missing from the registry are looked up on the host.
    pub fn set_system_fonts(&mut self, enabled: bool) {
        self.system_fonts = enabled;
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn register_dir(&mut self, path: impl AsRef<Path>) {
        let Ok(entries) = fs::read_dir(path.as_ref()) else {
            return;
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        // Registration order decides alias conflicts; keep it stable.
        files.sort();
        for file in files {
            self.register_file(file);
        }
    }

    pub fn register_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let Some(ext) = path.extension().and_then(|v| v.to_str()) else {
            return;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" {
            return;
        }
        let Ok(data) = fs::read(path) else {
            log::warn!("could not read font file {}", path.display());
            return;
        };
        if self.insert(data, path).is_none() {
            log::warn!("skipping unparseable font file {}", path.display());
        }
    }

    /// Registers an in-memory font, returning its primary name.
    pub fn register_bytes(&mut self, data: Vec<u8>, source_name: Option<&str>) -> Option<String> {
        let source = source_name.unwrap_or("EmbeddedFont");
        self.insert(data, Path::new(source))
    }

    fn insert(&mut self, data: Vec<u8>, path: &Path) -> Option<String> {
        let (name, aliases) = {
            let face = ttf_parser::Face::parse(&data, 0).ok()?;
            font_names(&face, path)
        };
        let font = LoadedFont::parse(name.clone(), data)?;
        let index = self.fonts.len();
        self.fonts.push(Arc::new(font));

        for alias in std::iter::once(name.clone()).chain(aliases) {
            let key = normalize_name(&alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, index);
        }
        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.clear();
        }
        Some(name)
    }

    pub(crate) fn loaded(&self, font: &FontRef) -> Option<Arc<LoadedFont>> {
        let resolved = self.resolved.lock().ok()?;
        resolved.get(font.key()).cloned().flatten()
    }

    fn registered(&self, name: &str) -> Option<Arc<LoadedFont>> {
        self.lookup
            .get(&normalize_name(name))
            .and_then(|index| self.fonts.get(*index))
            .cloned()
    }

    fn find_registered(&self, family: &str, bold: bool) -> Option<Arc<LoadedFont>> {
        if bold {
            for candidate in [
                format!("{family} bold"),
                format!("{family}-bold"),
                format!("{family}bold"),
            ] {
                if let Some(font) = self.registered(&candidate) {
                    return Some(font);
                }
            }
        }
        self.registered(family)
    }

    fn load(&self, family_list: &str, bold: bool) -> Option<Arc<LoadedFont>> {
        let families = font_family_candidates(family_list);
        for family in &families {
            if let Some(font) = self.find_registered(family, bold) {
                return Some(font);
            }
        }
        if !self.system_fonts {
            return None;
        }
        for (idx, family) in families.iter().enumerate() {
            if let Some(font) = load_system_font(family, bold) {
                if idx > 0 {
                    log::warn!(
                        "font family '{}' unavailable, substituting '{}'",
                        family_list,
                        font.name
                    );
                }
                return Some(font);
            }
        }
        None
    }
}

impl TextMeasurer for FontRegistry {
    fn resolve_font(&self, family: &str, weight: FontWeight) -> Option<FontRef> {
        let bold = weight.is_bold();
        let key = format!(
            "{}|{}",
            normalize_name(family),
            if bold { "bold" } else { "regular" }
        );
        if let Ok(resolved) = self.resolved.lock() {
            if let Some(entry) = resolved.get(&key) {
                return entry.as_ref().map(|_| FontRef::new(key.as_str()));
            }
        }
        let loaded = self.load(family, bold);
        let found = loaded.is_some();
        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.insert(key.clone(), loaded);
        }
        found.then(|| FontRef::new(key))
    }

    fn text_width(&self, font: &FontRef, size: f32, text: &str, letter_spacing: f32) -> f32 {
        if text.is_empty() || size <= 0.0 {
            return 0.0;
        }
        let cache_key = TextWidthKey {
            font: font.key.clone(),
            size_bits: size.to_bits(),
            spacing_bits: letter_spacing.to_bits(),
            text: text.to_string(),
        };
        if let Ok(cache) = self.text_width_cache.lock() {
            if let Some(value) = cache.get(&cache_key) {
                return value;
            }
        }
        let value = match self.loaded(font) {
            Some(loaded) => shape_run(&loaded.data, text, size, letter_spacing).advance,
            None => {
                let count = text.chars().count() as f32;
                count * (size * 0.6).max(1.0) + count * letter_spacing
            }
        };
        if let Ok(mut cache) = self.text_width_cache.lock() {
            cache.insert(cache_key, value);
        }
        value
    }

    fn vertical_metrics(&self, font: &FontRef, size: f32) -> VerticalMetrics {
        match self.loaded(font) {
            Some(loaded) => VerticalMetrics {
                ascent: loaded.ascender / loaded.units_per_em * size,
                descent: -loaded.descender / loaded.units_per_em * size,
            },
            None => VerticalMetrics {
                ascent: size * 0.8,
                descent: size * 0.2,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ShapedGlyph {
    pub(crate) glyph_id: u16,
    pub(crate) x: f32,
    pub(crate) y: f32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ShapedRun {
    pub(crate) glyphs: Vec<ShapedGlyph>,
    pub(crate) advance: f32,
}

/// Shapes `text` into pen positions relative to the run origin (y grows downward).
pub(crate) fn shape_run(font_data: &[u8], text: &str, size: f32, letter_spacing: f32) -> ShapedRun {
    let Some(face) = HbFace::from_slice(font_data, 0) else {
        return shape_run_unshaped(font_data, text, size, letter_spacing);
    };
    let units = face.units_per_em().max(1) as f32;
    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(detect_direction(text));
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let infos = output.glyph_infos();
    let positions = output.glyph_positions();
    if infos.is_empty() || infos.len() != positions.len() {
        return shape_run_unshaped(font_data, text, size, letter_spacing);
    }

    let mut glyphs = Vec::with_capacity(infos.len());
    let mut pen_x = 0.0f32;
    for (info, pos) in infos.iter().zip(positions.iter()) {
        let gid = info.glyph_id as u16;
        if gid != 0 {
            glyphs.push(ShapedGlyph {
                glyph_id: gid,
                x: pen_x + pos.x_offset as f32 / units * size,
                y: -(pos.y_offset as f32 / units * size),
            });
        }
        pen_x += pos.x_advance as f32 / units * size + letter_spacing;
    }
    ShapedRun {
        glyphs,
        advance: pen_x.max(0.0),
    }
}

fn shape_run_unshaped(font_data: &[u8], text: &str, size: f32, letter_spacing: f32) -> ShapedRun {
    let Ok(face) = ttf_parser::Face::parse(font_data, 0) else {
        return ShapedRun::default();
    };
    let units = face.units_per_em().max(1) as f32;
    let mut glyphs = Vec::new();
    let mut pen_x = 0.0f32;
    for ch in text.chars() {
        let gid = face.glyph_index(ch).map(|id| id.0).unwrap_or(0);
        let mut adv = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0) as f32 / units * size;
        if adv <= 0.0 {
            adv = size * 0.5;
        }
        if gid != 0 {
            glyphs.push(ShapedGlyph {
                glyph_id: gid,
                x: pen_x,
                y: 0.0,
            });
        }
        pen_x += adv + letter_spacing;
    }
    ShapedRun {
        glyphs,
        advance: pen_x.max(0.0),
    }
}

fn detect_direction(text: &str) -> HbDirection {
    for ch in text.chars() {
        let code = ch as u32;
        let rtl = matches!(
            code,
            0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF | 0x1EE00..=0x1EEFF
        );
        if rtl {
            return HbDirection::RightToLeft;
        }
    }
    HbDirection::LeftToRight
}

fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;

    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => {
                if family.is_none() {
                    family = Some(name);
                }
            }
            name_id::FULL_NAME => {
                if full.is_none() {
                    full = Some(name);
                }
            }
            name_id::POST_SCRIPT_NAME => {
                if post.is_none() {
                    post = Some(name);
                }
            }
            _ => {}
        }
    }

    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string());
    let primary = full
        .clone()
        .or_else(|| post.clone())
        .or_else(|| family.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());

    // A bold face registers its family under "<family> bold" so weight lookups find it.
    let bold = face.is_bold() || face.weight().to_number() >= 600;
    let mut aliases = Vec::new();
    if let (true, Some(family)) = (bold, family.as_ref()) {
        aliases.push(format!("{family} bold"));
    }
    for candidate in [post, family.filter(|_| !bold), stem].into_iter().flatten() {
        if candidate != primary {
            aliases.push(candidate);
        }
    }
    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

/// Families from a CSS list, always ending with `sans-serif`.
fn font_family_candidates(font_name: &str) -> Vec<String> {
    let mut out = Vec::new();
    for part in font_name.split(',') {
        let family = part.trim().trim_matches('"').trim_matches('\'').trim();
        if !family.is_empty() {
            out.push(family.to_string());
        }
    }
    if !out.iter().any(|v| normalize_name(v) == "sans-serif") {
        out.push("sans-serif".to_string());
    }
    out
}

static SYSTEM_FONT_CACHE: OnceLock<Mutex<HashMap<String, Option<Arc<LoadedFont>>>>> =
    OnceLock::new();
static SYSTEM_FONT_INDEX: OnceLock<HashMap<String, PathBuf>> = OnceLock::new();

fn load_system_font(family: &str, bold: bool) -> Option<Arc<LoadedFont>> {
    let key = format!("{}|{}", normalize_name(family), bold);
    let cache = SYSTEM_FONT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Ok(guard) = cache.lock() {
        if let Some(entry) = guard.get(&key) {
            return entry.clone();
        }
    }

    let index = SYSTEM_FONT_INDEX.get_or_init(build_system_font_index);
    let mut loaded = None;
    for file_name in system_font_file_candidates(family, bold) {
        let Some(path) = index.get(&file_name.to_ascii_lowercase()) else {
            continue;
        };
        let Ok(bytes) = fs::read(path) else {
            continue;
        };
        let name = path
            .file_stem()
            .and_then(|v| v.to_str())
            .unwrap_or(family)
            .to_string();
        if let Some(font) = LoadedFont::parse(name, bytes) {
            loaded = Some(Arc::new(font));
            break;
        }
    }

    if let Ok(mut guard) = cache.lock() {
        guard.insert(key, loaded.clone());
    }
    loaded
}

// Lower-cased file name -> first path found, walking each font dir a few levels deep.
fn build_system_font_index() -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();
    for dir in system_font_dirs() {
        index_font_dir(&dir, 0, &mut index);
    }
    log::debug!("indexed {} system font files", index.len());
    index
}

fn index_font_dir(dir: &Path, depth: usize, index: &mut HashMap<String, PathBuf>) {
    const MAX_DEPTH: usize = 4;
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            if depth < MAX_DEPTH {
                index_font_dir(&path, depth + 1, index);
            }
            continue;
        }
        let Some(name) = path.file_name().and_then(|v| v.to_str()) else {
            continue;
        };
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".ttf") || lower.ends_with(".otf") {
            index.entry(lower).or_insert(path);
        }
    }
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    // Explicit directories win over anything the host ships.
    if let Ok(extra) = std::env::var("BANNERS_FONT_DIR") {
        for path in std::env::split_paths(&extra) {
            if !path.as_os_str().is_empty() {
                dirs.push(path);
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    dirs
}

const SANS_REGULAR: &[&str] = &[
    "segoeui.ttf",
    "arial.ttf",
    "NotoSans-Regular.ttf",
    "LiberationSans-Regular.ttf",
    "DejaVuSans.ttf",
];
const SANS_BOLD: &[&str] = &[
    "segoeuib.ttf",
    "arialbd.ttf",
    "NotoSans-Bold.ttf",
    "LiberationSans-Bold.ttf",
    "DejaVuSans-Bold.ttf",
];

fn system_font_file_candidates(family: &str, bold: bool) -> Vec<String> {
    let normalized = normalize_name(family);
    let (regular, bold_files): (&[&str], &[&str]) = match normalized.as_str() {
        "sans-serif" | "system-ui" | "ui-sans-serif" => (SANS_REGULAR, SANS_BOLD),
        "arial" | "helvetica" | "helvetica neue" => (
            &["arial.ttf", "Arial.ttf", "LiberationSans-Regular.ttf"],
            &["arialbd.ttf", "Arial Bold.ttf", "LiberationSans-Bold.ttf"],
        ),
        "inter" => (
            &["Inter-Regular.ttf", "Inter.ttf", "InterVariable.ttf"],
            &["Inter-Bold.ttf", "Inter-SemiBold.ttf"],
        ),
        "roboto" => (&["Roboto-Regular.ttf"], &["Roboto-Bold.ttf"]),
        "open sans" => (&["OpenSans-Regular.ttf"], &["OpenSans-Bold.ttf"]),
        "montserrat" => (&["Montserrat-Regular.ttf"], &["Montserrat-Bold.ttf"]),
        "poppins" => (&["Poppins-Regular.ttf"], &["Poppins-Bold.ttf"]),
        "lato" => (&["Lato-Regular.ttf"], &["Lato-Bold.ttf"]),
        "serif" | "times" | "times new roman" | "georgia" => (
            &["times.ttf", "LiberationSerif-Regular.ttf", "DejaVuSerif.ttf"],
            &["timesbd.ttf", "LiberationSerif-Bold.ttf", "DejaVuSerif-Bold.ttf"],
        ),
        "monospace" | "courier" | "courier new" => (
            &["cour.ttf", "LiberationMono-Regular.ttf", "DejaVuSansMono.ttf"],
            &["courbd.ttf", "LiberationMono-Bold.ttf", "DejaVuSansMono-Bold.ttf"],
        ),
        _ => {
            // Guess file names from the family itself ("Open Sans" -> "OpenSans-Bold.ttf").
            let compact: String = family.chars().filter(|c| !c.is_whitespace()).collect();
            let regular = [format!("{compact}-Regular.ttf"), format!("{compact}.ttf")];
            let bolds = [format!("{compact}-Bold.ttf"), format!("{compact}Bold.ttf")];
            let (first, second) = if bold {
                (bolds, regular)
            } else {
                (regular, bolds)
            };
            return first.into_iter().chain(second).collect();
        }
    };
    let (first, second) = if bold {
        (bold_files, regular)
    } else {
        (regular, bold_files)
    };
    first
        .iter()
        .chain(second.iter())
        .map(|v| (*v).to_string())
        .collect()
}
