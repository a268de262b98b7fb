use anyhow::Context;
use plotters::style::{register_font, FontStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// File names of regular and bold faces, in order of preference.
const CANDIDATES: &[(&str, &str)] = &[
    ("DejaVuSans.ttf", "DejaVuSans-Bold.ttf"),
    ("LiberationSans-Regular.ttf", "LiberationSans-Bold.ttf"),
    ("Arial.ttf", "Arial Bold.ttf"),
    ("arial.ttf", "arialbd.ttf"),
    ("NotoSans-Regular.ttf", "NotoSans-Bold.ttf"),
    ("FreeSans.ttf", "FreeSansBold.ttf"),
    ("Roboto-Regular.ttf", "Roboto-Bold.ttf"),
];

static DISCOVERED: OnceLock<bool> = OnceLock::new();

/// A regular face and, if one was found next to it, a bold face.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FontPair {
    pub regular: PathBuf,
    pub bold: Option<PathBuf>,
}

/// Register the sans-serif font used for chart text.
///
/// An explicit font must load and replaces any font registered before it. Otherwise the platform
/// font directories are searched once per process and `false` is returned when nothing usable is
/// found.
pub(crate) fn register_fonts(explicit: Option<&Path>) -> anyhow::Result<bool> {
    match explicit {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("Font file {} not found", path.display());
            }
            register_pair(&FontPair {
                regular: path.to_path_buf(),
                bold: None,
            })?;
            Ok(true)
        }
        None => Ok(*DISCOVERED.get_or_init(register_discovered)),
    }
}

fn register_discovered() -> bool {
    match discover_fonts() {
        Some(pair) => {
            log::debug!("Using font {pair:?}");
            match register_pair(&pair) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Rendering charts without text: {e:#}");
                    false
                }
            }
        }
        None => {
            log::warn!(
                "No usable font found, rendering charts without text. Pass --font to pick one."
            );
            false
        }
    }
}

fn register_pair(pair: &FontPair) -> anyhow::Result<()> {
    let regular = read_font(&pair.regular)?;
    let bold = match &pair.bold {
        Some(path) => read_font(path)?,
        None => regular,
    };

    register_font("sans-serif", FontStyle::Normal, regular)
        .map_err(|_| anyhow::anyhow!("Invalid font file {}", pair.regular.display()))?;
    register_font("sans-serif", FontStyle::Bold, bold)
        .map_err(|_| anyhow::anyhow!("Invalid bold font file for {}", pair.regular.display()))?;

    Ok(())
}

/// Fonts live for the rest of the process once registered.
fn read_font(path: &Path) -> anyhow::Result<&'static [u8]> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;

    Ok(Box::leak(bytes.into_boxed_slice()))
}

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from(r"C:\Windows\Fonts"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join(".fonts"));
        dirs.push(home.join("Library/Fonts"));
    }

    dirs
}

fn discover_fonts() -> Option<FontPair> {
    let found = font_dirs()
        .into_iter()
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| {
            walkdir::WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
        })
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            Some((name, path))
        })
        .fold(HashMap::new(), |mut found, (name, path)| {
            found.entry(name).or_insert(path);
            found
        });

    log::debug!("Found {} font files", found.len());

    pick_font(&found)
}

/// Choose the most preferred candidate present in `found`, keyed by file name.
pub(crate) fn pick_font(found: &HashMap<String, PathBuf>) -> Option<FontPair> {
    CANDIDATES.iter().find_map(|(regular, bold)| {
        Some(FontPair {
            regular: found.get(*regular)?.clone(),
            bold: found.get(*bold).cloned(),
        })
    })
}

/// Small TrueType font shipped with the test data.
#[cfg(test)]
pub(crate) fn test_font() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join("fonts")
        .join("demo.ttf")
}
