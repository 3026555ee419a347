//! Font discovery for the local renderer.
//!
//! `genpdf` embeds TrueType fonts, so rendering needs a font family on disk.
//! Directories are searched in this order:
//!
//! 1. `TOC_COMPOSER_FONTS_DIR`
//! 2. `assets/fonts` next to the running executable
//! 3. `assets/fonts` inside the crate
//!
//! When none of them holds the Liberation Sans files, the Windows Arial family
//! is tried from `TOC_COMPOSER_WINDOWS_FONTS_DIR` or `%WINDIR%\Fonts`.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{self, FontData, FontFamily};
use log::{debug, warn};

/// Environment variable overriding the bundled font directory.
pub const FONTS_DIR_ENV: &str = "TOC_COMPOSER_FONTS_DIR";

/// Environment variable overriding the Windows fallback directory.
pub const WINDOWS_FONTS_DIR_ENV: &str = "TOC_COMPOSER_WINDOWS_FONTS_DIR";

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "LiberationSans";

const FONT_STYLES: &[&str] = &["Regular", "Bold", "Italic", "BoldItalic"];

struct FallbackFamily {
    name: &'static str,
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

const WINDOWS_FALLBACK: FallbackFamily = FallbackFamily {
    name: "Arial",
    regular: "arial.ttf",
    bold: "arialbd.ttf",
    italic: "ariali.ttf",
    bold_italic: "arialbi.ttf",
};

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

fn search_directories() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    let mut push = |candidate: PathBuf| {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    };

    if let Some(path) = env_path(FONTS_DIR_ENV) {
        push(path);
    }

    if let Some(bin_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        push(bin_dir.join("assets/fonts"));
    }

    push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts"));

    candidates
}

fn missing_files(directory: &Path) -> Vec<String> {
    FONT_STYLES
        .iter()
        .map(|style| format!("{DEFAULT_FONT_FAMILY_NAME}-{style}.ttf"))
        .filter(|name| !directory.join(name).is_file())
        .collect()
}

fn locate_bundled_directory() -> Result<PathBuf, Error> {
    let mut attempts = Vec::new();

    for candidate in search_directories() {
        if !candidate.is_dir() {
            attempts.push(format!("{} (directory missing)", candidate.display()));
            continue;
        }

        let missing = missing_files(&candidate);
        if missing.is_empty() {
            debug!("using fonts from {}", candidate.display());
            return Ok(candidate);
        }
        attempts.push(format!(
            "{} (missing files [{}])",
            candidate.display(),
            missing.join(", ")
        ));
    }

    let summary = if attempts.is_empty() {
        "no search paths were available".to_owned()
    } else {
        attempts.join(", ")
    };

    Err(Error::new(
        format!("Unable to locate font directory. Checked: {summary}. Set {FONTS_DIR_ENV} to a directory containing the {DEFAULT_FONT_FAMILY_NAME} files."),
        io::Error::new(io::ErrorKind::NotFound, "font directory not found"),
    ))
}

fn load_bundled_family() -> Result<FontFamily<FontData>, Error> {
    let directory = locate_bundled_directory()?;

    fonts::from_files(&directory, DEFAULT_FONT_FAMILY_NAME, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load font family '{}' from {}: {}",
                DEFAULT_FONT_FAMILY_NAME,
                directory.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

fn windows_font_directory() -> Option<PathBuf> {
    if let Some(path) = env_path(WINDOWS_FONTS_DIR_ENV) {
        return Some(path);
    }

    ["WINDIR", "SystemRoot"]
        .into_iter()
        .filter_map(env_path)
        .map(|root| root.join("Fonts"))
        .find(|candidate| candidate.is_dir())
}

fn load_fallback_file(directory: &Path, file: &str) -> Result<FontData, Error> {
    let path = directory.join(file);
    FontData::load(&path, None).map_err(|err| {
        let kind = if path.is_file() {
            io::ErrorKind::Other
        } else {
            io::ErrorKind::NotFound
        };
        Error::new(
            format!("Failed to load fallback font {}: {}", path.display(), err),
            io::Error::new(kind, err.to_string()),
        )
    })
}

fn load_fallback_family(family: &FallbackFamily) -> Result<FontFamily<FontData>, Error> {
    let directory = windows_font_directory().ok_or_else(|| {
        Error::new(
            "Windows font directory not found for fallback",
            io::Error::new(io::ErrorKind::NotFound, "windows fonts directory not found"),
        )
    })?;

    Ok(FontFamily {
        regular: load_fallback_file(&directory, family.regular)?,
        bold: load_fallback_file(&directory, family.bold)?,
        italic: load_fallback_file(&directory, family.italic)?,
        bold_italic: load_fallback_file(&directory, family.bold_italic)?,
    })
}

fn is_not_found(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

/// Loads the default font family, falling back to Windows Arial when the
/// Liberation Sans files cannot be found.
pub fn default_font_family() -> Result<FontFamily<FontData>, Error> {
    match load_bundled_family() {
        Ok(family) => Ok(family),
        Err(err) if is_not_found(&err) => match load_fallback_family(&WINDOWS_FALLBACK) {
            Ok(fallback) => {
                warn!(
                    "Fonts unavailable ({}); falling back to '{}'.",
                    err, WINDOWS_FALLBACK.name
                );
                Ok(fallback)
            }
            Err(fallback_err) => {
                warn!("Fonts unavailable ({err}); fallback failed: {fallback_err}");
                Err(Error::new(
                    format!("Fonts unavailable and fallback failed: {fallback_err}"),
                    io::Error::new(io::ErrorKind::NotFound, "default fonts are not available"),
                ))
            }
        },
        Err(err) => Err(err),
    }
}

/// Indicates whether a usable font family can be found without loading it.
pub fn default_fonts_available() -> bool {
    locate_bundled_directory().is_ok()
        || windows_font_directory()
            .map(|directory| directory.join(WINDOWS_FALLBACK.regular).is_file())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::missing_files;

    #[test]
    fn reports_every_missing_style() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(directory.path().join("LiberationSans-Bold.ttf"), b"").unwrap();

        let missing = missing_files(directory.path());
        assert_eq!(
            missing,
            [
                "LiberationSans-Regular.ttf",
                "LiberationSans-Italic.ttf",
                "LiberationSans-BoldItalic.ttf"
            ]
        );
    }
}
