//! Tesseract-backed [`TextDetector`]. Compiled with the `ocr-tesseract` feature.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageOutputFormat, RgbImage};

use super::detection::{lines_from_tsv, DetectionError, DetectionOptions, RecognitionLevel, TextDetector};
use super::types::RawDetection;

const DEFAULT_LANGUAGE: &str = "eng";

pub struct TesseractDetector {
    tessdata_dir: Option<PathBuf>,
}

impl TesseractDetector {
    /// Use the system tessdata location.
    pub fn new() -> Self {
        Self { tessdata_dir: None }
    }

    pub fn with_tessdata_dir(dir: &Path) -> Result<Self, DetectionError> {
        if !dir.is_dir() {
            return Err(DetectionError::Init(format!(
                "tessdata directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self {
            tessdata_dir: Some(dir.to_path_buf()),
        })
    }
}

impl Default for TesseractDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDetector for TesseractDetector {
    fn detect(
        &self,
        image: &RgbImage,
        options: &DetectionOptions,
    ) -> Result<Vec<RawDetection>, DetectionError> {
        let lang = tesseract_languages(&options.languages);
        let datapath = match &self.tessdata_dir {
            Some(dir) => Some(
                dir.to_str()
                    .ok_or_else(|| DetectionError::Init("Invalid tessdata path".into()))?,
            ),
            None => None,
        };

        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut png, ImageOutputFormat::Png)
            .map_err(|e| DetectionError::Engine(format!("PNG encoding failed: {e}")))?;

        let mut tess = tesseract::Tesseract::new(datapath, Some(lang.as_str()))
            .map_err(|e| DetectionError::Init(format!("{e:?}")))?;

        if options.level == RecognitionLevel::Fast {
            tess = tess
                .set_variable("tessedit_do_invert", "0")
                .map_err(|e| DetectionError::Init(format!("{e:?}")))?;
        }

        let mut tess = tess
            .set_image_from_mem(png.get_ref())
            .map_err(|e| DetectionError::Engine(format!("{e:?}")))?;

        let tsv = tess
            .get_tsv_text(0)
            .map_err(|e| DetectionError::Engine(format!("{e:?}")))?;

        let lines = lines_from_tsv(&tsv, image.width(), image.height());
        tracing::debug!(lang = %lang, level = %options.level, lines = lines.len(), "Tesseract detection done");
        Ok(lines)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Map BCP-47 tags to Tesseract traineddata names joined with `+`.
/// Unknown three-letter codes pass through; an empty list means English.
pub fn tesseract_languages(tags: &[String]) -> String {
    let mut codes: Vec<&str> = Vec::new();
    for tag in tags {
        let code = tesseract_code(tag);
        if let Some(code) = code {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
    }
    if codes.is_empty() {
        DEFAULT_LANGUAGE.to_string()
    } else {
        codes.join("+")
    }
}

fn tesseract_code(tag: &str) -> Option<&str> {
    let lower = tag.to_ascii_lowercase();
    let code = match lower.as_str() {
        t if t.starts_with("zh-hant") || t == "zh-tw" || t == "zh-hk" => "chi_tra",
        t if t.starts_with("zh") => "chi_sim",
        t => match t.split(['-', '_']).next().unwrap_or_default() {
            "en" => "eng",
            "fr" => "fra",
            "de" => "deu",
            "es" => "spa",
            "it" => "ita",
            "pt" => "por",
            "ru" => "rus",
            "uk" => "ukr",
            "ja" => "jpn",
            "ko" => "kor",
            _ if tag.len() == 3 && tag.chars().all(|c| c.is_ascii_lowercase()) => return Some(tag),
            _ => return None,
        },
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_languages_default_to_english() {
        assert_eq!(tesseract_languages(&[]), "eng");
    }

    #[test]
    fn bcp47_tags_are_mapped_and_deduplicated() {
        assert_eq!(
            tesseract_languages(&tags(&["en-US", "en-GB", "ru-RU", "zh-Hant", "zh-Hans"])),
            "eng+rus+chi_tra+chi_sim"
        );
    }

    #[test]
    fn native_codes_pass_through() {
        assert_eq!(tesseract_languages(&tags(&["fra", "xx-YY"])), "fra");
    }

    #[test]
    fn missing_tessdata_dir_is_init_error() {
        let err = TesseractDetector::with_tessdata_dir(Path::new("/nonexistent/tessdata"))
            .err()
            .unwrap();
        assert!(matches!(err, DetectionError::Init(_)));
    }
}
