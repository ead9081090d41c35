use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use eframe::egui;
use shared::protocol::strip_png_data_uri;

/// Decodes a `data:image/png;base64,...` source into pixels.
pub fn decode_data_uri(src: &str) -> Result<egui::ColorImage> {
    let b64 = strip_png_data_uri(src).context("image source is not a png data uri")?;
    let bytes = STANDARD.decode(b64).context("invalid base64 image payload")?;
    let rgba = image::load_from_memory(&bytes)
        .context("unable to decode result image")?
        .to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

/// Textures for the result images, keyed by their data-URI source.
#[derive(Default)]
pub struct TextureCache {
    entries: HashMap<String, Option<egui::TextureHandle>>,
    loaded: u64,
}

impl TextureCache {
    /// Returns the texture for `src`, decoding it on first use. Sources that
    /// fail to decode are remembered and yield `None`.
    pub fn get_or_load(&mut self, ctx: &egui::Context, src: &str) -> Option<egui::TextureHandle> {
        if let Some(entry) = self.entries.get(src) {
            return entry.clone();
        }
        let texture = match decode_data_uri(src) {
            Ok(color_image) => {
                self.loaded += 1;
                Some(ctx.load_texture(
                    format!("result_image_{}", self.loaded),
                    color_image,
                    egui::TextureOptions::LINEAR,
                ))
            }
            Err(err) => {
                tracing::warn!("failed to load result image: {err:#}");
                None
            }
        };
        self.entries.insert(src.to_string(), texture.clone());
        texture
    }

    /// Drops textures whose source is no longer rendered anywhere.
    pub fn retain_sources(&mut self, live: &HashSet<&str>) {
        self.entries.retain(|src, _| live.contains(src.as_str()));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use shared::protocol::png_data_uri;
    use std::io::Cursor;

    fn png_uri(width: u32, height: u32) -> String {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png");
        png_data_uri(&STANDARD.encode(buf))
    }

    #[test]
    fn decodes_png_data_uri() {
        let image = decode_data_uri(&png_uri(7, 3)).expect("decode");
        assert_eq!(image.size, [7, 3]);
    }

    #[test]
    fn rejects_other_sources() {
        assert!(decode_data_uri("https://example.invalid/a.png").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
        assert!(decode_data_uri(&png_data_uri(&STANDARD.encode(b"not a png"))).is_err());
    }

    #[test]
    fn caches_and_prunes_by_source() {
        let ctx = egui::Context::default();
        let mut cache = TextureCache::default();
        let a = png_uri(2, 2);
        let b = png_uri(4, 4);

        assert!(cache.get_or_load(&ctx, &a).is_some());
        assert!(cache.get_or_load(&ctx, &a).is_some());
        assert!(cache.get_or_load(&ctx, "bogus").is_none());
        assert!(cache.get_or_load(&ctx, &b).is_some());
        assert_eq!(cache.len(), 3);

        let live: HashSet<&str> = [b.as_str()].into_iter().collect();
        cache.retain_sources(&live);
        assert_eq!(cache.len(), 1);
    }
}
