use eframe::egui;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Rgb, RgbImage, RgbaImage};

/// Fill color of the placeholder shown when no background could be loaded.
pub const PLACEHOLDER_RGB: [u8; 3] = [0x33, 0x33, 0x33];

/// Resize `source` to `size` and use `mask` as its alpha channel.
///
/// The output depends only on the source pixels, the target size and the
/// mask pixels. A mask of a different size is resampled to `size` first.
pub fn composite(source: &DynamicImage, size: (u32, u32), mask: &GrayImage) -> RgbaImage {
    let (width, height) = size;
    let rgb = source.to_rgb8();
    let resized = if rgb.dimensions() == size {
        rgb
    } else {
        image::imageops::resize(&rgb, width, height, FilterType::Lanczos3)
    };
    apply_mask(&resized, mask)
}

/// Solid placeholder cut out by the same mask as a real background.
pub fn placeholder(size: (u32, u32), mask: &GrayImage) -> RgbaImage {
    let fill = RgbImage::from_pixel(size.0, size.1, Rgb(PLACEHOLDER_RGB));
    apply_mask(&fill, mask)
}

fn apply_mask(rgb: &RgbImage, mask: &GrayImage) -> RgbaImage {
    let (width, height) = rgb.dimensions();
    let resized_mask;
    let mask = if mask.dimensions() == (width, height) {
        mask
    } else {
        resized_mask = image::imageops::resize(mask, width, height, FilterType::Lanczos3);
        &resized_mask
    };
    RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let [a] = mask.get_pixel(x, y).0;
        image::Rgba([r, g, b, a])
    })
}

pub fn to_color_image(image: &RgbaImage) -> egui::ColorImage {
    let size = [image.width() as usize, image.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw())
}
