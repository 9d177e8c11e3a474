//! Rendering properties checked through the public renderer API.

use super::test_support::{black_text, gradient, solid};
use image::{ColorType, DynamicImage, Rgba};
use photomark::watermark::{
    Anchor, Color, Offset, Renderer, Shadow, Stroke, SystemFontResolver, WatermarkError,
    WatermarkSpec,
};
use rstest::rstest;
use std::sync::Arc;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[test]
fn test_black_x_on_white_square() {
    let source = solid(100, 100, [255, 255, 255, 255]);
    let result = Renderer::default()
        .render(&source, &black_text("X", 20.0))
        .unwrap()
        .to_rgba8();

    assert_eq!(result.dimensions(), (100, 100));
    assert_eq!(*result.get_pixel(0, 0), WHITE);
    assert_eq!(*result.get_pixel(99, 99), WHITE);

    let marked = (30..70).any(|y| (30..70).any(|x| *result.get_pixel(x, y) != WHITE));
    assert!(marked, "expected a non-white pixel in the central 40x40 region");
}

#[test]
fn test_empty_text_is_identity() {
    let source = gradient(37, 23);
    let spec = WatermarkSpec {
        text: String::new(),
        rotation_degrees: 45.0,
        shadow: Some(Shadow {
            offset_x: 4.0,
            offset_y: 4.0,
            color: Color::black(),
            blur_radius: 3.0,
        }),
        ..WatermarkSpec::default()
    };
    let result = Renderer::default().render(&source, &spec).unwrap();
    assert_eq!(result.to_rgba8(), source.to_rgba8());
}

#[test]
fn test_opacity_is_monotonic() {
    let renderer = Renderer::default();
    let source = solid(120, 60, [255, 255, 255, 255]);

    let darkness: Vec<Vec<u8>> = [0.0, 0.25, 0.5, 0.75, 1.0]
        .iter()
        .map(|&opacity| {
            let spec = WatermarkSpec {
                opacity,
                ..black_text("Mono", 28.0)
            };
            renderer
                .render(&source, &spec)
                .unwrap()
                .to_rgba8()
                .pixels()
                .map(|p| 255 - p[0])
                .collect()
        })
        .collect();

    assert!(darkness[0].iter().all(|&d| d == 0), "opacity 0 must leave the image untouched");
    for pair in darkness.windows(2) {
        assert!(pair[0].iter().zip(&pair[1]).all(|(lo, hi)| lo <= hi));
    }
    assert!(darkness[4].iter().map(|&d| d as u64).sum::<u64>() > 0);
}

#[rstest]
fn test_only_layer_region_changes(
    #[values(
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::MiddleLeft,
        Anchor::Center,
        Anchor::MiddleRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
        Anchor::FreeOffset
    )]
    anchor: Anchor,
    #[values(0.0, 90.0, 217.5)] rotation: f32,
) {
    let source = gradient(160, 90);
    let spec = WatermarkSpec {
        text: "Region".to_string(),
        font_size_pt: 18.0,
        color: Color::rgba(255, 0, 0, 220),
        opacity: 0.9,
        rotation_degrees: rotation,
        anchor,
        offset: Offset::new(12.0, 7.0),
        shadow: Some(Shadow {
            offset_x: 3.0,
            offset_y: -2.0,
            color: Color::rgba(0, 0, 0, 180),
            blur_radius: 1.5,
        }),
        stroke: Some(Stroke {
            width: 1.0,
            color: Color::white(),
        }),
        ..WatermarkSpec::default()
    };

    let renderer = Renderer::default();
    let font = renderer.resolve_font(&spec).unwrap();
    let layer = renderer.layer_for(160, 90, &spec, &font).unwrap();
    let result = renderer.render(&source, &spec).unwrap().to_rgba8();
    let original = source.to_rgba8();

    match layer.clip_to(160, 90) {
        Some(region) => {
            for (x, y, pixel) in result.enumerate_pixels() {
                if !region.contains(x, y) {
                    assert_eq!(pixel, original.get_pixel(x, y), "pixel ({}, {}) changed", x, y);
                }
            }
        }
        None => assert_eq!(result, original),
    }
}

#[test]
fn test_layer_larger_than_image_is_clipped() {
    let source = solid(40, 20, [255, 255, 255, 255]);
    let result = Renderer::default()
        .render(&source, &black_text("MMMM", 64.0))
        .unwrap();
    assert_eq!((result.width(), result.height()), (40, 20));
    assert_ne!(result.to_rgba8(), source.to_rgba8());
}

#[test]
fn test_rendering_is_deterministic() {
    let source = gradient(90, 60);
    let spec = WatermarkSpec {
        rotation_degrees: 33.0,
        bold: true,
        italic: true,
        ..black_text("Same", 22.0)
    };
    let renderer = Renderer::default();
    let first = renderer.render(&source, &spec).unwrap();
    let second = renderer.render(&source, &spec).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unknown_family_reports_font_resolution() {
    let renderer = Renderer::new(Arc::new(SystemFontResolver::new(Vec::new())));
    let spec = WatermarkSpec {
        font_family: Some("Definitely Not Installed".to_string()),
        ..black_text("F", 20.0)
    };

    let err = renderer
        .render(&solid(30, 30, [255, 255, 255, 255]), &spec)
        .unwrap_err();
    assert!(err.is_font_resolution());

    // Without a family the resolver falls back to the embedded face.
    let plain = black_text("F", 20.0);
    assert!(renderer.render(&solid(30, 30, [255, 255, 255, 255]), &plain).is_ok());
}

fn convert(source: &DynamicImage, color: ColorType) -> DynamicImage {
    match color {
        ColorType::L8 => DynamicImage::ImageLuma8(source.to_luma8()),
        ColorType::La16 => DynamicImage::ImageLumaA16(source.to_luma_alpha16()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(source.to_rgb8()),
        ColorType::Rgb16 => DynamicImage::ImageRgb16(source.to_rgb16()),
        ColorType::Rgba16 => DynamicImage::ImageRgba16(source.to_rgba16()),
        ColorType::Rgb32F => DynamicImage::ImageRgb32F(source.to_rgb32f()),
        other => panic!("no fixture for {:?}", other),
    }
}

#[rstest]
#[case::gray(ColorType::L8)]
#[case::gray_alpha_16(ColorType::La16)]
#[case::rgb(ColorType::Rgb8)]
#[case::rgb_16(ColorType::Rgb16)]
#[case::rgba_16(ColorType::Rgba16)]
#[case::rgb_float(ColorType::Rgb32F)]
fn test_pixel_format_is_preserved_outside_layer(#[case] color: ColorType) {
    let source = convert(&gradient(120, 80), color);
    let spec = WatermarkSpec {
        rotation_degrees: 20.0,
        anchor: Anchor::BottomRight,
        ..black_text("Deep", 20.0)
    };

    let renderer = Renderer::default();
    let font = renderer.resolve_font(&spec).unwrap();
    let region = renderer
        .layer_for(120, 80, &spec, &font)
        .unwrap()
        .clip_to(120, 80)
        .unwrap();
    let result = renderer.render(&source, &spec).unwrap();

    assert_eq!(result.color(), color);
    assert_ne!(result, source);

    let bpp = color.bytes_per_pixel() as usize;
    let (before, after) = (source.as_bytes(), result.as_bytes());
    for y in 0..80u32 {
        for x in 0..120u32 {
            if !region.contains(x, y) {
                let at = (y as usize * 120 + x as usize) * bpp;
                assert_eq!(
                    &after[at..at + bpp],
                    &before[at..at + bpp],
                    "pixel ({}, {}) changed",
                    x,
                    y
                );
            }
        }
    }
}

#[rstest]
#[case::blur(Some(1e12), None)]
#[case::stroke(None, Some(1e12))]
#[case::both(Some(f32::MAX), Some(f32::MAX))]
fn test_extreme_effects_fail_cleanly(#[case] blur: Option<f32>, #[case] stroke: Option<f32>) {
    let spec = WatermarkSpec {
        shadow: blur.map(|blur_radius| Shadow {
            offset_x: 2.0,
            offset_y: 2.0,
            color: Color::black(),
            blur_radius,
        }),
        stroke: stroke.map(|width| Stroke {
            width,
            color: Color::white(),
        }),
        ..black_text("Big", 20.0)
    };
    assert!(spec.validate().is_ok());

    let err = Renderer::default()
        .render(&solid(64, 64, [255, 255, 255, 255]), &spec)
        .unwrap_err();
    assert!(matches!(err, WatermarkError::RenderError(_)));
}
