use factory_preprocess::{gray_blurred, Preprocessor, Scale};
use image::{Rgb, RgbImage};

#[test]
fn cpu_smoke() {
    // Fake white 640×480 crop
    let img = RgbImage::from_pixel(640, 480, Rgb([255, 255, 255]));

    let pp = Preprocessor::new(224, 224, Scale::Unit);
    let out = pp.run(&img).unwrap();
    assert_eq!(out.shape(), &[1, 3, 224, 224]);
    assert!(out.iter().all(|v| *v > 0.99 && *v <= 1.0));
}

#[test]
fn empty_crop_is_an_error() {
    let pp = Preprocessor::new(224, 224, Scale::Raw);
    assert!(pp.run(&RgbImage::new(0, 0)).is_err());
}

#[test]
fn blur_keeps_dimensions() {
    let img = RgbImage::from_pixel(32, 16, Rgb([90, 90, 90]));
    let gray = gray_blurred(&img, 1.5);
    assert_eq!(gray.dimensions(), (32, 16));
    let centre = gray.get_pixel(16, 8)[0] as i32;
    assert!((centre - 90).abs() <= 1);
}
