use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use logocluster::config::AppConfig;
use std::fs;
use std::path::Path;

pub const SVG_LOGO: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64">
    <rect width="32" height="64" fill="#000"/>
    <rect x="32" width="32" height="64" fill="#fff"/>
</svg>"##;

/// 64x64 PNG, black left of `split`, white to the right
pub fn png_logo(split: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(64, 64, |x, _| if x < split { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .expect("encode png fixture");
    bytes
}

/// Homepage declaring an icon link
pub fn homepage_with_icon(href: &str) -> String {
    format!(
        r#"<html><head><title>Home</title><link rel="icon" href="{}"></head><body>Welcome</body></html>"#,
        href
    )
}

/// Built-in configuration with both lookup services pointed at `services_uri`
/// and a short request timeout.
pub fn test_config(services_uri: &str, timeout_secs: u64) -> AppConfig {
    let mut config = AppConfig::builtin().expect("bundled config is valid");
    config.http.request_timeout_secs = timeout_secs;
    config.services.logo_api_url = format!("{}/logo/{{host}}", services_uri);
    config.services.favicon_api_url = format!("{}/icon/{{host}}.ico", services_uri);
    config
}

/// Copy the bundled config into `dir/config/logocluster.toml`
pub fn install_config(dir: &Path) {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("config").join("logocluster.toml");
    let dst = dir.join("config");
    fs::create_dir_all(&dst).expect("create config dir");
    fs::copy(src, dst.join("logocluster.toml")).expect("copy config");
}
