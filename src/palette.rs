//! Color palette: an ordered list of stops baked into a small 1D lookup
//! texture that maps velocity magnitude to a display color.

use anyhow::{bail, Context, Result};

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0x00, 0x00, 0x00]),
    ("white", [0xFF, 0xFF, 0xFF]),
    ("red", [0xFF, 0x00, 0x00]),
    ("green", [0x00, 0x80, 0x00]),
    ("blue", [0x00, 0x00, 0xFF]),
    ("cyan", [0x00, 0xFF, 0xFF]),
    ("magenta", [0xFF, 0x00, 0xFF]),
    ("yellow", [0xFF, 0xFF, 0x00]),
    ("orange", [0xFF, 0xA5, 0x00]),
    ("purple", [0x80, 0x00, 0x80]),
];

/// Parse `#rgb`, `#rrggbb` or a known color name into RGB bytes.
pub fn parse_color(value: &str) -> Result<[u8; 3]> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        let digit = |c: char| {
            c.to_digit(16)
                .with_context(|| format!("invalid hex digit {c:?} in color {value:?}"))
        };
        let chars: Vec<char> = hex.chars().collect();
        return match chars.len() {
            3 => {
                let mut rgb = [0u8; 3];
                for (i, c) in chars.iter().enumerate() {
                    let d = digit(*c)? as u8;
                    rgb[i] = d << 4 | d;
                }
                Ok(rgb)
            }
            6 => {
                let mut rgb = [0u8; 3];
                for i in 0..3 {
                    rgb[i] = (digit(chars[i * 2])? * 16 + digit(chars[i * 2 + 1])?) as u8;
                }
                Ok(rgb)
            }
            n => bail!("color {value:?} has {n} hex digits, expected 3 or 6"),
        };
    }
    let lower = value.to_ascii_lowercase();
    for (name, rgb) in NAMED_COLORS {
        if *name == lower {
            return Ok(*rgb);
        }
    }
    bail!("unknown color {value:?}")
}

/// Gradient stops resolved to bytes, ready for texture upload. Immutable
/// after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    stops: Vec<[u8; 3]>,
}

impl Palette {
    /// A single stop is duplicated so the texture is always a valid
    /// 2-sample gradient.
    pub fn new(colors: &[String]) -> Result<Self> {
        if colors.is_empty() {
            bail!("palette needs at least one color");
        }
        let mut stops: Vec<[u8; 3]> = colors
            .iter()
            .map(|c| parse_color(c))
            .collect::<Result<_>>()?;
        if stops.len() == 1 {
            stops.push(stops[0]);
        }
        Ok(Self { stops })
    }

    pub fn stops(&self) -> &[[u8; 3]] {
        &self.stops
    }

    /// RGBA8 texel data, one texel per stop.
    pub fn texel_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.stops.len() * 4);
        for rgb in &self.stops {
            data.extend_from_slice(rgb);
            data.push(0xFF);
        }
        data
    }

    /// Upload the gradient as an Nx1 linear-filtered texture.
    pub fn create_texture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let width = self.stops.len() as u32;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Palette"),
            size: wgpu::Extent3d {
                width,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.texel_data(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(parse_color("#5227FF").unwrap(), [0x52, 0x27, 0xFF]);
        assert_eq!(parse_color("#f0a").unwrap(), [0xFF, 0x00, 0xAA]);
    }

    #[test]
    fn parses_named_colors() {
        assert_eq!(parse_color("white").unwrap(), [0xFF, 0xFF, 0xFF]);
        assert_eq!(parse_color("Orange").unwrap(), [0xFF, 0xA5, 0x00]);
    }

    #[test]
    fn rejects_malformed_colors() {
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#xyzxyz").is_err());
        assert!(parse_color("chartreuse-ish").is_err());
    }

    #[test]
    fn single_color_becomes_two_sample_gradient() {
        let palette = Palette::new(&["#ff0000".to_string()]).unwrap();
        assert_eq!(palette.stops(), &[[0xFF, 0, 0], [0xFF, 0, 0]]);
        assert_eq!(palette.texel_data(), vec![0xFF, 0, 0, 0xFF, 0xFF, 0, 0, 0xFF]);
    }

    #[test]
    fn empty_palette_is_an_error() {
        assert!(Palette::new(&[]).is_err());
    }

    #[test]
    fn duplicate_stops_are_valid() {
        let c = "#B19EEF".to_string();
        let palette = Palette::new(&[c.clone(), c]).unwrap();
        assert_eq!(palette.stops().len(), 2);
        assert_eq!(palette.stops()[0], palette.stops()[1]);
    }
}
