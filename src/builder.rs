use crate::error::{Result, StampError};
use crate::overlay::{OverlaySource, RasterFormat};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageFormat};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

/// Adds the overlay as an image XObject and returns its id.
///
/// PNG is decoded and stored as Flate RGB, with a DeviceGray soft mask when
/// any pixel is not fully opaque. JPEG is stored as-is under DCTDecode.
pub fn add_image_xobject(doc: &mut Document, overlay: &OverlaySource) -> Result<ObjectId> {
    let stream = match overlay.format() {
        RasterFormat::Png => {
            let img = decode(overlay, ImageFormat::Png)?;
            let (rgb_stream, alpha) = encode_png_stream(&img)?;
            match alpha {
                Some(mask) => {
                    let smask_id = doc.add_object(mask);
                    let mut stream = rgb_stream;
                    stream.dict.set("SMask", Object::Reference(smask_id));
                    stream
                }
                None => rgb_stream,
            }
        }
        RasterFormat::Jpeg => {
            let img = decode(overlay, ImageFormat::Jpeg)?;
            encode_jpeg_stream(overlay, &img)?
        }
    };
    Ok(doc.add_object(stream))
}

/// Graphics state carrying fill and stroke alpha.
pub fn add_opacity_state(doc: &mut Document, opacity: f64) -> ObjectId {
    let alpha = opacity.clamp(0.0, 1.0) as f32;
    doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => alpha,
        "CA" => alpha,
    })
}

fn decode(overlay: &OverlaySource, format: ImageFormat) -> Result<DynamicImage> {
    image::load_from_memory_with_format(overlay.bytes(), format)
        .map_err(|e| StampError::Embed(e.to_string()))
}

fn encode_png_stream(img: &DynamicImage) -> Result<(Stream, Option<Stream>)> {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();

    let mut rgb = Vec::with_capacity((w * h * 3) as usize);
    let mut alpha = Vec::with_capacity((w * h) as usize);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
    }

    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "FlateDecode",
        },
        deflate(&rgb)?,
    );

    let mask = if alpha.iter().any(|&a| a < u8::MAX) {
        Some(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8_i64,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        ))
    } else {
        None
    };

    Ok((image, mask))
}

fn encode_jpeg_stream(overlay: &OverlaySource, img: &DynamicImage) -> Result<Stream> {
    let header = JpegHeader::parse(overlay.bytes())
        .ok_or_else(|| StampError::Embed("JPEG sin cabecera de cuadro".into()))?;
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => img.width() as i64,
        "Height" => img.height() as i64,
        "BitsPerComponent" => 8_i64,
        "Filter" => "DCTDecode",
    };
    match header.components {
        1 => dict.set("ColorSpace", "DeviceGray"),
        3 => dict.set("ColorSpace", "DeviceRGB"),
        4 => {
            dict.set("ColorSpace", "DeviceCMYK");
            // Adobe writers store CMYK inverted.
            if header.adobe {
                let decode = [1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer);
                dict.set("Decode", decode.to_vec());
            }
        }
        n => return Err(StampError::Embed(format!("JPEG con {n} componentes de color"))),
    }
    Ok(Stream::new(dict, overlay.bytes().to_vec()))
}

/// What the DCT stream itself says about its colour layout. The decoded image
/// can't be trusted for this: CMYK and YCCK come back converted to RGB.
#[derive(Debug, PartialEq)]
struct JpegHeader {
    components: u8,
    adobe: bool,
}

impl JpegHeader {
    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.get(..2)? != [0xFF, 0xD8] {
            return None;
        }
        let mut adobe = false;
        let mut pos = 2;
        loop {
            if *bytes.get(pos)? != 0xFF {
                return None;
            }
            let marker = *bytes.get(pos + 1)?;
            pos += 2;
            match marker {
                0xFF => pos -= 1,
                0x01 | 0xD0..=0xD7 => {}
                0xDA | 0xD9 => return None,
                _ => {
                    let len = u16::from_be_bytes([*bytes.get(pos)?, *bytes.get(pos + 1)?]) as usize;
                    let segment = bytes.get(pos + 2..pos + len)?;
                    match marker {
                        0xEE if segment.starts_with(b"Adobe") => adobe = true,
                        0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                            return Some(Self {
                                components: *segment.get(5)?,
                                adobe,
                            });
                        }
                        _ => {}
                    }
                    pos += len;
                }
            }
        }
    }
}

fn deflate(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| StampError::Embed(e.to_string()))?;
    encoder.finish().map_err(|e| StampError::Embed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_source(alpha: u8) -> OverlaySource {
        let img = RgbaImage::from_pixel(6, 3, Rgba([0, 0, 255, alpha]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        OverlaySource::from_bytes(&out).unwrap()
    }

    #[test]
    fn opaque_png_has_no_mask() {
        let mut doc = Document::with_version("1.5");
        let id = add_image_xobject(&mut doc, &png_source(255)).unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert!(stream.dict.get(b"SMask").is_err());
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 6);
        assert_eq!(doc.objects.len(), 1);
    }

    #[test]
    fn translucent_png_gets_soft_mask() {
        let mut doc = Document::with_version("1.5");
        let id = add_image_xobject(&mut doc, &png_source(128)).unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        let mask_id = stream.dict.get(b"SMask").unwrap().as_reference().unwrap();
        let mask = doc.get_object(mask_id).unwrap().as_stream().unwrap();
        assert_eq!(mask.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
    }

    #[test]
    fn jpeg_is_passed_through() {
        let img = image::RgbImage::from_pixel(5, 5, image::Rgb([1, 2, 3]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg).unwrap();
        let src = OverlaySource::from_bytes(&out).unwrap();

        let mut doc = Document::with_version("1.5");
        let id = add_image_xobject(&mut doc, &src).unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, out);
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
        assert_eq!(stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceRGB");
        assert!(stream.dict.get(b"Decode").is_err());
    }

    #[test]
    fn grey_jpeg_is_device_gray() {
        let img = image::GrayImage::from_pixel(4, 4, image::Luma([90]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg).unwrap();
        let src = OverlaySource::from_bytes(&out).unwrap();

        let mut doc = Document::with_version("1.5");
        let id = add_image_xobject(&mut doc, &src).unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
    }

    #[test]
    fn cmyk_jpeg_keeps_its_colour_space() {
        let cmyk = [10u8, 200, 30, 0].repeat(16 * 16);
        let mut out = Vec::new();
        jpeg_encoder::Encoder::new(&mut out, 90)
            .encode(&cmyk, 16, 16, jpeg_encoder::ColorType::Cmyk)
            .unwrap();
        let src = OverlaySource::from_bytes(&out).unwrap();

        let mut doc = Document::with_version("1.5");
        let id = add_image_xobject(&mut doc, &src).unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceCMYK");
        let decode = stream.dict.get(b"Decode").unwrap().as_array().unwrap();
        assert_eq!(decode.len(), 8);
        assert_eq!(decode[0].as_i64().unwrap(), 1);
        assert_eq!(stream.content, out);
    }

    #[test]
    fn frame_header_is_found_past_app_segments() {
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend([0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        bytes.extend([0xFF, 0xEE, 0x00, 0x0E]);
        bytes.extend(b"Adobe\0\0\0\0\0\0\x02");
        bytes.extend([0xFF, 0xC2, 0x00, 0x14, 8, 0, 16, 0, 16, 4]);
        bytes.extend([0u8; 12]);
        assert_eq!(
            JpegHeader::parse(&bytes),
            Some(JpegHeader {
                components: 4,
                adobe: true
            })
        );

        assert_eq!(JpegHeader::parse(&bytes[..12]), None);
        assert_eq!(JpegHeader::parse(b"GIF89a"), None);
    }

    #[test]
    fn truncated_png_fails_to_embed() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([9, 9, 9, 255]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        let src = OverlaySource::from_bytes(&out[..out.len() / 2]).unwrap();

        let mut doc = Document::with_version("1.5");
        assert!(matches!(add_image_xobject(&mut doc, &src), Err(StampError::Embed(_))));
    }

    #[test]
    fn opacity_is_clamped() {
        let mut doc = Document::with_version("1.5");
        let id = add_opacity_state(&mut doc, 1.7);
        let dict = doc.get_object(id).unwrap().as_dict().unwrap();
        assert_eq!(dict.get(b"ca").unwrap().as_float().unwrap(), 1.0);
    }
}
