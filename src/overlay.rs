use crate::error::{Result, StampError};
use crate::geometry::Size;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Jpeg,
}

/// Encoded overlay image plus its pixel size. Never modified after creation.
#[derive(Debug, Clone)]
pub struct OverlaySource {
    bytes: Vec<u8>,
    format: RasterFormat,
    width: u32,
    height: u32,
}

impl OverlaySource {
    /// Accepts PNG, JPEG, or either one wrapped in a base64 `data:` URL.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let bytes = if data.starts_with(b"data:") {
            let url = std::str::from_utf8(data)
                .map_err(|_| StampError::Embed("la data URL no es UTF-8 válido".into()))?;
            decode_data_url(url)?
        } else {
            data.to_vec()
        };

        let format = match image::guess_format(&bytes) {
            Ok(ImageFormat::Png) => RasterFormat::Png,
            Ok(ImageFormat::Jpeg) => RasterFormat::Jpeg,
            Ok(other) => return Err(StampError::Embed(format!("formato no soportado: {other:?}"))),
            Err(e) => return Err(StampError::Embed(e.to_string())),
        };

        let image_format = match format {
            RasterFormat::Png => ImageFormat::Png,
            RasterFormat::Jpeg => ImageFormat::Jpeg,
        };
        let (width, height) = ImageReader::with_format(Cursor::new(&bytes), image_format)
            .into_dimensions()
            .map_err(|e| StampError::Embed(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(StampError::Embed("la imagen no tiene píxeles".into()));
        }

        Ok(Self {
            bytes,
            format,
            width,
            height,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width as f64,
            height: self.height as f64,
        }
    }
}

/// Where the overlay came from. Each origin knows how to hand over its
/// encoded raster; nothing downstream looks at the origin again.
#[derive(Debug, Clone)]
pub enum OverlayRaster {
    Drawn(DrawnSignature),
    Typed(TypedText),
    Uploaded(UploadedImage),
}

#[derive(Debug, Clone, Default)]
pub struct DrawnSignature {
    pub capture: Option<String>,
}

/// Text rendered to an image by the host, e.g. a cursive signature or a
/// text watermark.
#[derive(Debug, Clone, Default)]
pub struct TypedText {
    pub text: String,
    pub font: String,
    pub rendered: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl OverlayRaster {
    /// Encoded image bytes, or `None` while there is nothing to place.
    pub fn raster(&self) -> Result<Option<Vec<u8>>> {
        match self {
            OverlayRaster::Drawn(d) => drawn_raster(d),
            OverlayRaster::Typed(t) => Ok(typed_raster(t)),
            OverlayRaster::Uploaded(u) => Ok(uploaded_raster(u)),
        }
    }

    pub fn source(&self) -> Result<OverlaySource> {
        let bytes = self.raster()?.ok_or(StampError::MissingOverlay)?;
        OverlaySource::from_bytes(&bytes)
    }
}

fn drawn_raster(drawn: &DrawnSignature) -> Result<Option<Vec<u8>>> {
    match drawn.capture.as_deref().map(str::trim) {
        None | Some("") | Some("data:,") => Ok(None),
        Some(url) => decode_data_url(url).map(Some),
    }
}

fn typed_raster(typed: &TypedText) -> Option<Vec<u8>> {
    if typed.text.trim().is_empty() {
        return None;
    }
    typed.rendered.clone().filter(|b| !b.is_empty())
}

fn uploaded_raster(upload: &UploadedImage) -> Option<Vec<u8>> {
    (!upload.bytes.is_empty()).then(|| upload.bytes.clone())
}

fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (header, payload) = url
        .split_once(',')
        .ok_or_else(|| StampError::Embed("data URL mal formada".into()))?;
    if !header.ends_with(";base64") {
        return Err(StampError::Embed("la data URL no está en base64".into()));
    }
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    B64.decode(compact.as_bytes())
        .map_err(|e| StampError::Embed(format!("contenido de la data URL: {e}")))
}
