//! Image loading and decoding

use crate::{AppError, FolderInfo};
use app_fs::{AccessProvider, AccessToken, UniversalPath};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, RgbaImage};
use std::fs::File;
use std::io::{Cursor, Read};
use std::sync::Arc;

/// An EXIF APP1 segment is at most 64 KiB and sits near the start of the file
const EXIF_SCAN_LIMIT: u64 = 128 * 1024;

/// How an image on screen was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Full-resolution decode
    Full,
    /// Quick downscaled decode, replaced once the full image lands
    Thumbnail,
    /// Cached preview from the previous session
    Preview,
}

/// A decoded RGBA bitmap
#[derive(Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
    pub source: ImageSource,
}

impl DecodedImage {
    fn from_dynamic(img: DynamicImage, source: ImageSource) -> Self {
        let pixels = img.to_rgba8();
        let (width, height) = pixels.dimensions();
        Self {
            width,
            height,
            pixels,
            source,
        }
    }
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("source", &self.source)
            .finish()
    }
}

/// Reads image files under the owning folder's access grant
#[derive(Clone)]
pub struct ImageLoader {
    access: Arc<dyn AccessProvider>,
}

impl ImageLoader {
    pub fn new(access: Arc<dyn AccessProvider>) -> Self {
        Self { access }
    }

    /// Decode at full resolution
    pub fn load_full(&self, path: &UniversalPath, owner: Option<&FolderInfo>) -> Result<DecodedImage, AppError> {
        let _token = self.acquire(owner)?;
        let img = decode_file(path)?;
        Ok(DecodedImage::from_dynamic(img, ImageSource::Full))
    }

    /// Quick low-resolution image, neither side exceeding `max_dimension`
    ///
    /// Uses the thumbnail embedded in the EXIF header when there is one, so
    /// only the first few kilobytes of the file are read. Otherwise the
    /// whole file is decoded and downscaled.
    pub fn load_thumbnail(
        &self,
        path: &UniversalPath,
        owner: Option<&FolderInfo>,
        max_dimension: u32,
    ) -> Result<DecodedImage, AppError> {
        let _token = self.acquire(owner)?;
        let img = match read_embedded_thumbnail(path) {
            Some(img) => img,
            None => decode_file(path)?,
        };
        Ok(DecodedImage::from_dynamic(
            shrink(img, max_dimension),
            ImageSource::Thumbnail,
        ))
    }

    fn acquire(&self, owner: Option<&FolderInfo>) -> Result<Option<AccessToken>, AppError> {
        match owner {
            None => Ok(None),
            Some(folder) if folder.is_shared => Ok(Some(AccessToken::unscoped(folder.path.as_path()))),
            Some(folder) => Ok(Some(self.access.acquire(folder.path.as_path())?)),
        }
    }
}

fn decode_file(path: &UniversalPath) -> Result<DynamicImage, AppError> {
    tracing::debug!("Decoding image: {}", path);

    let data = std::fs::read(path.as_path())?;

    let mut reader = ImageReader::new(Cursor::new(&data))
        .with_guessed_format()
        .map_err(|e| AppError::ImageDecode(e.to_string()))?;
    if reader.format().is_none() {
        if let Ok(format) = ImageFormat::from_path(path.as_path()) {
            reader.set_format(format);
        }
    }

    match reader.decode() {
        Ok(img) => Ok(img),
        Err(image::ImageError::Unsupported(e)) => {
            // HEIC among others: listed for draws, but there is no decoder for it
            tracing::warn!("No decoder for {}: {}", path, e);
            Err(AppError::UnsupportedFormat(path.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn read_embedded_thumbnail(path: &UniversalPath) -> Option<DynamicImage> {
    let mut header = Vec::new();
    File::open(path.as_path())
        .and_then(|file| file.take(EXIF_SCAN_LIMIT).read_to_end(&mut header))
        .ok()?;

    let jpeg = embedded_thumbnail(&header)?;
    match image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg) {
        Ok(img) => {
            tracing::trace!("Using embedded thumbnail of {}", path);
            Some(img)
        }
        Err(e) => {
            tracing::debug!("Embedded thumbnail of {} is unreadable: {}", path, e);
            None
        }
    }
}

/// JPEG bytes of the IFD1 thumbnail in a JPEG's EXIF segment
fn embedded_thumbnail(data: &[u8]) -> Option<&[u8]> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut pos = 2;
    loop {
        if *data.get(pos)? != 0xFF {
            return None;
        }
        let marker = *data.get(pos + 1)?;
        match marker {
            // Fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            // Start of scan or end of image: no more metadata
            0xDA | 0xD9 => return None,
            _ => {}
        }

        let len = usize::from(u16::from_be_bytes([*data.get(pos + 2)?, *data.get(pos + 3)?]));
        let segment = data.get(pos + 4..pos + 2 + len)?;
        if marker == 0xE1 {
            if let Some(tiff) = segment.strip_prefix(b"Exif\0\0") {
                if let Some(jpeg) = Tiff::new(tiff).and_then(|t| t.thumbnail()) {
                    return Some(jpeg);
                }
            }
        }
        pos += 2 + len;
    }
}

/// Just enough TIFF to find the IFD1 thumbnail
struct Tiff<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl<'a> Tiff<'a> {
    const TAG_THUMBNAIL_OFFSET: u16 = 0x0201;
    const TAG_THUMBNAIL_LENGTH: u16 = 0x0202;
    const TYPE_SHORT: u16 = 3;

    fn new(data: &'a [u8]) -> Option<Self> {
        let big_endian = match data.get(..2)? {
            b"MM" => true,
            b"II" => false,
            _ => return None,
        };
        let tiff = Self { data, big_endian };
        (tiff.u16(2)? == 42).then_some(tiff)
    }

    fn u16(&self, at: usize) -> Option<u16> {
        let bytes = [*self.data.get(at)?, *self.data.get(at + 1)?];
        Some(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn u32(&self, at: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(at..at + 4)?.try_into().ok()?;
        Some(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    /// Offset of the IFD that follows the one at `ifd`
    fn next_ifd(&self, ifd: usize) -> Option<usize> {
        let count = usize::from(self.u16(ifd)?);
        let next = self.u32(ifd + 2 + count * 12)?;
        (next != 0).then_some(next as usize)
    }

    fn thumbnail(&self) -> Option<&'a [u8]> {
        let ifd0 = self.u32(4)? as usize;
        let ifd1 = self.next_ifd(ifd0)?;

        let mut offset = None;
        let mut length = None;
        for i in 0..usize::from(self.u16(ifd1)?) {
            let entry = ifd1 + 2 + i * 12;
            let value = if self.u16(entry + 2)? == Self::TYPE_SHORT {
                u32::from(self.u16(entry + 8)?)
            } else {
                self.u32(entry + 8)?
            };
            match self.u16(entry)? {
                Self::TAG_THUMBNAIL_OFFSET => offset = Some(value as usize),
                Self::TAG_THUMBNAIL_LENGTH => length = Some(value as usize),
                _ => {}
            }
        }

        let (offset, length) = (offset?, length?);
        let jpeg = self.data.get(offset..offset.checked_add(length)?)?;
        jpeg.starts_with(&[0xFF, 0xD8]).then_some(jpeg)
    }
}

fn shrink(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w > max_dimension || h > max_dimension {
        img.thumbnail(max_dimension, max_dimension)
    } else {
        img
    }
}

/// Downscale and JPEG-encode for the resume preview
pub fn encode_preview_jpeg(image: &DecodedImage, max_dimension: u32, quality: u8) -> Result<Vec<u8>, AppError> {
    let img = shrink(DynamicImage::ImageRgba8(image.pixels.clone()), max_dimension);
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(buf)
}

pub fn decode_preview(bytes: &[u8]) -> Result<DecodedImage, AppError> {
    let img = image::load_from_memory(bytes)?;
    Ok(DecodedImage::from_dynamic(img, ImageSource::Preview))
}
